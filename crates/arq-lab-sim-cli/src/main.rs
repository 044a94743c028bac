use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

use arq_lab_abstract::{SimConfig, SimConfigOverride};
use arq_lab_protocols::ProtocolKind;
use arq_lab_simulator::scenario_runner::{self, load_scenario};
use arq_lab_simulator::{SimulationReport, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-Wait / Go-Back-N channel simulator")]
struct Args {
    /// Protocol to run (`stop-and-wait` or `go-back-n`). Defaults to the
    /// scenario's protocol, then to go-back-n.
    #[arg(long)]
    protocol: Option<ProtocolKind>,

    /// Load a scenario from disk and check its assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// TOML file with a base `SimConfig`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of generated application messages.
    #[arg(long)]
    messages: Option<u32>,

    /// Probability that a packet is lost.
    #[arg(long)]
    loss: Option<f64>,

    /// Probability that a packet is corrupted.
    #[arg(long)]
    corrupt: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Log channel decisions and every processed event.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("arq-lab starting…");

    let report = if let Some(path) = &args.scenario {
        let scenario = load_scenario(path)?;
        let base = args.base_config(SimConfig::default())?;
        let protocol = match (args.protocol, scenario.protocol.as_deref()) {
            (Some(kind), _) => kind,
            (None, Some(name)) => name.parse()?,
            (None, None) => ProtocolKind::GoBackN,
        };
        info!("Protocol: {protocol}");
        scenario_runner::run_scenario(&scenario, base, &args.flag_overrides(), |cfg| {
            protocol.pair(cfg)
        })?
    } else {
        let protocol = args.protocol.unwrap_or(ProtocolKind::GoBackN);
        run_default_sim(protocol, args.default_run_config()?)?
    };

    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    /// The `--config` file, or `fallback` when none is given.
    fn base_config(&self, fallback: SimConfig) -> Result<SimConfig> {
        match &self.config {
            Some(path) => load_config(path),
            None => Ok(fallback),
        }
    }

    /// Individual flags. Applied last, over the config file and any scenario `[config]`.
    fn flag_overrides(&self) -> SimConfigOverride {
        SimConfigOverride {
            message_count: self.messages,
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            seed: self.seed,
            ..Default::default()
        }
    }

    fn default_run_config(&self) -> Result<SimConfig> {
        let mut config = self.base_config(default_config())?;
        self.flag_overrides().apply_to(&mut config);
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

/// Workload used when no scenario is given.
fn default_config() -> SimConfig {
    SimConfig {
        loss_rate: 0.1,
        corrupt_rate: 0.1,
        seed: 42,
        message_count: 10,
        message_interval: 20.0,
        ..Default::default()
    }
}

fn run_default_sim(protocol: ProtocolKind, config: SimConfig) -> Result<SimulationReport> {
    config.validate().context("Invalid simulation configuration")?;
    info!(
        "Starting {} simulation: {} messages, loss={}, corrupt={}",
        protocol, config.message_count, config.loss_rate, config.corrupt_rate
    );

    let (sender, receiver) = protocol.pair(&config);
    let mut sim = Simulator::new(config, sender, receiver);
    sim.schedule_generated_messages()
        .context("Failed to generate application messages")?;
    sim.run_until_complete();
    info!("Simulation complete.");
    Ok(sim.export_report())
}

fn log_summary(report: &SimulationReport) {
    info!(
        "Simulation time: {:.1} | packets sent: {} | ACKs sent: {} | deliveries: {}",
        report.duration,
        report.sender_packet_count,
        report.receiver_packet_count,
        report.delivered_data.len()
    );
    info!(
        "Lost: {} | corrupted: {} | timeouts: {} | refused offers: {}",
        report.stats.lost, report.stats.corrupted, report.stats.timeouts, report.stats.refused_offers
    );
}

fn load_config(path: &Path) -> Result<SimConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SimConfig = toml::from_str(&content).context("Failed to parse config file")?;
    Ok(config)
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
