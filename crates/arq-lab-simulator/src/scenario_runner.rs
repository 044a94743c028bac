use anyhow::{Context, anyhow};
use arq_lab_abstract::{
    Message, NetworkHost, SenderHost, SimConfig, SimConfigOverride, TestAction, TestAssertion,
    TestScenario,
};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

/// Simulated time after which a scenario without `max_duration` is considered hung.
pub const DEFAULT_MAX_DURATION: f64 = 10_000.0;

pub fn load_scenario(path: &Path) -> anyhow::Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> anyhow::Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario")
}

/// `base`, then the scenario's `[config]`, then `overrides`, validated.
///
/// `overrides` carries settings the caller forces on every scenario (CLI flags).
pub fn scenario_config(
    scenario: &TestScenario,
    base: SimConfig,
    overrides: &SimConfigOverride,
) -> anyhow::Result<SimConfig> {
    let mut config = base;
    scenario.config.apply_to(&mut config);
    overrides.apply_to(&mut config);
    config
        .validate()
        .with_context(|| format!("Invalid configuration in scenario '{}'", scenario.name))?;
    Ok(config)
}

/// Schedule application sends and register deterministic faults.
pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) -> anyhow::Result<()> {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                let message = Message::new(data.as_str())
                    .with_context(|| format!("Invalid app_send at time {time}"))?;
                sim.schedule_app_send(*time, message);
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
            TestAction::CorruptNextFromReceiverAck { ack } => {
                sim.add_corrupt_receiver_ack_once(*ack);
            }
        }
    }
    Ok(())
}

/// Run `scenario` to completion and check its assertions.
///
/// `build` receives the effective configuration (see [`scenario_config`]) and
/// returns the sender/receiver pair.
pub fn run_scenario<F>(
    scenario: &TestScenario,
    base: SimConfig,
    overrides: &SimConfigOverride,
    build: F,
) -> anyhow::Result<SimulationReport>
where
    F: FnOnce(&SimConfig) -> (Box<dyn SenderHost>, Box<dyn NetworkHost>),
{
    info!("Running Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("Description: {}", scenario.description);
    }

    let config = scenario_config(scenario, base, overrides)?;
    let (sender, receiver) = build(&config);
    let mut sim = Simulator::new(config, sender, receiver);

    configure_actions(&mut sim, &scenario.actions)?;
    sim.schedule_generated_messages()
        .context("Failed to generate application messages")?;

    // Call init after we've configured the simulator
    sim.init();

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { time } = a {
                Some(*time)
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_DURATION);

    while sim.step() {
        if sim.current_time() > max_duration {
            return Err(anyhow!(
                "Scenario '{}' timed out after {} time units ({} events still queued)",
                scenario.name,
                max_duration,
                sim.remaining_events()
            ));
        }
    }

    check_assertions(&sim, &scenario.assertions)?;

    info!("Test Scenario Passed!");
    Ok(sim.export_report())
}

pub fn check_assertions(sim: &Simulator, assertions: &[TestAssertion]) -> anyhow::Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                if !sim.delivered_data.iter().any(|d| d == data) {
                    return Err(anyhow!(
                        "Assertion Failed: Data {:?} was not delivered",
                        data
                    ));
                }
            }
            TestAssertion::DeliveredExactly { data } => {
                if sim.delivered_data != *data {
                    return Err(anyhow!(
                        "Assertion Failed: delivered {:?}, expected exactly {:?}",
                        sim.delivered_data,
                        data
                    ));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                if sim.sender_packet_count < *min {
                    return Err(anyhow!(
                        "Assertion Failed: Sender sent {} packets, expected min {}",
                        sim.sender_packet_count,
                        min
                    ));
                }
                if let Some(max) = max
                    && sim.sender_packet_count > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: Sender sent {} packets, expected max {}",
                        sim.sender_packet_count,
                        max
                    ));
                }
            }
            TestAssertion::NoTimerOverlap => {
                if sim.stats.timer_overlaps > 0 {
                    return Err(anyhow!(
                        "Assertion Failed: {} timer(s) started while another was live",
                        sim.stats.timer_overlaps
                    ));
                }
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_lab_abstract::{Admission, Packet, SystemContext, TimerHandle};

    /// Sends every message once, never retransmits.
    struct OneShotSender;

    impl NetworkHost for OneShotSender {
        fn input(&mut self, _ctx: &mut dyn SystemContext, _packet: Packet) {}
    }

    impl SenderHost for OneShotSender {
        fn output(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission {
            ctx.send_packet(Packet::new(0, 0, 0, message.into_data()));
            Admission::Accepted
        }

        fn timer_interrupt(&mut self, _ctx: &mut dyn SystemContext, _handle: TimerHandle) {}
    }

    struct Deliverer;

    impl NetworkHost for Deliverer {
        fn input(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
            ctx.deliver_data(&packet.payload);
        }
    }

    fn pair(_: &SimConfig) -> (Box<dyn SenderHost>, Box<dyn NetworkHost>) {
        (Box::new(OneShotSender), Box::new(Deliverer))
    }

    fn run_default(scenario: &TestScenario) -> anyhow::Result<SimulationReport> {
        run_scenario(
            scenario,
            SimConfig::default(),
            &SimConfigOverride::default(),
            pair,
        )
    }

    const SCENARIO: &str = r#"
        name = "one-shot"
        description = "a lossless channel with a one-shot sender"

        [config]
        preserve_order = true

        [[actions]]
        type = "app_send"
        time = 0.0
        data = "hello"

        [[actions]]
        type = "app_send"
        time = 5.0
        data = "world"

        [[assertions]]
        type = "delivered_exactly"
        data = ["hello", "world"]

        [[assertions]]
        type = "sender_packet_count"
        min = 2
        max = 2

        [[assertions]]
        type = "no_timer_overlap"
    "#;

    #[test]
    fn parses_and_runs_a_scenario() {
        let scenario = parse_scenario(SCENARIO).unwrap();
        assert_eq!(scenario.actions.len(), 2);
        assert!(scenario.protocol.is_none());

        let report = run_default(&scenario).unwrap();
        assert_eq!(report.delivered_data, vec!["hello", "world"]);
    }

    #[test]
    fn failed_assertion_names_the_problem() {
        let mut scenario = parse_scenario(SCENARIO).unwrap();
        scenario.actions.push(TestAction::DropNextFromSenderSeq { seq: 0 });

        let err = run_default(&scenario).unwrap_err();
        assert!(err.to_string().contains("expected exactly"));
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let mut scenario = parse_scenario(SCENARIO).unwrap();
        scenario.config.loss_rate = Some(2.0);
        assert!(
            scenario_config(&scenario, SimConfig::default(), &SimConfigOverride::default())
                .is_err()
        );
    }

    #[test]
    fn caller_overrides_win_over_scenario_config() {
        let mut scenario = parse_scenario(SCENARIO).unwrap();
        scenario.config.loss_rate = Some(0.15);
        scenario.config.seed = Some(11);
        let flags = SimConfigOverride {
            loss_rate: Some(0.0),
            seed: Some(3),
            ..Default::default()
        };

        let config = scenario_config(&scenario, SimConfig::default(), &flags).unwrap();
        assert_eq!(config.loss_rate, 0.0);
        assert_eq!(config.seed, 3);
        // Untouched by the flags, so the scenario's value stays.
        assert!(config.preserve_order);

        let report = run_scenario(&scenario, SimConfig::default(), &flags, pair).unwrap();
        assert_eq!(report.config.seed, 3);
        assert_eq!(report.config.loss_rate, 0.0);
    }

    #[test]
    fn overrides_are_validated_too() {
        let scenario = parse_scenario(SCENARIO).unwrap();
        let flags = SimConfigOverride {
            corrupt_rate: Some(-0.5),
            ..Default::default()
        };
        assert!(scenario_config(&scenario, SimConfig::default(), &flags).is_err());
    }

    #[test]
    fn exceeding_max_duration_reports_a_timeout() {
        let mut scenario = parse_scenario(SCENARIO).unwrap();
        scenario
            .assertions
            .push(TestAssertion::MaxDuration { time: 0.5 });

        let err = run_default(&scenario).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("events still queued"));
    }

    #[test]
    fn oversize_app_send_is_an_error() {
        let mut scenario = parse_scenario(SCENARIO).unwrap();
        scenario.actions.push(TestAction::AppSend {
            time: 1.0,
            data: "x".repeat(arq_lab_abstract::MAX_DATA_SIZE + 1),
        });
        assert!(run_default(&scenario).is_err());
    }
}
