use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Retransmission timeout used by both senders, in simulated time units.
pub const DEFAULT_TIMEOUT: f64 = 40.0;

/// Go-Back-N window size.
pub const DEFAULT_WINDOW_SIZE: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: f64,
    pub max_latency: f64,
    /// Never schedule an arrival before the previous arrival in the same direction.
    pub preserve_order: bool,
    pub seed: u64,
    pub timeout: f64,
    pub window_size: usize,
    /// Messages generated by the application source (0 disables it).
    pub message_count: u32,
    /// Mean time between generated messages.
    pub message_interval: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1.0,
            max_latency: 10.0,
            preserve_order: false,
            seed: 0,
            timeout: DEFAULT_TIMEOUT,
            window_size: DEFAULT_WINDOW_SIZE,
            message_count: 0,
            message_interval: 100.0,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("loss_rate", self.loss_rate),
            ("corrupt_rate", self.corrupt_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        for (name, value) in [
            ("min_latency", self.min_latency),
            ("max_latency", self.max_latency),
            ("message_interval", self.message_interval),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDuration { name, value });
            }
        }
        if self.min_latency > self.max_latency {
            return Err(ConfigError::LatencyRange {
                min: self.min_latency,
                max: self.max_latency,
            });
        }
        if !(self.timeout.is_finite() && self.timeout > 0.0) {
            return Err(ConfigError::NonPositiveTimeout(self.timeout));
        }
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_rates() {
        let config = SimConfig {
            corrupt_rate: 1.5,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RateOutOfRange {
                name: "corrupt_rate",
                value: 1.5
            })
        );
    }

    #[test]
    fn rejects_inverted_latency_range() {
        let config = SimConfig {
            min_latency: 20.0,
            max_latency: 5.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LatencyRange { .. })
        ));
    }

    #[test]
    fn rejects_zero_window_and_timeout() {
        let config = SimConfig {
            window_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyWindow));

        let config = SimConfig {
            timeout: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveTimeout(0.0)));
    }
}
