use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("min_latency ({min}) is greater than max_latency ({max})")]
    LatencyRange { min: f64, max: f64 },

    #[error("{name} must be non-negative and finite, got {value}")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("timeout must be positive, got {0}")]
    NonPositiveTimeout(f64),

    #[error("window_size must be at least 1")]
    EmptyWindow,
}
