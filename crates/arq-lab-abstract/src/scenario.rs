use crate::config::SimConfig;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Protocol name (`stop-and-wait` or `go-back-n`); the caller decides when absent.
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<f64>,
    pub max_latency: Option<f64>,
    pub preserve_order: Option<bool>,
    pub seed: Option<u64>,
    pub timeout: Option<f64>,
    pub window_size: Option<usize>,
    pub message_count: Option<u32>,
    pub message_interval: Option<f64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.preserve_order {
            config.preserve_order = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.message_count {
            config.message_count = v;
        }
        if let Some(v) = self.message_interval {
            config.message_interval = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application offers data at a specific time
    AppSend { time: f64, data: String },
    /// Drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: i32 },
    /// Drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: i32 },
    /// Corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: i32 },
    /// Corrupt the first ACK sent by Receiver with given ack number
    CorruptNextFromReceiverAck { ack: i32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert the exact, ordered sequence of deliveries (no gaps, duplicates or reordering)
    DeliveredExactly { data: Vec<String> },
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that simulation finishes within time
    MaxDuration { time: f64 },
    /// Assert that no node ever held more than one live timer
    NoTimerOverlap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_only_touches_present_fields() {
        let over = SimConfigOverride {
            corrupt_rate: Some(0.2),
            window_size: Some(4),
            ..Default::default()
        };
        let mut config = SimConfig::default();
        over.apply_to(&mut config);
        assert_eq!(config.corrupt_rate, 0.2);
        assert_eq!(config.window_size, 4);
        assert_eq!(config.loss_rate, 0.0);
        assert_eq!(config.timeout, crate::DEFAULT_TIMEOUT);
    }
}
