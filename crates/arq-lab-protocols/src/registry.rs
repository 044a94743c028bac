use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use arq_lab_abstract::{NetworkHost, SenderHost, SimConfig};

use crate::go_back_n::{GoBackNReceiver, GoBackNSender};
use crate::stop_and_wait::{StopAndWaitReceiver, StopAndWaitSender};

/// The reliable-transfer variants shipped with the lab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    StopAndWait,
    GoBackN,
}

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 2] = [ProtocolKind::StopAndWait, ProtocolKind::GoBackN];

    pub fn name(self) -> &'static str {
        match self {
            ProtocolKind::StopAndWait => "stop-and-wait",
            ProtocolKind::GoBackN => "go-back-n",
        }
    }

    /// Build a sender using the timeout (and, for Go-Back-N, the window size) from `config`.
    pub fn sender(self, config: &SimConfig) -> Box<dyn SenderHost> {
        match self {
            ProtocolKind::StopAndWait => Box::new(StopAndWaitSender::new(config.timeout)),
            ProtocolKind::GoBackN => {
                Box::new(GoBackNSender::new(config.window_size, config.timeout))
            }
        }
    }

    pub fn receiver(self) -> Box<dyn NetworkHost> {
        match self {
            ProtocolKind::StopAndWait => Box::new(StopAndWaitReceiver::new()),
            ProtocolKind::GoBackN => Box::new(GoBackNReceiver::new()),
        }
    }

    pub fn pair(self, config: &SimConfig) -> (Box<dyn SenderHost>, Box<dyn NetworkHost>) {
        (self.sender(config), self.receiver())
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolKind {
    type Err = anyhow::Error;

    /// Map a user-visible protocol name to its kind.
    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stop-and-wait" | "stop_and_wait" | "sw" | "abp" => Ok(ProtocolKind::StopAndWait),
            "go-back-n" | "go_back_n" | "gbn" => Ok(ProtocolKind::GoBackN),
            other => anyhow::bail!("Unknown protocol '{other}'. Try 'stop-and-wait' or 'go-back-n'."),
        }
    }
}
