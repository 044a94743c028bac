pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{Admission, NetworkHost, SenderHost, SystemContext, TimerHandle};
pub use packet::{MAX_DATA_SIZE, Message, Packet};

pub use config::{DEFAULT_TIMEOUT, DEFAULT_WINDOW_SIZE, SimConfig};
pub use error::{ConfigError, PacketError};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
