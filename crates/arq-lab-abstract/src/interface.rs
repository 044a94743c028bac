use serde::{Deserialize, Serialize};

use crate::packet::{Message, Packet};

/// Opaque identifier of one armed timer, issued by [`SystemContext::start_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

/// Outcome of offering a message to a sender.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// The sender cannot take the message now. Nothing was sent or buffered;
    /// the caller still owns the message and must offer it again later.
    Refused,
}

impl Admission {
    pub fn is_accepted(self) -> bool {
        self == Admission::Accepted
    }
}

/// The capability provided by the simulator to a protocol endpoint.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel.
    fn send_packet(&mut self, packet: Packet);

    /// Arm a single-shot timer expiring `duration` time units from now.
    fn start_timer(&mut self, duration: f64) -> TimerHandle;

    /// Stop a timer. Stopping an expired or already stopped timer is a no-op.
    fn stop_timer(&mut self, handle: TimerHandle);

    /// Pass data up to the application layer.
    fn deliver_data(&mut self, data: &str);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time.
    fn now(&self) -> f64;
}

/// Entry points shared by every endpoint attached to the channel.
pub trait NetworkHost {
    /// Called once before any traffic.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a (possibly corrupted) packet arrives from the peer.
    fn input(&mut self, ctx: &mut dyn SystemContext, packet: Packet);
}

/// The sending role: accepts application messages and owns the retransmission timer.
pub trait SenderHost: NetworkHost {
    /// Offer a message from the application layer.
    fn output(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission;

    /// Called when a timer armed by this sender expires.
    fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext, handle: TimerHandle);
}
