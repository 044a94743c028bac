//! Alternating-bit (Stop-and-Wait) sender and receiver.
//!
//! The sender keeps exactly one packet in flight. Data packets carry the
//! current bit in `seq_num`; the receiver acknowledges with the same bit in
//! `ack_num` and re-sends its last acknowledgment for anything it did not
//! expect.

use arq_lab_abstract::{
    Admission, DEFAULT_TIMEOUT, Message, NetworkHost, Packet, SenderHost, SystemContext,
    TimerHandle,
};

use crate::checksum::{is_corrupted, make_ack, make_packet};
use crate::timer::RetransmitTimer;

/// The alternating sequence bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bit {
    #[default]
    Zero,
    One,
}

impl Bit {
    pub fn flip(self) -> Self {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }

    /// Wire value carried in the sequence / acknowledgment field.
    pub fn value(self) -> i32 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Idle, accepting a new message.
    WaitForApp,
    /// One packet outstanding, timer armed.
    WaitForAck,
}

pub struct StopAndWaitSender {
    state: SenderState,
    current_seq: Bit,
    expected_ack: Bit,
    last_sent: Option<Packet>,
    timer: RetransmitTimer,
}

impl Default for StopAndWaitSender {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl StopAndWaitSender {
    pub fn new(timeout: f64) -> Self {
        Self {
            state: SenderState::WaitForApp,
            current_seq: Bit::Zero,
            expected_ack: Bit::Zero,
            last_sent: None,
            timer: RetransmitTimer::new(timeout),
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Bit the next new message will be sent with.
    pub fn current_seq(&self) -> Bit {
        self.current_seq
    }

    pub fn expected_ack(&self) -> Bit {
        self.expected_ack
    }

    pub fn last_sent(&self) -> Option<&Packet> {
        self.last_sent.as_ref()
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }
}

impl NetworkHost for StopAndWaitSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.timer.cancel(ctx);
        self.state = SenderState::WaitForApp;
        self.current_seq = Bit::Zero;
        self.expected_ack = Bit::Zero;
        self.last_sent = None;
        ctx.log("Stop-and-Wait sender ready");
    }

    fn input(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if is_corrupted(&packet) {
            ctx.log(&format!(
                "SW sender: corrupted ACK (ack={}), waiting for timeout",
                packet.ack_num
            ));
            return;
        }
        if self.state != SenderState::WaitForAck || packet.ack_num != self.expected_ack.value() {
            ctx.log(&format!(
                "SW sender: ignoring ACK {} (expecting {} in {:?})",
                packet.ack_num,
                self.expected_ack.value(),
                self.state
            ));
            return;
        }

        ctx.log(&format!("SW sender: received ACK {}", packet.ack_num));
        self.timer.cancel(ctx);
        self.state = SenderState::WaitForApp;
    }
}

impl SenderHost for StopAndWaitSender {
    fn output(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission {
        if self.state == SenderState::WaitForAck {
            ctx.log("SW sender busy: refusing application data");
            return Admission::Refused;
        }

        let packet = make_packet(self.current_seq.value(), 0, message.data());
        ctx.log(&format!(
            "SW sender: send seq={} ({} bytes)",
            packet.seq_num,
            packet.len()
        ));
        ctx.send_packet(packet.clone());
        self.timer.arm(ctx);
        self.last_sent = Some(packet);

        self.expected_ack = self.current_seq;
        self.current_seq = self.current_seq.flip();
        self.state = SenderState::WaitForAck;
        Admission::Accepted
    }

    fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext, handle: TimerHandle) {
        if !self.timer.expired(handle) {
            return;
        }
        if self.state != SenderState::WaitForAck {
            return;
        }
        if let Some(packet) = &self.last_sent {
            ctx.log(&format!(
                "SW sender: timeout, retransmitting seq {}",
                packet.seq_num
            ));
            ctx.send_packet(packet.clone());
            self.timer.arm(ctx);
        }
    }
}

#[derive(Default)]
pub struct StopAndWaitReceiver {
    expected: Bit,
    last_ack: Option<Packet>,
}

impl StopAndWaitReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_bit(&self) -> Bit {
        self.expected
    }

    pub fn last_ack(&self) -> Option<&Packet> {
        self.last_ack.as_ref()
    }
}

impl NetworkHost for StopAndWaitReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.expected = Bit::Zero;
        self.last_ack = None;
        ctx.log("Stop-and-Wait receiver ready");
    }

    fn input(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if !is_corrupted(&packet) && packet.seq_num == self.expected.value() {
            ctx.log(&format!(
                "SW receiver: received seq {} ({} bytes)",
                packet.seq_num,
                packet.len()
            ));
            ctx.deliver_data(&packet.payload);

            let ack = make_ack(self.expected.value());
            ctx.send_packet(ack.clone());
            self.last_ack = Some(ack);
            self.expected = self.expected.flip();
            return;
        }

        match &self.last_ack {
            Some(ack) => {
                ctx.log(&format!(
                    "SW receiver: unexpected or corrupted seq {} (expect {}), re-ACK {}",
                    packet.seq_num,
                    self.expected.value(),
                    ack.ack_num
                ));
                ctx.send_packet(ack.clone());
            }
            None => ctx.log("SW receiver: dropping packet, nothing acknowledged yet"),
        }
    }
}
