//! Go-Back-N sliding-window sender and receiver.
//!
//! ```text
//!    base             next_seq         base + window_size
//!     │                  │                  │
//! ────┼──────────────────┼──────────────────┼────▶ seq space
//!     │ <── in flight ──▶│ <── sendable ───▶│
//! ```
//!
//! ACKs are cumulative: `ack_num = k` acknowledges every packet up to and
//! including `k`. One timer covers the oldest outstanding packet; when it
//! fires the whole window `[base, next_seq)` is sent again.

use std::collections::VecDeque;

use arq_lab_abstract::{
    Admission, DEFAULT_TIMEOUT, DEFAULT_WINDOW_SIZE, Message, NetworkHost, Packet, SenderHost,
    SystemContext, TimerHandle,
};

use crate::checksum::{is_corrupted, make_ack, make_packet};
use crate::timer::RetransmitTimer;

pub struct GoBackNSender {
    /// Oldest unacknowledged sequence number.
    base: i32,
    next_seq: i32,
    window_size: usize,
    /// Sent packets with seq in `[base, next_seq)`, oldest first.
    window: VecDeque<Packet>,
    timer: RetransmitTimer,
}

impl Default for GoBackNSender {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_TIMEOUT)
    }
}

impl GoBackNSender {
    /// `window_size` must be at least 1 (`SimConfig::validate` rejects 0); a
    /// zero window refuses every message.
    pub fn new(window_size: usize, timeout: f64) -> Self {
        Self {
            base: 0,
            next_seq: 0,
            window_size,
            window: VecDeque::with_capacity(window_size),
            timer: RetransmitTimer::new(timeout),
        }
    }

    pub fn base(&self) -> i32 {
        self.base
    }

    pub fn next_seq(&self) -> i32 {
        self.next_seq
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of sent but unacknowledged packets.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    /// Room in the window and sequence numbers left to hand out.
    pub fn can_send(&self) -> bool {
        self.in_flight() < self.window_size && self.next_seq < i32::MAX
    }

    /// Outstanding packets from oldest to newest.
    pub fn outstanding(&self) -> impl Iterator<Item = &Packet> {
        self.window.iter()
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }
}

impl NetworkHost for GoBackNSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.timer.cancel(ctx);
        self.base = 0;
        self.next_seq = 0;
        self.window.clear();
        ctx.log(&format!(
            "GBN sender ready (window={}, timeout={})",
            self.window_size,
            self.timer.duration()
        ));
    }

    fn input(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if is_corrupted(&packet) {
            ctx.log("GBN sender: dropping corrupted ACK");
            return;
        }

        let ack = packet.ack_num;
        if ack < self.base {
            ctx.log(&format!(
                "GBN sender: stale ACK {} (base={})",
                ack, self.base
            ));
            return;
        }
        if ack >= self.next_seq {
            ctx.log(&format!(
                "GBN sender: ACK {} for unsent data (next_seq={})",
                ack, self.next_seq
            ));
            return;
        }

        let newly_acked = (ack - self.base + 1) as usize;
        self.window.drain(..newly_acked);
        self.base = ack + 1;
        ctx.log(&format!(
            "GBN sender: ACK {} slides base to {} ({} in flight)",
            ack,
            self.base,
            self.in_flight()
        ));

        if self.base == self.next_seq {
            self.timer.cancel(ctx);
        } else {
            self.timer.arm(ctx);
        }
    }
}

impl SenderHost for GoBackNSender {
    fn output(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission {
        if !self.can_send() {
            if self.next_seq == i32::MAX {
                ctx.log("GBN sender: sequence space exhausted, refusing application data");
            } else {
                ctx.log(&format!(
                    "GBN sender: window full (base={}, next_seq={}), refusing application data",
                    self.base, self.next_seq
                ));
            }
            return Admission::Refused;
        }

        let packet = make_packet(self.next_seq, 0, message.data());
        ctx.log(&format!(
            "GBN sender: send seq={} ({} bytes)",
            packet.seq_num,
            packet.len()
        ));
        self.window.push_back(packet.clone());
        ctx.send_packet(packet);

        if self.base == self.next_seq {
            self.timer.arm(ctx);
        }
        self.next_seq += 1;
        Admission::Accepted
    }

    fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext, handle: TimerHandle) {
        if !self.timer.expired(handle) || self.window.is_empty() {
            return;
        }

        self.timer.arm(ctx);
        ctx.log(&format!(
            "GBN sender: timeout, going back to {} ({} packets)",
            self.base,
            self.window.len()
        ));
        for packet in &self.window {
            ctx.send_packet(packet.clone());
        }
    }
}

#[derive(Default)]
pub struct GoBackNReceiver {
    expected_seq: i32,
    last_ack: Option<Packet>,
}

impl GoBackNReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_seq(&self) -> i32 {
        self.expected_seq
    }

    pub fn last_ack(&self) -> Option<&Packet> {
        self.last_ack.as_ref()
    }
}

impl NetworkHost for GoBackNReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.expected_seq = 0;
        self.last_ack = None;
        ctx.log("GBN receiver ready");
    }

    fn input(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if !is_corrupted(&packet) && packet.seq_num == self.expected_seq {
            ctx.log(&format!(
                "GBN receiver: received seq {} ({} bytes)",
                packet.seq_num,
                packet.len()
            ));
            ctx.deliver_data(&packet.payload);

            let ack = make_ack(self.expected_seq);
            ctx.send_packet(ack.clone());
            self.last_ack = Some(ack);
            self.expected_seq += 1;
            return;
        }

        // Out-of-order data is never buffered.
        match &self.last_ack {
            Some(ack) => {
                ctx.log(&format!(
                    "GBN receiver: unexpected or corrupted seq {} (expect {}), re-ACK {}",
                    packet.seq_num, self.expected_seq, ack.ack_num
                ));
                ctx.send_packet(ack.clone());
            }
            None => ctx.log("GBN receiver: dropping packet, nothing acknowledged yet"),
        }
    }
}
