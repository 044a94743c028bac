//! Recording `SystemContext` used by the state machine tests.

use arq_lab_abstract::{Packet, SystemContext, TimerHandle};

#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Packet>,
    pub delivered: Vec<String>,
    pub started: Vec<(TimerHandle, f64)>,
    pub stopped: Vec<TimerHandle>,
    pub expired: Vec<TimerHandle>,
    pub logs: Vec<String>,
    next_timer: u64,
}

impl RecordingContext {
    /// Timers started and neither stopped nor expired.
    pub fn live_timers(&self) -> Vec<TimerHandle> {
        self.started
            .iter()
            .map(|(handle, _)| *handle)
            .filter(|h| !self.stopped.contains(h) && !self.expired.contains(h))
            .collect()
    }

    /// The single live timer, marked as expired so it can be handed to `timer_interrupt`.
    pub fn fire(&mut self) -> TimerHandle {
        let live = self.live_timers();
        assert_eq!(live.len(), 1, "expected exactly one live timer, got {live:?}");
        self.expired.push(live[0]);
        live[0]
    }

    pub fn take_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, duration: f64) -> TimerHandle {
        self.next_timer += 1;
        let handle = TimerHandle(self.next_timer);
        self.started.push((handle, duration));
        handle
    }

    fn stop_timer(&mut self, handle: TimerHandle) {
        self.stopped.push(handle);
    }

    fn deliver_data(&mut self, data: &str) {
        self.delivered.push(data.to_string());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> f64 {
        0.0
    }
}
