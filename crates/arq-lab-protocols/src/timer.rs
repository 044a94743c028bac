use arq_lab_abstract::{SystemContext, TimerHandle};

/// The single retransmission timer a sender owns.
///
/// Holds at most one live handle. Arming always stops the previous handle
/// first, so a sender can never leave a second timer running behind it.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    duration: f64,
    handle: Option<TimerHandle>,
}

impl RetransmitTimer {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            handle: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// (Re)start the timer for the full duration.
    pub fn arm(&mut self, ctx: &mut dyn SystemContext) {
        self.cancel(ctx);
        self.handle = Some(ctx.start_timer(self.duration));
    }

    pub fn cancel(&mut self, ctx: &mut dyn SystemContext) {
        if let Some(handle) = self.handle.take() {
            ctx.stop_timer(handle);
        }
    }

    /// Consume an expiry notification.
    ///
    /// Returns `false` when `handle` is not the one currently held, i.e. the
    /// notification belongs to a timer that was already stopped or replaced.
    pub fn expired(&mut self, handle: TimerHandle) -> bool {
        if self.handle == Some(handle) {
            self.handle = None;
            true
        } else {
            false
        }
    }
}
