use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timer deadlines delivered back into the session loop.
///
/// The epoch identifies the arming that produced the event. A fire whose
/// epoch no longer matches raced a cancellation and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    NegotiationTimeout { epoch: u64 },
    RestartDue { epoch: u64 },
}

/// A single cancellable deadline. Arming again supersedes the previous one.
#[derive(Debug, Default)]
pub struct OneShot {
    epoch: u64,
    pending: Option<JoinHandle<()>>,
}

impl OneShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the deadline; `event` receives the epoch of this arming.
    pub fn arm<F>(&mut self, delay: Duration, tx: mpsc::Sender<TimerEvent>, event: F)
    where
        F: FnOnce(u64) -> TimerEvent,
    {
        self.cancel();
        self.epoch += 1;
        let fired = event(self.epoch);

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(fired).await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Consume a fire. Returns `false` for stale epochs and cancelled timers.
    pub fn fire(&mut self, epoch: u64) -> bool {
        if self.pending.is_none() || epoch != self.epoch {
            return false;
        }
        self.pending = None;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for OneShot {
    fn drop(&mut self) {
        self.cancel();
    }
}
