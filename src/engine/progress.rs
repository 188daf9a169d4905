use crate::models::ProgressSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Emits snapshots with a percentage that never goes backwards
pub struct ProgressReporter {
    tx: UnboundedSender<ProgressSnapshot>,
    last_percent: u8,
}

impl ProgressReporter {
    pub fn new(tx: UnboundedSender<ProgressSnapshot>) -> Self {
        Self {
            tx,
            last_percent: 0,
        }
    }

    /// Send `snapshot`, raising its percentage to the highest one already sent.
    /// Returns the percentage actually sent.
    pub fn emit(&mut self, mut snapshot: ProgressSnapshot) -> u8 {
        let percent = snapshot.progress_percent.min(100).max(self.last_percent);
        snapshot.progress_percent = percent;
        self.last_percent = percent;
        // Receiver gone means nobody is watching; the job still runs to completion
        let _ = self.tx.send(snapshot);
        percent
    }
}

pub fn should_cancel(cancel_flag: &AtomicBool) -> bool {
    cancel_flag.load(Ordering::Relaxed)
}
