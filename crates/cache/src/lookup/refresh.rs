//! Tracking of detached background refreshes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct RefreshTracker {
    active: AtomicUsize,
    idle: Notify,
}

impl RefreshTracker {
    /// Count a refresh as running until the returned ticket is dropped
    pub fn begin(self: &Arc<Self>) -> RefreshTicket {
        self.active.fetch_add(1, Ordering::SeqCst);
        RefreshTicket {
            tracker: Arc::clone(self),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Resolve once no refresh is running
    pub async fn settled(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, or a wakeup between the
            // check and the await would be lost.
            notified.as_mut().enable();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub(crate) struct RefreshTicket {
    tracker: Arc<RefreshTracker>,
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        if self.tracker.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}
