//! Session cancellation signal
//!
//! A [`CancelTrigger`] / [`CancelSignal`] pair built on a `watch` channel.
//! Cancelling the trigger, or dropping it, resolves every pending
//! [`CancelSignal::cancelled`].

use tokio::sync::watch;

/// Owner side: fires cancellation
#[derive(Debug)]
pub struct CancelTrigger(watch::Sender<bool>);

impl CancelTrigger {
    /// Signal cancellation
    #[inline]
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observer side: awaited by long-running work
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// Whether cancellation has been signalled or the trigger is gone
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Resolves once cancelled
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Create a linked trigger and signal
#[must_use]
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger(tx), CancelSignal(rx))
}
