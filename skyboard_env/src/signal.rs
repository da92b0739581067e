//! Payload-less notifications: heartbeat, watchdog warning, termination.
//!
//! A signal carries no data. Raising it never blocks the raiser and never
//! fails loudly; the receiver either waits for the next one inside a
//! `tokio::select!` or drains whatever is pending on its own schedule.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Raising half of a signal.
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<()>,
}

impl SignalSender {
    /// Fire-and-forget notification.
    ///
    /// Returns `false` if nobody is listening anymore.
    pub fn raise(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Receiving half of a signal.
pub struct SignalReceiver {
    rx: mpsc::UnboundedReceiver<()>,
}

impl SignalReceiver {
    /// Waits for the next notification.
    ///
    /// # Returns
    /// * `Some(())` - The signal was raised
    /// * `None` - Every sender has been dropped; no signal can arrive anymore
    pub async fn wait(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Resolves when the signal is raised.
    ///
    /// Once every sender is gone this never resolves, so it can sit in a
    /// `tokio::select!` branch without spinning.
    pub async fn raised(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    /// Drains pending notifications without waiting and returns how many
    /// there were.
    pub fn take_pending(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(()) => count += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return count,
            }
        }
    }

    /// True if at least one notification is pending (drains them).
    pub fn is_raised(&mut self) -> bool {
        self.take_pending() > 0
    }
}

/// Creates a signal pair.
pub fn signal() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, SignalReceiver { rx })
}
