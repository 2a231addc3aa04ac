//! Interruptible wait

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Why a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed
    Elapsed,
    /// Someone called `interrupt`
    Interrupted,
    /// Shutdown was requested
    Shutdown,
}

/// Timed sleep that ends early on interrupt or shutdown
///
/// An interrupt sent while nobody is waiting is kept and ends the next wait
/// immediately, so a change made between two waits is never missed.
#[derive(Clone)]
pub struct InterruptibleTimer {
    interrupt: Arc<Notify>,
    shutdown: CancellationToken,
}

impl InterruptibleTimer {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            interrupt: Arc::new(Notify::new()),
            shutdown,
        }
    }

    /// Cut the current (or next) wait short
    pub fn interrupt(&self) {
        self.interrupt.notify_one();
    }

    pub async fn wait(&self, duration: Duration) -> WaitOutcome {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => WaitOutcome::Shutdown,
            () = self.interrupt.notified() => WaitOutcome::Interrupted,
            () = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
        }
    }
}
