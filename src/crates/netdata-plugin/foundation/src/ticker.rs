//! Logical clock aligned to wall-clock interval boundaries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Produces an increasing clock value each time the wall clock crosses an
/// interval boundary.
///
/// Delivery never blocks the ticker: a value that cannot be handed over
/// because the previous one is still unread is dropped, and the ticker
/// simply sleeps until the next boundary. Slow consumers therefore miss
/// intermediate values instead of accumulating a backlog.
#[derive(Debug)]
pub struct Ticker {
    rx: mpsc::Receiver<u64>,
    cancellation: CancellationToken,
}

impl Ticker {
    /// Start a ticker with the given interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let (tx, rx) = mpsc::channel(1);
        let cancellation = CancellationToken::new();

        tokio::spawn(run(interval, tx, cancellation.clone()));

        Self { rx, cancellation }
    }

    /// Wait for the next clock value.
    ///
    /// Returns `None` once the ticker has been stopped and every
    /// already-delivered value has been read.
    pub async fn tick(&mut self) -> Option<u64> {
        self.rx.recv().await
    }

    /// Stop the background task. Further calls have no effect.
    pub fn stop(&self) {
        self.cancellation.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn run(interval: Duration, tx: mpsc::Sender<u64>, cancellation: CancellationToken) {
    let mut clock: u64 = 0;

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = tokio::time::sleep(until_next_boundary(SystemTime::now(), interval)) => {}
        }

        match tx.try_send(clock) {
            Ok(()) => {}
            Err(TrySendError::Full(missed)) => {
                tracing::trace!(clock = missed, "ticker consumer busy, tick dropped");
            }
            Err(TrySendError::Closed(_)) => break,
        }
        clock += 1;
    }
}

/// Time left until `now` reaches the next multiple of `interval`
/// (measured from the Unix epoch).
fn until_next_boundary(now: SystemTime, interval: Duration) -> Duration {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let interval_ns = interval.as_nanos();
    let elapsed_ns = since_epoch.as_nanos() % interval_ns;

    Duration::from_nanos((interval_ns - elapsed_ns) as u64)
}
