//! Background eviction of stale tracking entries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;

/// Handle to the periodic sweep task.
///
/// The task lives until [`Sweeper::shutdown`] is called or the handle is
/// dropped.
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a task that sweeps `limiter` once per `interval`.
    ///
    /// The first sweep runs one interval after spawning. Must be called from
    /// within a tokio runtime.
    pub fn spawn(limiter: Arc<RateLimiter>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(interval_ms = interval.as_millis() as u64, "Starting entry sweeper");

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep_at(Instant::now());
                        if removed > 0 {
                            debug!(
                                removed = removed,
                                remaining = limiter.entry_count(),
                                "Evicted stale entries"
                            );
                        }
                    }
                    // Fires on an explicit signal or when the sender is dropped
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Self { shutdown_tx, handle }
    }

    /// Stop the sweep task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Entry sweeper exited abnormally");
        } else {
            info!("Entry sweeper stopped");
        }
    }

    /// Whether the sweep task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
