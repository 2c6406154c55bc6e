//! Duration watchdog
//!
//! A repeating timer that reports the seconds left in a recording and
//! fires a stop once the duration limit is reached.

use super::session::RecordingEvent;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Whole seconds left, computed from whole elapsed seconds
pub fn remaining_secs(limit: Duration, elapsed: Duration) -> u64 {
    limit.as_secs().saturating_sub(elapsed.as_secs())
}

/// Handle to a running watchdog task
pub struct Watchdog {
    handle: JoinHandle<()>,
    active: Arc<AtomicBool>,
}

impl Watchdog {
    /// Start ticking every `tick`, beginning one tick after `started_at`
    ///
    /// `on_expire` runs at most once, on its own task, after which the
    /// watchdog deactivates itself.
    pub fn spawn<F, Fut>(
        started_at: Instant,
        limit: Duration,
        tick: Duration,
        events: broadcast::Sender<RecordingEvent>,
        on_expire: F,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(started_at + tick, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }

                let elapsed = started_at.elapsed();
                let remaining = remaining_secs(limit, elapsed);
                let _ = events.send(RecordingEvent::Progress {
                    remaining_secs: remaining,
                });

                if elapsed >= limit {
                    tracing::info!("Duration limit of {}s reached", limit.as_secs());
                    flag.store(false, Ordering::SeqCst);
                    tokio::spawn(on_expire());
                    break;
                }
            }
        });

        Self { handle, active }
    }

    /// Dispose of the timer
    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.handle.abort();
    }

    /// Whether the timer is still counting down
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_remaining_uses_whole_seconds() {
        let limit = Duration::from_secs(2);
        assert_eq!(remaining_secs(limit, Duration::from_millis(100)), 2);
        assert_eq!(remaining_secs(limit, Duration::from_millis(1900)), 1);
        assert_eq!(remaining_secs(limit, Duration::from_secs(2)), 0);
        assert_eq!(remaining_secs(limit, Duration::from_secs(5)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_exactly_once() {
        let (tx, mut rx) = broadcast::channel(256);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let watchdog = Watchdog::spawn(
            Instant::now(),
            Duration::from_secs(1),
            Duration::from_millis(100),
            tx,
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!watchdog.is_active());

        let mut progress = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RecordingEvent::Progress { remaining_secs } = event {
                progress.push(remaining_secs);
            }
        }
        assert_eq!(progress.len(), 10);
        assert!(progress.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(progress.last(), Some(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_expiry() {
        let (tx, _rx) = broadcast::channel(256);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let watchdog = Watchdog::spawn(
            Instant::now(),
            Duration::from_secs(1),
            Duration::from_millis(100),
            tx,
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        watchdog.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!watchdog.is_active());
    }
}
