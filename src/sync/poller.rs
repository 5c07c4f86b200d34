use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::BankingError;
use crate::infrastructure::config::SyncConfig;

const EVENT_CHANNEL_CAPACITY: usize = 16;
/// Consecutive failures after which retries are logged at `warn`.
const NOISY_FAILURE_THRESHOLD: u32 = 3;
/// Floor for the poll interval; a zero interval would spin against the server.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent<T> {
    Fetched(T),
    /// The cache should be left as is; the next attempt runs after `retry_in`.
    Failed {
        error: BankingError,
        consecutive_failures: u32,
        retry_in: Duration,
    },
}

/// Periodic fetch loop with exponential backoff on consecutive failures.
///
/// Results are pushed onto a channel so a push-based source could replace
/// polling without changing consumers.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_backoff: Duration,
    initial_delay: Duration,
}

impl Poller {
    pub fn new(config: &SyncConfig) -> Self {
        let interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        if interval != config.poll_interval {
            warn!(
                requested_ms = config.poll_interval.as_millis() as u64,
                "Poll interval raised to the minimum"
            );
        }
        Self {
            interval,
            max_backoff: config.max_backoff.max(interval),
            initial_delay: Duration::ZERO,
        }
    }

    /// Wait before the first fetch instead of fetching immediately.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Delay before the next fetch: the interval doubled per consecutive
    /// failure, capped at the configured ceiling.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        let factor = 1u32.checked_shl(consecutive_failures).unwrap_or(u32::MAX);
        self.interval.saturating_mul(factor).min(self.max_backoff)
    }

    /// Spawn the loop. It stops when `token` is cancelled or the receiver is dropped.
    pub fn spawn<T, F, Fut>(
        &self,
        name: &'static str,
        fetch: F,
        token: CancellationToken,
    ) -> (mpsc::Receiver<PollEvent<T>>, JoinHandle<()>)
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BankingError>> + Send,
    {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let poller = self.clone();
        let handle = tokio::spawn(async move { poller.run(name, fetch, sender, token).await });
        (receiver, handle)
    }

    pub async fn run<T, F, Fut>(
        &self,
        name: &'static str,
        mut fetch: F,
        sender: mpsc::Sender<PollEvent<T>>,
        token: CancellationToken,
    ) where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BankingError>>,
    {
        debug!(poller = name, interval_ms = self.interval.as_millis() as u64, "Poller started");
        let mut delay = self.initial_delay;
        let mut failures: u32 = 0;

        loop {
            if !delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(delay) => {}
                }
            }

            let result = tokio::select! {
                _ = token.cancelled() => break,
                result = fetch() => result,
            };

            let event = match result {
                Ok(value) => {
                    if failures > 0 {
                        info!(poller = name, failures, "Poll recovered");
                    }
                    failures = 0;
                    delay = self.interval;
                    PollEvent::Fetched(value)
                }
                Err(error) => {
                    failures = failures.saturating_add(1);
                    delay = self.backoff_delay(failures);
                    if failures >= NOISY_FAILURE_THRESHOLD {
                        warn!(
                            poller = name,
                            failures,
                            retry_in_ms = delay.as_millis() as u64,
                            "Poll failed: {}", error
                        );
                    } else {
                        debug!(
                            poller = name,
                            failures,
                            retry_in_ms = delay.as_millis() as u64,
                            "Poll failed: {}", error
                        );
                    }
                    PollEvent::Failed {
                        error,
                        consecutive_failures: failures,
                        retry_in: delay,
                    }
                }
            };

            if sender.send(event).await.is_err() {
                debug!(poller = name, "Receiver dropped");
                break;
            }
        }
        debug!(poller = name, "Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn poller() -> Poller {
        Poller::new(&SyncConfig {
            poll_interval: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let poller = poller();
        assert_eq!(poller.backoff_delay(0), Duration::from_secs(5));
        assert_eq!(poller.backoff_delay(1), Duration::from_secs(10));
        assert_eq!(poller.backoff_delay(3), Duration::from_secs(40));
        assert_eq!(poller.backoff_delay(4), Duration::from_secs(60));
        assert_eq!(poller.backoff_delay(200), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_then_reset() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(BankingError::transient("offline"))
                } else {
                    Ok(n)
                }
            }
        };

        let token = CancellationToken::new();
        let (mut rx, handle) = poller().spawn("test", fetch, token.clone());

        match rx.recv().await.unwrap() {
            PollEvent::Failed { consecutive_failures, retry_in, .. } => {
                assert_eq!(consecutive_failures, 1);
                assert_eq!(retry_in, Duration::from_secs(10));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            PollEvent::Failed { consecutive_failures, retry_in, .. } => {
                assert_eq!(consecutive_failures, 2);
                assert_eq!(retry_in, Duration::from_secs(20));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap(), PollEvent::Fetched(2));

        let before = tokio::time::Instant::now();
        assert_eq!(rx.recv().await.unwrap(), PollEvent::Fetched(3));
        assert_eq!(before.elapsed(), Duration::from_secs(5));

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let poller = Poller::new(&SyncConfig {
            poll_interval: Duration::ZERO,
            max_backoff: Duration::ZERO,
        });
        assert_eq!(poller.interval(), MIN_POLL_INTERVAL);
        assert_eq!(poller.backoff_delay(5), MIN_POLL_INTERVAL);

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(BankingError::transient("offline")) }
        };
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();
        let (mut rx, handle) = poller.spawn("test", fetch, token.clone());

        for _ in 0..5 {
            rx.recv().await.unwrap();
        }
        // Five fetches need at least four waits between them.
        assert!(start.elapsed() >= MIN_POLL_INTERVAL * 4);
        token.cancel();
        handle.await.unwrap();
        assert!(calls.load(Ordering::SeqCst) <= 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_loop() {
        let token = CancellationToken::new();
        let (mut rx, handle) =
            poller().spawn("test", || async { Ok::<_, BankingError>(1) }, token.clone());

        assert_eq!(rx.recv().await.unwrap(), PollEvent::Fetched(1));
        token.cancel();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay() {
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();
        let (mut rx, _handle) = poller()
            .with_initial_delay(Duration::from_secs(5))
            .spawn("test", || async { Ok::<_, BankingError>(()) }, token.clone());

        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        token.cancel();
    }
}
