//! Poll-to-push notification of a changing count.
//!
//! The dashboard shows how many orders are waiting for a driver. Rather than
//! have every client poll, each subscriber gets a task that polls a
//! [`CountSource`] on a fixed interval and pushes a value only when it
//! differs from the last one pushed. A change that reverts within one
//! interval may go unseen.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::Result;

const CHANNEL_CAPACITY: usize = 16;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Something whose current count can be polled.
#[async_trait]
pub trait CountSource: Send + Sync + 'static {
    async fn current_count(&self) -> Result<u64>;
}

/// Suppresses consecutive repeats of a value.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last: Option<u64>,
}

impl ChangeTracker {
    /// Returns the value if it differs from the previously observed one.
    pub fn observe(&mut self, value: u64) -> Option<u64> {
        if self.last == Some(value) {
            None
        } else {
            self.last = Some(value);
            Some(value)
        }
    }
}

/// Hands out count subscriptions, one polling task each.
pub struct LiveCountFeed<C: CountSource> {
    source: Arc<C>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    live: Arc<AtomicUsize>,
}

impl<C: CountSource> Clone for LiveCountFeed<C> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            poll_interval: self.poll_interval,
            shutdown: self.shutdown.clone(),
            live: Arc::clone(&self.live),
        }
    }
}

impl<C: CountSource> LiveCountFeed<C> {
    /// Creates a feed polling `source` every `poll_interval` (at least 1ms).
    pub fn new(source: C, poll_interval: Duration) -> Self {
        Self {
            source: Arc::new(source),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            shutdown: CancellationToken::new(),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Starts a polling task and returns its subscription.
    ///
    /// The first value arrives right away; later values only on change. The
    /// task stops when the subscription is dropped or cancelled, or when the
    /// feed shuts down.
    pub fn subscribe(&self) -> CountSubscription {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = self.shutdown.child_token();
        let guard = LiveGuard::new(Arc::clone(&self.live));

        tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            self.poll_interval,
            tx,
            token.clone(),
            guard,
        ));

        CountSubscription { rx, token }
    }

    /// Number of polling tasks still running.
    pub fn subscriber_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Stops every subscription's task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn poll_loop<C: CountSource>(
    source: Arc<C>,
    period: Duration,
    tx: mpsc::Sender<u64>,
    token: CancellationToken,
    _guard: LiveGuard,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tracker = ChangeTracker::default();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tx.closed() => break,
            _ = ticker.tick() => {}
        }

        let count = match source.current_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::debug!(error = %e, "count poll failed");
                continue;
            }
        };

        if let Some(changed) = tracker.observe(count) {
            tokio::select! {
                _ = token.cancelled() => break,
                sent = tx.send(changed) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!("count subscription closed");
}

/// Keeps the feed's live-task count while a polling task runs.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Receiving end of a count subscription.
///
/// Yields each changed count. Ends once the polling task stops.
pub struct CountSubscription {
    rx: mpsc::Receiver<u64>,
    token: CancellationToken,
}

impl CountSubscription {
    pub async fn next_count(&mut self) -> Option<u64> {
        self.rx.recv().await
    }

    /// Stops the polling task. Values already pushed can still be read.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Stream for CountSubscription {
    type Item = u64;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u64>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for CountSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectionError;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Returns scripted values, then repeats the last one.
    struct Scripted {
        values: Mutex<VecDeque<Result<u64>>>,
        last: Mutex<u64>,
    }

    impl Scripted {
        fn new(values: Vec<Result<u64>>) -> Self {
            Self {
                values: Mutex::new(values.into()),
                last: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl CountSource for Scripted {
        async fn current_count(&self) -> Result<u64> {
            match self.values.lock().await.pop_front() {
                Some(Ok(value)) => {
                    *self.last.lock().await = value;
                    Ok(value)
                }
                Some(Err(e)) => Err(e),
                None => Ok(*self.last.lock().await),
            }
        }
    }

    const TICK: Duration = Duration::from_secs(1);

    #[test]
    fn test_change_tracker_suppresses_repeats() {
        let mut tracker = ChangeTracker::default();
        let pushed: Vec<_> = [3, 3, 5, 5, 2, 2, 3]
            .into_iter()
            .filter_map(|v| tracker.observe(v))
            .collect();
        assert_eq!(pushed, vec![3, 5, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushes_only_changes() {
        let source = Scripted::new(vec![Ok(3), Ok(3), Ok(5), Ok(5), Ok(2)]);
        let feed = LiveCountFeed::new(source, TICK);
        let mut sub = feed.subscribe();

        assert_eq!(sub.next_count().await, Some(3));
        assert_eq!(sub.next_count().await, Some(5));
        assert_eq!(sub.next_count().await, Some(2));

        let quiet = tokio::time::timeout(TICK * 10, sub.next_count()).await;
        assert!(quiet.is_err(), "no value expected while the count is stable");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_value_is_immediate() {
        let feed = LiveCountFeed::new(Scripted::new(vec![Ok(7)]), Duration::from_secs(3600));
        let mut sub = feed.subscribe();

        let first = tokio::time::timeout(Duration::from_millis(1), sub.next_count()).await;
        assert_eq!(first.unwrap(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_skipped() {
        let source = Scripted::new(vec![
            Ok(1),
            Err(ProjectionError::Projection("index unavailable".to_string())),
            Ok(4),
        ]);
        let feed = LiveCountFeed::new(source, TICK);
        let mut sub = feed.subscribe();

        assert_eq!(sub.next_count().await, Some(1));
        assert_eq!(sub.next_count().await, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_subscription_stops_task() {
        let feed = LiveCountFeed::new(Scripted::new(vec![Ok(1)]), TICK);
        let mut sub = feed.subscribe();
        assert_eq!(sub.next_count().await, Some(1));
        assert_eq!(feed.subscriber_count(), 1);

        drop(sub);
        tokio::time::sleep(TICK * 2).await;
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_every_subscription() {
        let feed = LiveCountFeed::new(Scripted::new(vec![Ok(1)]), TICK);
        let mut first = feed.subscribe();
        let mut second = feed.subscribe();
        assert_eq!(first.next_count().await, Some(1));
        assert_eq!(second.next_count().await, Some(1));
        assert_eq!(feed.subscriber_count(), 2);

        feed.shutdown();

        assert_eq!(first.next_count().await, None);
        assert_eq!(second.next_count().await, None);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_is_a_stream() {
        use futures_util::StreamExt;

        let source = Scripted::new(vec![Ok(2), Ok(2), Ok(9)]);
        let feed = LiveCountFeed::new(source, TICK);
        let counts: Vec<_> = feed.subscribe().take(2).collect().await;
        assert_eq!(counts, vec![2, 9]);
    }
}
