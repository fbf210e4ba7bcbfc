//! Keyed progress store for background sync and import runs.
//!
//! One worker per session writes a percentage after every processed record;
//! any number of pollers read it. An absent session reads as 100 ("already
//! complete"), which papers over the window where a poller starts before
//! the worker's first write — an accepted race, since a worker always
//! registers its session before the token escapes. Dropping a subscription
//! stops that poller only; the worker runs to completion regardless.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;

use tally_shared::SessionToken;

/// Percentage reported for a finished or unknown session.
pub const COMPLETE: u8 = 100;

const SUBSCRIBE_BUFFER: usize = 16;

/// Thread-safe progress store, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    sessions: Arc<DashMap<SessionToken, u8>>,
}

impl ProgressTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session at zero percent.
    pub fn start(&self, token: SessionToken) {
        self.sessions.insert(token, 0);
    }

    /// Records that `processed` of `total` records are done.
    pub fn record(&self, token: SessionToken, processed: usize, total: usize) {
        self.sessions.insert(token, percent(processed, total));
    }

    /// Marks a session complete. Also the sentinel for an aborted run.
    pub fn complete(&self, token: SessionToken) {
        self.sessions.insert(token, COMPLETE);
    }

    /// Current percentage for a session; absent sessions read as complete.
    #[must_use]
    pub fn get(&self, token: SessionToken) -> u8 {
        self.sessions.get(&token).map_or(COMPLETE, |entry| *entry)
    }

    /// Number of live sessions, for tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Opens a polling subscription for a session.
    ///
    /// A detached task re-reads the session's value once per
    /// `poll_interval` and sends it down the channel. After sending a
    /// complete value it removes the session entry and closes the channel.
    /// A dropped receiver ends the task without touching the entry.
    #[must_use]
    pub fn subscribe(&self, token: SessionToken, poll_interval: Duration) -> mpsc::Receiver<u8> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBE_BUFFER);
        let tracker = self.clone();

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(poll_interval);
            loop {
                ticks.tick().await;
                let current = tracker.get(token);
                if sender.send(current).await.is_err() {
                    return;
                }
                if current >= COMPLETE {
                    tracker.sessions.remove(&token);
                    return;
                }
            }
        });

        receiver
    }
}

/// Half-up integer percentage, clamped to 100. Zero total is complete.
#[must_use]
pub fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return COMPLETE;
    }
    let rounded = (processed * 100 + total / 2) / total;
    u8::try_from(rounded.min(100)).unwrap_or(COMPLETE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::nothing_done(0, 8, 0)]
    #[case::halfway(4, 8, 50)]
    #[case::rounds_half_up(1, 3, 33)]
    #[case::rounds_up(2, 3, 67)]
    #[case::all_done(8, 8, 100)]
    #[case::overshoot_clamps(9, 8, 100)]
    #[case::zero_total_is_complete(0, 0, 100)]
    fn percent_rounds_half_up(#[case] processed: usize, #[case] total: usize, #[case] expected: u8) {
        assert_eq!(percent(processed, total), expected);
    }

    #[test]
    fn absent_session_reads_complete() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.get(SessionToken::new()), COMPLETE);
    }

    #[test]
    fn worker_writes_are_visible_to_readers() {
        let tracker = ProgressTracker::new();
        let token = SessionToken::new();

        tracker.start(token);
        assert_eq!(tracker.get(token), 0);

        tracker.record(token, 3, 4);
        assert_eq!(tracker.get(token), 75);

        tracker.complete(token);
        assert_eq!(tracker.get(token), COMPLETE);
    }

    #[tokio::test]
    async fn subscription_reports_until_complete_then_closes() {
        let tracker = ProgressTracker::new();
        let token = SessionToken::new();
        tracker.start(token);

        let mut receiver = tracker.subscribe(token, Duration::from_millis(1));
        assert_eq!(receiver.recv().await, Some(0));

        tracker.record(token, 1, 2);
        // Drain until the mid-run value shows up.
        loop {
            match receiver.recv().await {
                Some(50) => break,
                Some(0) => {}
                other => panic!("unexpected progress {other:?}"),
            }
        }

        tracker.complete(token);
        loop {
            match receiver.recv().await {
                Some(COMPLETE) => break,
                Some(50) => {}
                other => panic!("unexpected progress {other:?}"),
            }
        }

        assert_eq!(receiver.recv().await, None);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn dropping_the_receiver_leaves_the_session_alone() {
        let tracker = ProgressTracker::new();
        let token = SessionToken::new();
        tracker.start(token);

        let receiver = tracker.subscribe(token, Duration::from_millis(1));
        drop(receiver);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(tracker.get(token), 0);
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn many_concurrent_readers_see_the_same_value() {
        let tracker = ProgressTracker::new();
        let token = SessionToken::new();
        tracker.start(token);
        tracker.record(token, 7, 10);

        let reads = (0..16).map(|_| {
            let tracker = tracker.clone();
            async move { tracker.get(token) }
        });
        let values = futures::future::join_all(reads).await;
        assert!(values.iter().all(|&value| value == 70));
    }
}
