//! Size/time-bounded buffering for a single partition's claimed messages.

use tokio::sync::Mutex;

use crate::model::Message;

/// Default buffer capacity (preallocation size for the backing `Vec`).
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Default flush threshold — the buffer is swapped out once it reaches this length.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 8_000;
/// Default flush ticker interval, in seconds.
pub const DEFAULT_TICKER_INTERVAL_SECS: u64 = 10;

/// Accumulates messages for one partition under a mutex and hands off a
/// full slice when either the flush threshold is crossed or the caller
/// forces a flush (on a ticker tick).
///
/// The swap happens while holding the mutex only long enough to take the
/// old `Vec` and install a fresh, preallocated one — the caller is
/// responsible for sending the returned batch onward *after* releasing the
/// lock, so the hot append path never blocks on a slow downstream channel.
pub struct ConsumerBuffer {
    capacity: usize,
    flush_threshold: usize,
    inner: Mutex<Vec<Message>>,
}

impl ConsumerBuffer {
    pub fn new(capacity: usize, flush_threshold: usize) -> Self {
        assert!(
            flush_threshold <= capacity,
            "flush_threshold must not exceed capacity"
        );
        Self {
            capacity,
            flush_threshold,
            inner: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_FLUSH_THRESHOLD)
    }

    /// Append `message`. Returns `Some(batch)` if appending crossed the
    /// flush threshold, in which case the buffer has already been swapped
    /// for a fresh one.
    pub async fn push(&self, message: Message) -> Option<Vec<Message>> {
        let mut guard = self.inner.lock().await;
        guard.push(message);
        if guard.len() >= self.flush_threshold {
            Some(self.swap_locked(&mut guard))
        } else {
            None
        }
    }

    /// Force a flush regardless of length (used by the ticker). Returns
    /// `None` if the buffer was empty.
    pub async fn flush(&self) -> Option<Vec<Message>> {
        let mut guard = self.inner.lock().await;
        if guard.is_empty() {
            None
        } else {
            Some(self.swap_locked(&mut guard))
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    fn swap_locked(&self, guard: &mut Vec<Message>) -> Vec<Message> {
        std::mem::replace(guard, Vec::with_capacity(self.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(n: i64) -> Message {
        Message {
            topic: "orders".to_string(),
            key: None,
            payload: json!({ "n": n }),
            partition: Some(0),
            offset: Some(n),
        }
    }

    #[tokio::test]
    async fn test_push_below_threshold_does_not_flush() {
        let buf = ConsumerBuffer::new(10, 4);
        assert!(buf.push(msg(1)).await.is_none());
        assert!(buf.push(msg(2)).await.is_none());
        assert_eq!(buf.len().await, 2);
    }

    #[tokio::test]
    async fn test_push_at_threshold_flushes_and_resets() {
        let buf = ConsumerBuffer::new(10, 2);
        assert!(buf.push(msg(1)).await.is_none());
        let flushed = buf.push(msg(2)).await.expect("should flush at threshold");
        assert_eq!(flushed.len(), 2);
        assert_eq!(buf.len().await, 0);
    }

    #[tokio::test]
    async fn test_flush_empty_returns_none() {
        let buf = ConsumerBuffer::new(10, 4);
        assert!(buf.flush().await.is_none());
    }

    #[tokio::test]
    async fn test_flush_nonempty_returns_batch_and_resets() {
        let buf = ConsumerBuffer::new(10, 4);
        buf.push(msg(1)).await;
        let flushed = buf.flush().await.expect("should flush");
        assert_eq!(flushed.len(), 1);
        assert_eq!(buf.len().await, 0);
    }

    #[test]
    #[should_panic(expected = "flush_threshold must not exceed capacity")]
    fn test_invalid_threshold_panics() {
        ConsumerBuffer::new(4, 10);
    }
}
