use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Register a one-shot deferred invocation of `task` at `when`. Timestamps
/// in the past fire immediately.
///
/// Fire-and-forget: the caller returns without waiting, there is no
/// cancellation handle, and pending schedules are lost if the process
/// crashes before they fire (known limitation; durability would require a
/// persisted due-queue with a recovery sweep on startup).
pub fn schedule_at<F>(when: DateTime<Utc>, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let delay = (when - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(delay).await;
        task.await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fires_once_at_the_scheduled_time() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        schedule_at(Utc::now() + chrono::Duration::milliseconds(50), async move {
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn past_timestamps_fire_immediately() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        schedule_at(Utc::now() - chrono::Duration::seconds(10), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
