//! Queue types for the scheduler

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::domain::TaskRecord;

/// Consumer handle for the completion channel
///
/// The dispatch side pushes every task exactly once after its terminal
/// transition; the channel is unbounded so a slow consumer never blocks
/// dispatch. Clones share the same underlying receiver, so multiple
/// consumers race for items - a single logical consumer is the supported
/// configuration.
#[derive(Clone)]
pub struct FinishedTaskQueue {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<TaskRecord>>>,
}

impl FinishedTaskQueue {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<TaskRecord>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Receive the next finished task, waiting if none is ready
    ///
    /// Returns `None` once the scheduler has been dropped and the queue
    /// drained.
    pub async fn recv(&self) -> Option<TaskRecord> {
        self.rx.lock().await.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub async fn try_recv(&self) -> Option<TaskRecord> {
        self.rx.lock().await.try_recv().ok()
    }
}

impl fmt::Debug for FinishedTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishedTaskQueue").finish_non_exhaustive()
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_scheduled: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cleaned: u64,
    pub peak_pending: usize,
    pub peak_running: usize,
}

/// Point-in-time queue state
#[derive(Debug, Clone)]
pub struct QueueState {
    pub pending: usize,
    pub running: usize,
    pub stats: SchedulerStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskRecord;

    #[tokio::test]
    async fn test_recv_in_send_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = FinishedTaskQueue::new(rx);

        tx.send(TaskRecord::new("jt-1", "a")).unwrap();
        tx.send(TaskRecord::new("jt-2", "b")).unwrap();

        assert_eq!(queue.recv().await.unwrap().id, "jt-1");
        assert_eq!(queue.recv().await.unwrap().id, "jt-2");
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let (_tx, rx) = mpsc::unbounded_channel::<TaskRecord>();
        let queue = FinishedTaskQueue::new(rx);
        assert!(queue.try_recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recv_none_after_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = FinishedTaskQueue::new(rx);

        tx.send(TaskRecord::new("jt-1", "a")).unwrap();
        drop(tx);

        assert!(queue.recv().await.is_some());
        assert!(queue.recv().await.is_none());
    }
}
