//! In-memory scheduler implementation

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::{JudgeAction, JudgeTask, TaskRecord, TaskStatus, generate_id};

use super::config::{AdmissionPolicy, SchedulerConfig};
use super::queue::{FinishedTaskQueue, QueueState, SchedulerStats};
use super::{SchedulerError, TaskScheduler};

/// Internal state protected by mutex
struct SchedulerInner {
    /// Canonical record for every known task, by id
    records: HashMap<String, TaskRecord>,

    /// Insertion order of ids, for `list` snapshots
    order: Vec<String>,

    /// FIFO queue of pending task ids
    pending: VecDeque<String>,

    /// Actions awaiting dispatch, removed when the task starts
    actions: HashMap<String, Arc<dyn JudgeAction>>,

    /// Number of currently executing tasks
    running: usize,

    /// Statistics
    stats: SchedulerStats,
}

/// Bounded FIFO in-memory scheduler
///
/// One mutex guards all registry state and is held only for in-memory
/// updates; actions execute outside the lock so a slow task never blocks
/// `schedule` or `list`. The dispatch loop parks on a Notify and is woken by
/// new work and freed slots.
pub struct InMemoryScheduler {
    config: SchedulerConfig,
    inner: Arc<Mutex<SchedulerInner>>,

    /// Wakes the dispatch loop on new work or a freed slot
    notify: Arc<Notify>,

    /// Pending + running count, read lock-free by `can_accept_judge_task`
    in_flight: Arc<AtomicUsize>,

    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,

    finished_tx: mpsc::UnboundedSender<TaskRecord>,
    finished: FinishedTaskQueue,
}

impl InMemoryScheduler {
    /// Create a new scheduler with the given configuration
    pub fn new(config: SchedulerConfig) -> Self {
        debug!(?config, "InMemoryScheduler::new: called");
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            inner: Arc::new(Mutex::new(SchedulerInner {
                records: HashMap::new(),
                order: Vec::new(),
                pending: VecDeque::new(),
                actions: HashMap::new(),
                running: 0,
                stats: SchedulerStats::default(),
            })),
            notify: Arc::new(Notify::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            started: AtomicBool::new(false),
            shutdown_tx,
            finished_tx,
            finished: FinishedTaskQueue::new(finished_rx),
        }
    }

    /// Signal the dispatch loop to exit
    ///
    /// Running tasks finish their terminal transition; pending tasks stay
    /// pending. `schedule` refuses new work afterwards.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown_tx.send_replace(true);
        self.notify.notify_one();
    }

    /// Get current queue state for display surfaces
    pub async fn queue_state(&self) -> QueueState {
        let inner = self.inner.lock().await;
        QueueState {
            pending: inner.pending.len(),
            running: inner.running,
            stats: inner.stats.clone(),
        }
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        let inner = self.inner.lock().await;
        inner.stats.clone()
    }

    /// Pop the earliest pending task if a slot is free, marking it running
    async fn next_ready(&self) -> Option<(String, Arc<dyn JudgeAction>)> {
        let mut inner = self.inner.lock().await;

        if inner.running >= self.config.max_concurrent {
            debug!(running = inner.running, "next_ready: no free slot");
            return None;
        }

        let id = inner.pending.pop_front()?;
        let action = inner.actions.remove(&id)?;
        let record = inner.records.get_mut(&id)?;

        record.status = TaskStatus::Running;
        record.started_at = Some(Utc::now());

        inner.running += 1;
        inner.stats.peak_running = inner.stats.peak_running.max(inner.running);
        debug!(%id, running = inner.running, "next_ready: task starting");

        Some((id, action))
    }

    /// Run one action to completion and record its terminal transition
    ///
    /// Spawned per task; failures and panics are captured here and never
    /// reach the dispatch loop.
    fn spawn_task(&self, id: String, action: Arc<dyn JudgeAction>) {
        let inner = Arc::clone(&self.inner);
        let in_flight = Arc::clone(&self.in_flight);
        let notify = Arc::clone(&self.notify);
        let finished_tx = self.finished_tx.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(action.run()).catch_unwind().await;

            let mut inner = inner.lock().await;
            let snapshot = if let Some(record) = inner.records.get_mut(&id) {
                match outcome {
                    Ok(Ok(result)) => {
                        record.status = TaskStatus::Done;
                        record.result = Some(result);
                    }
                    Ok(Err(err)) => {
                        warn!(%id, error = %err, "Task action failed");
                        record.status = TaskStatus::Failed;
                        record.error = Some(format!("{err:#}"));
                    }
                    Err(panic) => {
                        let msg = panic_message(panic);
                        warn!(%id, error = %msg, "Task action panicked");
                        record.status = TaskStatus::Failed;
                        record.error = Some(msg);
                    }
                }
                record.finished_at = Some(Utc::now());
                Some(record.clone())
            } else {
                None
            };

            inner.running -= 1;
            if let Some(ref record) = snapshot {
                match record.status {
                    TaskStatus::Done => inner.stats.total_completed += 1,
                    TaskStatus::Failed => inner.stats.total_failed += 1,
                    _ => {}
                }
            }
            drop(inner);

            in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(record) = snapshot {
                debug!(id = %record.id, status = %record.status, "Task finished");
                let _ = finished_tx.send(record);
            }

            // Wake the dispatch loop: a slot is free
            notify.notify_one();
        });
    }
}

#[async_trait]
impl TaskScheduler for InMemoryScheduler {
    fn can_accept_judge_task(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) < self.config.max_concurrent
    }

    fn finished_judge_tasks_queue(&self) -> FinishedTaskQueue {
        self.finished.clone()
    }

    async fn clean(&self) -> Result<(), SchedulerError> {
        debug!("InMemoryScheduler::clean: called");
        let mut inner = self.inner.lock().await;

        let terminal: HashSet<String> = inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .records
                    .get(id.as_str())
                    .map(|r| r.status.is_terminal())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        for id in &terminal {
            inner.records.remove(id);
        }
        inner.order.retain(|id| !terminal.contains(id));
        inner.stats.total_cleaned += terminal.len() as u64;

        debug!(
            removed = terminal.len(),
            remaining = inner.order.len(),
            "InMemoryScheduler::clean: removed terminal tasks"
        );
        Ok(())
    }

    async fn list(&self) -> Vec<TaskRecord> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .cloned()
            .collect()
    }

    async fn schedule(&self, task: JudgeTask) -> Result<String, SchedulerError> {
        debug!(name = %task.name, "InMemoryScheduler::schedule: called");

        if *self.shutdown_tx.borrow() {
            debug!(name = %task.name, "InMemoryScheduler::schedule: scheduler shut down, rejecting");
            return Err(SchedulerError::ShutDown);
        }

        let mut inner = self.inner.lock().await;

        let pending = inner.pending.len();
        let running = inner.running;
        if pending + running >= self.config.max_concurrent {
            match self.config.admission_policy {
                AdmissionPolicy::RejectWhenFull => {
                    debug!(name = %task.name, pending, running, "InMemoryScheduler::schedule: at capacity, rejecting");
                    return Err(SchedulerError::CapacityExceeded {
                        pending,
                        running,
                        limit: self.config.max_concurrent,
                    });
                }
                AdmissionPolicy::AcceptAndQueue => {
                    debug!(name = %task.name, pending, running, "InMemoryScheduler::schedule: at capacity, queuing anyway");
                }
            }
        }

        let id = generate_id("jt");
        let record = TaskRecord::new(&id, &task.name);

        inner.records.insert(id.clone(), record);
        inner.order.push(id.clone());
        inner.pending.push_back(id.clone());
        inner.actions.insert(id.clone(), task.action);

        inner.stats.total_scheduled += 1;
        inner.stats.peak_pending = inner.stats.peak_pending.max(inner.pending.len());

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        drop(inner);

        // Wake the dispatch loop: new work is available
        self.notify.notify_one();

        debug!(%id, "InMemoryScheduler::schedule: accepted");
        Ok(id)
    }

    async fn start(&self) -> Result<(), SchedulerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("InMemoryScheduler::start: called twice");
            return Err(SchedulerError::AlreadyStarted);
        }

        info!(max_concurrent = self.config.max_concurrent, "Dispatch loop started");
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // Fill free slots with pending work, FIFO by submission
            while let Some((id, action)) = self.next_ready().await {
                self.spawn_task(id, action);
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Dispatch loop stopped");
        Ok(())
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quick_task(name: &str) -> JudgeTask {
        JudgeTask::from_fn(name, || async { Ok(json!("ok")) })
    }

    #[tokio::test]
    async fn test_schedule_assigns_distinct_ids() {
        let scheduler = InMemoryScheduler::new(SchedulerConfig::default());

        let a = scheduler.schedule(quick_task("a")).await.unwrap();
        let b = scheduler.schedule(quick_task("b")).await.unwrap();

        assert_ne!(a, b);
        let tasks = scheduler.list().await;
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let scheduler = InMemoryScheduler::new(SchedulerConfig::default());

        scheduler.schedule(quick_task("first")).await.unwrap();
        scheduler.schedule(quick_task("second")).await.unwrap();
        scheduler.schedule(quick_task("third")).await.unwrap();

        let names: Vec<String> = scheduler.list().await.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_can_accept_counts_pending() {
        let scheduler = InMemoryScheduler::new(SchedulerConfig {
            max_concurrent: 2,
            ..Default::default()
        });

        // Dispatch loop not started, so both stay pending
        assert!(scheduler.can_accept_judge_task());
        scheduler.schedule(quick_task("a")).await.unwrap();
        assert!(scheduler.can_accept_judge_task());
        scheduler.schedule(quick_task("b")).await.unwrap();
        assert!(!scheduler.can_accept_judge_task());
    }

    #[tokio::test]
    async fn test_reject_when_full() {
        let scheduler = InMemoryScheduler::new(SchedulerConfig {
            max_concurrent: 1,
            admission_policy: AdmissionPolicy::RejectWhenFull,
        });

        scheduler.schedule(quick_task("a")).await.unwrap();

        let err = scheduler.schedule(quick_task("b")).await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::CapacityExceeded {
                pending: 1,
                running: 0,
                limit: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_accept_and_queue_over_capacity() {
        let scheduler = InMemoryScheduler::new(SchedulerConfig {
            max_concurrent: 1,
            ..Default::default()
        });

        scheduler.schedule(quick_task("a")).await.unwrap();
        // Advisory admission says no, schedule still accepts
        assert!(!scheduler.can_accept_judge_task());
        scheduler.schedule(quick_task("b")).await.unwrap();

        assert_eq!(scheduler.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_clean_skips_pending() {
        let scheduler = InMemoryScheduler::new(SchedulerConfig::default());

        scheduler.schedule(quick_task("a")).await.unwrap();
        scheduler.clean().await.unwrap();

        assert_eq!(scheduler.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_after_shutdown() {
        let scheduler = InMemoryScheduler::new(SchedulerConfig::default());

        scheduler.shutdown();
        let err = scheduler.schedule(quick_task("late")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::ShutDown));
    }

    #[tokio::test]
    async fn test_start_twice() {
        let scheduler = Arc::new(InMemoryScheduler::new(SchedulerConfig::default()));

        let runner = Arc::clone(&scheduler);
        let handle = tokio::spawn(async move { runner.start().await });

        scheduler.shutdown();
        handle.await.unwrap().unwrap();

        let err = scheduler.start().await.unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyStarted));
    }
}
