//! Retry scheduling for master registration.
//!
//! Keeps at most one live recurring retry task per deployment id. Firings
//! across all deployments are serialized through a shared lock, matching a
//! single retry worker; cancellation never interrupts a firing that is
//! already executing.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A retriable unit of work with its captured context.
///
/// Modeled as an explicit trait object rather than an inline closure so the
/// action can be cancelled and tested in isolation.
#[async_trait]
pub trait RetryAction: Send + Sync + 'static {
    /// Execute one firing. `attempt` is the process-wide attempt number.
    async fn run(&self, attempt: u32);
}

/// Handle to one deployment's recurring retry task
struct RetryTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RetryTask {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Schedules recurring registration retries, one live task per deployment id.
#[derive(Clone)]
pub struct RetryScheduler {
    tasks: Arc<DashMap<String, RetryTask>>,
    /// Attempt counter shared across all deployments; reset on any success
    attempts: Arc<AtomicU32>,
    /// Serializes firings across deployments
    serial: Arc<Mutex<()>>,
    period: Duration,
}

impl RetryScheduler {
    /// Create a scheduler with the given fixed period (also the initial delay)
    pub fn new(period: Duration) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            attempts: Arc::new(AtomicU32::new(0)),
            serial: Arc::new(Mutex::new(())),
            period,
        }
    }

    /// Schedule a recurring retry for a deployment.
    ///
    /// No-op when a live task already exists for the id. The check and the
    /// insert happen under the map's entry lock, so concurrent calls for the
    /// same id cannot both spawn.
    pub fn schedule(&self, deployment_id: &str, action: Arc<dyn RetryAction>) {
        match self.tasks.entry(deployment_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_live() {
                    return;
                }
                entry.insert(self.spawn_task(deployment_id.to_string(), action));
            }
            Entry::Vacant(entry) => {
                entry.insert(self.spawn_task(deployment_id.to_string(), action));
            }
        }
    }

    fn spawn_task(&self, deployment_id: String, action: Arc<dyn RetryAction>) -> RetryTask {
        info!(deployment_id = %deployment_id, "scheduling registration retry");

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let attempts = Arc::clone(&self.attempts);
        let serial = Arc::clone(&self.serial);
        let period = self.period;

        let handle = tokio::spawn(async move {
            // First firing only after the full initial delay elapses.
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let _guard = serial.lock().await;
                        if token.is_cancelled() {
                            break;
                        }

                        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                        info!(
                            attempt,
                            deployment_id = %deployment_id,
                            "retrying registration with master"
                        );

                        // A panicking firing must not kill the schedule.
                        if AssertUnwindSafe(action.run(attempt))
                            .catch_unwind()
                            .await
                            .is_err()
                        {
                            error!(
                                deployment_id = %deployment_id,
                                "registration retry panicked, keeping schedule"
                            );
                        }
                    }
                }
            }
        });

        RetryTask { cancel, handle }
    }

    /// Cancel the retry task for a deployment if one exists.
    ///
    /// Never blocks: a firing already in progress completes, then the task
    /// observes the cancellation and exits.
    pub fn cancel(&self, deployment_id: &str) {
        if let Some((_, task)) = self.tasks.remove(deployment_id) {
            info!(deployment_id = %deployment_id, "cancelling registration retry");
            task.cancel.cancel();
        }
    }

    /// Record a successful registration: cancel any pending task for the id
    /// and reset the shared attempt counter.
    pub fn mark_registered(&self, deployment_id: &str) {
        self.cancel(deployment_id);
        self.attempts.store(0, Ordering::SeqCst);
    }

    /// Whether a live retry task exists for the deployment
    pub fn has_pending(&self, deployment_id: &str) -> bool {
        self.tasks
            .get(deployment_id)
            .map(|task| task.is_live())
            .unwrap_or(false)
    }

    /// Deployment ids with a live retry task
    pub fn pending_ids(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|entry| entry.value().is_live())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Current value of the shared attempt counter
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const PERIOD: Duration = Duration::from_secs(60);

    struct CountingAction {
        fired: Arc<AtomicU32>,
    }

    #[async_trait]
    impl RetryAction for CountingAction {
        async fn run(&self, _attempt: u32) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingAction {
        fired: Arc<AtomicU32>,
    }

    #[async_trait]
    impl RetryAction for PanickingAction {
        async fn run(&self, attempt: u32) {
            self.fired.fetch_add(1, Ordering::SeqCst);
            if attempt == 1 {
                panic!("transient failure inside retry body");
            }
        }
    }

    fn counting(fired: &Arc<AtomicU32>) -> Arc<dyn RetryAction> {
        Arc::new(CountingAction {
            fired: Arc::clone(fired),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn no_firing_before_initial_delay() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));
        scheduler.schedule("svc-a", counting(&fired));

        sleep(PERIOD / 2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(scheduler.has_pending("svc-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn firings_increment_shared_counter() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));
        scheduler.schedule("svc-a", counting(&fired));

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.attempt_count(), 1);

        sleep(PERIOD).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.attempt_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_schedule_is_a_noop() {
        let scheduler = RetryScheduler::new(PERIOD);
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        scheduler.schedule("svc-a", counting(&first));
        scheduler.schedule("svc-a", counting(&second));

        assert_eq!(scheduler.pending_ids(), vec!["svc-a".to_string()]);

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_schedules_spawn_one_task() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            let action = counting(&fired);
            handles.push(tokio::spawn(async move {
                scheduler.schedule("svc-a", action);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(scheduler.pending_ids().len(), 1);

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_future_firings() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));
        scheduler.schedule("svc-a", counting(&fired));

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.cancel("svc-a");
        assert!(!scheduler.has_pending("svc-a"));

        sleep(PERIOD * 3).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));
        scheduler.schedule("svc-a", counting(&fired));

        scheduler.cancel("svc-a");
        scheduler.cancel("svc-a");
        scheduler.cancel("never-scheduled");

        assert!(!scheduler.has_pending("svc-a"));
        assert!(scheduler.pending_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_after_cancel_spawns_fresh_task() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));

        scheduler.schedule("svc-a", counting(&fired));
        scheduler.cancel("svc-a");
        scheduler.schedule("svc-a", counting(&fired));

        assert!(scheduler.has_pending("svc-a"));
        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_firing_keeps_the_schedule() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));
        scheduler.schedule(
            "svc-a",
            Arc::new(PanickingAction {
                fired: Arc::clone(&fired),
            }),
        );

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        sleep(PERIOD).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(scheduler.has_pending("svc-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_registered_cancels_and_resets_counter() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));
        scheduler.schedule("svc-a", counting(&fired));

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(scheduler.attempt_count(), 1);

        scheduler.mark_registered("svc-a");
        assert!(!scheduler.has_pending("svc-a"));
        assert_eq!(scheduler.attempt_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_is_shared_across_deployments() {
        let scheduler = RetryScheduler::new(PERIOD);
        let fired = Arc::new(AtomicU32::new(0));
        scheduler.schedule("svc-a", counting(&fired));
        scheduler.schedule("svc-b", counting(&fired));

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.attempt_count(), 2);

        // Any success resets the shared counter, not just the owner's share.
        scheduler.mark_registered("svc-a");
        assert_eq!(scheduler.attempt_count(), 0);
        assert!(scheduler.has_pending("svc-b"));
    }
}
