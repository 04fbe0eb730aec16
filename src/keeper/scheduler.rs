use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::shutdown::ShutdownSignal;
use crate::policy::{CycleOutcome, Policy};

/// Fixed-interval driver for one policy
///
/// The first tick fires one interval after start. Cycle errors are logged
/// and never end the loop; only the shutdown signal does.
pub struct PolicyScheduler {
    policy: Arc<dyn Policy>,
    interval: Duration,
    shutdown: ShutdownSignal,
}

impl PolicyScheduler {
    pub fn new(policy: Arc<dyn Policy>, interval: Duration, shutdown: ShutdownSignal) -> Self {
        Self {
            policy,
            interval,
            shutdown,
        }
    }

    /// Start the loop in the background
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let name = self.policy.name();

        if let Err(e) = self.policy.prime().await {
            error!("❌ Failed to prepare {} policy: {}", name, e);
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("⏰ {} loop started (every {:?})", name, self.interval);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    info!("{} loop stopped", name);
                    break;
                }
                _ = ticker.tick() => {
                    match self.policy.run_cycle().await {
                        Ok(CycleOutcome::Skipped(reason)) => {
                            debug!("{} cycle skipped: {}", name, reason);
                        }
                        Ok(CycleOutcome::Executed { tx_hash, success }) => {
                            info!("{} cycle executed {} (success: {})", name, tx_hash, success);
                        }
                        Err(e) => error!("❌ {} cycle failed: {}", name, e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::keeper::shutdown::ShutdownController;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPolicy {
        runs: AtomicUsize,
        primed: AtomicUsize,
        fail: bool,
    }

    impl CountingPolicy {
        fn new(fail: bool) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                primed: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Policy for CountingPolicy {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn prime(&self) -> AppResult<()> {
            self.primed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run_cycle(&self) -> AppResult<CycleOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Internal("node unreachable".to_string()));
            }
            Ok(CycleOutcome::Skipped("nothing to do".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_after_each_interval_until_shutdown() {
        let controller = ShutdownController::new();
        let policy = Arc::new(CountingPolicy::new(false));
        let handle =
            PolicyScheduler::new(policy.clone(), Duration::from_secs(10), controller.signal())
                .start();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(policy.primed.load(Ordering::SeqCst), 1);
        assert_eq!(policy.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(policy.runs.load(Ordering::SeqCst), 3);

        controller.trigger();
        handle.await.unwrap();
        assert_eq!(policy.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_cycles_do_not_stop_loop() {
        let controller = ShutdownController::new();
        let policy = Arc::new(CountingPolicy::new(true));
        let handle =
            PolicyScheduler::new(policy.clone(), Duration::from_secs(10), controller.signal())
                .start();

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(policy.runs.load(Ordering::SeqCst), 4);

        controller.trigger();
        handle.await.unwrap();
    }
}
