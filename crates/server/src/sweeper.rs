//! Periodic removal of expired verification sessions.
//!
//! `verify` only expires the session it is asked about, so abandoned
//! sessions are reclaimed here on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use staffbridge_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use staffbridge_core::verification::VerificationStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

const SWEEPER_ACTOR: &str = "system:sweeper";

pub struct ExpirySweeper {
    store: Arc<VerificationStore>,
    audit: Arc<dyn AuditSink>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<VerificationStore>, audit: Arc<dyn AuditSink>, interval: Duration) -> Self {
        Self { store, audit, interval }
    }

    /// Runs one sweep and returns how many sessions were removed.
    pub fn run_cycle(&self) -> usize {
        let removed = self.store.cleanup_expired();
        if removed > 0 {
            self.audit.emit(
                AuditEvent::new(
                    None,
                    "sweeper",
                    "verification.expired_sessions_removed",
                    AuditCategory::System,
                    SWEEPER_ACTOR,
                    AuditOutcome::Success,
                )
                .with_metadata("removed", removed.to_string()),
            );
        }
        removed
    }

    /// Spawns the sweep loop. It exits once `shutdown` flips to `true` or
    /// its sender is dropped.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            info!(
                event_name = "system.sweeper.started",
                interval_secs = self.interval.as_secs(),
                "expiry sweeper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.run_cycle();
                        debug!(event_name = "system.sweeper.cycle", removed, "sweep cycle finished");
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(event_name = "system.sweeper.stopped", "expiry sweeper stopped");
        })
    }
}
