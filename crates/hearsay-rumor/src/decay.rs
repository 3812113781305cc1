//! Time-driven decay of idle rumors.
//!
//! A rumor is a candidate when it is not archived and has been idle for
//! longer than the threshold, measured from the later of its last spread
//! and its last decay. Each candidate moves one step:
//!
//! - severity above `Minor` drops one level, otherwise
//! - lifecycle moves `Active -> Decayed` or `Decayed -> Archived`.
//!
//! Every change stamps `last_decayed_at`, so a second sweep in the same
//! window finds nothing to do. Sweeps never overlap: a second caller waits
//! for the running sweep to finish. Within a sweep each rumor is locked
//! only while its own transition is applied.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use hearsay_store::{RumorStore, StoreError};
use hearsay_types::{LifecycleState, RumorId, RumorRecord, Severity};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One rumor's change during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayChange {
    /// The rumor that decayed.
    pub rumor_id: RumorId,
    /// Severity after the change.
    pub severity: Severity,
    /// Lifecycle state after the change.
    pub lifecycle_state: LifecycleState,
}

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecaySweep {
    /// Rumors that were idle long enough to be considered.
    pub candidates: usize,
    /// Rumors whose state actually changed.
    pub changes: Vec<DecayChange>,
    /// Rumors skipped because their update failed.
    pub failures: usize,
}

impl DecaySweep {
    /// Number of rumors whose state changed.
    pub fn changed(&self) -> usize {
        self.changes.len()
    }
}

/// Runs decay sweeps over a [`RumorStore`].
#[derive(Debug)]
pub struct DecayScheduler {
    store: Arc<RumorStore>,
    sweep_guard: Mutex<()>,
}

impl DecayScheduler {
    /// Create a scheduler over `store`.
    pub fn new(store: Arc<RumorStore>) -> Self {
        Self {
            store,
            sweep_guard: Mutex::new(()),
        }
    }

    /// Sweep using the current time.
    pub async fn decay(&self, days_since_active: u32) -> DecaySweep {
        self.decay_at(Utc::now(), days_since_active).await
    }

    /// Sweep as if the current time were `now`.
    pub async fn decay_at(&self, now: DateTime<Utc>, days_since_active: u32) -> DecaySweep {
        let _running = self.sweep_guard.lock().await;
        let threshold = TimeDelta::days(i64::from(days_since_active));
        let mut sweep = DecaySweep::default();

        for record in self.store.all().await {
            if !is_candidate(&record, now, threshold) {
                continue;
            }
            sweep.candidates = sweep.candidates.saturating_add(1);
            let rumor_id = record.rumor.id;

            // Re-check under the rumor's lock; a spread may have revived it.
            let result: Result<Option<DecayChange>, StoreError> = self
                .store
                .update(rumor_id, None, |locked| {
                    if !is_candidate(locked, now, threshold) {
                        return Ok(None);
                    }
                    Ok(step(locked, now))
                })
                .await;

            match result {
                Ok(Some(change)) => {
                    debug!(
                        rumor_id = %rumor_id,
                        severity = %change.severity,
                        lifecycle_state = %change.lifecycle_state,
                        "rumor decayed"
                    );
                    sweep.changes.push(change);
                }
                Ok(None) => {}
                Err(StoreError::NotFound(_)) => {
                    debug!(rumor_id = %rumor_id, "rumor deleted during sweep");
                }
                Err(e) => {
                    warn!(rumor_id = %rumor_id, error = %e, "skipping rumor in decay sweep");
                    sweep.failures = sweep.failures.saturating_add(1);
                }
            }
        }

        info!(
            candidates = sweep.candidates,
            changed = sweep.changed(),
            failures = sweep.failures,
            days_since_active,
            "decay sweep finished"
        );
        sweep
    }
}

fn is_candidate(record: &RumorRecord, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
    record.rumor.lifecycle_state.can_spread()
        && now.signed_duration_since(record.rumor.last_touched_at()) > threshold
}

/// Apply one decay step, returning the change if anything moved.
fn step(record: &mut RumorRecord, now: DateTime<Utc>) -> Option<DecayChange> {
    let rumor = &mut record.rumor;
    if let Some(lower) = rumor.severity.step_down() {
        rumor.severity = lower;
    } else {
        rumor.lifecycle_state = rumor.lifecycle_state.next()?;
    }
    rumor.last_decayed_at = Some(now);
    Some(DecayChange {
        rumor_id: rumor.id,
        severity: rumor.severity,
        lifecycle_state: rumor.lifecycle_state,
    })
}
