//! The rumor service facade.
//!
//! [`RumorService`] is the single entry point external collaborators use:
//! creation, spreading, decay, deletion, and read queries. It composes the
//! [`RumorStore`], the [`PropagationEngine`] and the [`DecayScheduler`], and
//! after every committed write it emits a [`RumorEvent`] on a broadcast
//! channel and, for spreads, notifies the listener through the injected
//! [`RumorNotifier`].

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hearsay_rumor::{
    ContentMutationService, DecayScheduler, PropagationEngine, RumorError, RumorNotifier,
    SpreadOutcome, SpreadRequest, clamp01,
};
use hearsay_store::RumorStore;
use hearsay_types::{
    EntityId, EntityRumorView, ImpactLevel, LifecycleState, Rumor, RumorCategory, RumorEvent,
    RumorId, RumorImpact, RumorRecord, RumorSpread, RumorStatistics, RumorSummary, RumorVariant,
    Severity, SpreadHistoryEntry, VariantId,
};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::query::{EntityRumorFilter, RumorQuery};

/// Capacity of the rumor event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Spreads at which the reach term of the impact score saturates.
const IMPACT_REACH_SATURATION: f64 = 20.0;

/// Inputs to [`RumorService::create_rumor`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRumor {
    /// Who starts the rumor.
    pub originator_id: EntityId,
    /// Content of the root variant.
    pub content: String,
    /// Thematic tags. Must not be empty.
    pub categories: BTreeSet<RumorCategory>,
    /// Initial severity.
    pub severity: Severity,
    /// Ground truth in `[0, 1]`.
    pub truth_value: f64,
}

impl NewRumor {
    /// Reject out-of-range truth values, empty categories and blank content.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::Validation`].
    pub fn validate(&self) -> Result<(), RumorError> {
        if !self.truth_value.is_finite() || !(0.0..=1.0).contains(&self.truth_value) {
            return Err(RumorError::Validation(format!(
                "truth_value must be within [0, 1], got {}",
                self.truth_value
            )));
        }
        if self.categories.is_empty() {
            return Err(RumorError::Validation(String::from(
                "a rumor needs at least one category",
            )));
        }
        if self.content.trim().is_empty() {
            return Err(RumorError::Validation(String::from(
                "rumor content must not be blank",
            )));
        }
        Ok(())
    }
}

/// Edits accepted by [`RumorService::update_rumor`].
///
/// Content and truth value are fixed at creation; spreads and variants
/// derive from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RumorUpdate {
    /// Replacement categories. Must not be empty when set.
    pub categories: Option<BTreeSet<RumorCategory>>,
    /// Replacement severity.
    pub severity: Option<Severity>,
}

impl RumorUpdate {
    /// Reject empty edits and empty category sets.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::Validation`].
    pub fn validate(&self) -> Result<(), RumorError> {
        if self.categories.is_none() && self.severity.is_none() {
            return Err(RumorError::Validation(String::from(
                "an update needs categories or severity",
            )));
        }
        if self.categories.as_ref().is_some_and(BTreeSet::is_empty) {
            return Err(RumorError::Validation(String::from(
                "a rumor needs at least one category",
            )));
        }
        Ok(())
    }
}

/// Orchestrates rumor writes and serves rumor reads.
pub struct RumorService<M> {
    store: Arc<RumorStore>,
    propagation: PropagationEngine<M>,
    decay: DecayScheduler,
    notifier: Arc<dyn RumorNotifier>,
    events: broadcast::Sender<RumorEvent>,
}

impl<M: ContentMutationService> RumorService<M> {
    /// Create a service over `store`. `propagation` must share the same store.
    pub fn new(
        store: Arc<RumorStore>,
        propagation: PropagationEngine<M>,
        notifier: Arc<dyn RumorNotifier>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            decay: DecayScheduler::new(Arc::clone(&store)),
            store,
            propagation,
            notifier,
            events,
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &Arc<RumorStore> {
        &self.store
    }

    /// Mutation chance applied when a caller does not supply one.
    pub const fn default_mutation_chance(&self) -> f64 {
        self.propagation.config().default_mutation_chance
    }

    /// Subscribe to rumor events.
    pub fn subscribe(&self) -> broadcast::Receiver<RumorEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RumorEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create a rumor with its root variant and the originator's spread.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::Validation`] for bad inputs.
    pub async fn create_rumor(&self, new: NewRumor) -> Result<RumorId, RumorError> {
        new.validate()?;
        let now = Utc::now();
        let rumor_id = RumorId::new();
        let root = RumorVariant {
            id: VariantId::new(),
            rumor_id,
            parent_variant_id: None,
            content: new.content,
            created_at: now,
        };
        let originator_spread = RumorSpread {
            rumor_id,
            entity_id: new.originator_id,
            variant_id: root.id,
            believability: 1.0,
            first_heard_at: now,
            last_reinforced_at: now,
        };
        let record = RumorRecord {
            rumor: Rumor {
                id: rumor_id,
                originator_id: new.originator_id,
                truth_value: new.truth_value,
                categories: new.categories,
                severity: new.severity,
                created_at: now,
                last_active_at: now,
                last_decayed_at: None,
                lifecycle_state: LifecycleState::Active,
            },
            variants: vec![root],
            spreads: std::iter::once((new.originator_id, originator_spread)).collect(),
            history: Vec::new(),
            version: 0,
        };
        self.store.insert(record).await?;

        info!(
            rumor_id = %rumor_id,
            originator_id = %new.originator_id,
            severity = %new.severity,
            "rumor created"
        );
        self.emit(RumorEvent::Created {
            rumor_id,
            originator_id: new.originator_id,
        });
        Ok(rumor_id)
    }

    /// Pass a rumor from one entity to another.
    ///
    /// If another writer commits to the rumor while the spread is being
    /// computed, the spread is recomputed once from fresh state.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::InvalidOperation`] for self-spreads and archived
    /// rumors, [`RumorError::NotFound`] for an unknown rumor or a teller who
    /// does not know it, [`RumorError::Validation`] for bad inputs, and
    /// [`RumorError::ConcurrencyConflict`] if the retry also conflicts.
    pub async fn spread_rumor(&self, request: &SpreadRequest) -> Result<SpreadOutcome, RumorError> {
        let outcome = match self.propagation.spread(request).await {
            Err(RumorError::ConcurrencyConflict(rumor_id)) => {
                debug!(rumor_id = %rumor_id, "concurrent write during spread, retrying");
                self.propagation.spread(request).await?
            }
            other => other?,
        };

        if let Some(variant) = &outcome.new_variant
            && let Some(parent_variant_id) = variant.parent_variant_id
        {
            self.emit(RumorEvent::Mutated {
                rumor_id: variant.rumor_id,
                variant_id: variant.id,
                parent_variant_id,
            });
        }
        self.emit(RumorEvent::Spread {
            rumor_id: outcome.entry.rumor_id,
            from_entity_id: outcome.entry.from_entity_id,
            to_entity_id: outcome.entry.to_entity_id,
            variant_id: outcome.entry.variant_id,
            believability: outcome.entry.believability,
            mutation: outcome.entry.mutation,
        });
        self.notifier
            .push_rumor(outcome.entry.to_entity_id, &outcome.notification);
        Ok(outcome)
    }

    /// Run a decay sweep now. Returns the number of rumors that changed.
    pub async fn decay_rumors(&self, days_since_active: u32) -> usize {
        self.decay_rumors_at(Utc::now(), days_since_active).await
    }

    /// Run a decay sweep as if the current time were `now`.
    pub async fn decay_rumors_at(&self, now: DateTime<Utc>, days_since_active: u32) -> usize {
        let sweep = self.decay.decay_at(now, days_since_active).await;
        for change in &sweep.changes {
            self.emit(RumorEvent::Decayed {
                rumor_id: change.rumor_id,
                severity: change.severity,
                lifecycle_state: change.lifecycle_state,
            });
        }
        sweep.changed()
    }

    /// Hard-delete a rumor with its variants, spreads and history.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::NotFound`] if the rumor does not exist.
    pub async fn delete_rumor(&self, rumor_id: RumorId) -> Result<(), RumorError> {
        self.store.remove(rumor_id).await?;
        info!(rumor_id = %rumor_id, "rumor deleted");
        self.emit(RumorEvent::Deleted { rumor_id });
        Ok(())
    }

    /// Replace a rumor's categories and/or severity. Lifecycle state and
    /// activity timestamps are left alone, so an edit does not postpone
    /// decay. Returns the edited rumor.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::Validation`] for an empty edit, or
    /// [`RumorError::NotFound`] if the rumor does not exist.
    pub async fn update_rumor(
        &self,
        rumor_id: RumorId,
        update: RumorUpdate,
    ) -> Result<Rumor, RumorError> {
        update.validate()?;
        let rumor = self
            .store
            .update(rumor_id, None, |record| {
                if let Some(categories) = update.categories {
                    record.rumor.categories = categories;
                }
                if let Some(severity) = update.severity {
                    record.rumor.severity = severity;
                }
                Ok::<_, RumorError>(record.rumor.clone())
            })
            .await?;
        info!(rumor_id = %rumor_id, severity = %rumor.severity, "rumor updated");
        self.emit(RumorEvent::Updated {
            rumor_id,
            categories: rumor.categories.clone(),
            severity: rumor.severity,
        });
        Ok(rumor)
    }

    /// Reinforce (positive `delta`) or contradict (negative `delta`) an
    /// entity's belief. Returns the new believability.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::Validation`] for a non-finite delta, or
    /// [`RumorError::NotFound`] if the rumor or the entity's spread is missing.
    pub async fn adjust_believability(
        &self,
        rumor_id: RumorId,
        entity_id: EntityId,
        delta: f64,
    ) -> Result<f64, RumorError> {
        if !delta.is_finite() {
            return Err(RumorError::Validation(String::from(
                "believability delta must be a finite number",
            )));
        }
        let now = Utc::now();
        let believability = self
            .store
            .update(rumor_id, None, |record| {
                let spread = record
                    .spreads
                    .get_mut(&entity_id)
                    .ok_or_else(|| RumorError::spread_not_found(rumor_id, entity_id))?;
                spread.believability = clamp01(spread.believability + delta);
                spread.last_reinforced_at = now;
                Ok::<_, RumorError>(spread.believability)
            })
            .await?;
        debug!(
            rumor_id = %rumor_id,
            entity_id = %entity_id,
            delta,
            believability,
            "believability adjusted"
        );
        Ok(believability)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Full detail of one rumor.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::NotFound`] if the rumor does not exist.
    pub async fn get_rumor(&self, rumor_id: RumorId) -> Result<RumorRecord, RumorError> {
        self.store
            .get(rumor_id)
            .await
            .ok_or_else(|| RumorError::rumor_not_found(rumor_id))
    }

    /// The spread audit log of one rumor, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::NotFound`] if the rumor does not exist.
    pub async fn spread_history(
        &self,
        rumor_id: RumorId,
    ) -> Result<Vec<SpreadHistoryEntry>, RumorError> {
        Ok(self.get_rumor(rumor_id).await?.history)
    }

    /// Every rumor the entity knows, with the content it holds.
    pub async fn get_rumors_by_entity(&self, entity_id: EntityId) -> Vec<EntityRumorView> {
        let mut views = self.entity_views(entity_id).await;
        sort_by_believability(&mut views);
        views
    }

    /// Like [`get_rumors_by_entity`](Self::get_rumors_by_entity), filtered
    /// and limited.
    pub async fn get_rumors_by_entity_filtered(
        &self,
        entity_id: EntityId,
        filter: &EntityRumorFilter,
    ) -> Vec<EntityRumorView> {
        let mut views: Vec<EntityRumorView> = self
            .entity_views(entity_id)
            .await
            .into_iter()
            .filter(|v| filter.min_believability.is_none_or(|min| v.believability >= min))
            .filter(|v| filter.categories.is_empty() || !filter.categories.is_disjoint(&v.categories))
            .collect();
        sort_by_believability(&mut views);
        views.truncate(filter.effective_limit());
        views
    }

    async fn entity_views(&self, entity_id: EntityId) -> Vec<EntityRumorView> {
        let mut views = Vec::new();
        for rumor_id in self.store.rumors_known_by(entity_id).await {
            let Some(record) = self.store.get(rumor_id).await else {
                continue;
            };
            let Some(spread) = record.spread_for(entity_id) else {
                continue;
            };
            let Some(variant) = record.variant(spread.variant_id) else {
                continue;
            };
            views.push(EntityRumorView {
                rumor_id,
                variant_id: variant.id,
                content: variant.content.clone(),
                believability: spread.believability,
                categories: record.rumor.categories.clone(),
                severity: record.rumor.severity,
                lifecycle_state: record.rumor.lifecycle_state,
            });
        }
        views
    }

    /// Search rumors, newest first.
    pub async fn query_rumors(&self, query: &RumorQuery) -> Vec<RumorSummary> {
        let records = match query.known_by {
            Some(entity_id) => {
                let mut known = Vec::new();
                for rumor_id in self.store.rumors_known_by(entity_id).await {
                    if let Some(record) = self.store.get(rumor_id).await {
                        known.push(record);
                    }
                }
                known
            }
            None => self.store.all().await,
        };

        let mut matched: Vec<&RumorRecord> = records.iter().filter(|r| query.matches(r)).collect();
        matched.sort_by(|a, b| {
            b.rumor
                .created_at
                .cmp(&a.rumor.created_at)
                .then_with(|| b.rumor.id.cmp(&a.rumor.id))
        });
        matched
            .into_iter()
            .take(query.effective_limit())
            .map(RumorSummary::from)
            .collect()
    }

    /// Aggregate counters over every stored rumor.
    pub async fn statistics(&self) -> RumorStatistics {
        let records = self.store.all().await;
        let mut stats = RumorStatistics::default();
        let mut truth_sum = 0.0;

        for record in &records {
            let rumor = &record.rumor;
            stats.total_rumors = stats.total_rumors.saturating_add(1);
            stats.total_variants = stats.total_variants.saturating_add(record.variants.len() as u64);
            stats.total_spreads = stats.total_spreads.saturating_add(record.spreads.len() as u64);
            bump(stats.by_lifecycle.entry(rumor.lifecycle_state).or_default());
            bump(stats.by_severity.entry(rumor.severity).or_default());
            for category in &rumor.categories {
                bump(stats.by_category.entry(*category).or_default());
            }
            truth_sum += rumor.truth_value;
        }

        if stats.total_rumors > 0 {
            #[allow(clippy::cast_precision_loss)]
            let n = stats.total_rumors as f64;
            #[allow(clippy::cast_precision_loss)]
            let variants = stats.total_variants as f64;
            #[allow(clippy::cast_precision_loss)]
            let spreads = stats.total_spreads as f64;
            stats.average_truth_value = truth_sum / n;
            stats.average_variants_per_rumor = variants / n;
            stats.average_spreads_per_rumor = spreads / n;
        }
        stats
    }

    /// Influence estimate for one rumor.
    ///
    /// `0.4 * severity_weight + 0.4 * mean_believability + 0.2 * reach`,
    /// where reach is `min(1, spreads / 20)`.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::NotFound`] if the rumor does not exist.
    pub async fn impact(&self, rumor_id: RumorId) -> Result<RumorImpact, RumorError> {
        let record = self.get_rumor(rumor_id).await?;
        Ok(impact_of(&record))
    }
}

/// Compute the impact of a record.
pub fn impact_of(record: &RumorRecord) -> RumorImpact {
    let mean_believability = record.mean_believability();
    #[allow(clippy::cast_precision_loss)]
    let spreads = record.spreads.len() as f64;
    let reach = (spreads / IMPACT_REACH_SATURATION).min(1.0);
    let score = clamp01(
        0.4 * record.rumor.severity.weight() + 0.4 * mean_believability + 0.2 * reach,
    );
    RumorImpact {
        rumor_id: record.rumor.id,
        impact_score: score,
        level: ImpactLevel::from_score(score),
        severity: record.rumor.severity,
        mean_believability,
        spread_count: record.spreads.len() as u64,
        variant_count: record.variants.len() as u64,
    }
}

fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}

fn sort_by_believability(views: &mut [EntityRumorView]) {
    views.sort_by(|a, b| {
        b.believability
            .partial_cmp(&a.believability)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.rumor_id.cmp(&b.rumor_id))
    });
}
