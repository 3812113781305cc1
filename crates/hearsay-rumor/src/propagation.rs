//! Passing a rumor from one entity to another.
//!
//! A spread is computed outside the rumor's lock and committed with the
//! version it was computed against:
//!
//! 1. Read a snapshot of the rumor and the teller's spread.
//! 2. `effective = clamp01(mutation_chance * (1 - relationship_factor))`.
//! 3. Draw `r`. If `r < effective`, ask the [`ContentMutationService`] for
//!    a rewrite of the teller's variant (bounded by a timeout, retried, then
//!    replaced by local [`garble`]). The rewrite becomes a new variant whose
//!    parent is the teller's variant. Otherwise the listener inherits the
//!    teller's variant.
//! 4. `believability = clamp01(teller_believability * relationship_factor + modifier)`.
//! 5. Commit: new variant (if any), listener spread upsert, history entry,
//!    `last_active_at` refresh. A version mismatch surfaces as
//!    [`RumorError::ConcurrencyConflict`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hearsay_store::RumorStore;
use hearsay_types::{
    EntityId, MutationSource, RumorId, RumorNotification, RumorSpread, RumorVariant,
    SpreadHistoryEntry, VariantId,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::collaborators::ContentMutationService;
use crate::config::PropagationConfig;
use crate::error::{MutationServiceError, RumorError};
use crate::mutation::garble;

/// Clamp to `[0, 1]`, mapping NaN to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Inputs to one spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadRequest {
    /// The rumor to pass on.
    pub rumor_id: RumorId,
    /// The teller. Must already know the rumor.
    pub from_entity_id: EntityId,
    /// The listener.
    pub to_entity_id: EntityId,
    /// Base chance the content mutates, in `[0, 1]`.
    pub mutation_chance: f64,
    /// Relationship strength between teller and listener, in `[0, 1]`.
    pub relationship_factor: f64,
    /// Added to the listener's believability before clamping. Any finite value.
    pub believability_modifier: f64,
}

impl SpreadRequest {
    /// Reject self-spreads and out-of-range or non-finite inputs.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::Validation`] or [`RumorError::InvalidOperation`].
    pub fn validate(&self) -> Result<(), RumorError> {
        if self.from_entity_id == self.to_entity_id {
            return Err(RumorError::InvalidOperation(format!(
                "entity {} cannot spread a rumor to itself",
                self.from_entity_id
            )));
        }
        check_unit("mutation_chance", self.mutation_chance)?;
        check_unit("relationship_factor", self.relationship_factor)?;
        if !self.believability_modifier.is_finite() {
            return Err(RumorError::Validation(String::from(
                "believability_modifier must be a finite number",
            )));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), RumorError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RumorError::Validation(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

/// What a committed spread did.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadOutcome {
    /// The history entry appended for this spread.
    pub entry: SpreadHistoryEntry,
    /// The variant created by mutation, if the content changed.
    pub new_variant: Option<RumorVariant>,
    /// Payload for the listener's notification.
    pub notification: RumorNotification,
    /// The effective mutation chance that was drawn against.
    pub effective_mutation_chance: f64,
}

/// Computes and commits spreads.
pub struct PropagationEngine<M> {
    store: Arc<RumorStore>,
    mutator: M,
    config: PropagationConfig,
    rng: Mutex<SmallRng>,
}

impl<M: ContentMutationService> PropagationEngine<M> {
    /// Create an engine. The RNG is seeded from `config.seed` when set.
    pub fn new(store: Arc<RumorStore>, mutator: M, config: PropagationConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self::with_rng(store, mutator, config, rng)
    }

    /// Create an engine with an explicit RNG.
    pub fn with_rng(
        store: Arc<RumorStore>,
        mutator: M,
        config: PropagationConfig,
        rng: SmallRng,
    ) -> Self {
        Self {
            store,
            mutator,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Perform one spread attempt.
    ///
    /// Checks run in this order: self-spread, input ranges, rumor exists,
    /// rumor not archived, teller knows the rumor.
    ///
    /// # Errors
    ///
    /// Returns [`RumorError::InvalidOperation`], [`RumorError::Validation`],
    /// [`RumorError::NotFound`], or [`RumorError::ConcurrencyConflict`] when
    /// another writer committed to the rumor during the computation.
    pub async fn spread(&self, request: &SpreadRequest) -> Result<SpreadOutcome, RumorError> {
        request.validate()?;

        let snapshot = self
            .store
            .get(request.rumor_id)
            .await
            .ok_or_else(|| RumorError::rumor_not_found(request.rumor_id))?;
        if !snapshot.rumor.lifecycle_state.can_spread() {
            return Err(RumorError::InvalidOperation(format!(
                "rumor {} is {} and can no longer spread",
                request.rumor_id, snapshot.rumor.lifecycle_state
            )));
        }
        let from_spread = snapshot
            .spread_for(request.from_entity_id)
            .cloned()
            .ok_or_else(|| RumorError::spread_not_found(request.rumor_id, request.from_entity_id))?;
        let from_content = snapshot
            .variant(from_spread.variant_id)
            .map(|v| v.content.clone())
            .ok_or_else(|| {
                RumorError::NotFound(format!(
                    "variant {} of rumor {}",
                    from_spread.variant_id, request.rumor_id
                ))
            })?;

        let effective = clamp01(request.mutation_chance * (1.0 - request.relationship_factor));
        let draw: f64 = self.rng.lock().await.random();

        let now = Utc::now();
        let (new_variant, mutation) = if draw < effective {
            let (content, source) = self.mutate(&from_content, effective).await;
            let variant = RumorVariant {
                id: VariantId::new(),
                rumor_id: request.rumor_id,
                parent_variant_id: Some(from_spread.variant_id),
                content,
                created_at: now,
            };
            (Some(variant), source)
        } else {
            (None, MutationSource::None)
        };
        let variant_id = new_variant
            .as_ref()
            .map_or(from_spread.variant_id, |v| v.id);
        let held_content = new_variant
            .as_ref()
            .map_or(from_content, |v| v.content.clone());
        let believability = clamp01(
            from_spread.believability * request.relationship_factor
                + request.believability_modifier,
        );

        let entry = SpreadHistoryEntry {
            rumor_id: request.rumor_id,
            from_entity_id: request.from_entity_id,
            to_entity_id: request.to_entity_id,
            variant_id,
            believability,
            mutation,
            spread_at: now,
        };

        let committed_variant = new_variant.clone();
        let committed_entry = entry.clone();
        let (severity, categories) = self
            .store
            .update(request.rumor_id, Some(snapshot.version), move |record| {
                if let Some(variant) = committed_variant {
                    record.variants.push(variant);
                }
                let first_heard_at = record
                    .spreads
                    .get(&request.to_entity_id)
                    .map_or(now, |existing| existing.first_heard_at);
                record.spreads.insert(
                    request.to_entity_id,
                    RumorSpread {
                        rumor_id: request.rumor_id,
                        entity_id: request.to_entity_id,
                        variant_id,
                        believability,
                        first_heard_at,
                        last_reinforced_at: now,
                    },
                );
                record.history.push(committed_entry);
                record.rumor.last_active_at = now;
                Ok::<_, RumorError>((record.rumor.severity, record.rumor.categories.clone()))
            })
            .await?;

        debug!(
            rumor_id = %request.rumor_id,
            from = %request.from_entity_id,
            to = %request.to_entity_id,
            variant_id = %variant_id,
            believability,
            mutation = ?mutation,
            "rumor spread committed"
        );

        Ok(SpreadOutcome {
            notification: RumorNotification {
                rumor_id: request.rumor_id,
                from_entity_id: request.from_entity_id,
                variant_id,
                content: held_content,
                believability,
                severity,
                categories,
            },
            entry,
            new_variant,
            effective_mutation_chance: effective,
        })
    }

    /// Ask the mutation service for a rewrite, falling back to [`garble`].
    async fn mutate(&self, original: &str, strength: f64) -> (String, MutationSource) {
        let attempts = self.config.mutation_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.try_mutate(original, strength).await {
                Ok(content) => return (content, MutationSource::Service),
                Err(e) => warn!(attempt, error = %e, "mutation attempt failed"),
            }
        }

        warn!(attempts, "mutation service unavailable, using local garbling");
        (garble(original), MutationSource::Fallback)
    }

    /// One bounded call to the mutation service.
    ///
    /// An answer that is blank or identical to the input is
    /// [`MutationServiceError::InvalidResponse`].
    async fn try_mutate(
        &self,
        original: &str,
        strength: f64,
    ) -> Result<String, MutationServiceError> {
        let timeout_ms = self.config.mutation_timeout_ms;
        let content = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.mutator.generate_variant(original, strength),
        )
        .await
        .map_err(|_elapsed| MutationServiceError::Timeout { timeout_ms })??;
        if content.trim().is_empty() {
            return Err(MutationServiceError::InvalidResponse(String::from(
                "blank content",
            )));
        }
        if content == original {
            return Err(MutationServiceError::InvalidResponse(String::from(
                "content unchanged",
            )));
        }
        Ok(content)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicU32, Ordering};

    use hearsay_types::{LifecycleState, Rumor, RumorCategory, RumorRecord, Severity};

    use super::*;

    /// Mutator that always succeeds with a fixed rewrite.
    struct Rewriter;

    impl ContentMutationService for Rewriter {
        async fn generate_variant(
            &self,
            original_content: &str,
            _mutation_strength: f64,
        ) -> Result<String, MutationServiceError> {
            Ok(format!("{original_content}, or worse"))
        }
    }

    /// Mutator that always fails and counts its calls.
    #[derive(Default)]
    struct Broken {
        calls: AtomicU32,
    }

    impl ContentMutationService for Broken {
        async fn generate_variant(
            &self,
            _original_content: &str,
            _mutation_strength: f64,
        ) -> Result<String, MutationServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MutationServiceError::Request(String::from("connection refused")))
        }
    }

    /// Mutator that never answers.
    struct Hanging;

    impl ContentMutationService for Hanging {
        async fn generate_variant(
            &self,
            _original_content: &str,
            _mutation_strength: f64,
        ) -> Result<String, MutationServiceError> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    async fn seeded_store(originator: EntityId, content: &str) -> (Arc<RumorStore>, RumorId) {
        let now = Utc::now();
        let rumor_id = RumorId::new();
        let root = RumorVariant {
            id: VariantId::new(),
            rumor_id,
            parent_variant_id: None,
            content: content.to_owned(),
            created_at: now,
        };
        let spread = RumorSpread {
            rumor_id,
            entity_id: originator,
            variant_id: root.id,
            believability: 0.8,
            first_heard_at: now,
            last_reinforced_at: now,
        };
        let record = RumorRecord {
            rumor: Rumor {
                id: rumor_id,
                originator_id: originator,
                truth_value: 0.5,
                categories: BTreeSet::from([RumorCategory::Gossip]),
                severity: Severity::Moderate,
                created_at: now,
                last_active_at: now,
                last_decayed_at: None,
                lifecycle_state: LifecycleState::Active,
            },
            variants: vec![root],
            spreads: BTreeMap::from([(originator, spread)]),
            history: Vec::new(),
            version: 0,
        };
        let store = Arc::new(RumorStore::new());
        store.insert(record).await.ok();
        (store, rumor_id)
    }

    fn request(rumor_id: RumorId, from: EntityId, to: EntityId) -> SpreadRequest {
        SpreadRequest {
            rumor_id,
            from_entity_id: from,
            to_entity_id: to,
            mutation_chance: 1.0,
            relationship_factor: 0.0,
            believability_modifier: 0.0,
        }
    }

    fn engine<M: ContentMutationService>(store: Arc<RumorStore>, mutator: M) -> PropagationEngine<M> {
        let config = PropagationConfig {
            mutation_timeout_ms: 50,
            ..PropagationConfig::default()
        };
        PropagationEngine::with_rng(store, mutator, config, SmallRng::seed_from_u64(42))
    }

    #[test]
    fn clamp01_bounds_values() {
        assert!((clamp01(2.0) - 1.0).abs() < f64::EPSILON);
        assert!(clamp01(-0.5).abs() < f64::EPSILON);
        assert!(clamp01(f64::NAN).abs() < f64::EPSILON);
        assert!((clamp01(0.25) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn validation_rejects_bad_inputs() {
        let a = EntityId::new();
        let b = EntityId::new();
        let id = RumorId::new();

        let mut req = request(id, a, b);
        req.mutation_chance = 1.5;
        assert!(matches!(req.validate(), Err(RumorError::Validation(_))));

        let mut req = request(id, a, b);
        req.relationship_factor = f64::NAN;
        assert!(matches!(req.validate(), Err(RumorError::Validation(_))));

        let mut req = request(id, a, b);
        req.believability_modifier = f64::INFINITY;
        assert!(matches!(req.validate(), Err(RumorError::Validation(_))));

        let mut req = request(id, a, b);
        req.believability_modifier = 2.0;
        assert!(req.validate().is_ok());

        assert!(matches!(
            request(id, a, a).validate(),
            Err(RumorError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn certain_mutation_uses_service_and_links_parent() {
        let teller = EntityId::new();
        let listener = EntityId::new();
        let (store, id) = seeded_store(teller, "The well is poisoned").await;
        let engine = engine(Arc::clone(&store), Rewriter);

        let outcome = engine.spread(&request(id, teller, listener)).await.unwrap();

        assert_eq!(outcome.entry.mutation, MutationSource::Service);
        let variant = outcome.new_variant.clone();
        assert_eq!(
            variant.as_ref().map(|v| v.content.as_str()),
            Some("The well is poisoned, or worse")
        );

        let record = store.get(id).await;
        let record = record.as_ref();
        let root_id = record.and_then(|r| r.root_variant()).map(|v| v.id);
        assert_eq!(variant.and_then(|v| v.parent_variant_id), root_id);
        assert_eq!(record.map(|r| r.variants.len()), Some(2));
        assert_eq!(record.map(|r| r.history.len()), Some(1));
        assert_eq!(
            record.and_then(|r| r.content_for(listener)),
            Some("The well is poisoned, or worse")
        );
    }

    #[tokio::test]
    async fn strong_relationship_suppresses_mutation() {
        let teller = EntityId::new();
        let listener = EntityId::new();
        let (store, id) = seeded_store(teller, "The mayor is ill").await;
        let engine = engine(Arc::clone(&store), Rewriter);

        let mut req = request(id, teller, listener);
        req.relationship_factor = 1.0;
        let outcome = engine.spread(&req).await;
        assert_eq!(
            outcome.as_ref().map(|o| o.entry.mutation).ok(),
            Some(MutationSource::None)
        );
        let outcome = outcome.ok();
        assert!(outcome.as_ref().is_some_and(|o| o.new_variant.is_none()));
        // 0.8 * 1.0 + 0.0
        assert!(
            outcome
                .as_ref()
                .is_some_and(|o| (o.entry.believability - 0.8).abs() < 1e-12)
        );
    }

    #[tokio::test]
    async fn failing_service_is_retried_then_garbled() {
        let teller = EntityId::new();
        let listener = EntityId::new();
        let (store, id) = seeded_store(teller, "The harvest was poor").await;
        let engine = engine(Arc::clone(&store), Broken::default());

        let outcome = engine.spread(&request(id, teller, listener)).await.ok();
        assert_eq!(
            outcome.as_ref().map(|o| o.entry.mutation),
            Some(MutationSource::Fallback)
        );
        assert_eq!(
            outcome
                .as_ref()
                .and_then(|o| o.new_variant.as_ref())
                .map(|v| v.content.as_str()),
            Some("The harvest supposedly was poor")
        );
        assert_eq!(engine.mutator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_service_times_out_to_fallback() {
        let teller = EntityId::new();
        let listener = EntityId::new();
        let (store, id) = seeded_store(teller, "Wolves near the village").await;
        let engine = engine(Arc::clone(&store), Hanging);

        let outcome = engine.spread(&request(id, teller, listener)).await.ok();
        assert_eq!(
            outcome.map(|o| o.entry.mutation),
            Some(MutationSource::Fallback)
        );
    }

    /// Mutator that repeats its input.
    struct Echo;

    impl ContentMutationService for Echo {
        async fn generate_variant(
            &self,
            original_content: &str,
            _mutation_strength: f64,
        ) -> Result<String, MutationServiceError> {
            Ok(original_content.to_owned())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_reports_timeout_and_unusable_answers() {
        let (store, _) = seeded_store(EntityId::new(), "Wolves near the village").await;

        let hanging = engine(Arc::clone(&store), Hanging);
        assert_eq!(
            hanging.try_mutate("Wolves near the village", 0.5).await,
            Err(MutationServiceError::Timeout { timeout_ms: 50 })
        );

        let echo = engine(Arc::clone(&store), Echo);
        assert!(matches!(
            echo.try_mutate("Wolves near the village", 0.5).await,
            Err(MutationServiceError::InvalidResponse(_))
        ));

        let rewriter = engine(store, Rewriter);
        assert_eq!(
            rewriter.try_mutate("Wolves near the village", 0.5).await,
            Ok(String::from("Wolves near the village, or worse"))
        );
    }

    #[tokio::test]
    async fn respread_keeps_first_heard_at() {
        let teller = EntityId::new();
        let listener = EntityId::new();
        let (store, id) = seeded_store(teller, "A ship was lost").await;
        let engine = engine(Arc::clone(&store), Rewriter);

        let mut req = request(id, teller, listener);
        req.mutation_chance = 0.0;
        engine.spread(&req).await.ok();
        let first = store
            .get(id)
            .await
            .and_then(|r| r.spread_for(listener).map(|s| s.first_heard_at));
        engine.spread(&req).await.ok();
        let record = store.get(id).await;

        assert_eq!(record.as_ref().map(|r| r.spreads.len()), Some(2));
        assert_eq!(record.as_ref().map(|r| r.history.len()), Some(2));
        assert_eq!(
            record.and_then(|r| r.spread_for(listener).map(|s| s.first_heard_at)),
            first
        );
    }

    #[tokio::test]
    async fn unknown_teller_is_not_found() {
        let teller = EntityId::new();
        let (store, id) = seeded_store(teller, "Gold in the hills").await;
        let engine = engine(store, Rewriter);

        let result = engine
            .spread(&request(id, EntityId::new(), EntityId::new()))
            .await;
        assert!(matches!(result, Err(RumorError::NotFound(_))));
    }
}
