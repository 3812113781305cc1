//! Distance-based knowledge of world events.
//!
//! An observer at distance `d` from an event knows it with accuracy
//! `exp(-d / max_distance)`. Each detail of the event (every involved
//! entity, then the type, then the description) is revealed independently:
//!
//! ```text
//! r1 < accuracy          -> Known
//! otherwise r2 < 0.5     -> Distorted
//! otherwise              -> Unknown
//! ```
//!
//! The miss branch is a flat coin flip regardless of accuracy.
//!
//! Results are cached per `(entity, event)` for a fixed TTL. Expiry is
//! checked lazily on read; [`KnowledgeAccuracyEngine::purge_expired`] can be
//! run periodically to bound memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hearsay_types::{
    DETAIL_DESCRIPTION, DETAIL_TYPE, DetailKnowledge, EntityId, KnowledgeResult, WorldEvent,
    WorldEventId, entity_detail_key,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::collaborators::{EntityPositionProvider, WorldEventSource};
use crate::config::KnowledgeConfig;
use crate::error::KnowledgeError;
use crate::propagation::clamp01;

/// Accuracy for an observer `distance` units from an event.
pub fn accuracy_at(distance: f64, max_distance: f64) -> f64 {
    clamp01((-distance.max(0.0) / max_distance).exp())
}

/// Cache key.
type CacheKey = (EntityId, WorldEventId);

#[derive(Debug, Clone)]
struct CacheEntry {
    result: KnowledgeResult,
    expires_at: Instant,
}

/// TTL cache of knowledge results with a size bound.
#[derive(Debug)]
struct KnowledgeCache {
    entries: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl KnowledgeCache {
    fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries,
        }
    }

    fn get(&mut self, key: &CacheKey, now: Instant) -> Option<KnowledgeResult> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.result.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&mut self, key: CacheKey, result: KnowledgeResult, now: Instant) {
        if self.max_entries == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.purge(now);
            if self.entries.len() >= self.max_entries {
                self.evict_oldest();
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                result,
                expires_at: now.checked_add(self.ttl).unwrap_or(now),
            },
        );
    }

    /// Keep a live entry if another caller cached one first, otherwise
    /// store `result`. Returns the cached result and whether it is ours.
    fn insert_if_absent(
        &mut self,
        key: CacheKey,
        result: KnowledgeResult,
        now: Instant,
    ) -> (KnowledgeResult, bool) {
        if let Some(existing) = self.get(&key, now) {
            return (existing, false);
        }
        self.insert(key, result.clone(), now);
        (result, true)
    }

    fn purge(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    fn invalidate_entity(&mut self, entity_id: EntityId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(entity, _), _| *entity != entity_id);
        before.saturating_sub(self.entries.len())
    }

    fn invalidate_event(&mut self, world_event_id: WorldEventId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, event), _| *event != world_event_id);
        before.saturating_sub(self.entries.len())
    }
}

/// Computes and caches how well entities know world events.
pub struct KnowledgeAccuracyEngine {
    positions: Arc<dyn EntityPositionProvider>,
    events: Option<Arc<dyn WorldEventSource>>,
    max_distance: f64,
    cache: Mutex<KnowledgeCache>,
    rng: Mutex<SmallRng>,
}

impl KnowledgeAccuracyEngine {
    /// Create an engine. The RNG is seeded from `config.seed` when set.
    pub fn new(positions: Arc<dyn EntityPositionProvider>, config: &KnowledgeConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self::with_rng(positions, config, rng)
    }

    /// Create an engine with an explicit RNG.
    pub fn with_rng(
        positions: Arc<dyn EntityPositionProvider>,
        config: &KnowledgeConfig,
        rng: SmallRng,
    ) -> Self {
        let max_distance = if config.max_distance.is_finite() && config.max_distance > 0.0 {
            config.max_distance
        } else {
            warn!(
                max_distance = config.max_distance,
                "invalid knowledge max_distance, using 50"
            );
            50.0
        };
        Self {
            positions,
            events: None,
            max_distance,
            cache: Mutex::new(KnowledgeCache::new(
                Duration::from_millis(config.cache_ttl_ms),
                config.cache_max_entries,
            )),
            rng: Mutex::new(rng),
        }
    }

    /// Attach a world event source so events can be looked up by ID.
    #[must_use]
    pub fn with_event_source(mut self, events: Arc<dyn WorldEventSource>) -> Self {
        self.events = Some(events);
        self
    }

    /// Whether a world event source is attached.
    pub const fn has_event_source(&self) -> bool {
        self.events.is_some()
    }

    /// How well `entity_id` knows `event`.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::UnknownEntity`] if the entity has no
    /// position, or [`KnowledgeError::InvalidPosition`] if either position
    /// is not finite.
    pub async fn get_knowledge(
        &self,
        entity_id: EntityId,
        event: &WorldEvent,
    ) -> Result<KnowledgeResult, KnowledgeError> {
        let key = (entity_id, event.id);
        if let Some(hit) = self.cache.lock().await.get(&key, Instant::now()) {
            debug!(entity_id = %entity_id, world_event_id = %event.id, "knowledge cache hit");
            return Ok(hit);
        }

        let position = self
            .positions
            .position(entity_id)
            .ok_or(KnowledgeError::UnknownEntity(entity_id))?;
        let distance = position.distance_to(event.location);
        if !distance.is_finite() {
            return Err(KnowledgeError::InvalidPosition(entity_id));
        }
        let accuracy = accuracy_at(distance, self.max_distance);

        let per_detail_knowledge = {
            let mut rng = self.rng.lock().await;
            let mut details = BTreeMap::new();
            for involved in &event.involved_entities {
                details.insert(entity_detail_key(*involved), reveal(&mut *rng, accuracy));
            }
            details.insert(DETAIL_TYPE.to_owned(), reveal(&mut *rng, accuracy));
            details.insert(DETAIL_DESCRIPTION.to_owned(), reveal(&mut *rng, accuracy));
            details
        };

        let computed = KnowledgeResult {
            entity_id,
            world_event_id: event.id,
            distance,
            accuracy,
            per_detail_knowledge,
            computed_at: Utc::now(),
        };
        // A concurrent miss may have cached its own draws meanwhile; the
        // first one cached wins so every caller within the TTL agrees.
        let (result, stored) = self
            .cache
            .lock()
            .await
            .insert_if_absent(key, computed, Instant::now());
        if stored {
            debug!(
                entity_id = %entity_id,
                world_event_id = %event.id,
                distance,
                accuracy,
                "knowledge computed"
            );
        } else {
            debug!(
                entity_id = %entity_id,
                world_event_id = %event.id,
                "concurrent knowledge miss, keeping cached result"
            );
        }
        Ok(result)
    }

    /// Like [`get_knowledge`](Self::get_knowledge), resolving the event
    /// through the attached [`WorldEventSource`].
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NoEventSource`],
    /// [`KnowledgeError::UnknownEvent`], or any error of `get_knowledge`.
    pub async fn get_knowledge_for(
        &self,
        entity_id: EntityId,
        world_event_id: WorldEventId,
    ) -> Result<KnowledgeResult, KnowledgeError> {
        let source = self.events.as_ref().ok_or(KnowledgeError::NoEventSource)?;
        let event = source
            .event(world_event_id)
            .ok_or(KnowledgeError::UnknownEvent(world_event_id))?;
        self.get_knowledge(entity_id, &event).await
    }

    /// Drop every expired cache entry. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let purged = self.cache.lock().await.purge(Instant::now());
        if purged > 0 {
            debug!(purged, "expired knowledge entries purged");
        }
        purged
    }

    /// Drop every cached result for an entity, e.g. after it moves.
    pub async fn invalidate_entity(&self, entity_id: EntityId) -> usize {
        self.cache.lock().await.invalidate_entity(entity_id)
    }

    /// Drop every cached result for an event, e.g. after it is re-recorded.
    pub async fn invalidate_event(&self, world_event_id: WorldEventId) -> usize {
        self.cache.lock().await.invalidate_event(world_event_id)
    }

    /// Number of cached results, expired or not.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.entries.len()
    }
}

/// Reveal one detail. Two independent draws; see the module docs.
fn reveal<R: Rng + ?Sized>(rng: &mut R, accuracy: f64) -> DetailKnowledge {
    let r1: f64 = rng.random();
    if r1 < accuracy {
        return DetailKnowledge::Known;
    }
    let r2: f64 = rng.random();
    if r2 < 0.5 {
        DetailKnowledge::Distorted
    } else {
        DetailKnowledge::Unknown
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hearsay_types::{Position, WorldEventKind};

    use super::*;
    use crate::collaborators::{InMemoryPositions, InMemoryWorldEvents};

    fn event_at(x: f64, y: f64, involved: Vec<EntityId>) -> WorldEvent {
        WorldEvent {
            id: WorldEventId::new(),
            location: Position::new(x, y),
            involved_entities: involved,
            kind: WorldEventKind::Combat { victor: None },
            description: String::from("A skirmish at the ford"),
        }
    }

    fn engine(positions: Arc<InMemoryPositions>, ttl_ms: u64, max_entries: usize) -> KnowledgeAccuracyEngine {
        let config = KnowledgeConfig {
            cache_ttl_ms: ttl_ms,
            cache_max_entries: max_entries,
            ..KnowledgeConfig::default()
        };
        KnowledgeAccuracyEngine::with_rng(positions, &config, SmallRng::seed_from_u64(42))
    }

    #[test]
    fn accuracy_falls_with_distance() {
        let near = accuracy_at(0.0, 50.0);
        let mid = accuracy_at(10.0, 50.0);
        let far = accuracy_at(100.0, 50.0);
        assert!((near - 1.0).abs() < f64::EPSILON);
        assert!(near > mid);
        assert!(mid > far);
        assert!(far > 0.0);
        assert!((far - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn full_accuracy_reveals_everything() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(reveal(&mut rng, 1.0), DetailKnowledge::Known);
        }
    }

    #[test]
    fn zero_accuracy_splits_misses() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut distorted = 0u32;
        let mut unknown = 0u32;
        for _ in 0..1000 {
            match reveal(&mut rng, 0.0) {
                DetailKnowledge::Known => {}
                DetailKnowledge::Distorted => distorted = distorted.saturating_add(1),
                DetailKnowledge::Unknown => unknown = unknown.saturating_add(1),
            }
        }
        assert_eq!(distorted.saturating_add(unknown), 1000);
        assert!(distorted > 350 && unknown > 350);
    }

    #[tokio::test]
    async fn details_cover_entities_type_and_description() {
        let positions = Arc::new(InMemoryPositions::new());
        let observer = EntityId::new();
        positions.set(observer, Position::new(0.0, 0.0));
        let a = EntityId::new();
        let b = EntityId::new();
        let event = event_at(3.0, 4.0, vec![a, b]);

        let engine = engine(positions, 5000, 100);
        let result = engine.get_knowledge(observer, &event).await.unwrap();

        assert!((result.distance - 5.0).abs() < 1e-12);
        assert!((result.accuracy - (-0.1f64).exp()).abs() < 1e-12);
        assert_eq!(result.per_detail_knowledge.len(), 4);
        assert!(result.per_detail_knowledge.contains_key(&entity_detail_key(a)));
        assert!(result.per_detail_knowledge.contains_key(&entity_detail_key(b)));
        assert!(result.per_detail_knowledge.contains_key(DETAIL_TYPE));
        assert!(result.per_detail_knowledge.contains_key(DETAIL_DESCRIPTION));
    }

    #[tokio::test(start_paused = true)]
    async fn cached_result_is_identical_within_ttl() {
        let positions = Arc::new(InMemoryPositions::new());
        let observer = EntityId::new();
        positions.set(observer, Position::new(40.0, 0.0));
        let event = event_at(0.0, 0.0, vec![EntityId::new(), EntityId::new()]);
        let engine = engine(Arc::clone(&positions), 5000, 100);

        let first = engine.get_knowledge(observer, &event).await.unwrap();
        tokio::time::advance(Duration::from_millis(4000)).await;
        // Moving without invalidation does not change a live entry.
        positions.set(observer, Position::new(0.0, 0.0));
        let second = engine.get_knowledge(observer, &event).await.unwrap();
        assert_eq!(first, second);

        tokio::time::advance(Duration::from_millis(1500)).await;
        let third = engine.get_knowledge(observer, &event).await.unwrap();
        assert!(third.distance.abs() < f64::EPSILON);
        assert!(third.computed_at >= first.computed_at);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_and_invalidate_drop_entries() {
        let positions = Arc::new(InMemoryPositions::new());
        let observer = EntityId::new();
        let other = EntityId::new();
        positions.set(observer, Position::new(1.0, 1.0));
        positions.set(other, Position::new(2.0, 2.0));
        let event = event_at(0.0, 0.0, Vec::new());
        let engine = engine(positions, 1000, 100);

        engine.get_knowledge(observer, &event).await.unwrap();
        engine.get_knowledge(other, &event).await.unwrap();
        assert_eq!(engine.cached_len().await, 2);

        assert_eq!(engine.invalidate_entity(observer).await, 1);
        assert_eq!(engine.cached_len().await, 1);

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert_eq!(engine.purge_expired().await, 1);
        assert_eq!(engine.cached_len().await, 0);
    }

    #[tokio::test]
    async fn cache_never_exceeds_its_bound() {
        let positions = Arc::new(InMemoryPositions::new());
        let event = event_at(0.0, 0.0, Vec::new());
        let engine = engine(Arc::clone(&positions), 60_000, 3);

        for i in 0..5u32 {
            let entity = EntityId::new();
            positions.set(entity, Position::new(f64::from(i), 0.0));
            engine.get_knowledge(entity, &event).await.unwrap();
        }
        assert_eq!(engine.cached_len().await, 3);
    }

    /// Position provider that blocks for a while on every lookup, so
    /// concurrent misses overlap.
    struct SlowPositions {
        inner: InMemoryPositions,
    }

    impl EntityPositionProvider for SlowPositions {
        fn position(&self, entity_id: EntityId) -> Option<Position> {
            std::thread::sleep(Duration::from_millis(50));
            self.inner.position(entity_id)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_misses_agree_on_one_result() {
        let observer = EntityId::new();
        let slow = SlowPositions {
            inner: InMemoryPositions::new(),
        };
        slow.inner.set(observer, Position::new(60.0, 0.0));
        let involved: Vec<EntityId> = (0..12).map(|_| EntityId::new()).collect();
        let event = event_at(0.0, 0.0, involved);
        let config = KnowledgeConfig::default();
        let engine = Arc::new(KnowledgeAccuracyEngine::with_rng(
            Arc::new(slow),
            &config,
            SmallRng::seed_from_u64(11),
        ));

        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            let event = event.clone();
            async move { engine.get_knowledge(observer, &event).await }
        });
        let second = tokio::spawn({
            let engine = Arc::clone(&engine);
            let event = event.clone();
            async move { engine.get_knowledge(observer, &event).await }
        });
        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        let c = engine.get_knowledge(observer, &event).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(engine.cached_len().await, 1);
    }

    #[tokio::test]
    async fn invalidate_event_drops_only_that_event() {
        let positions = Arc::new(InMemoryPositions::new());
        let observer = EntityId::new();
        positions.set(observer, Position::new(1.0, 1.0));
        let first = event_at(0.0, 0.0, Vec::new());
        let second = event_at(5.0, 5.0, Vec::new());
        let engine = engine(positions, 60_000, 100);

        engine.get_knowledge(observer, &first).await.unwrap();
        engine.get_knowledge(observer, &second).await.unwrap();
        assert_eq!(engine.invalidate_event(first.id).await, 1);
        assert_eq!(engine.cached_len().await, 1);
    }

    #[tokio::test]
    async fn unknown_entity_and_event_are_errors() {
        let positions = Arc::new(InMemoryPositions::new());
        let events = Arc::new(InMemoryWorldEvents::new());
        let engine = engine(Arc::clone(&positions), 5000, 10);
        let stranger = EntityId::new();

        let event = event_at(0.0, 0.0, Vec::new());
        assert_eq!(
            engine.get_knowledge(stranger, &event).await,
            Err(KnowledgeError::UnknownEntity(stranger))
        );
        assert_eq!(
            engine.get_knowledge_for(stranger, event.id).await,
            Err(KnowledgeError::NoEventSource)
        );

        let engine = engine.with_event_source(events.clone());
        assert_eq!(
            engine.get_knowledge_for(stranger, event.id).await,
            Err(KnowledgeError::UnknownEvent(event.id))
        );

        events.insert(event.clone());
        positions.set(stranger, Position::new(0.0, 0.0));
        let result = engine.get_knowledge_for(stranger, event.id).await.unwrap();
        assert_eq!(result.world_event_id, event.id);
    }
}
