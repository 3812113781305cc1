//! Seams to the systems around the rumor engine.
//!
//! - [`ContentMutationService`] rewrites rumor content when it mutates.
//! - [`RumorNotifier`] tells downstream consumers (NPC memory, dialogue)
//!   that an entity heard something.
//! - [`EntityPositionProvider`] and [`WorldEventSource`] feed the spatial
//!   knowledge model.
//!
//! The in-memory implementations here back tests and small embeddings
//! where no external world simulation is attached.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use hearsay_types::{EntityId, Position, RumorNotification, WorldEvent, WorldEventId};

use crate::error::MutationServiceError;
use crate::mutation::garble;

/// Produces a mutated rewrite of rumor content.
///
/// The returned future must be `Send` so spreads can run inside spawned
/// tasks and HTTP handlers.
pub trait ContentMutationService: Send + Sync {
    /// Rewrite `original_content`. `mutation_strength` is in `[0, 1]`;
    /// higher values should distort more.
    fn generate_variant(
        &self,
        original_content: &str,
        mutation_strength: f64,
    ) -> impl Future<Output = Result<String, MutationServiceError>> + Send;
}

/// Receives a notification each time an entity hears a rumor.
///
/// Delivery is fire-and-forget. Implementations must not block.
pub trait RumorNotifier: Send + Sync {
    /// Tell `entity_id` it now holds the rumor described by `notification`.
    fn push_rumor(&self, entity_id: EntityId, notification: &RumorNotification);
}

/// Looks up where an entity currently is.
pub trait EntityPositionProvider: Send + Sync {
    /// The entity's position, or `None` if it is unknown.
    fn position(&self, entity_id: EntityId) -> Option<Position>;
}

/// Looks up world events by ID.
pub trait WorldEventSource: Send + Sync {
    /// The event, or `None` if it is unknown.
    fn event(&self, world_event_id: WorldEventId) -> Option<WorldEvent>;
}

// ---------------------------------------------------------------------------
// Built-in implementations
// ---------------------------------------------------------------------------

/// Mutation service that applies the local garbling transform.
///
/// Never fails, so spreads using it never take the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGarbler;

impl ContentMutationService for LocalGarbler {
    async fn generate_variant(
        &self,
        original_content: &str,
        _mutation_strength: f64,
    ) -> Result<String, MutationServiceError> {
        Ok(garble(original_content))
    }
}

/// Notifier that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl RumorNotifier for NoopNotifier {
    fn push_rumor(&self, _entity_id: EntityId, _notification: &RumorNotification) {}
}

/// Mutable in-memory entity positions.
#[derive(Debug, Default)]
pub struct InMemoryPositions {
    positions: RwLock<BTreeMap<EntityId, Position>>,
}

impl InMemoryPositions {
    /// Create an empty position table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or move an entity.
    pub fn set(&self, entity_id: EntityId, position: Position) {
        self.positions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_id, position);
    }

    /// Forget an entity.
    pub fn remove(&self, entity_id: EntityId) {
        self.positions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&entity_id);
    }
}

impl EntityPositionProvider for InMemoryPositions {
    fn position(&self, entity_id: EntityId) -> Option<Position> {
        self.positions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&entity_id)
            .copied()
    }
}

/// Mutable in-memory world event table.
#[derive(Debug, Default)]
pub struct InMemoryWorldEvents {
    events: RwLock<BTreeMap<WorldEventId, WorldEvent>>,
}

impl InMemoryWorldEvents {
    /// Create an empty event table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, replacing any event with the same ID.
    pub fn insert(&self, event: WorldEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.id, event);
    }
}

impl WorldEventSource for InMemoryWorldEvents {
    fn event(&self, world_event_id: WorldEventId) -> Option<WorldEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&world_event_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use hearsay_types::WorldEventKind;

    use super::*;

    #[tokio::test]
    async fn local_garbler_always_changes_content() {
        let out = LocalGarbler.generate_variant("The baker is a thief", 0.5).await;
        assert_eq!(out.ok().as_deref(), Some("The baker might be a thief"));
    }

    #[test]
    fn positions_can_move_and_vanish() {
        let positions = InMemoryPositions::new();
        let id = EntityId::new();
        assert_eq!(positions.position(id), None);
        positions.set(id, Position::new(1.0, 2.0));
        positions.set(id, Position::new(3.0, 4.0));
        assert_eq!(positions.position(id), Some(Position::new(3.0, 4.0)));
        positions.remove(id);
        assert_eq!(positions.position(id), None);
    }

    #[test]
    fn world_events_resolve_by_id() {
        let events = InMemoryWorldEvents::new();
        let event = WorldEvent {
            id: WorldEventId::new(),
            location: Position::new(0.0, 0.0),
            involved_entities: Vec::new(),
            kind: WorldEventKind::Gathering {
                purpose: String::from("harvest festival"),
            },
            description: String::from("The village gathered in the square"),
        };
        events.insert(event.clone());
        assert_eq!(events.event(event.id), Some(event));
        assert_eq!(events.event(WorldEventId::new()), None);
    }
}
