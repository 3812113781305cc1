//! Shared application state for the rumor API server.

use std::sync::Arc;

use hearsay_core::RumorService;
use hearsay_rumor::{InMemoryPositions, InMemoryWorldEvents, KnowledgeAccuracyEngine};
use hearsay_types::RumorEvent;
use tokio::sync::broadcast;

/// Writable world tables behind the knowledge engine.
///
/// The host simulation pushes entity moves and world events through the
/// `/knowledge/positions` and `/knowledge/events` routes.
#[derive(Debug, Clone)]
pub struct WorldFeed {
    /// Entity positions read by the knowledge engine.
    pub positions: Arc<InMemoryPositions>,
    /// World events resolved by ID.
    pub events: Arc<InMemoryWorldEvents>,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState<M> {
    /// The rumor service every route delegates to.
    pub service: Arc<RumorService<M>>,
    /// Spatial knowledge engine, present when a world is attached.
    pub knowledge: Option<Arc<KnowledgeAccuracyEngine>>,
    /// World tables the knowledge routes may write to.
    pub world: Option<WorldFeed>,
}

impl<M: hearsay_rumor::ContentMutationService> AppState<M> {
    /// State serving rumors only.
    pub const fn new(service: Arc<RumorService<M>>) -> Self {
        Self {
            service,
            knowledge: None,
            world: None,
        }
    }

    /// Attach a knowledge engine, enabling `GET /knowledge/...`.
    #[must_use]
    pub fn with_knowledge(mut self, engine: Arc<KnowledgeAccuracyEngine>) -> Self {
        self.knowledge = Some(engine);
        self
    }

    /// Attach writable world tables, enabling the position and event
    /// routes. They should be the same tables the knowledge engine reads.
    #[must_use]
    pub fn with_world_feed(mut self, world: WorldFeed) -> Self {
        self.world = Some(world);
        self
    }

    /// Subscribe to the service's rumor event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RumorEvent> {
        self.service.subscribe()
    }
}

impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            knowledge: self.knowledge.clone(),
            world: self.world.clone(),
        }
    }
}
