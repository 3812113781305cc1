//! Rumor propagation, decay, and spatial knowledge for the Hearsay engine.
//!
//! This crate is the logic layer between `hearsay-store` (storage) and
//! `hearsay-core` (the service facade). It never performs network I/O
//! itself; the systems around it are reached through the traits in
//! [`collaborators`].
//!
//! # Modules
//!
//! - [`collaborators`] -- Mutation service, notifier, position and world
//!   event seams, plus in-memory implementations.
//! - [`config`] -- Propagation, decay and knowledge tunables.
//! - [`decay`] -- The [`DecayScheduler`] sweep.
//! - [`error`] -- [`RumorError`], [`MutationServiceError`], [`KnowledgeError`].
//! - [`knowledge`] -- The [`KnowledgeAccuracyEngine`] and its TTL cache.
//! - [`mutation`] -- Deterministic fallback garbling.
//! - [`propagation`] -- The [`PropagationEngine`].

pub mod collaborators;
pub mod config;
pub mod decay;
pub mod error;
pub mod knowledge;
pub mod mutation;
pub mod propagation;

pub use collaborators::{
    ContentMutationService, EntityPositionProvider, InMemoryPositions, InMemoryWorldEvents,
    LocalGarbler, NoopNotifier, RumorNotifier, WorldEventSource,
};
pub use config::{DecayConfig, KnowledgeConfig, PropagationConfig};
pub use decay::{DecayChange, DecayScheduler, DecaySweep};
pub use error::{KnowledgeError, MutationServiceError, RumorError};
pub use knowledge::{KnowledgeAccuracyEngine, accuracy_at};
pub use mutation::garble;
pub use propagation::{PropagationEngine, SpreadOutcome, SpreadRequest, clamp01};
