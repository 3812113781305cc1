//! Shared type definitions for the Hearsay rumor propagation engine.
//!
//! This crate is the single source of truth for the data model used across
//! the workspace. Types flow downstream to `TypeScript` via `ts-rs` for the
//! rumor dashboards.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for rumors, variants, entities, events
//! - [`enums`] -- Categories, severity, lifecycle, knowledge and mutation tags
//! - [`structs`] -- Rumor aggregate, variants, spreads, projections, events
//! - [`world`] -- World events, positions, and knowledge results

pub mod enums;
pub mod ids;
pub mod structs;
pub mod world;

// Re-export all public types at crate root for convenience.
pub use enums::{
    DetailKnowledge, ImpactLevel, LifecycleState, MutationSource, RumorCategory, Severity,
    UnknownVariant,
};
pub use ids::{EntityId, RumorId, VariantId, WorldEventId};
pub use structs::{
    EntityRumorView, Rumor, RumorEvent, RumorImpact, RumorNotification, RumorRecord,
    RumorSpread, RumorStatistics, RumorSummary, RumorVariant, SpreadHistoryEntry,
};
pub use world::{
    DETAIL_DESCRIPTION, DETAIL_TYPE, KnowledgeResult, Position, WorldEvent, WorldEventKind,
    entity_detail_key,
};
