//! World events and per-observer knowledge results.
//!
//! These types feed the spatial knowledge model: a [`WorldEvent`] happens at
//! a [`Position`], and each observer gets a [`KnowledgeResult`] describing
//! how much of it they know.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::DetailKnowledge;
use crate::ids::{EntityId, WorldEventId};

/// A point on the world plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
}

impl Position {
    /// Create a position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// What kind of thing happened, with a typed payload per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum WorldEventKind {
    /// A fight between entities.
    Combat {
        /// The winner, if the fight was decided.
        victor: Option<EntityId>,
    },
    /// Goods changed hands.
    Trade {
        /// What was traded.
        goods: String,
    },
    /// Someone died.
    Death {
        /// How they died.
        cause: String,
    },
    /// A crowd assembled.
    Gathering {
        /// Why they assembled.
        purpose: String,
    },
    /// Fire, flood, plague and the like.
    Disaster {
        /// Rough magnitude, 1 (local) to 5 (regional).
        scale: u8,
    },
    /// Anything else, labelled freely.
    Other {
        /// Free-form label.
        label: String,
    },
}

impl WorldEventKind {
    /// Short label used when describing the event.
    pub fn label(&self) -> &str {
        match self {
            Self::Combat { .. } => "combat",
            Self::Trade { .. } => "trade",
            Self::Death { .. } => "death",
            Self::Gathering { .. } => "gathering",
            Self::Disaster { .. } => "disaster",
            Self::Other { label } => label.as_str(),
        }
    }
}

/// Something that happened somewhere in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldEvent {
    /// Unique event identifier.
    pub id: WorldEventId,
    /// Where it happened.
    pub location: Position,
    /// Entities involved, in the order details are revealed.
    pub involved_entities: Vec<EntityId>,
    /// What happened.
    pub kind: WorldEventKind,
    /// Narrative description.
    pub description: String,
}

/// Detail key for the event's type field.
pub const DETAIL_TYPE: &str = "type";

/// Detail key for the event's description field.
pub const DETAIL_DESCRIPTION: &str = "description";

/// Detail key for an involved entity reference.
pub fn entity_detail_key(entity_id: EntityId) -> String {
    format!("entity:{entity_id}")
}

/// How accurately one entity knows one world event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct KnowledgeResult {
    /// The observer.
    pub entity_id: EntityId,
    /// The event observed.
    pub world_event_id: WorldEventId,
    /// Distance from observer to event at computation time.
    pub distance: f64,
    /// Accuracy in `(0, 1]`.
    pub accuracy: f64,
    /// Per-detail outcome keyed by detail name.
    pub per_detail_knowledge: BTreeMap<String, DetailKnowledge>,
    /// When this result was computed.
    pub computed_at: DateTime<Utc>,
}
