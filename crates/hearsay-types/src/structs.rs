//! Core data-model structs: rumors, their variant tree, and spreads.
//!
//! A [`RumorRecord`] is the persisted aggregate. It nests the variant list
//! and the per-entity spread map under the rumor so that every write to a
//! single rumor touches exactly one record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ImpactLevel, LifecycleState, MutationSource, RumorCategory, Severity};
use crate::ids::{EntityId, RumorId, VariantId};

// ---------------------------------------------------------------------------
// Rumor
// ---------------------------------------------------------------------------

/// A piece of narrative information with an immutable ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Rumor {
    /// Unique rumor identifier.
    pub id: RumorId,
    /// The entity that started the rumor.
    pub originator_id: EntityId,
    /// How true the rumor is, in `[0, 1]`. Set once at creation.
    pub truth_value: f64,
    /// Thematic tags. Never empty.
    pub categories: BTreeSet<RumorCategory>,
    /// Current severity. Decay lowers it one step at a time.
    pub severity: Severity,
    /// When the rumor was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful spread.
    pub last_active_at: DateTime<Utc>,
    /// Stamped whenever a decay sweep changes this rumor.
    pub last_decayed_at: Option<DateTime<Utc>>,
    /// Where the rumor is in its lifecycle.
    pub lifecycle_state: LifecycleState,
}

impl Rumor {
    /// The later of `last_active_at` and `last_decayed_at`.
    ///
    /// Decay eligibility is measured from this instant so a sweep never
    /// acts twice on the same idle window.
    pub fn last_touched_at(&self) -> DateTime<Utc> {
        self.last_decayed_at
            .map_or(self.last_active_at, |decayed| decayed.max(self.last_active_at))
    }
}

/// One textual form of a rumor. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RumorVariant {
    /// Unique variant identifier.
    pub id: VariantId,
    /// The rumor this variant belongs to.
    pub rumor_id: RumorId,
    /// The variant this one was mutated from. `None` for the root.
    pub parent_variant_id: Option<VariantId>,
    /// The text an entity holding this variant would repeat.
    pub content: String,
    /// When the variant was created.
    pub created_at: DateTime<Utc>,
}

/// One entity's current knowledge of a rumor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RumorSpread {
    /// The rumor being known.
    pub rumor_id: RumorId,
    /// The entity that knows it.
    pub entity_id: EntityId,
    /// The variant this entity holds. Always owned by `rumor_id`.
    pub variant_id: VariantId,
    /// Confidence in the held variant, in `[0, 1]`.
    pub believability: f64,
    /// When the entity first heard the rumor.
    pub first_heard_at: DateTime<Utc>,
    /// When the entity last heard it again (or was reinforced).
    pub last_reinforced_at: DateTime<Utc>,
}

/// Append-only audit entry written for every successful spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpreadHistoryEntry {
    /// The rumor that spread.
    pub rumor_id: RumorId,
    /// The teller.
    pub from_entity_id: EntityId,
    /// The listener.
    pub to_entity_id: EntityId,
    /// The variant the listener ended up holding.
    pub variant_id: VariantId,
    /// The listener's believability after the spread.
    pub believability: f64,
    /// Whether and how the content mutated in transit.
    pub mutation: MutationSource,
    /// When the spread was committed.
    pub spread_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RumorRecord (persisted aggregate)
// ---------------------------------------------------------------------------

/// The persisted aggregate: a rumor with its variant tree, spread map,
/// spread history, and optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RumorRecord {
    /// The rumor itself.
    pub rumor: Rumor,
    /// Every variant ever created, in creation order. The first is the root.
    pub variants: Vec<RumorVariant>,
    /// At most one spread per entity.
    pub spreads: BTreeMap<EntityId, RumorSpread>,
    /// Append-only spread log.
    pub history: Vec<SpreadHistoryEntry>,
    /// Bumped on every committed write.
    pub version: u64,
}

impl RumorRecord {
    /// Look up a variant owned by this rumor.
    pub fn variant(&self, id: VariantId) -> Option<&RumorVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// The root variant created at origination.
    pub fn root_variant(&self) -> Option<&RumorVariant> {
        self.variants.iter().find(|v| v.parent_variant_id.is_none())
    }

    /// The spread row for an entity, if it knows this rumor.
    pub fn spread_for(&self, entity_id: EntityId) -> Option<&RumorSpread> {
        self.spreads.get(&entity_id)
    }

    /// The content an entity would repeat, resolved through its held variant.
    pub fn content_for(&self, entity_id: EntityId) -> Option<&str> {
        let spread = self.spread_for(entity_id)?;
        self.variant(spread.variant_id).map(|v| v.content.as_str())
    }

    /// The root content, or an empty string for a malformed record.
    pub fn root_content(&self) -> &str {
        self.root_variant().map_or("", |v| v.content.as_str())
    }

    /// Mean believability across all spreads (0 when nobody knows it).
    pub fn mean_believability(&self) -> f64 {
        if self.spreads.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.spreads.values().map(|s| s.believability).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.spreads.len() as f64;
        sum / count
    }

    /// Check that every spread references a variant owned by this rumor.
    pub fn variants_resolve(&self) -> bool {
        self.spreads.values().all(|s| {
            s.rumor_id == self.rumor.id
                && self
                    .variant(s.variant_id)
                    .is_some_and(|v| v.rumor_id == self.rumor.id)
        })
    }
}

// ---------------------------------------------------------------------------
// Read projections
// ---------------------------------------------------------------------------

/// A rumor as seen by one entity, returned by the entity listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntityRumorView {
    /// The rumor.
    pub rumor_id: RumorId,
    /// The variant this entity holds.
    pub variant_id: VariantId,
    /// The content of that variant.
    pub content: String,
    /// How strongly the entity believes it.
    pub believability: f64,
    /// The rumor's categories.
    pub categories: BTreeSet<RumorCategory>,
    /// The rumor's current severity.
    pub severity: Severity,
    /// The rumor's lifecycle state.
    pub lifecycle_state: LifecycleState,
}

/// Compact rumor listing row used by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RumorSummary {
    /// The rumor.
    pub rumor_id: RumorId,
    /// Who started it.
    pub originator_id: EntityId,
    /// Content of the root variant.
    pub root_content: String,
    /// Thematic tags.
    pub categories: BTreeSet<RumorCategory>,
    /// Current severity.
    pub severity: Severity,
    /// Ground truth.
    pub truth_value: f64,
    /// Lifecycle state.
    pub lifecycle_state: LifecycleState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Number of variants in the tree.
    pub variant_count: u64,
    /// Number of entities that know the rumor.
    pub spread_count: u64,
}

impl From<&RumorRecord> for RumorSummary {
    fn from(record: &RumorRecord) -> Self {
        Self {
            rumor_id: record.rumor.id,
            originator_id: record.rumor.originator_id,
            root_content: record.root_content().to_owned(),
            categories: record.rumor.categories.clone(),
            severity: record.rumor.severity,
            truth_value: record.rumor.truth_value,
            lifecycle_state: record.rumor.lifecycle_state,
            created_at: record.rumor.created_at,
            variant_count: record.variants.len() as u64,
            spread_count: record.spreads.len() as u64,
        }
    }
}

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RumorStatistics {
    /// Number of rumors.
    pub total_rumors: u64,
    /// Number of variants across all rumors.
    pub total_variants: u64,
    /// Number of spread rows across all rumors.
    pub total_spreads: u64,
    /// Rumor count per lifecycle state.
    pub by_lifecycle: BTreeMap<LifecycleState, u64>,
    /// Rumor count per category (a rumor counts once per tag).
    pub by_category: BTreeMap<RumorCategory, u64>,
    /// Rumor count per severity.
    pub by_severity: BTreeMap<Severity, u64>,
    /// Mean truth value.
    pub average_truth_value: f64,
    /// Mean variants per rumor.
    pub average_variants_per_rumor: f64,
    /// Mean spreads per rumor.
    pub average_spreads_per_rumor: f64,
}

/// Influence estimate for a single rumor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RumorImpact {
    /// The rumor.
    pub rumor_id: RumorId,
    /// Score in `[0, 1]`.
    pub impact_score: f64,
    /// Bucketed score.
    pub level: ImpactLevel,
    /// Current severity.
    pub severity: Severity,
    /// Mean believability across spreads.
    pub mean_believability: f64,
    /// Number of entities that know the rumor.
    pub spread_count: u64,
    /// Number of variants in the tree.
    pub variant_count: u64,
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Payload handed to the notification system when an entity hears a rumor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RumorNotification {
    /// The rumor heard.
    pub rumor_id: RumorId,
    /// Who told it.
    pub from_entity_id: EntityId,
    /// The variant now held.
    pub variant_id: VariantId,
    /// The content now held.
    pub content: String,
    /// How strongly the listener believes it.
    pub believability: f64,
    /// The rumor's severity at the time of hearing.
    pub severity: Severity,
    /// The rumor's categories.
    pub categories: BTreeSet<RumorCategory>,
}

/// Analytics event broadcast for every rumor write. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RumorEvent {
    /// A rumor and its root variant were created.
    Created {
        /// The new rumor.
        rumor_id: RumorId,
        /// Who started it.
        originator_id: EntityId,
    },
    /// A spread was committed.
    Spread {
        /// The rumor.
        rumor_id: RumorId,
        /// The teller.
        from_entity_id: EntityId,
        /// The listener.
        to_entity_id: EntityId,
        /// The variant the listener holds.
        variant_id: VariantId,
        /// The listener's believability.
        believability: f64,
        /// Whether and how the content mutated.
        mutation: MutationSource,
    },
    /// A new variant was added to the tree.
    Mutated {
        /// The rumor.
        rumor_id: RumorId,
        /// The new variant.
        variant_id: VariantId,
        /// Its parent.
        parent_variant_id: VariantId,
    },
    /// A rumor's categories or severity were edited.
    Updated {
        /// The rumor.
        rumor_id: RumorId,
        /// Categories after the edit.
        categories: BTreeSet<RumorCategory>,
        /// Severity after the edit.
        severity: Severity,
    },
    /// A decay sweep changed a rumor's severity or lifecycle state.
    Decayed {
        /// The rumor.
        rumor_id: RumorId,
        /// Severity after the sweep.
        severity: Severity,
        /// Lifecycle state after the sweep.
        lifecycle_state: LifecycleState,
    },
    /// A rumor was hard-deleted.
    Deleted {
        /// The rumor.
        rumor_id: RumorId,
    },
}
