//! Filters for rumor listings.

use std::collections::BTreeSet;

use hearsay_types::{EntityId, LifecycleState, RumorCategory, RumorRecord, Severity};

/// Listing size when a filter does not set one.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Filter for [`RumorService::query_rumors`](crate::RumorService::query_rumors).
///
/// Empty fields do not filter. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RumorQuery {
    /// Case-insensitive substring of the root content.
    pub text: Option<String>,
    /// Match rumors carrying any of these categories.
    pub categories: BTreeSet<RumorCategory>,
    /// Minimum severity, inclusive.
    pub min_severity: Option<Severity>,
    /// Minimum truth value, inclusive.
    pub min_truth_value: Option<f64>,
    /// Exact lifecycle state.
    pub lifecycle_state: Option<LifecycleState>,
    /// Only rumors this entity knows.
    pub known_by: Option<EntityId>,
    /// Maximum results (default [`DEFAULT_LIST_LIMIT`]).
    pub limit: Option<usize>,
}

impl RumorQuery {
    /// Whether `record` passes every filter except `known_by`, which the
    /// service resolves through the entity index.
    pub fn matches(&self, record: &RumorRecord) -> bool {
        let rumor = &record.rumor;
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            if !record.root_content().to_lowercase().contains(&needle) {
                return false;
            }
        }
        if !self.categories.is_empty() && self.categories.is_disjoint(&rumor.categories) {
            return false;
        }
        if self.min_severity.is_some_and(|min| rumor.severity < min) {
            return false;
        }
        if self.min_truth_value.is_some_and(|min| rumor.truth_value < min) {
            return false;
        }
        if self.lifecycle_state.is_some_and(|state| rumor.lifecycle_state != state) {
            return false;
        }
        true
    }

    /// The limit to apply.
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

/// Filter for [`RumorService::get_rumors_by_entity_filtered`](crate::RumorService::get_rumors_by_entity_filtered).
///
/// Results are sorted by believability, strongest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRumorFilter {
    /// Minimum believability, inclusive.
    pub min_believability: Option<f64>,
    /// Match rumors carrying any of these categories.
    pub categories: BTreeSet<RumorCategory>,
    /// Maximum results (default [`DEFAULT_LIST_LIMIT`]).
    pub limit: Option<usize>,
}

impl EntityRumorFilter {
    /// The limit to apply.
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}
