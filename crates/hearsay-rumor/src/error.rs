//! Error types for rumor operations.
//!
//! [`RumorError`] is the taxonomy surfaced to callers of the rumor service.
//! [`MutationServiceError`] describes failures of the external content
//! mutation collaborator; those are recovered locally during a spread and
//! only reach callers that invoke a mutator directly.
//! [`KnowledgeError`] covers the spatial knowledge model.

use hearsay_store::StoreError;
use hearsay_types::{EntityId, RumorId, WorldEventId};

/// Errors surfaced by rumor creation, spreading, decay and queries.
#[derive(Debug, thiserror::Error)]
pub enum RumorError {
    /// An unknown rumor, or an entity with no knowledge of the rumor.
    #[error("not found: {0}")]
    NotFound(String),

    /// An input was out of range or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not allowed in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The content mutation service failed.
    #[error("external service error: {0}")]
    ExternalService(#[from] MutationServiceError),

    /// Another writer committed to the same rumor first, twice in a row.
    #[error("concurrent write conflict on rumor {0}")]
    ConcurrencyConflict(RumorId),

    /// The storage layer failed for a reason other than the above.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl RumorError {
    /// The rumor does not exist.
    pub fn rumor_not_found(rumor_id: RumorId) -> Self {
        Self::NotFound(format!("rumor {rumor_id}"))
    }

    /// The entity does not know the rumor.
    pub fn spread_not_found(rumor_id: RumorId, entity_id: EntityId) -> Self {
        Self::NotFound(format!("entity {entity_id} has no knowledge of rumor {rumor_id}"))
    }
}

impl From<StoreError> for RumorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(rumor_id) => Self::rumor_not_found(rumor_id),
            StoreError::VersionConflict { rumor_id, .. } => Self::ConcurrencyConflict(rumor_id),
            StoreError::Duplicate(rumor_id) => {
                Self::InvalidOperation(format!("rumor {rumor_id} already exists"))
            }
            other @ (StoreError::Integrity { .. }
            | StoreError::Io(_)
            | StoreError::Serialization(_)) => Self::Store(other),
        }
    }
}

/// Failures of the external content mutation service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationServiceError {
    /// The call did not finish within the configured deadline.
    #[error("mutation service timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// The request could not be sent or the service returned an error status.
    #[error("mutation service request failed: {0}")]
    Request(String),

    /// The service answered but the answer held no usable content.
    #[error("mutation service returned an unusable response: {0}")]
    InvalidResponse(String),

    /// The mutation prompt could not be rendered.
    #[error("mutation prompt error: {0}")]
    Prompt(String),
}

/// Errors from the spatial knowledge model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KnowledgeError {
    /// The position provider has no position for the entity.
    #[error("no position known for entity {0}")]
    UnknownEntity(EntityId),

    /// The world event source does not know the event.
    #[error("world event not found: {0}")]
    UnknownEvent(WorldEventId),

    /// No world event source is attached to the engine.
    #[error("no world event source is configured")]
    NoEventSource,

    /// A position held a non-finite coordinate.
    #[error("non-finite position for entity {0}")]
    InvalidPosition(EntityId),
}
