//! In-memory rumor store with per-rumor write serialization.
//!
//! Records live behind one [`Mutex`] each, so writes to a single rumor are
//! serialized while writes to different rumors proceed in parallel. The
//! outer map lock is only held long enough to find (or insert/remove) a
//! record handle, never across a write.
//!
//! Lock order is always: record map, then record, then entity index.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use hearsay_types::{EntityId, RumorId, RumorRecord};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::StoreError;

/// Shared handle to a single record.
type RecordCell = Arc<Mutex<RumorRecord>>;

/// Durable keyed storage for rumor aggregates plus an entity index.
///
/// All reads return owned snapshots; callers never hold a reference into
/// the store.
#[derive(Debug, Default)]
pub struct RumorStore {
    records: RwLock<BTreeMap<RumorId, RecordCell>>,
    entity_index: RwLock<BTreeMap<EntityId, BTreeSet<RumorId>>>,
}

impl RumorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously persisted records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if two records share an ID, or
    /// [`StoreError::Integrity`] if a record's spreads do not resolve.
    pub fn from_records(records: Vec<RumorRecord>) -> Result<Self, StoreError> {
        let mut map = BTreeMap::new();
        let mut index: BTreeMap<EntityId, BTreeSet<RumorId>> = BTreeMap::new();
        for record in records {
            let rumor_id = record.rumor.id;
            check_integrity(&record)?;
            for entity_id in record.spreads.keys() {
                index.entry(*entity_id).or_default().insert(rumor_id);
            }
            if map.insert(rumor_id, Arc::new(Mutex::new(record))).is_some() {
                return Err(StoreError::Duplicate(rumor_id));
            }
        }
        Ok(Self {
            records: RwLock::new(map),
            entity_index: RwLock::new(index),
        })
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the rumor ID is taken, or
    /// [`StoreError::Integrity`] if the record's spreads do not resolve.
    pub async fn insert(&self, record: RumorRecord) -> Result<(), StoreError> {
        check_integrity(&record)?;
        let rumor_id = record.rumor.id;
        let entities: Vec<EntityId> = record.spreads.keys().copied().collect();

        {
            let mut records = self.records.write().await;
            if records.contains_key(&rumor_id) {
                return Err(StoreError::Duplicate(rumor_id));
            }
            records.insert(rumor_id, Arc::new(Mutex::new(record)));
        }

        self.index_entities(rumor_id, entities).await;
        debug!(rumor_id = %rumor_id, "rumor record inserted");
        Ok(())
    }

    /// Return a snapshot of a record.
    pub async fn get(&self, rumor_id: RumorId) -> Option<RumorRecord> {
        let cell = self.cell(rumor_id).await?;
        let record = cell.lock().await;
        Some(record.clone())
    }

    /// Whether a record exists.
    pub async fn contains(&self, rumor_id: RumorId) -> bool {
        self.records.read().await.contains_key(&rumor_id)
    }

    /// Number of stored rumors.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no rumors.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// All rumor IDs, in ID (creation) order.
    pub async fn ids(&self) -> Vec<RumorId> {
        self.records.read().await.keys().copied().collect()
    }

    /// Snapshot every record.
    ///
    /// Each record is locked only while it is cloned, so a long listing
    /// never blocks writers for more than one record at a time.
    pub async fn all(&self) -> Vec<RumorRecord> {
        let cells: Vec<RecordCell> = self.records.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            out.push(cell.lock().await.clone());
        }
        out
    }

    /// IDs of every rumor the entity holds a spread for.
    pub async fn rumors_known_by(&self, entity_id: EntityId) -> Vec<RumorId> {
        self.entity_index
            .read()
            .await
            .get(&entity_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Apply a write to one record under its lock.
    ///
    /// The closure works on a copy; the copy replaces the stored record only
    /// if the closure succeeds and the result still passes the integrity
    /// check, so a failed write leaves no partial state. On success the
    /// version is bumped and any newly known entities are indexed.
    ///
    /// When `expected_version` is set the write is rejected with
    /// [`StoreError::VersionConflict`] if another writer committed first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`], [`StoreError::VersionConflict`],
    /// [`StoreError::Integrity`], or whatever the closure returns.
    pub async fn update<T, E, F>(
        &self,
        rumor_id: RumorId,
        expected_version: Option<u64>,
        apply: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut RumorRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let cell = self
            .cell(rumor_id)
            .await
            .ok_or(StoreError::NotFound(rumor_id))?;

        let (output, new_entities) = {
            let mut stored = cell.lock().await;
            if let Some(expected) = expected_version
                && stored.version != expected
            {
                return Err(StoreError::VersionConflict {
                    rumor_id,
                    expected,
                    actual: stored.version,
                }
                .into());
            }

            let mut working = stored.clone();
            let output = apply(&mut working)?;
            if working.rumor.id != rumor_id {
                return Err(StoreError::Integrity {
                    rumor_id,
                    reason: String::from("write changed the rumor id"),
                }
                .into());
            }
            check_integrity(&working)?;

            let new_entities: Vec<EntityId> = working
                .spreads
                .keys()
                .filter(|e| !stored.spreads.contains_key(e))
                .copied()
                .collect();
            working.version = stored.version.saturating_add(1);
            *stored = working;
            (output, new_entities)
        };

        if !new_entities.is_empty() {
            self.index_entities(rumor_id, new_entities).await;
        }
        Ok(output)
    }

    /// Hard-delete a record and drop it from the entity index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the rumor does not exist.
    pub async fn remove(&self, rumor_id: RumorId) -> Result<RumorRecord, StoreError> {
        let cell = self
            .records
            .write()
            .await
            .remove(&rumor_id)
            .ok_or(StoreError::NotFound(rumor_id))?;

        let record = cell.lock().await.clone();
        {
            let mut index = self.entity_index.write().await;
            for entity_id in record.spreads.keys() {
                if let Some(known) = index.get_mut(entity_id) {
                    known.remove(&rumor_id);
                    if known.is_empty() {
                        index.remove(entity_id);
                    }
                }
            }
        }
        debug!(rumor_id = %rumor_id, "rumor record removed");
        Ok(record)
    }

    async fn cell(&self, rumor_id: RumorId) -> Option<RecordCell> {
        self.records.read().await.get(&rumor_id).cloned()
    }

    async fn index_entities(&self, rumor_id: RumorId, entities: Vec<EntityId>) {
        // Holding the map read lock keeps `remove` out until the index write
        // is done; a record already removed is not indexed again.
        let records = self.records.read().await;
        if !records.contains_key(&rumor_id) {
            return;
        }
        let mut index = self.entity_index.write().await;
        for entity_id in entities {
            index.entry(entity_id).or_default().insert(rumor_id);
        }
    }
}

/// Reject records whose spreads reference variants they do not own.
fn check_integrity(record: &RumorRecord) -> Result<(), StoreError> {
    if record.root_variant().is_none() {
        return Err(StoreError::Integrity {
            rumor_id: record.rumor.id,
            reason: String::from("missing root variant"),
        });
    }
    if !record.variants_resolve() {
        return Err(StoreError::Integrity {
            rumor_id: record.rumor.id,
            reason: String::from("spread references a variant not owned by the rumor"),
        });
    }
    Ok(())
}
