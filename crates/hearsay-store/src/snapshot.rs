//! JSON snapshot persistence for [`RumorStore`].
//!
//! The snapshot is a single pretty-printed JSON document holding every
//! record. It is written to a temporary sibling file and renamed into
//! place so a crash mid-write never leaves a truncated snapshot.

use std::path::Path;

use hearsay_types::RumorRecord;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::memory::RumorStore;

/// Current snapshot file format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// On-disk snapshot layout.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    saved_at: chrono::DateTime<chrono::Utc>,
    records: Vec<RumorRecord>,
}

impl RumorStore {
    /// Write every record to `path`.
    ///
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Io`].
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, StoreError> {
        let records = self.all().await;
        let count = records.len();
        let file = SnapshotFile {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: chrono::Utc::now(),
            records,
        };
        let body = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(path = %path.display(), records = count, "rumor snapshot saved");
        Ok(count)
    }

    /// Build a store from the snapshot at `path`.
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for unreadable files,
    /// [`StoreError::Serialization`] for malformed ones, and the errors of
    /// [`RumorStore::from_records`] for structurally invalid contents.
    pub async fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        let body = match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no rumor snapshot found, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let file: SnapshotFile = serde_json::from_slice(&body)?;
        let count = file.records.len();
        let store = Self::from_records(file.records)?;
        info!(
            path = %path.display(),
            records = count,
            format_version = file.format_version,
            "rumor snapshot loaded"
        );
        Ok(store)
    }
}
