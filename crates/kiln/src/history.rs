//! History stores: JSON files on disk and an in-memory map.

use crate::config::Settings;
use kiln_caching::{
    Error, HistoryRecord, HistoryStore, OutputSnapshot, OverlapInfo, Result, detect_overlap,
};
use kiln_fingerprint::CompositeFingerprint;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Index mapping output paths to the unit that last recorded them
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct OwnerIndex {
    /// Map of absolute output path -> unit id
    pub owners: BTreeMap<String, String>,
}

impl OwnerIndex {
    /// Make `unit_id` the owner of every path in `outputs`, releasing
    /// paths it owned before but no longer produces.
    pub fn claim(&mut self, unit_id: &str, outputs: &OutputSnapshot) {
        self.owners.retain(|_, owner| owner != unit_id);
        for path in outputs
            .properties()
            .values()
            .flat_map(|property| property.entries.keys())
        {
            self.owners.insert(path.clone(), unit_id.to_string());
        }
    }
}

fn unit_file_name(unit_id: &str) -> String {
    let digest = Sha256::digest(unit_id.as_bytes());
    format!("{}.json", hex::encode(&digest[..8]))
}

/// History persisted as JSON files
///
/// Layout under the root directory:
/// - `units/<hash>.json`: the last [`HistoryRecord`] of one unit
/// - `owners.json`: the [`OwnerIndex`]
#[derive(Debug)]
pub struct JsonHistoryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    /// Open (and create) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let units = root.join("units");
        fs::create_dir_all(&units).map_err(|e| Error::io(e, &units, "create_dir_all"))?;
        tracing::debug!(root = %root.display(), "Opened history store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Open the store in the directory chosen by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error when no writable directory can be found.
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let root = settings.resolve_history_dir()?;
        Ok(Self::open(root)?)
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, unit_id: &str) -> PathBuf {
        self.root.join("units").join(unit_file_name(unit_id))
    }

    fn owners_path(&self) -> PathBuf {
        self.root.join("owners.json")
    }

    fn read_owners(&self) -> OwnerIndex {
        let path = self.owners_path();
        read_json(&path).unwrap_or_default()
    }
}

/// Read a JSON file. Absent and corrupt files both yield `None`; corruption
/// is logged.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read history file");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt history file");
            None
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::serialization(format!("Failed to serialize {what}: {e}")))?;
    fs::write(path, json).map_err(|e| Error::io(e, path, "write"))
}

impl HistoryStore for JsonHistoryStore {
    fn record_outputs(
        &self,
        unit_id: &str,
        outputs: &OutputSnapshot,
        fingerprint: &CompositeFingerprint,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();
        let record = HistoryRecord::new(unit_id, fingerprint.clone(), outputs.clone());
        let path = self.record_path(unit_id);
        write_json(&path, &record, "history record")?;

        let mut owners = self.read_owners();
        owners.claim(unit_id, outputs);
        write_json(&self.owners_path(), &owners, "owner index")?;

        tracing::debug!(
            unit = unit_id,
            path = %path.display(),
            fingerprint = %fingerprint.hash(),
            "Recorded execution history"
        );
        Ok(())
    }

    fn previous_record(&self, unit_id: &str) -> Option<HistoryRecord> {
        let record: HistoryRecord = read_json(&self.record_path(unit_id))?;
        // Truncated hashes may collide.
        (record.unit_id == unit_id).then_some(record)
    }

    fn owner_of(&self, path: &str) -> Option<String> {
        self.read_owners().owners.get(path).cloned()
    }

    /// Reads the owner index once for the whole snapshot.
    fn previous_overlap(
        &self,
        unit_id: &str,
        current_outputs: &OutputSnapshot,
    ) -> Option<OverlapInfo> {
        let previous = self.previous_record(unit_id);
        let owners = self.read_owners();
        detect_overlap(
            unit_id,
            previous.as_ref().map(|record| &record.outputs),
            current_outputs,
            |path| owners.owners.get(path).cloned(),
        )
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<String, HistoryRecord>,
    owners: OwnerIndex,
}

/// History kept in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryHistoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units with a record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Whether no unit has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn record_outputs(
        &self,
        unit_id: &str,
        outputs: &OutputSnapshot,
        fingerprint: &CompositeFingerprint,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.owners.claim(unit_id, outputs);
        state.records.insert(
            unit_id.to_string(),
            HistoryRecord::new(unit_id, fingerprint.clone(), outputs.clone()),
        );
        Ok(())
    }

    fn previous_record(&self, unit_id: &str) -> Option<HistoryRecord> {
        self.state.lock().records.get(unit_id).cloned()
    }

    fn owner_of(&self, path: &str) -> Option<String> {
        self.state.lock().owners.owners.get(path).cloned()
    }
}
