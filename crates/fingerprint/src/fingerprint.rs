//! Fingerprint value types.

use crate::hashing::FingerprintHasher;
use crate::normalize::{NormalizedEntry, normalize};
use crate::{Error, PathSensitivity, Result};
use kiln_snapshot::{EntryContent, FileEntry, RootSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One `(key, ordinal) → content` pair of a [`FileSetFingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    /// Normalized key
    pub key: String,
    /// Tie-break among entries sharing `key`
    pub ordinal: u32,
    /// Observed content
    pub content: EntryContent,
}

/// Fingerprint of a file or directory property.
///
/// Entries are ordered by key, then ordinal, and are unique by
/// `(key, ordinal)`. Entries that share a key are ordered by content, then
/// relative path, then absolute path before ordinals are handed out, so a
/// content-only policy does not depend on file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSetFingerprint {
    sensitivity: PathSensitivity,
    entries: Vec<FingerprintEntry>,
    hash: String,
}

struct Candidate<'a> {
    normalized: NormalizedEntry,
    relative: String,
    absolute: &'a Arc<str>,
}

impl FileSetFingerprint {
    /// Fingerprint the entries of several walked roots.
    #[must_use]
    pub fn from_snapshots(sensitivity: PathSensitivity, snapshots: &[RootSnapshot]) -> Self {
        Self::from_entries(
            sensitivity,
            snapshots.iter().flat_map(|snapshot| snapshot.entries.iter()),
        )
    }

    /// Fingerprint a sequence of entries.
    ///
    /// An absolute path reached through nested roots contributes once, as
    /// seen from the innermost root (fewest relative segments), whatever
    /// order the roots were walked in.
    pub fn from_entries<'a>(
        sensitivity: PathSensitivity,
        entries: impl IntoIterator<Item = &'a FileEntry>,
    ) -> Self {
        let mut unique: Vec<&'a FileEntry> = Vec::new();
        let mut positions: HashMap<&'a str, usize> = HashMap::new();
        for entry in entries {
            match positions.entry(entry.absolute_path()) {
                Entry::Occupied(slot) => {
                    let kept = &mut unique[*slot.get()];
                    if entry.relative_segments().len() < kept.relative_segments().len() {
                        *kept = entry;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(unique.len());
                    unique.push(entry);
                }
            }
        }

        let mut candidates: Vec<Candidate<'a>> = Vec::with_capacity(unique.len());
        for entry in unique {
            if let Some(normalized) = normalize(sensitivity, entry) {
                candidates.push(Candidate {
                    normalized,
                    relative: entry.relative_path(),
                    absolute: entry.absolute_path_arc(),
                });
            }
        }

        candidates.sort_by(|a, b| {
            a.normalized
                .path
                .cmp(&b.normalized.path)
                .then_with(|| a.normalized.content.cmp(&b.normalized.content))
                .then_with(|| a.relative.cmp(&b.relative))
                .then_with(|| a.absolute.cmp(b.absolute))
        });

        let mut entries: Vec<FingerprintEntry> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let key = candidate.normalized.key();
            let ordinal = match entries.last() {
                Some(previous) if previous.key == key => previous.ordinal + 1,
                _ => 0,
            };
            entries.push(FingerprintEntry {
                key: key.to_string(),
                ordinal,
                content: candidate.normalized.content,
            });
        }

        let hash = Self::compute_hash(&entries);
        Self {
            sensitivity,
            entries,
            hash,
        }
    }

    /// The empty file set.
    #[must_use]
    pub fn empty(sensitivity: PathSensitivity) -> Self {
        Self::from_entries(sensitivity, std::iter::empty())
    }

    fn compute_hash(entries: &[FingerprintEntry]) -> String {
        let mut hasher = FingerprintHasher::new("kiln.fileset");
        hasher.put_u64(entries.len() as u64);
        for entry in entries {
            hasher.put_str(&entry.key);
            hasher.put_u64(u64::from(entry.ordinal));
            hasher.put_content(&entry.content);
        }
        hasher.finish()
    }

    /// The policy the entries were normalized under.
    #[must_use]
    pub fn sensitivity(&self) -> PathSensitivity {
        self.sensitivity
    }

    /// Ordered entries.
    #[must_use]
    pub fn entries(&self) -> &[FingerprintEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry contributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash over the ordered entries.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Snapshot of a scalar or structured input value.
///
/// The hash covers the canonical JSON form (object keys sorted), so
/// structurally equal values always hash alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    value: Value,
    hash: String,
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(inner) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(inner));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl ValueSnapshot {
    /// Snapshot `value`, hashing its canonical serialized form.
    pub fn of(value: &Value) -> Result<Self> {
        let canonical = canonicalize(value);
        let bytes = serde_json::to_vec(&canonical)
            .map_err(|e| Error::serialization(format!("Failed to serialize input value: {e}")))?;
        let mut hasher = FingerprintHasher::new("kiln.value");
        hasher.put_bytes(&bytes);
        Ok(Self {
            value: canonical,
            hash: hasher.finish(),
        })
    }

    /// Whether `value` is structurally equal to the snapshotted value.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        self.value == *value
    }

    /// The snapshotted value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Hash of the canonical form.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Fingerprint of one declared input property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PropertyFingerprint {
    /// A scalar or structured value
    Value(ValueSnapshot),
    /// A file or directory collection
    FileSet(FileSetFingerprint),
}

impl PropertyFingerprint {
    /// The property's own hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        match self {
            Self::Value(snapshot) => snapshot.hash(),
            Self::FileSet(fingerprint) => fingerprint.hash(),
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::FileSet(_) => "fileset",
        }
    }
}

/// Fingerprint of everything a unit of work consumed.
///
/// Properties are keyed by unique name in sorted order; the rolled-up hash
/// covers the whole sorted mapping, so two composites are equal exactly
/// when every property is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeFingerprint {
    properties: BTreeMap<String, PropertyFingerprint>,
    hash: String,
}

impl CompositeFingerprint {
    /// Roll up a set of property fingerprints.
    #[must_use]
    pub fn new(properties: BTreeMap<String, PropertyFingerprint>) -> Self {
        let mut hasher = FingerprintHasher::new("kiln.composite");
        hasher.put_u64(properties.len() as u64);
        for (name, property) in &properties {
            hasher.put_str(name);
            hasher.put_str(property.tag());
            hasher.put_str(property.hash());
        }
        Self {
            properties,
            hash: hasher.finish(),
        }
    }

    /// Properties by name.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, PropertyFingerprint> {
        &self.properties
    }

    /// One property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyFingerprint> {
        self.properties.get(name)
    }

    /// The rolled-up hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Value snapshots, for reuse by a later execution.
    #[must_use]
    pub fn value_snapshots(&self) -> BTreeMap<String, ValueSnapshot> {
        self.properties
            .iter()
            .filter_map(|(name, property)| match property {
                PropertyFingerprint::Value(snapshot) => Some((name.clone(), snapshot.clone())),
                PropertyFingerprint::FileSet(_) => None,
            })
            .collect()
    }

    /// File fingerprints by property name.
    #[must_use]
    pub fn file_fingerprints(&self) -> BTreeMap<String, FileSetFingerprint> {
        self.properties
            .iter()
            .filter_map(|(name, property)| match property {
                PropertyFingerprint::FileSet(fingerprint) => {
                    Some((name.clone(), fingerprint.clone()))
                }
                PropertyFingerprint::Value(_) => None,
            })
            .collect()
    }

    /// Whether both composites cover the same inputs. Only hashes are
    /// compared, so a value read back from history with a slightly
    /// different representation still matches.
    #[must_use]
    pub fn same_inputs(&self, other: &Self) -> bool {
        self.hash == other.hash
    }

    /// Names of properties whose hashes differ from `previous`, including
    /// properties present on only one side.
    #[must_use]
    pub fn changed_properties(&self, previous: &Self) -> Vec<String> {
        let mut changed: Vec<String> = self
            .properties
            .iter()
            .filter(|(name, property)| {
                previous.properties.get(*name).is_none_or(|recorded| {
                    recorded.tag() != property.tag() || recorded.hash() != property.hash()
                })
            })
            .map(|(name, _)| name.clone())
            .collect();
        changed.extend(
            previous
                .properties
                .keys()
                .filter(|name| !self.properties.contains_key(*name))
                .cloned(),
        );
        changed.sort();
        changed
    }
}
