//! JSON-file stores: per-user library, cross-reference cache and the
//! no-achievements registry.
//!
//! Every write is a whole-file read-modify-write. The new content goes to a
//! temporary file in the same directory which is then renamed over the old
//! one, so an interrupted write never leaves a truncated store behind.
//! Nothing here locks; one process at a time.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::models::{AppId, CrossReferenceEntry, LibraryRecord};

// ============================================================================
// File helpers
// ============================================================================

/// Read a JSON document. A missing or blank file reads as `T::default()`.
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-print `value` (4-space indent) and atomically replace `path`.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_err)?;

    let tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
        value.serialize(&mut ser).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;
    }
    tmp.persist(path).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ============================================================================
// Library Store
// ============================================================================

/// Sort by rarest achievement, highest percentage first. Records whose
/// percentage does not parse go last; equal values keep their order.
pub fn sort_by_rarity(records: &mut [LibraryRecord]) {
    records.sort_by(|a, b| match (a.rarity_value(), b.rarity_value()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// One user's scraped records, unique by AppID
#[derive(Clone, Debug)]
pub struct LibraryStore {
    path: PathBuf,
}

impl LibraryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<LibraryRecord>, StoreError> {
        read_json(&self.path)
    }

    pub fn app_ids(&self) -> Result<FxHashSet<AppId>, StoreError> {
        Ok(self.load()?.into_iter().map(|r| r.app_id).collect())
    }

    /// Append records whose AppID is not stored yet, re-sort, write.
    /// Returns how many were added.
    pub fn append(&self, records: &[LibraryRecord]) -> Result<usize, StoreError> {
        let mut existing = self.load()?;
        let mut seen: FxHashSet<AppId> = existing.iter().map(|r| r.app_id).collect();

        let before = existing.len();
        for record in records {
            if seen.insert(record.app_id) {
                existing.push(record.clone());
            }
        }
        let added = existing.len() - before;
        if added == 0 {
            return Ok(0);
        }

        sort_by_rarity(&mut existing);
        write_json(&self.path, &existing)?;
        tracing::debug!(path = %self.path.display(), added, total = existing.len(), "library saved");
        Ok(added)
    }
}

// ============================================================================
// Cross-Reference Store
// ============================================================================

/// AppID → length-source mapping shared across users. First writer wins.
#[derive(Clone, Debug)]
pub struct CrossReferenceStore {
    path: PathBuf,
}

impl CrossReferenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<CrossReferenceEntry>, StoreError> {
        read_json(&self.path)
    }

    /// Entries keyed by AppID. If the file somehow holds duplicates the
    /// first occurrence is kept.
    pub fn index(&self) -> Result<FxHashMap<AppId, CrossReferenceEntry>, StoreError> {
        let mut index = FxHashMap::default();
        for entry in self.load()? {
            index.entry(entry.app_id).or_insert(entry);
        }
        Ok(index)
    }

    /// Add entries for AppIDs not present yet, keeping file order and
    /// appending new ones at the end. An existing entry without a length
    /// match is replaced in place by one that has a match; a matched entry
    /// is never overwritten. Returns how many entries were added or filled.
    pub fn insert_new(&self, entries: &[CrossReferenceEntry]) -> Result<usize, StoreError> {
        let mut existing = self.load()?;
        let mut position: FxHashMap<AppId, usize> = FxHashMap::default();
        for (i, e) in existing.iter().enumerate() {
            position.entry(e.app_id).or_insert(i);
        }

        let mut changed = 0;
        for entry in entries {
            match position.get(&entry.app_id) {
                Some(&i) => {
                    if !existing[i].length.is_resolved() && entry.length.is_resolved() {
                        existing[i] = entry.clone();
                        changed += 1;
                    }
                }
                None => {
                    position.insert(entry.app_id, existing.len());
                    existing.push(entry.clone());
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            write_json(&self.path, &existing)?;
        }
        Ok(changed)
    }

    /// Overwrite the whole cache (used by the refresh passes)
    pub fn save(&self, entries: &[CrossReferenceEntry]) -> Result<(), StoreError> {
        write_json(&self.path, entries)
    }

    /// Rewrite ordered ascending by AppID. Returns the entry count.
    pub fn sort(&self) -> Result<usize, StoreError> {
        let mut entries = self.load()?;
        entries.sort_by_key(|e| e.app_id);
        write_json(&self.path, &entries)?;
        Ok(entries.len())
    }
}

// ============================================================================
// No-Achievements Registry
// ============================================================================

/// Sorted, deduplicated AppIDs known to have no achievements
#[derive(Clone, Debug)]
pub struct NoAchievementsRegistry {
    path: PathBuf,
}

impl NoAchievementsRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BTreeSet<AppId>, StoreError> {
        let ids: Vec<AppId> = read_json(&self.path)?;
        Ok(ids.into_iter().collect())
    }

    /// Merge `ids` into the registry. Writes only when something is new.
    /// Returns how many were added.
    pub fn extend<I: IntoIterator<Item = AppId>>(&self, ids: I) -> Result<usize, StoreError> {
        let mut set = self.load()?;
        let before = set.len();
        set.extend(ids);
        let added = set.len() - before;
        if added > 0 {
            self.replace(&set)?;
        }
        Ok(added)
    }

    /// Overwrite the registry with exactly `ids`
    pub fn replace(&self, ids: &BTreeSet<AppId>) -> Result<(), StoreError> {
        let list: Vec<AppId> = ids.iter().copied().collect();
        write_json(&self.path, &list)
    }
}
