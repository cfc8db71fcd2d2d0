use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::foundation::{
    core::MediaKind,
    error::{FramelabError, FramelabResult},
};

/// One input the pipelines may read from. Immutable for the lifetime of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceEntry {
    pub id: String,
    pub kind: MediaKind,
    pub path: PathBuf,
}

impl SourceEntry {
    pub fn new(id: impl Into<String>, kind: MediaKind, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            kind,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fixed id -> source mapping, built once from configuration.
#[derive(Clone, Debug, Default)]
pub struct SourceCatalog {
    entries: BTreeMap<String, SourceEntry>,
}

impl SourceCatalog {
    pub fn new(entries: impl IntoIterator<Item = SourceEntry>) -> FramelabResult<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if entry.id.trim().is_empty() {
                return Err(FramelabError::validation("source id must be non-empty"));
            }
            if entry.path.as_os_str().is_empty() {
                return Err(FramelabError::validation(format!(
                    "source '{}' has an empty path",
                    entry.id
                )));
            }
            if map.contains_key(&entry.id) {
                return Err(FramelabError::validation(format!(
                    "duplicate source id '{}'",
                    entry.id
                )));
            }
            map.insert(entry.id.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, id: &str) -> FramelabResult<&SourceEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| FramelabError::unknown_source(id))
    }

    /// Look up `id` and require it to be of `kind`.
    pub fn resolve(&self, id: &str, kind: MediaKind) -> FramelabResult<&SourceEntry> {
        let entry = self.get(id)?;
        ensure_kind(entry, kind)?;
        Ok(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn ensure_kind(entry: &SourceEntry, kind: MediaKind) -> FramelabResult<()> {
    if entry.kind != kind {
        return Err(FramelabError::wrong_kind(&entry.id, kind, entry.kind));
    }
    Ok(())
}
