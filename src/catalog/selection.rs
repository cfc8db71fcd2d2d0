use std::sync::Arc;

use crate::{
    catalog::source::{SourceCatalog, SourceEntry},
    foundation::{core::MediaKind, error::FramelabResult},
};

/// Caller-scoped record of the active source.
///
/// A `Session` is an explicit value threaded through each pipeline call rather than a
/// process-wide global, so two callers never observe each other's selection. The selected
/// entry is always a member of the catalog the session was created from.
#[derive(Clone, Debug)]
pub struct Session {
    catalog: Arc<SourceCatalog>,
    selected: SourceEntry,
}

impl Session {
    pub fn new(catalog: Arc<SourceCatalog>, initial: &str) -> FramelabResult<Self> {
        let selected = catalog.get(initial)?.clone();
        Ok(Self { catalog, selected })
    }

    /// Make `id` the active source. Unknown ids fail and leave the selection untouched.
    pub fn select(&mut self, id: &str) -> FramelabResult<&SourceEntry> {
        let entry = self.catalog.get(id)?.clone();
        tracing::debug!(source = %entry.id, kind = %entry.kind, "selected source");
        self.selected = entry;
        Ok(&self.selected)
    }

    pub fn selected(&self) -> &SourceEntry {
        &self.selected
    }

    /// Snapshot of the active source, checked against the kind a pipeline needs.
    pub fn selected_as(&self, kind: MediaKind) -> FramelabResult<SourceEntry> {
        self.catalog
            .resolve(&self.selected.id, kind)
            .map(SourceEntry::clone)
    }

    pub fn catalog(&self) -> &Arc<SourceCatalog> {
        &self.catalog
    }
}
