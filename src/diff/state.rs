use serde_json::Value;

use crate::error::WatchDiffError;
use crate::events::ResourceMeta;
use crate::normalize::Normalizer;

use super::generator::{DiffGenerator, DiffOutput};

/// Revision label used for the empty baseline of a newly seen resource.
pub const BASELINE_REVISION: &str = "0";

/// Last observed state of a single resource.
///
/// Holds exactly one canonical text at a time, so memory stays bounded by the
/// number of distinct resources rather than the number of events.
#[derive(Debug, Clone)]
pub struct ResourceDiffState {
    kind: String,
    namespace: Option<String>,
    name: String,
    last_revision: Option<String>,
    last_canonical: String,
}

impl ResourceDiffState {
    pub fn new(kind: impl Into<String>, namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace,
            name: name.into(),
            last_revision: None,
            last_canonical: String::new(),
        }
    }

    pub fn from_meta(meta: &ResourceMeta) -> Self {
        Self::new(meta.gvk.kind.clone(), meta.namespace.clone(), meta.name.clone())
    }

    pub fn last_revision(&self) -> Option<&str> {
        self.last_revision.as_deref()
    }

    pub fn last_canonical(&self) -> &str {
        &self.last_canonical
    }

    /// `{kind}/[{namespace}/]{name}/{revision}`
    pub fn label(&self, revision: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}/{}/{}", self.kind, ns, self.name, revision),
            None => format!("{}/{}/{}", self.kind, self.name, revision),
        }
    }

    /// Record a new snapshot and diff it against the previous one.
    ///
    /// A repeated revision is a no-op and returns `None`. Otherwise the stored
    /// baseline is replaced and the (possibly empty) diff is returned.
    pub fn observe(
        &mut self,
        revision: &str,
        snapshot: Value,
        normalizer: &Normalizer,
        generator: &DiffGenerator,
    ) -> Result<Option<DiffOutput>, WatchDiffError> {
        if self.last_revision.as_deref() == Some(revision) {
            return Ok(None);
        }

        let canonical = normalizer.normalize(snapshot)?;
        let base_revision = match self.last_revision.as_deref() {
            Some(rev) if !rev.is_empty() => rev,
            _ => BASELINE_REVISION,
        };

        let diff = generator.generate(
            &self.label(base_revision),
            &self.last_canonical,
            &self.label(revision),
            &canonical,
        );

        self.last_canonical = canonical;
        self.last_revision = Some(revision.to_string());
        Ok(Some(diff))
    }
}
