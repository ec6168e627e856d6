//! Turns a raw resource snapshot into comparison-ready canonical text.

use serde_json::{Map, Value};

use crate::config::{DiffConfig, LAST_APPLIED_ANNOTATION};
use crate::error::WatchDiffError;
use crate::jsonpath::JsonPath;

/// Redaction and projection rules, fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Normalizer {
    focus_paths: Vec<JsonPath>,
    ignored_label_keys: Vec<String>,
    ignored_annotation_keys: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }
}

impl Normalizer {
    pub fn new(
        focus_paths: Vec<JsonPath>,
        ignored_label_keys: Vec<String>,
        mut ignored_annotation_keys: Vec<String>,
    ) -> Self {
        if !ignored_annotation_keys.iter().any(|k| k == LAST_APPLIED_ANNOTATION) {
            ignored_annotation_keys.push(LAST_APPLIED_ANNOTATION.to_string());
        }
        Self {
            focus_paths,
            ignored_label_keys,
            ignored_annotation_keys,
        }
    }

    /// Compile from configuration. Path expressions are parsed here, so a bad
    /// expression fails before any watching begins.
    pub fn from_config(config: &DiffConfig) -> Result<Self, WatchDiffError> {
        Ok(Self::new(
            config.compile_paths()?,
            config.ignore_label_keys.clone(),
            config.effective_annotation_keys(),
        ))
    }

    pub fn focus_paths(&self) -> &[JsonPath] {
        &self.focus_paths
    }

    /// Consume `snapshot` and produce its canonical text.
    pub fn normalize(&self, mut snapshot: Value) -> Result<String, WatchDiffError> {
        self.redact(&mut snapshot);
        let canonical = if self.focus_paths.is_empty() {
            snapshot
        } else {
            self.project(&snapshot)
        };
        Ok(serde_yaml_ng::to_string(&canonical)?)
    }

    fn redact(&self, snapshot: &mut Value) {
        let Some(metadata) = snapshot.get_mut("metadata").and_then(Value::as_object_mut) else {
            return;
        };

        metadata.remove("managedFields");
        metadata.remove("resourceVersion");
        remove_keys(metadata, "labels", &self.ignored_label_keys);
        remove_keys(metadata, "annotations", &self.ignored_annotation_keys);
    }

    /// Keep only the first match of each focus path, keyed by the expression.
    /// A path with no match is left out.
    fn project(&self, snapshot: &Value) -> Value {
        let mut projected = Map::new();
        for path in &self.focus_paths {
            if let Some(found) = path.first(snapshot) {
                projected.insert(focus_key(path), found.clone());
            }
        }
        Value::Object(projected)
    }
}

/// Synthetic key a focus path's value is stored under.
pub fn focus_key(path: &JsonPath) -> String {
    format!("<fieldByJsonPath = {path}>")
}

/// Remove `keys` from the string map at `metadata[field]`; an emptied map is
/// dropped entirely.
fn remove_keys(metadata: &mut Map<String, Value>, field: &str, keys: &[String]) {
    let Some(map) = metadata.get_mut(field).and_then(Value::as_object_mut) else {
        return;
    };
    for key in keys {
        map.remove(key);
    }
    if map.is_empty() {
        metadata.remove(field);
    }
}
