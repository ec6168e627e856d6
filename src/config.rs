//! Configuration management for watchdiff
//!
//! The diff engine consumes three lists (field-focus path expressions, label
//! keys and annotation keys to redact) plus the color switch. They are
//! layered from an optional TOML file, environment variables and CLI flags.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::WatchDiffError;
use crate::jsonpath::JsonPath;

/// Annotation written by `kubectl apply`; always redacted.
pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Path expressions to focus on; empty compares whole objects
    pub jsonpaths: Vec<String>,
    /// Label keys removed before comparing
    pub ignore_label_keys: Vec<String>,
    /// Annotation keys removed before comparing
    pub ignore_annotation_keys: Vec<String>,
    /// Disable colored diff output
    pub no_color: bool,
}

impl DiffConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, WatchDiffError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| WatchDiffError::Config {
            reason: format!("{}: {e}", path.display()),
        })
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, WatchDiffError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply `WATCHDIFF_*` environment overrides
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let list = |key: &str| -> Vec<String> {
            var(key)
                .map(|val| split_list(&val))
                .unwrap_or_default()
        };

        self.jsonpaths.extend(list("WATCHDIFF_JSONPATHS"));
        self.ignore_label_keys.extend(list("WATCHDIFF_IGNORE_LABEL_KEYS"));
        self.ignore_annotation_keys
            .extend(list("WATCHDIFF_IGNORE_ANNOTATION_KEYS"));

        if let Some(val) = var("WATCHDIFF_NO_COLOR") {
            self.no_color |= matches!(val.trim(), "1" | "true" | "yes");
        }
        self
    }

    /// Layer another configuration on top; lists append, flags OR
    pub fn merge(mut self, other: DiffConfig) -> Self {
        self.jsonpaths.extend(other.jsonpaths);
        self.ignore_label_keys.extend(other.ignore_label_keys);
        self.ignore_annotation_keys.extend(other.ignore_annotation_keys);
        self.no_color |= other.no_color;
        self
    }

    /// Parse every path expression
    pub fn compile_paths(&self) -> Result<Vec<JsonPath>, WatchDiffError> {
        self.jsonpaths.iter().map(|expr| JsonPath::parse(expr)).collect()
    }

    /// Annotation keys to redact, always including the last-applied annotation
    pub fn effective_annotation_keys(&self) -> Vec<String> {
        let mut keys = self.ignore_annotation_keys.clone();
        if !keys.iter().any(|key| key == LAST_APPLIED_ANNOTATION) {
            keys.push(LAST_APPLIED_ANNOTATION.to_string());
        }
        keys
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), WatchDiffError> {
        self.compile_paths()?;

        let blank = self
            .ignore_label_keys
            .iter()
            .chain(&self.ignore_annotation_keys)
            .any(|key| key.trim().is_empty());
        if blank {
            return Err(WatchDiffError::Config {
                reason: "ignored label and annotation keys must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Split a comma-separated list. Commas inside brackets or quotes belong to
/// the item, so path unions like `$['a','b']` stay whole.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                items.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&raw[start..]);

    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
