use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WatchDiffError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

/// One delivery from a watch subscription, in the wire shape
/// `{"type": "MODIFIED", "object": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub kind: WatchEventType,
    pub object: Value,
}

impl WatchEvent {
    pub fn new(kind: WatchEventType, object: Value) -> Self {
        Self { kind, object }
    }

    pub fn added(object: Value) -> Self {
        Self::new(WatchEventType::Added, object)
    }

    pub fn modified(object: Value) -> Self {
        Self::new(WatchEventType::Modified, object)
    }

    pub fn deleted(object: Value) -> Self {
        Self::new(WatchEventType::Deleted, object)
    }

    pub fn error(object: Value) -> Self {
        Self::new(WatchEventType::Error, object)
    }

    /// Human readable message of an error event: the `message` field of a
    /// status payload when present, the raw payload otherwise.
    pub fn error_message(&self) -> String {
        self.object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.object.to_string())
    }
}

/// Stable, process-unique key of a watched object (its `metadata.uid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    /// Split an `apiVersion` such as `apps/v1` (or core `v1`) and pair it with `kind`.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// The identifying metadata of a structured resource payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMeta {
    pub uid: ResourceIdentity,
    pub gvk: GroupVersionKind,
    pub namespace: Option<String>,
    pub name: String,
    pub resource_version: String,
}

impl ResourceMeta {
    pub fn from_object(object: &Value) -> Result<Self, WatchDiffError> {
        let map = object
            .as_object()
            .ok_or_else(|| WatchDiffError::malformed("event object is not a structured resource"))?;

        let kind = map
            .get("kind")
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
            .ok_or_else(|| WatchDiffError::malformed("resource has no kind"))?;
        let api_version = map.get("apiVersion").and_then(Value::as_str).unwrap_or_default();

        let metadata = map
            .get("metadata")
            .and_then(Value::as_object)
            .ok_or_else(|| WatchDiffError::malformed(format!("{kind} has no metadata")))?;
        let field = |key: &str| metadata.get(key).and_then(Value::as_str).unwrap_or_default();

        let uid = field("uid");
        if uid.is_empty() {
            return Err(WatchDiffError::malformed(format!(
                "{kind} {:?} has no metadata.uid",
                field("name")
            )));
        }

        let namespace = Some(field("namespace"))
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        Ok(Self {
            uid: ResourceIdentity::new(uid),
            gvk: GroupVersionKind::from_api_version(api_version, kind),
            namespace,
            name: field("name").to_string(),
            resource_version: field("resourceVersion").to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event: WatchEvent = serde_json::from_value(json!({
            "type": "MODIFIED",
            "object": {"kind": "Pod"}
        }))
        .unwrap();
        assert_eq!(event.kind, WatchEventType::Modified);
        assert_eq!(event.object["kind"], "Pod");

        let unknown = serde_json::from_value::<WatchEvent>(json!({"type": "SYNC", "object": {}}));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_error_message() {
        let event = WatchEvent::error(json!({
            "kind": "Status",
            "status": "Failure",
            "message": "too old resource version: 1 (42)",
            "code": 410
        }));
        assert_eq!(event.error_message(), "too old resource version: 1 (42)");

        let raw = WatchEvent::error(json!({"code": 500}));
        assert_eq!(raw.error_message(), r#"{"code":500}"#);
    }

    #[test]
    fn test_gvk_from_api_version() {
        let core = GroupVersionKind::from_api_version("v1", "Pod");
        assert_eq!(core.group, "");
        assert_eq!(core.api_version(), "v1");

        let apps = GroupVersionKind::from_api_version("apps/v1", "Deployment");
        assert_eq!(apps.group, "apps");
        assert_eq!(apps.version, "v1");
        assert_eq!(apps.to_string(), "apps/v1, Kind=Deployment");
    }

    #[test]
    fn test_meta_from_namespaced_object() {
        let meta = ResourceMeta::from_object(&json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"uid": "u-1", "name": "a", "namespace": "default", "resourceVersion": "7"}
        }))
        .unwrap();

        assert_eq!(meta.uid.as_str(), "u-1");
        assert_eq!(meta.gvk.kind, "Pod");
        assert_eq!(meta.namespace.as_deref(), Some("default"));
        assert_eq!(meta.name, "a");
        assert_eq!(meta.resource_version, "7");
    }

    #[test]
    fn test_meta_cluster_scoped() {
        let meta = ResourceMeta::from_object(&json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"uid": "n-1", "name": "node-a", "namespace": ""}
        }))
        .unwrap();
        assert_eq!(meta.namespace, None);
        assert_eq!(meta.resource_version, "");
    }

    #[test]
    fn test_meta_rejects_unstructured_payloads() {
        for payload in [
            json!("just a string"),
            json!([1, 2]),
            json!({"metadata": {"uid": "x"}}),
            json!({"kind": "Pod"}),
            json!({"kind": "Pod", "metadata": {"name": "a"}}),
        ] {
            let err = ResourceMeta::from_object(&payload).unwrap_err();
            assert!(matches!(err, WatchDiffError::MalformedPayload { .. }), "{payload}");
        }
    }
}
