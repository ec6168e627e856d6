//! Resource location and watch subscription.
//!
//! The diff engine only needs two things from the outside world: the set of
//! resource kinds a selection resolves to, and an ordered event stream for
//! that selection. `kubectl` provides both for live clusters; recorded event
//! streams can be replayed from a file or stdin.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value;

use crate::error::WatchDiffError;
use crate::events::GroupVersionKind;
use crate::watcher::EventStream;

/// Resource version requesting a synthetic `ADDED` event for every live
/// object before changes start flowing.
pub const INITIAL_RESOURCE_VERSION: &str = "0";

pub trait ResourceLocator {
    /// Kinds of every resource the selection currently resolves to.
    fn resolve(&self) -> Result<Vec<GroupVersionKind>, WatchDiffError>;

    /// Subscribe to changes, starting at `resource_version`.
    fn watch(&self, resource_version: &str) -> Result<EventStream, WatchDiffError>;

    /// Whether the subscription ending on its own is a failure.
    fn closed_stream_is_error(&self) -> bool {
        true
    }
}

/// Reject selections spanning more than one group/version/kind.
pub fn ensure_single_kind(kinds: &[GroupVersionKind]) -> Result<(), WatchDiffError> {
    let distinct: BTreeSet<&GroupVersionKind> = kinds.iter().collect();
    if distinct.len() > 1 {
        let kinds = distinct
            .iter()
            .map(|gvk| gvk.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(WatchDiffError::Selection { kinds });
    }
    Ok(())
}

/// Collect the kinds of a `kubectl get -o json` result: a single object or a
/// `List` with `items`.
pub fn kinds_of(listing: &Value) -> Vec<GroupVersionKind> {
    let gvk_of = |obj: &Value| {
        let kind = obj.get("kind").and_then(Value::as_str)?;
        let api_version = obj.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
        Some(GroupVersionKind::from_api_version(api_version, kind))
    };

    match listing.get("items").and_then(Value::as_array) {
        Some(items) => items.iter().filter_map(gvk_of).collect(),
        None => gvk_of(listing).into_iter().collect(),
    }
}

/// Locates and watches resources by shelling out to `kubectl`.
#[derive(Debug, Clone, Default)]
pub struct KubectlLocator {
    pub binary: String,
    pub resources: Vec<String>,
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    pub selector: Option<String>,
    pub field_selector: Option<String>,
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
}

impl KubectlLocator {
    pub fn new(binary: impl Into<String>, resources: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            resources,
            ..Default::default()
        }
    }

    /// `get <resources...>` plus the selection and connection flags.
    pub fn get_args(&self) -> Vec<String> {
        let mut args = vec!["get".to_string()];
        args.extend(self.resources.iter().cloned());

        let mut flag = |name: &str, value: &Option<String>| {
            if let Some(value) = value {
                args.push(format!("--{name}={value}"));
            }
        };
        flag("namespace", &self.namespace);
        flag("selector", &self.selector);
        flag("field-selector", &self.field_selector);
        flag("context", &self.context);
        flag("kubeconfig", &self.kubeconfig.as_ref().map(|p| p.display().to_string()));

        if self.all_namespaces {
            args.push("--all-namespaces".to_string());
        }
        args
    }

    /// Arguments of the watch subscription. The initial resource version
    /// maps to list-then-watch, anything else to watch-only.
    pub fn watch_args(&self, resource_version: &str) -> Vec<String> {
        let mut args = self.get_args();
        if resource_version == INITIAL_RESOURCE_VERSION {
            args.push("--watch".to_string());
        } else {
            args.push("--watch-only".to_string());
        }
        args.extend(["--output-watch-events", "-o", "json"].map(String::from));
        args
    }

    /// The child runs in its own process group so a terminal Ctrl-C reaches
    /// only us; the watch process is torn down when its stream is dropped.
    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).stdin(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}

impl ResourceLocator for KubectlLocator {
    fn resolve(&self) -> Result<Vec<GroupVersionKind>, WatchDiffError> {
        let mut args = self.get_args();
        args.extend(["-o", "json"].map(String::from));
        tracing::debug!("resolving selection: {} {}", self.binary, args.join(" "));

        let output = self
            .command(&args)
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| WatchDiffError::locator(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchDiffError::locator(stderr.trim().to_string()));
        }

        let listing: Value = serde_json::from_slice(&output.stdout)?;
        Ok(kinds_of(&listing))
    }

    fn watch(&self, resource_version: &str) -> Result<EventStream, WatchDiffError> {
        let args = self.watch_args(resource_version);
        tracing::debug!("starting watch: {} {}", self.binary, args.join(" "));

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| WatchDiffError::locator(format!("failed to run {}: {e}", self.binary)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WatchDiffError::locator("watch process has no stdout"))?;

        Ok(EventStream::from_reader(stdout).with_child(child))
    }
}

/// Replays a recorded watch-event stream from a file, or stdin for `-`.
#[derive(Debug, Clone)]
pub struct FileLocator {
    path: PathBuf,
}

impl FileLocator {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn is_stdin(&self) -> bool {
        self.path == Path::new("-")
    }
}

impl ResourceLocator for FileLocator {
    /// A recording carries no selection to resolve.
    fn resolve(&self) -> Result<Vec<GroupVersionKind>, WatchDiffError> {
        Ok(Vec::new())
    }

    fn watch(&self, _resource_version: &str) -> Result<EventStream, WatchDiffError> {
        if self.is_stdin() {
            return Ok(EventStream::from_reader(std::io::stdin()));
        }
        let file = File::open(&self.path).map_err(|e| {
            WatchDiffError::locator(format!("cannot open {}: {e}", self.path.display()))
        })?;
        Ok(EventStream::from_reader(file))
    }

    fn closed_stream_is_error(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_single_kind_accepted() {
        let pod = GroupVersionKind::from_api_version("v1", "Pod");
        assert!(ensure_single_kind(&[]).is_ok());
        assert!(ensure_single_kind(&[pod.clone(), pod.clone(), pod]).is_ok());
    }

    #[test]
    fn test_multiple_kinds_rejected() {
        let kinds = vec![
            GroupVersionKind::from_api_version("v1", "Pod"),
            GroupVersionKind::from_api_version("v1", "Service"),
        ];
        let err = ensure_single_kind(&kinds).unwrap_err();
        assert!(matches!(err, WatchDiffError::Selection { .. }));
        assert!(err.to_string().contains("Kind=Service"));
    }

    #[test]
    fn test_same_kind_different_version_rejected() {
        let kinds = vec![
            GroupVersionKind::from_api_version("autoscaling/v1", "HorizontalPodAutoscaler"),
            GroupVersionKind::from_api_version("autoscaling/v2", "HorizontalPodAutoscaler"),
        ];
        assert!(ensure_single_kind(&kinds).is_err());
    }

    #[test]
    fn test_kinds_of_list_and_object() {
        let list = json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": [
                {"apiVersion": "v1", "kind": "Pod"},
                {"apiVersion": "apps/v1", "kind": "Deployment"}
            ]
        });
        let kinds = kinds_of(&list);
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[1].group, "apps");

        let single = json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "a"}});
        assert_eq!(kinds_of(&single), vec![GroupVersionKind::from_api_version("v1", "Pod")]);

        assert!(kinds_of(&json!({"kind": "List", "items": []})).is_empty());
    }

    #[test]
    fn test_kubectl_args() {
        let locator = KubectlLocator {
            namespace: Some("prod".to_string()),
            selector: Some("app=foo".to_string()),
            ..KubectlLocator::new("kubectl", vec!["pods".to_string()])
        };

        assert_eq!(
            locator.get_args(),
            vec!["get", "pods", "--namespace=prod", "--selector=app=foo"]
        );

        let watch = locator.watch_args(INITIAL_RESOURCE_VERSION);
        assert!(watch.contains(&"--watch".to_string()));
        let tail: Vec<String> = ["--output-watch-events", "-o", "json"].map(String::from).to_vec();
        assert!(watch.ends_with(&tail));

        let resume = locator.watch_args("12345");
        assert!(resume.contains(&"--watch-only".to_string()));
    }

    #[test]
    fn test_all_namespaces_flag() {
        let locator = KubectlLocator {
            all_namespaces: true,
            ..KubectlLocator::new("kubectl", vec!["pods".to_string()])
        };
        assert!(locator.get_args().contains(&"--all-namespaces".to_string()));
    }

    #[test]
    fn test_missing_binary_is_locator_error() {
        let locator = KubectlLocator::new("definitely-not-a-real-kubectl-binary", vec!["pods".to_string()]);
        assert!(matches!(locator.resolve(), Err(WatchDiffError::Locator { .. })));
    }

    #[tokio::test]
    async fn test_file_locator_replays_events() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"ADDED","object":{{"kind":"Pod"}}}}"#).unwrap();

        let locator = FileLocator::new(file.path());
        assert!(locator.resolve().unwrap().is_empty());
        assert!(!locator.closed_stream_is_error());

        let mut stream = locator.watch(INITIAL_RESOURCE_VERSION).unwrap();
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_file_locator_missing_file() {
        let locator = FileLocator::new("/nonexistent/watchdiff/events.json");
        assert!(matches!(
            locator.watch(INITIAL_RESOURCE_VERSION),
            Err(WatchDiffError::Locator { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_watch_process_has_own_process_group() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("kubectl");
        std::fs::write(
            &script,
            r#"#!/bin/sh
read -r _ _ _ _ pgrp _ < /proc/$$/stat
printf '{"type":"ADDED","object":{"apiVersion":"v1","kind":"Pod","metadata":{"name":"%s","uid":"%s","resourceVersion":"1"}}}\n' "$pgrp" "$$"
exec sleep 30
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = KubectlLocator::new(script.display().to_string(), vec!["pods".to_string()]);
        let mut stream = locator.watch(INITIAL_RESOURCE_VERSION).unwrap();
        let event = stream.next().await.unwrap().unwrap();

        let pgrp = event.object["metadata"]["name"].as_str().unwrap();
        let pid = event.object["metadata"]["uid"].as_str().unwrap();
        assert_eq!(pgrp, pid, "watch process should lead its own process group");
        assert_ne!(pgrp, std::process::id().to_string());
    }
}
