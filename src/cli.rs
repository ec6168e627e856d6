use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{split_list, DiffConfig};
use crate::locator::{FileLocator, KubectlLocator, ResourceLocator};

const EXAMPLES: &str = r#"Examples:
  # Monitor changes in all pods within the current namespace
  watchdiff pods

  # Monitor changes in a single pod
  watchdiff pod pod1

  # Filter pods through a label selector
  watchdiff pods -l app=foo

  # Monitor all pods across all namespaces
  watchdiff pods --all-namespaces

  # Ignore certain labels or annotations while comparing
  watchdiff pods --ignore-label-keys=pod-template-hash

  # Only focus on the status changes of pods
  watchdiff pods --jsonpaths='$.status'

  # Focus on a specific annotation
  watchdiff pods --jsonpaths="$.metadata.annotations['github.com/zoumo/kubectl-plugins']"

  # Replay a recorded watch stream
  kubectl get pods -w --output-watch-events -o json > events.json
  watchdiff --from-file events.json"#;

#[derive(Parser, Debug)]
#[command(name = "watchdiff")]
#[command(version)]
#[command(about = "Watch resources and print a colored diff of every change")]
#[command(long_about = "watchdiff watches a set of resources and, for each one independently, prints a unified diff between its previous and current state. Managed fields, resource versions and the last-applied annotation are never compared.")]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    /// Resource type followed by optional names, as accepted by `kubectl get`
    #[arg(value_name = "RESOURCE")]
    pub resources: Vec<String>,

    /// Label selector to filter on
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Field selector to filter on
    #[arg(long)]
    pub field_selector: Option<String>,

    /// Namespace scope for this request
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Watch the resources across all namespaces
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Name of the kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Path to the kubeconfig file to use
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// kubectl binary used to locate and watch resources
    #[arg(long, default_value = "kubectl")]
    pub kubectl: String,

    /// Replay watch events from a file (`-` for stdin) instead of a cluster
    #[arg(long, value_name = "PATH")]
    pub from_file: Option<PathBuf>,

    /// Select JSON path expressions to include in the output (comma separated;
    /// commas inside brackets or quotes are part of the expression)
    #[arg(long)]
    pub jsonpaths: Vec<String>,

    /// Labels ignored when comparing objects
    #[arg(long, value_delimiter = ',')]
    pub ignore_label_keys: Vec<String>,

    /// Annotations ignored when comparing objects (the last-applied annotation is always ignored)
    #[arg(long, value_delimiter = ',')]
    pub ignore_annotation_keys: Vec<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// TOML file with default diff options
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn setup_logging(&self) {
        let level = if self.verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    /// Log every resolved option at debug level.
    pub fn log_options(&self) {
        tracing::debug!("OPTION: resources={:?}", self.resources);
        tracing::debug!("OPTION: selector={:?}", self.selector);
        tracing::debug!("OPTION: field-selector={:?}", self.field_selector);
        tracing::debug!("OPTION: namespace={:?}", self.namespace);
        tracing::debug!("OPTION: all-namespaces={}", self.all_namespaces);
        tracing::debug!("OPTION: context={:?}", self.context);
        tracing::debug!("OPTION: kubeconfig={:?}", self.kubeconfig);
        tracing::debug!("OPTION: kubectl={}", self.kubectl);
        tracing::debug!("OPTION: from-file={:?}", self.from_file);
        tracing::debug!("OPTION: jsonpaths={:?}", self.jsonpaths);
        tracing::debug!("OPTION: ignore-label-keys={:?}", self.ignore_label_keys);
        tracing::debug!("OPTION: ignore-annotation-keys={:?}", self.ignore_annotation_keys);
        tracing::debug!("OPTION: no-color={}", self.no_color);
        tracing::debug!("OPTION: config={:?}", self.config);
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.from_file {
            Some(_) if !self.resources.is_empty() => {
                Err("--from-file replays a recording and takes no resource arguments".to_string())
            }
            None if self.resources.is_empty() => {
                Err("you must specify the type of resource to watch".to_string())
            }
            _ => Ok(()),
        }
    }

    /// The diff options given on the command line.
    pub fn diff_config(&self) -> DiffConfig {
        DiffConfig {
            jsonpaths: self.jsonpaths.iter().flat_map(|raw| split_list(raw)).collect(),
            ignore_label_keys: self.ignore_label_keys.clone(),
            ignore_annotation_keys: self.ignore_annotation_keys.clone(),
            no_color: self.no_color,
        }
    }

    pub fn locator(&self) -> Box<dyn ResourceLocator> {
        if let Some(path) = &self.from_file {
            return Box::new(FileLocator::new(path));
        }
        Box::new(KubectlLocator {
            binary: self.kubectl.clone(),
            resources: self.resources.clone(),
            namespace: self.namespace.clone(),
            all_namespaces: self.all_namespaces,
            selector: self.selector.clone(),
            field_selector: self.field_selector.clone(),
            context: self.context.clone(),
            kubeconfig: self.kubeconfig.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "watchdiff",
            "pods",
            "-l",
            "app=foo",
            "-A",
            "--jsonpaths",
            "$.status,$.spec",
            "--ignore-label-keys=a",
            "--ignore-label-keys=b",
            "--no-color",
        ])
        .unwrap();

        assert_eq!(cli.resources, vec!["pods"]);
        assert_eq!(cli.selector.as_deref(), Some("app=foo"));
        assert!(cli.all_namespaces);
        assert_eq!(cli.ignore_label_keys, vec!["a", "b"]);
        assert!(cli.validate().is_ok());

        let config = cli.diff_config();
        assert!(config.no_color);
        assert_eq!(config.jsonpaths, vec!["$.status", "$.spec"]);
    }

    #[test]
    fn test_jsonpath_unions_survive_splitting() {
        let cli = Cli::try_parse_from([
            "watchdiff",
            "pods",
            "--jsonpaths",
            "$.metadata.labels['app','tier'],$.spec.containers[0,1].image",
            "--jsonpaths=$.status",
        ])
        .unwrap();

        let config = cli.diff_config();
        assert_eq!(
            config.jsonpaths,
            vec!["$.metadata.labels['app','tier']", "$.spec.containers[0,1].image", "$.status"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let bare = Cli::try_parse_from(["watchdiff"]).unwrap();
        assert!(bare.validate().is_err());

        let replay = Cli::try_parse_from(["watchdiff", "--from-file", "-"]).unwrap();
        assert!(replay.validate().is_ok());

        let both = Cli::try_parse_from(["watchdiff", "pods", "--from-file", "-"]).unwrap();
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_locator_selection() {
        let replay = Cli::try_parse_from(["watchdiff", "--from-file", "events.json"]).unwrap();
        assert!(!replay.locator().closed_stream_is_error());

        let live = Cli::try_parse_from(["watchdiff", "pods"]).unwrap();
        assert!(live.locator().closed_stream_is_error());
    }
}
