pub mod apply;
pub mod destroy;
pub mod list;
pub mod refresh;
pub mod show;
pub mod validate;

use bucketctl_core::{default_state_path, Diagnostics, FailurePolicy, Severity, StateFile};
use bucketctl_remote::{CredentialContext, HttpBackend, ProviderConfig};
use bucketctl_schema::{parse_plan_file, DesiredPlan};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PLAN_ERROR: u8 = 2;
pub const EXIT_REMOTE_ERROR: u8 = 3;
pub const EXIT_CREDENTIAL_ERROR: u8 = 4;

/// Flags shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub endpoint: Option<String>,
    pub config: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub policy: FailurePolicy,
    pub json: bool,
}

impl GlobalOpts {
    pub fn state_file(&self, plan: &Path) -> StateFile {
        StateFile::new(
            self.state
                .clone()
                .unwrap_or_else(|| default_state_path(plan)),
        )
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Spinner for a remote pass, hidden in JSON mode so stdout stays parseable.
pub fn pass_spinner(msg: &str, json: bool) -> ProgressBar {
    if json {
        ProgressBar::hidden()
    } else {
        spinner(msg)
    }
}

pub fn colorize_severity(severity: Severity) -> String {
    use console::Style;
    let label = severity.to_string();
    match severity {
        Severity::Error => Style::new().red().bold().apply_to(label).to_string(),
        Severity::Warning => Style::new().yellow().apply_to(label).to_string(),
    }
}

/// Print diagnostics to stderr, one per line.
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for d in diagnostics {
        eprintln!(
            "{}: {}: {}",
            colorize_severity(d.severity),
            d.summary,
            d.message
        );
    }
}

/// Exit code for a pass that produced `diagnostics`.
pub fn exit_code_for(diagnostics: &Diagnostics) -> u8 {
    if diagnostics.has_errors() {
        EXIT_REMOTE_ERROR
    } else {
        EXIT_SUCCESS
    }
}

pub fn load_plan(path: &Path) -> Result<DesiredPlan, String> {
    parse_plan_file(path)
        .and_then(|p| p.normalize())
        .map_err(|e| format!("plan error: {}: {e}", path.display()))
}

/// Resolve the provider config: `--config` if given, else the default file
/// when present. `--endpoint` overrides whatever endpoint the file declares.
pub fn resolve_provider_config(
    endpoint: Option<&str>,
    config_path: Option<&Path>,
) -> Result<ProviderConfig, String> {
    let from_file = match config_path {
        Some(path) => Some(
            ProviderConfig::load(path)
                .map_err(|e| format!("failed to load provider config {}: {e}", path.display()))?,
        ),
        None => ProviderConfig::load_default().ok(),
    };

    match (endpoint, from_file) {
        (Some(url), Some(mut config)) => {
            config.endpoint = url.trim_end_matches('/').to_owned();
            Ok(config)
        }
        (Some(url), None) => Ok(ProviderConfig::new(url)),
        (None, Some(config)) => Ok(config),
        (None, None) => Err("no --endpoint and no provider config".to_owned()),
    }
}

/// Build the HTTP store, resolving credentials before any remote call.
pub fn make_store(opts: &GlobalOpts) -> Result<HttpBackend, String> {
    let config = resolve_provider_config(opts.endpoint.as_deref(), opts.config.as_deref())?;
    let credentials = CredentialContext::from_config(&config)
        .resolve()
        .map_err(|e| {
            print_diagnostics(&Diagnostics::from_credential_error(&e));
            format!("credential error: {e}")
        })?;
    let store = HttpBackend::new(config, credentials);
    tracing::debug!("using endpoint {}", store.endpoint());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketctl_core::DiagnosticKind;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_severity_keeps_label() {
        assert!(colorize_severity(Severity::Error).contains("error"));
        assert!(colorize_severity(Severity::Warning).contains("warning"));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_PLAN_ERROR,
            EXIT_REMOTE_ERROR,
            EXIT_CREDENTIAL_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn warnings_alone_exit_zero() {
        let mut diags = Diagnostics::new();
        diags.warning(DiagnosticKind::Drifted {
            name: "a".to_owned(),
        });
        assert_eq!(exit_code_for(&diags), EXIT_SUCCESS);
        diags.error(DiagnosticKind::ListFailed {
            cause: "down".to_owned(),
        });
        assert_eq!(exit_code_for(&diags), EXIT_REMOTE_ERROR);
    }

    #[test]
    fn endpoint_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.json");
        ProviderConfig::new("http://from-file")
            .with_region("eu-west-1")
            .save(&path)
            .unwrap();

        let config = resolve_provider_config(Some("http://flag/"), Some(&path)).unwrap();
        assert_eq!(config.endpoint, "http://flag");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));

        let config = resolve_provider_config(None, Some(&path)).unwrap();
        assert_eq!(config.endpoint, "http://from-file");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_provider_config(None, Some(&dir.path().join("absent.json")));
        assert!(err.is_err());
    }

    #[test]
    fn plan_errors_are_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buckets.toml");
        std::fs::write(&path, "plan_version = 2\n").unwrap();
        let err = load_plan(&path).unwrap_err();
        assert!(err.starts_with("plan error:"));
    }

    #[test]
    fn state_flag_overrides_default_location() {
        let opts = GlobalOpts {
            endpoint: None,
            config: None,
            state: Some(PathBuf::from("/tmp/custom.json")),
            policy: FailurePolicy::FailFast,
            json: false,
        };
        assert_eq!(
            opts.state_file(Path::new("/srv/buckets.toml")).path(),
            Path::new("/tmp/custom.json")
        );
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
