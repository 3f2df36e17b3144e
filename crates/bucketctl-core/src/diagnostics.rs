//! Structured error and warning records reported back to the host.
//!
//! Remote failures never abort the process; they end up here with the bucket
//! name, the operation, and the underlying cause.

use bucketctl_remote::CredentialError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    #[error("missing credential '{field}' (set it in the provider config or {env_var})")]
    MissingCredential { field: String, env_var: String },
    #[error("could not create bucket '{name}': {cause}")]
    CreateFailed { name: String, cause: String },
    #[error("could not tag bucket '{name}': {cause}")]
    TagFailed { name: String, cause: String },
    #[error("could not check bucket '{name}': {cause}")]
    ExistsCheckFailed { name: String, cause: String },
    #[error("bucket '{name}' no longer exists remotely")]
    Drifted { name: String },
    #[error("could not delete bucket '{name}': {cause}")]
    DeleteFailed { name: String, cause: String },
    #[error("could not list buckets: {cause}")]
    ListFailed { cause: String },
}

impl DiagnosticKind {
    /// Short headline for the diagnostic.
    pub fn summary(&self) -> &'static str {
        match self {
            DiagnosticKind::MissingCredential { .. } => "Missing credential",
            DiagnosticKind::CreateFailed { .. } => "Error creating bucket",
            DiagnosticKind::TagFailed { .. } => "Error tagging bucket",
            DiagnosticKind::ExistsCheckFailed { .. } => "Error reading bucket",
            DiagnosticKind::Drifted { .. } => "Bucket drifted",
            DiagnosticKind::DeleteFailed { .. } => "Error deleting bucket",
            DiagnosticKind::ListFailed { .. } => "Unable to read bucket data",
        }
    }

    /// Bucket the diagnostic is about, if any.
    pub fn bucket(&self) -> Option<&str> {
        match self {
            DiagnosticKind::CreateFailed { name, .. }
            | DiagnosticKind::TagFailed { name, .. }
            | DiagnosticKind::ExistsCheckFailed { name, .. }
            | DiagnosticKind::Drifted { name }
            | DiagnosticKind::DeleteFailed { name, .. } => Some(name.as_str()),
            DiagnosticKind::MissingCredential { .. } | DiagnosticKind::ListFailed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub message: String,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind) -> Self {
        Self {
            severity,
            summary: kind.summary().to_owned(),
            message: kind.to_string(),
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.summary, self.message)
    }
}

/// Ordered collection of diagnostics produced by one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        debug!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, kind: DiagnosticKind) {
        self.push(Diagnostic::new(Severity::Error, kind));
    }

    pub fn warning(&mut self, kind: DiagnosticKind) {
        self.push(Diagnostic::new(Severity::Warning, kind));
    }

    /// One `MissingCredential` error per field the resolver could not fill.
    pub fn from_credential_error(err: &CredentialError) -> Self {
        let mut diags = Self::new();
        for field in err.missing_fields() {
            diags.error(DiagnosticKind::MissingCredential {
                field: field.to_string(),
                env_var: field.env_var().to_owned(),
            });
        }
        diags
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries.len() - self.error_count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        for d in iter {
            self.push(d);
        }
    }
}
