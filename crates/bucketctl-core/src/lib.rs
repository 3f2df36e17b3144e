//! Reconciliation core for bucketctl.
//!
//! This crate turns a desired bucket plan into remote calls. The `Reconciler`
//! drives create, read, update, and delete passes against an injected
//! `RemoteStore`, the `Lister` projects the remote inventory, and every
//! per-bucket failure is collected into `Diagnostics` instead of aborting the
//! process. Managed state (`ManagedItemList`) is persisted between passes by
//! `StateFile`.

pub mod diagnostics;
pub mod lister;
pub mod model;
pub mod reconciler;
pub mod state;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use lister::{ListReport, Lister};
pub use model::{
    format_creation_date, format_observed_at, ListedBucket, ManagedItem, ManagedItemList,
    CREATION_DATE_FORMAT, OBSERVED_AT_FORMAT,
};
pub use reconciler::{DeleteReport, FailurePolicy, PassReport, Reconciler};
pub use state::{default_state_path, StateFile, STATE_FORMAT_VERSION};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("state format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}
