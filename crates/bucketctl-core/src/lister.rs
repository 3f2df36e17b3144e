use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::ListedBucket;
use bucketctl_remote::RemoteStore;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ListReport {
    pub buckets: Vec<ListedBucket>,
    pub diagnostics: Diagnostics,
}

/// Read-only view of every bucket in the account, managed or not.
pub struct Lister<'a> {
    store: &'a dyn RemoteStore,
}

impl<'a> Lister<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self { store }
    }

    /// Buckets in the order the remote returned them. A failed listing yields
    /// no buckets and a single `ListFailed` error.
    pub fn list(&self) -> ListReport {
        match self.store.list() {
            Ok(remote) => {
                debug!("listed {} buckets", remote.len());
                ListReport {
                    buckets: remote.iter().map(ListedBucket::from).collect(),
                    diagnostics: Diagnostics::new(),
                }
            }
            Err(e) => {
                let mut diagnostics = Diagnostics::new();
                diagnostics.error(DiagnosticKind::ListFailed {
                    cause: e.to_string(),
                });
                ListReport {
                    buckets: Vec::new(),
                    diagnostics,
                }
            }
        }
    }
}
