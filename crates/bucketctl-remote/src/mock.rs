use crate::{RemoteBucket, RemoteError, RemoteStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Which capability a call exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Exists,
    Tag,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Exists => write!(f, "exists"),
            Operation::Tag => write!(f, "tag"),
            Operation::Delete => write!(f, "delete"),
            Operation::List => write!(f, "list"),
        }
    }
}

/// One recorded call against a [`MemoryBackend`]. `name` is `None` for `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: Operation,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
struct MemoryBucket {
    name: String,
    created_at: DateTime<Utc>,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buckets: Vec<MemoryBucket>,
    faults: Vec<(Operation, Option<String>)>,
    calls: Vec<RemoteCall>,
}

/// In-process bucket store.
///
/// Keeps buckets in insertion order, records every call, and can be told to
/// fail specific operations so callers can exercise their error paths.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RemoteError> {
        self.state
            .lock()
            .map_err(|e| RemoteError::Backend(format!("mutex poisoned: {e}")))
    }

    /// Add a bucket that exists before any call is made.
    pub fn seed(&self, name: &str, created_at: DateTime<Utc>) {
        if let Ok(mut state) = self.lock() {
            state.buckets.push(MemoryBucket {
                name: name.to_owned(),
                created_at,
                tags: BTreeMap::new(),
            });
        }
    }

    /// Make every `op` call on `name` fail. For `list`, pass `None`.
    pub fn fail_on(&self, op: Operation, name: Option<&str>) {
        if let Ok(mut state) = self.lock() {
            state.faults.push((op, name.map(str::to_owned)));
        }
    }

    /// Stop injecting failures.
    pub fn clear_faults(&self) {
        if let Ok(mut state) = self.lock() {
            state.faults.clear();
        }
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock()
            .map(|s| s.buckets.iter().any(|b| b.name == name))
            .unwrap_or(false)
    }

    pub fn tags(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.lock().ok().and_then(|s| {
            s.buckets
                .iter()
                .find(|b| b.name == name)
                .map(|b| b.tags.clone())
        })
    }

    pub fn bucket_names(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.buckets.iter().map(|b| b.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Record the call and return the state, or the injected failure.
    fn begin(
        &self,
        op: Operation,
        name: Option<&str>,
    ) -> Result<MutexGuard<'_, MemoryState>, RemoteError> {
        let mut state = self.lock()?;
        state.calls.push(RemoteCall {
            op,
            name: name.map(str::to_owned),
        });
        let injected = state
            .faults
            .iter()
            .any(|(fop, fname)| *fop == op && fname.as_deref() == name);
        if injected {
            let target = name.unwrap_or("<account>");
            return Err(RemoteError::Backend(format!(
                "injected {op} failure for '{target}'"
            )));
        }
        Ok(state)
    }
}

impl RemoteStore for MemoryBackend {
    fn create(&self, name: &str) -> Result<(), RemoteError> {
        let mut state = self.begin(Operation::Create, Some(name))?;
        if state.buckets.iter().any(|b| b.name == name) {
            return Err(RemoteError::AlreadyExists(name.to_owned()));
        }
        state.buckets.push(MemoryBucket {
            name: name.to_owned(),
            created_at: Utc::now(),
            tags: BTreeMap::new(),
        });
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, RemoteError> {
        let state = self.begin(Operation::Exists, Some(name))?;
        Ok(state.buckets.iter().any(|b| b.name == name))
    }

    fn tag(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<(), RemoteError> {
        let mut state = self.begin(Operation::Tag, Some(name))?;
        let bucket = state
            .buckets
            .iter_mut()
            .find(|b| b.name == name)
            .ok_or_else(|| RemoteError::NotFound(name.to_owned()))?;
        bucket.tags = tags.clone();
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), RemoteError> {
        let mut state = self.begin(Operation::Delete, Some(name))?;
        let before = state.buckets.len();
        state.buckets.retain(|b| b.name != name);
        if state.buckets.len() == before {
            return Err(RemoteError::NotFound(name.to_owned()));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<RemoteBucket>, RemoteError> {
        let state = self.begin(Operation::List, None)?;
        Ok(state
            .buckets
            .iter()
            .map(|b| RemoteBucket {
                name: b.name.clone(),
                created_at: b.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_exists() {
        let store = MemoryBackend::new();
        assert!(!store.exists("a").unwrap());
        store.create("a").unwrap();
        assert!(store.exists("a").unwrap());
    }

    #[test]
    fn create_twice_conflicts() {
        let store = MemoryBackend::new();
        store.create("a").unwrap();
        assert!(matches!(store.create("a"), Err(RemoteError::AlreadyExists(_))));
    }

    #[test]
    fn tag_overwrites_previous_set() {
        let store = MemoryBackend::new();
        store.create("a").unwrap();

        let mut first = BTreeMap::new();
        first.insert("k1".to_owned(), "v1".to_owned());
        store.tag("a", &first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("k2".to_owned(), "v2".to_owned());
        store.tag("a", &second).unwrap();

        assert_eq!(store.tags("a"), Some(second));
    }

    #[test]
    fn tag_and_delete_missing_bucket_fail() {
        let store = MemoryBackend::new();
        assert!(matches!(
            store.tag("ghost", &BTreeMap::new()),
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(store.delete("ghost"), Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let store = MemoryBackend::new();
        store.create("zeta").unwrap();
        store.create("alpha").unwrap();
        let names: Vec<String> = store.list().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn injected_fault_only_hits_matching_call() {
        let store = MemoryBackend::new();
        store.fail_on(Operation::Create, Some("bad"));
        assert!(store.create("good").is_ok());
        assert!(matches!(store.create("bad"), Err(RemoteError::Backend(_))));
        assert!(!store.contains("bad"));

        store.clear_faults();
        assert!(store.create("bad").is_ok());
    }

    #[test]
    fn list_fault_uses_none_target() {
        let store = MemoryBackend::new();
        store.fail_on(Operation::List, None);
        let err = store.list().unwrap_err();
        assert!(err.to_string().contains("<account>"));
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let store = MemoryBackend::new();
        store.create("a").unwrap();
        let _ = store.exists("a");
        let _ = store.list();
        let ops: Vec<Operation> = store.calls().iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![Operation::Create, Operation::Exists, Operation::List]);
    }
}
