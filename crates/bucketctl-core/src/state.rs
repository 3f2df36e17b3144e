use crate::model::ManagedItemList;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const STATE_FORMAT_VERSION: u32 = 1;

const STATE_DIR: &str = ".bucketctl";
const STATE_FILE: &str = "state.json";

#[derive(Serialize, Deserialize)]
struct PersistedState {
    state_version: u32,
    managed: ManagedItemList,
}

/// `.bucketctl/state.json` next to the plan file.
pub fn default_state_path(plan_path: &Path) -> PathBuf {
    let dir = match plan_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    dir.join(STATE_DIR).join(STATE_FILE)
}

/// On-disk managed state for one plan.
///
/// Writes go through a temp file in the same directory and a rename, so a
/// crash mid-save leaves either the old state or the new one.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<ManagedItemList>, CoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let persisted: PersistedState = serde_json::from_str(&content)?;
        if persisted.state_version != STATE_FORMAT_VERSION {
            return Err(CoreError::VersionMismatch {
                expected: STATE_FORMAT_VERSION,
                found: persisted.state_version,
            });
        }
        debug!(
            "loaded state {} ({} buckets) from {}",
            persisted.managed.id,
            persisted.managed.len(),
            self.path.display()
        );
        Ok(Some(persisted.managed))
    }

    pub fn save(&self, managed: &ManagedItemList) -> Result<(), CoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let persisted = PersistedState {
            state_version: STATE_FORMAT_VERSION,
            managed: managed.clone(),
        };
        let content = serde_json::to_string_pretty(&persisted)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| CoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        debug!(
            "saved state {} ({} buckets) to {}",
            managed.id,
            managed.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Remove the state file. Missing files are not an error.
    pub fn remove(&self) -> Result<(), CoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Make a preceding rename durable.
fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = fs::File::open(dir)?;
    f.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ManagedItem;
    use bucketctl_schema::{BucketName, Tags};

    fn sample() -> ManagedItemList {
        let mut tags = Tags::new();
        tags.insert("provenance-key".to_owned(), "team=infra".to_owned());
        ManagedItemList::new(vec![ManagedItem {
            name: BucketName::new("logs-bucket"),
            tags,
            observed_at: "Monday, 02-Jan-06 15:04:05 UTC".to_owned(),
        }])
    }

    #[test]
    fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("state.json"));
        assert!(state.load().unwrap().is_none());
        assert!(!state.exists());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("nested").join("state.json"));
        let list = sample();
        state.save(&list).unwrap();
        assert_eq!(state.load().unwrap(), Some(list));
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("state.json"));
        state.save(&sample()).unwrap();
        let empty = ManagedItemList::new(vec![]);
        state.save(&empty).unwrap();
        assert_eq!(state.load().unwrap().unwrap().id, empty.id);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let managed = serde_json::to_value(sample()).unwrap();
        let doc = serde_json::json!({ "state_version": 99, "managed": managed });
        fs::write(&path, doc.to_string()).unwrap();

        let err = StateFile::new(&path).load().unwrap_err();
        assert!(matches!(
            err,
            CoreError::VersionMismatch {
                expected: 1,
                found: 99
            }
        ));
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            StateFile::new(&path).load(),
            Err(CoreError::Serialization(_))
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("state.json"));
        state.save(&sample()).unwrap();
        state.remove().unwrap();
        assert!(!state.exists());
        state.remove().unwrap();
    }

    #[test]
    fn default_path_sits_next_to_plan() {
        assert_eq!(
            default_state_path(Path::new("/srv/infra/buckets.toml")),
            PathBuf::from("/srv/infra/.bucketctl/state.json")
        );
        assert_eq!(
            default_state_path(Path::new("buckets.toml")),
            PathBuf::from("./.bucketctl/state.json")
        );
    }
}
