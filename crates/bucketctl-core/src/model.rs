use bucketctl_remote::RemoteBucket;
use bucketctl_schema::{BucketName, Tags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RFC 850 style, e.g. `Monday, 02-Jan-06 15:04:05 UTC`.
pub const OBSERVED_AT_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// Format of [`ListedBucket::creation_date`].
pub const CREATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_observed_at(at: DateTime<Utc>) -> String {
    at.format(OBSERVED_AT_FORMAT).to_string()
}

pub fn format_creation_date(at: DateTime<Utc>) -> String {
    at.format(CREATION_DATE_FORMAT).to_string()
}

/// A bucket the reconciler created or verified, with the tags it last wrote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedItem {
    pub name: BucketName,
    pub tags: Tags,
    pub observed_at: String,
}

/// Managed state for one plan, in plan order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedItemList {
    pub id: String,
    pub items: Vec<ManagedItem>,
    pub last_updated: String,
}

impl ManagedItemList {
    /// Start a new list with a fresh identifier.
    pub fn new(items: Vec<ManagedItem>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), items)
    }

    /// Build a list that keeps an existing identifier.
    pub fn with_id(id: String, items: Vec<ManagedItem>) -> Self {
        Self {
            id,
            items,
            last_updated: format_observed_at(Utc::now()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ManagedItem> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read-only projection of a bucket from the remote inventory.
///
/// The listing call carries no tags, so `tags` is always empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListedBucket {
    pub name: String,
    pub creation_date: String,
    #[serde(default)]
    pub tags: Tags,
}

impl From<&RemoteBucket> for ListedBucket {
    fn from(bucket: &RemoteBucket) -> Self {
        Self {
            name: bucket.name.clone(),
            creation_date: format_creation_date(bucket.created_at),
            tags: Tags::new(),
        }
    }
}
