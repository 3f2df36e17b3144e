use crate::plan::{BucketEntry, PlanError, PlanV1, TagSpec};
use crate::types::{is_path_safe_name, BucketName};
use std::collections::{BTreeMap, BTreeSet};

/// Tag key under which a single free-form tag string is stored.
pub const PROVENANCE_TAG_KEY: &str = "provenance-key";

/// Tag set written to a bucket. Ordered so that writes and persisted state are
/// deterministic.
pub type Tags = BTreeMap<String, String>;

/// Strip the quoting the configuration layer may leave around a value.
///
/// Every `"` is removed and surrounding whitespace is trimmed. Applying it
/// twice yields the same result as applying it once.
pub fn normalize_value(raw: &str) -> String {
    raw.replace('"', "").trim().to_owned()
}

/// One bucket the plan wants to exist, with its name already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredItem {
    name: BucketName,
    tags: Tags,
}

impl DesiredItem {
    /// Normalize a raw name and tag set into a desired item.
    pub fn new(raw_name: &str, raw_tags: &Tags) -> Result<Self, PlanError> {
        let name = normalize_value(raw_name);
        if name.is_empty() {
            return Err(PlanError::EmptyBucketName(raw_name.to_owned()));
        }
        if !is_path_safe_name(&name) {
            return Err(PlanError::InvalidBucketName(name));
        }

        let mut tags = Tags::new();
        for (key, value) in raw_tags {
            let key = normalize_value(key);
            if key.is_empty() {
                return Err(PlanError::EmptyTagKey { bucket: name });
            }
            tags.insert(key, normalize_value(value));
        }

        Ok(Self {
            name: BucketName::new(name),
            tags,
        })
    }

    /// Desired item carrying a single free-form tag string under
    /// [`PROVENANCE_TAG_KEY`].
    pub fn with_tag_value(raw_name: &str, raw_value: &str) -> Result<Self, PlanError> {
        let mut tags = Tags::new();
        tags.insert(PROVENANCE_TAG_KEY.to_owned(), raw_value.to_owned());
        Self::new(raw_name, &tags)
    }

    pub fn name(&self) -> &BucketName {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// Validated, ordered list of desired items with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredPlan {
    items: Vec<DesiredItem>,
}

impl DesiredPlan {
    /// Build a plan, rejecting duplicate names. Order is preserved.
    pub fn new(items: Vec<DesiredItem>) -> Result<Self, PlanError> {
        let mut seen = BTreeSet::new();
        for item in &items {
            if !seen.insert(item.name.as_str()) {
                return Err(PlanError::DuplicateBucketName(item.name.to_string()));
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[DesiredItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DesiredItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a DesiredPlan {
    type Item = &'a DesiredItem;
    type IntoIter = std::slice::Iter<'a, DesiredItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl PlanV1 {
    /// Normalize the plan: check the version, strip quoting from names and
    /// tags, and reject empty or duplicate bucket names.
    pub fn normalize(&self) -> Result<DesiredPlan, PlanError> {
        if self.plan_version != 1 {
            return Err(PlanError::UnsupportedVersion(self.plan_version));
        }
        if self.buckets.is_empty() {
            return Err(PlanError::NoBuckets);
        }

        let items = self
            .buckets
            .iter()
            .map(BucketEntry::to_desired)
            .collect::<Result<Vec<_>, _>>()?;
        DesiredPlan::new(items)
    }
}

impl BucketEntry {
    fn to_desired(&self) -> Result<DesiredItem, PlanError> {
        match &self.tags {
            TagSpec::Value(value) => DesiredItem::with_tag_value(&self.name, value),
            TagSpec::Map(map) => DesiredItem::new(&self.name, map),
        }
    }
}
