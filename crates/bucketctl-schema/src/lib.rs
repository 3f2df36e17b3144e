//! Plan parsing, normalization, and desired state for bucketctl.
//!
//! This crate defines the schema layer: TOML plan parsing (`PlanV1`), the
//! normalized desired state handed to the reconciler (`DesiredPlan` of
//! `DesiredItem`s), the quote-stripping normalization applied to every bucket
//! name and tag value, and the `BucketName` newtype.

pub mod normalize;
pub mod plan;
pub mod types;

pub use normalize::{normalize_value, DesiredItem, DesiredPlan, Tags, PROVENANCE_TAG_KEY};
pub use plan::{parse_plan_file, parse_plan_str, BucketEntry, PlanError, PlanV1, TagSpec};
pub use types::{is_path_safe_name, BucketName};
