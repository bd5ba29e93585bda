use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Metadata of a collection as returned by the gateway.
///
/// `rid` is the only field the client relies on for identity. Everything else
/// is descriptive and passed through to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct CollectionMetadata {
    /// User-facing collection name.
    #[serde(rename = "id")]
    #[builder(setter(into))]
    pub name: String,
    /// Stable opaque identifier assigned by the backend.
    #[serde(rename = "_rid")]
    #[builder(setter(into))]
    pub rid: String,
    /// Id-based self link, e.g. `dbs/AbCdEf==/colls/AbCdEfGh=/`.
    #[serde(rename = "_self", default)]
    #[builder(default, setter(into))]
    pub self_link: String,
    /// Name-based link, e.g. `dbs/shop/colls/orders`.
    #[serde(rename = "altLink", default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub alt_link: Option<String>,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub etag: Option<String>,
    #[serde(
        rename = "_ts",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[builder(default, setter(strip_option))]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(
        rename = "indexingPolicy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    #[builder(default, setter(strip_option))]
    pub indexing_policy: Option<IndexingPolicy>,
    #[serde(rename = "partitionKey", default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub partition_key: Option<PartitionKeyDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    #[default]
    Consistent,
    Lazy,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingPolicy {
    #[serde(default)]
    pub automatic: bool,
    #[serde(default)]
    pub indexing_mode: IndexingMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_paths: Vec<IncludedPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_paths: Vec<IncludedPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedPath {
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartitionKind {
    #[default]
    Hash,
    MultiHash,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
    #[serde(default)]
    pub kind: PartitionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
}
