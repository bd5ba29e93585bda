use std::{ops::Deref, str::FromStr};

use docstore_ext::ErrorModel;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::service::error::{InvalidResourceAddress, impl_error_stack_methods};

const DATABASES_SEGMENT: &str = "dbs";
const COLLECTIONS_SEGMENT: &str = "colls";

macro_rules! define_key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_key_type!(
    /// Normalized name path of a collection: `dbs/{db}/colls/{coll}`.
    CollectionPath
);
define_key_type!(
    /// Backend resource id of a collection.
    CollectionRid
);

impl CollectionPath {
    /// Builds the path from database and collection names.
    #[must_use]
    pub fn new(database: &str, collection: &str) -> Self {
        Self(format!(
            "{DATABASES_SEGMENT}/{database}/{COLLECTIONS_SEGMENT}/{collection}"
        ))
    }
}

impl CollectionRid {
    pub fn new(rid: impl Into<String>) -> Self {
        Self(rid.into())
    }
}

impl From<&str> for CollectionRid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AddressKind {
    NameBased,
    IdBased,
}

/// The collection an address points into, keyed the way the address names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionRef {
    ByName(CollectionPath),
    ByRid(CollectionRid),
}

/// A validated request path addressing a collection or a resource below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    path: String,
    collection: CollectionRef,
}

impl ResourceAddress {
    /// Parses a name-based path such as `dbs/shop/colls/orders/docs/1`.
    ///
    /// # Errors
    /// Fails if the path does not start with `dbs/{db}/colls/{coll}`.
    pub fn name_based(path: &str) -> Result<Self, InvalidResourceAddress> {
        Self::parse(path, AddressKind::NameBased)
    }

    /// Parses an id-based path such as `dbs/PaYSAA==/colls/PaYSAPH7qAo=`.
    ///
    /// # Errors
    /// Fails if the path does not start with `dbs/{dbRid}/colls/{collRid}`.
    pub fn id_based(path: &str) -> Result<Self, InvalidResourceAddress> {
        Self::parse(path, AddressKind::IdBased)
    }

    fn parse(path: &str, kind: AddressKind) -> Result<Self, InvalidResourceAddress> {
        let normalized = path.trim_matches('/');
        let segments = normalized.split('/').collect::<Vec<_>>();

        if segments.len() < 4 {
            return Err(InvalidResourceAddress::new(
                path,
                "expected at least `dbs/{database}/colls/{collection}`",
            ));
        }
        if let Some(position) = segments.iter().position(|s| s.is_empty()) {
            return Err(InvalidResourceAddress::new(
                path,
                format!("segment {position} is empty"),
            ));
        }
        if segments[0] != DATABASES_SEGMENT || segments[2] != COLLECTIONS_SEGMENT {
            return Err(InvalidResourceAddress::new(
                path,
                format!(
                    "expected segments `{DATABASES_SEGMENT}` and `{COLLECTIONS_SEGMENT}`, got `{}` and `{}`",
                    segments[0], segments[2]
                ),
            ));
        }

        let collection = match kind {
            AddressKind::NameBased => {
                CollectionRef::ByName(CollectionPath::new(segments[1], segments[3]))
            }
            AddressKind::IdBased => CollectionRef::ByRid(CollectionRid::new(segments[3])),
        };
        Ok(Self {
            path: normalized.to_string(),
            collection,
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> AddressKind {
        match self.collection {
            CollectionRef::ByName(_) => AddressKind::NameBased,
            CollectionRef::ByRid(_) => AddressKind::IdBased,
        }
    }

    #[must_use]
    pub fn is_name_based(&self) -> bool {
        self.kind() == AddressKind::NameBased
    }

    /// Cache key of the collection this address points into.
    #[must_use]
    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }
}

impl std::fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Partition key range a request is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKeyRangeIdentity {
    pub collection_rid: Option<CollectionRid>,
    pub partition_key_range_id: String,
}

impl PartitionKeyRangeIdentity {
    pub fn new(
        collection_rid: Option<CollectionRid>,
        partition_key_range_id: impl Into<String>,
    ) -> Self {
        Self {
            collection_rid,
            partition_key_range_id: partition_key_range_id.into(),
        }
    }
}

impl FromStr for PartitionKeyRangeIdentity {
    type Err = InvalidPartitionKeyRangeIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split(',').map(str::trim).collect::<Vec<_>>();
        match parts.as_slice() {
            [id] if !id.is_empty() => Ok(Self::new(None, *id)),
            [rid, id] if !rid.is_empty() && !id.is_empty() => {
                Ok(Self::new(Some(CollectionRid::from(*rid)), *id))
            }
            _ => Err(InvalidPartitionKeyRangeIdentity::new(s)),
        }
    }
}

impl std::fmt::Display for PartitionKeyRangeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.collection_rid {
            Some(rid) => write!(f, "{rid},{}", self.partition_key_range_id),
            None => write!(f, "{}", self.partition_key_range_id),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error(
    "Invalid partition key range identity `{value}`. Expected `<collectionRid>,<partitionKeyRangeId>` or `<partitionKeyRangeId>`"
)]
pub struct InvalidPartitionKeyRangeIdentity {
    pub value: String,
    pub stack: Vec<String>,
}

impl_error_stack_methods!(InvalidPartitionKeyRangeIdentity);

impl InvalidPartitionKeyRangeIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            stack: Vec::new(),
        }
    }
}

impl From<InvalidPartitionKeyRangeIdentity> for ErrorModel {
    fn from(err: InvalidPartitionKeyRangeIdentity) -> Self {
        ErrorModel::bad_request(err.to_string(), "InvalidPartitionKeyRangeIdentity", None)
            .append_details(err.stack)
    }
}

/// Per-operation resolution state, carried across retry attempts.
///
/// The resolver reads and updates it on every `resolve` call; retry policies
/// set `force_name_cache_refresh` after a stale-mapping failure.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ResolutionContext {
    pub address: ResourceAddress,
    #[builder(default)]
    pub force_name_cache_refresh: bool,
    #[builder(default, setter(strip_option))]
    pub partition_key_range_identity: Option<PartitionKeyRangeIdentity>,
    #[builder(default, setter(strip_option))]
    pub resolved_collection_rid: Option<CollectionRid>,
}

impl ResolutionContext {
    #[must_use]
    pub fn new(address: ResourceAddress) -> Self {
        Self::builder().address(address).build()
    }

    #[must_use]
    pub fn is_name_based(&self) -> bool {
        self.address.is_name_based()
    }
}
