pub mod authz;
pub mod collection_cache;
pub mod error;
pub mod identifier;
pub mod transport;

pub use collection_cache::{
    BackendCollectionFetcher, BackendCollectionResolver, CollectionFetcher, CollectionResolver,
};
pub use identifier::{
    AddressKind, CollectionPath, CollectionRef, CollectionRid, PartitionKeyRangeIdentity,
    ResolutionContext, ResourceAddress,
};
