#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::pedantic
)]
#![allow(clippy::module_name_repetitions)]
#![forbid(unsafe_code)]

pub mod collection;
pub mod error;

pub use collection::{
    CollectionMetadata, IncludedPath, IndexingMode, IndexingPolicy, PartitionKeyDefinition,
    PartitionKind,
};
pub use error::{DocstoreErrorResponse, ErrorModel};
