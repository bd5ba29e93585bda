#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::pedantic
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![forbid(unsafe_code)]
pub mod config;
pub mod request_metadata;
pub mod service;

pub use config::{CONFIG, DynAppConfig};
pub use docstore_ext;
pub use service::{
    CollectionPath, CollectionResolver, CollectionRid, ResolutionContext, ResourceAddress,
    error::ResolveCollectionError,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod tests;
