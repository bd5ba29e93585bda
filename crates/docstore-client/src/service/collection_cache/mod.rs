mod backend;
mod deferred;
mod resolution_cache;
mod resolver;

pub use backend::{BackendCollectionFetcher, BackendCollectionResolver};
pub use deferred::DeferredComputation;
pub use resolution_cache::ResolutionCache;
pub use resolver::{CollectionFetcher, CollectionResolver};
