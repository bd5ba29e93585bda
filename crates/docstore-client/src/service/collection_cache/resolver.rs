use std::sync::Arc;

use docstore_ext::CollectionMetadata;
use futures::{FutureExt, future::BoxFuture};

use super::ResolutionCache;
use crate::service::{
    error::{InvalidPartition, ResolveCollectionError},
    identifier::{
        CollectionPath, CollectionRef, CollectionRid, PartitionKeyRangeIdentity,
        ResolutionContext, ResourceAddress,
    },
};

const NAME_CACHE: &str = "collection_by_name";
const RID_CACHE: &str = "collection_by_rid";

type FetchResult = Result<Arc<CollectionMetadata>, ResolveCollectionError>;

/// Backend lookups used by [`CollectionResolver`] on a cache miss or refresh.
#[async_trait::async_trait]
pub trait CollectionFetcher: Send + Sync + 'static {
    async fn fetch_by_name(
        &self,
        path: &CollectionPath,
    ) -> Result<CollectionMetadata, ResolveCollectionError>;

    async fn fetch_by_rid(
        &self,
        rid: &CollectionRid,
    ) -> Result<CollectionMetadata, ResolveCollectionError>;
}

/// Resolves request addresses to collection metadata.
///
/// Holds one cache keyed by collection path and one keyed by collection rid.
/// A fetch by name seeds the rid cache with the same value.
pub struct CollectionResolver<F> {
    fetcher: Arc<F>,
    by_name: ResolutionCache<CollectionPath, Arc<CollectionMetadata>, ResolveCollectionError>,
    by_rid: ResolutionCache<CollectionRid, Arc<CollectionMetadata>, ResolveCollectionError>,
}

impl<F> Clone for CollectionResolver<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            by_name: self.by_name.clone(),
            by_rid: self.by_rid.clone(),
        }
    }
}

impl<F> std::fmt::Debug for CollectionResolver<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionResolver")
            .field("by_name", &self.by_name)
            .field("by_rid", &self.by_rid)
            .finish_non_exhaustive()
    }
}

impl<F: CollectionFetcher> CollectionResolver<F> {
    #[must_use]
    pub fn new(fetcher: F, initial_capacity: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            by_name: ResolutionCache::new(NAME_CACHE, initial_capacity),
            by_rid: ResolutionCache::new(RID_CACHE, initial_capacity),
        }
    }

    #[must_use]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolves the collection addressed by `context`.
    ///
    /// Honors and clears `force_name_cache_refresh`, serves partition-pinned
    /// requests by the pinned rid and records the resolved rid so that later
    /// attempts with the same context skip the name lookup.
    ///
    /// # Errors
    /// - `InvalidPartition` if the pinned collection rid no longer exists.
    /// - Any error returned by the fetcher.
    #[tracing::instrument(skip_all, fields(address = %context.address))]
    pub async fn resolve(
        &self,
        context: &mut ResolutionContext,
    ) -> Result<Arc<CollectionMetadata>, ResolveCollectionError> {
        let path = match context.address.collection() {
            CollectionRef::ByName(path) => path.clone(),
            CollectionRef::ByRid(rid) => {
                if let Some(metadata) = self.resolve_pinned(context).await? {
                    return Ok(metadata);
                }
                return self.resolve_by_rid(rid).await;
            }
        };

        if context.force_name_cache_refresh {
            self.refresh_for_context(&path, context).await?;
            context.force_name_cache_refresh = false;
        }

        if let Some(metadata) = self.resolve_pinned(context).await? {
            return Ok(metadata);
        }

        if let Some(rid) = &context.resolved_collection_rid {
            return self.resolve_by_rid(rid).await;
        }

        let metadata = self.resolve_by_name(&path).await?;
        context.resolved_collection_rid = Some(CollectionRid::new(metadata.rid.clone()));
        Ok(metadata)
    }

    /// Re-fetches the name mapping of `address`.
    ///
    /// Id-based addresses have no name mapping; refreshing them does nothing.
    ///
    /// # Errors
    /// Any error returned by the fetcher.
    #[tracing::instrument(skip_all, fields(address = %address))]
    pub async fn refresh(&self, address: &ResourceAddress) -> Result<(), ResolveCollectionError> {
        let CollectionRef::ByName(path) = address.collection() else {
            tracing::debug!("Id-based addresses have no name mapping to refresh");
            return Ok(());
        };
        self.by_name.refresh(path, self.name_fetch(path)).await?;
        Ok(())
    }

    /// Resolves a collection by its normalized name path.
    ///
    /// # Errors
    /// Any error returned by the fetcher.
    pub async fn resolve_by_name(
        &self,
        path: &CollectionPath,
    ) -> Result<Arc<CollectionMetadata>, ResolveCollectionError> {
        self.by_name.get(path, self.name_fetch(path)).await
    }

    /// Resolves a collection by its rid.
    ///
    /// # Errors
    /// Any error returned by the fetcher.
    pub async fn resolve_by_rid(
        &self,
        rid: &CollectionRid,
    ) -> Result<Arc<CollectionMetadata>, ResolveCollectionError> {
        self.by_rid.get(rid, self.rid_fetch(rid)).await
    }

    /// Resolved metadata cached for `path`, without fetching.
    pub async fn cached_by_name(&self, path: &CollectionPath) -> Option<Arc<CollectionMetadata>> {
        self.by_name.peek(path).await
    }

    /// Resolved metadata cached for `rid`, without fetching.
    pub async fn cached_by_rid(&self, rid: &CollectionRid) -> Option<Arc<CollectionMetadata>> {
        self.by_rid.peek(rid).await
    }

    async fn refresh_for_context(
        &self,
        path: &CollectionPath,
        context: &mut ResolutionContext,
    ) -> Result<(), ResolveCollectionError> {
        match &context.resolved_collection_rid {
            Some(stale_rid) => {
                tracing::debug!("Refreshing name mapping of `{path}` if still `{stale_rid}`");
                self.by_name
                    .conditional_refresh(
                        path,
                        stale_rid.as_str(),
                        |current, stale_rid| current.rid == stale_rid,
                        self.name_fetch(path),
                    )
                    .await?;
            }
            None => {
                tracing::debug!("Refreshing name mapping of `{path}`");
                self.by_name.refresh(path, self.name_fetch(path)).await?;
            }
        }
        context.resolved_collection_rid = None;
        Ok(())
    }

    async fn resolve_pinned(
        &self,
        context: &ResolutionContext,
    ) -> Result<Option<Arc<CollectionMetadata>>, ResolveCollectionError> {
        let Some(PartitionKeyRangeIdentity {
            collection_rid: Some(rid),
            partition_key_range_id,
        }) = &context.partition_key_range_identity
        else {
            return Ok(None);
        };

        match self.resolve_by_rid(rid).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(ResolveCollectionError::CollectionNotFound(not_found)) => {
                tracing::debug!(
                    "Pinned collection `{rid}` of partition key range `{partition_key_range_id}` not found"
                );
                Err(InvalidPartition::new(rid.as_str(), partition_key_range_id.as_str())
                    .append_details(not_found.stack)
                    .into())
            }
            Err(e) => Err(e),
        }
    }

    fn name_fetch(
        &self,
        path: &CollectionPath,
    ) -> impl FnOnce() -> BoxFuture<'static, FetchResult> + Send + use<F> {
        let fetcher = self.fetcher.clone();
        let by_rid = self.by_rid.clone();
        let path = path.clone();
        move || {
            async move {
                let metadata = Arc::new(fetcher.fetch_by_name(&path).await?);
                by_rid
                    .set(CollectionRid::new(metadata.rid.clone()), metadata.clone())
                    .await;
                Ok(metadata)
            }
            .boxed()
        }
    }

    fn rid_fetch(
        &self,
        rid: &CollectionRid,
    ) -> impl FnOnce() -> BoxFuture<'static, FetchResult> + Send + use<F> {
        let fetcher = self.fetcher.clone();
        let rid = rid.clone();
        move || async move { fetcher.fetch_by_rid(&rid).await.map(Arc::new) }.boxed()
    }
}
