use std::collections::HashMap;

use docstore_ext::CollectionMetadata;
use tokio::sync::{RwLock, watch};

use crate::service::{
    collection_cache::CollectionFetcher,
    error::{CollectionNotFound, ResolveCollectionError},
    identifier::{CollectionPath, CollectionRid},
};

#[cfg(test)]
mod backend_ops;

/// Metadata of collection `name` with id-based links derived from `rid`.
#[must_use]
pub fn collection(name: &str, rid: &str) -> CollectionMetadata {
    CollectionMetadata::builder()
        .name(name)
        .rid(rid)
        .self_link(format!("dbs/db-rid/colls/{rid}/"))
        .build()
}

/// In-memory [`CollectionFetcher`] with per-key call counters.
///
/// Fetches can be held in flight with [`Self::pause`] until [`Self::release`]
/// is called, and individual keys (collection paths or rids) can be made to
/// fail with [`Self::fail_with`].
#[derive(Debug)]
pub struct InMemoryCollectionFetcher {
    collections: RwLock<HashMap<CollectionPath, CollectionMetadata>>,
    failures: RwLock<HashMap<String, ResolveCollectionError>>,
    name_calls: RwLock<HashMap<CollectionPath, usize>>,
    rid_calls: RwLock<HashMap<String, usize>>,
    paused: watch::Sender<bool>,
}

impl Default for InMemoryCollectionFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCollectionFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            name_calls: RwLock::new(HashMap::new()),
            rid_calls: RwLock::new(HashMap::new()),
            paused: watch::Sender::new(false),
        }
    }

    /// Creates or replaces the collection `metadata.name` in `database`.
    pub async fn insert(&self, database: &str, metadata: CollectionMetadata) {
        let path = CollectionPath::new(database, &metadata.name);
        self.collections.write().await.insert(path, metadata);
    }

    pub async fn remove(&self, database: &str, name: &str) {
        self.collections
            .write()
            .await
            .remove(&CollectionPath::new(database, name));
    }

    pub async fn fail_with(&self, key: &str, error: ResolveCollectionError) {
        self.failures.write().await.insert(key.to_string(), error);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Holds every subsequent fetch until [`Self::release`].
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn release(&self) {
        self.paused.send_replace(false);
    }

    pub async fn name_calls(&self, path: &CollectionPath) -> usize {
        self.name_calls
            .read()
            .await
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    pub async fn rid_calls(&self, rid: &str) -> usize {
        self.rid_calls
            .read()
            .await
            .get(rid)
            .copied()
            .unwrap_or_default()
    }

    async fn wait_until_released(&self) {
        let mut paused = self.paused.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = paused.wait_for(|paused| !*paused).await;
    }

    async fn injected_failure(&self, key: &str) -> Result<(), ResolveCollectionError> {
        match self.failures.read().await.get(key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl CollectionFetcher for InMemoryCollectionFetcher {
    async fn fetch_by_name(
        &self,
        path: &CollectionPath,
    ) -> Result<CollectionMetadata, ResolveCollectionError> {
        *self
            .name_calls
            .write()
            .await
            .entry(path.clone())
            .or_default() += 1;
        self.wait_until_released().await;
        self.injected_failure(path.as_str()).await?;

        self.collections
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| CollectionNotFound::new(path.as_str()).into())
    }

    async fn fetch_by_rid(
        &self,
        rid: &CollectionRid,
    ) -> Result<CollectionMetadata, ResolveCollectionError> {
        *self
            .rid_calls
            .write()
            .await
            .entry(rid.to_string())
            .or_default() += 1;
        self.wait_until_released().await;
        self.injected_failure(rid.as_str()).await?;

        self.collections
            .read()
            .await
            .values()
            .find(|metadata| metadata.rid == rid.as_str())
            .cloned()
            .ok_or_else(|| CollectionNotFound::new(rid.as_str()).into())
    }
}
