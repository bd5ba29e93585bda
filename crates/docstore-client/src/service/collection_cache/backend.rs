use docstore_ext::CollectionMetadata;
use http::{HeaderMap, HeaderValue, Method, header::AUTHORIZATION};

use super::{CollectionFetcher, CollectionResolver};
use crate::{
    config::{ClientConfigurationError, DynAppConfig},
    request_metadata::{X_MS_DATE_HEADER_NAME, X_MS_VERSION_HEADER_NAME, rfc1123_date},
    service::{
        authz::{AuthorizationTokenProvider, ConfiguredAuthorization, ResourceType},
        error::{PayloadDecodingError, RequestEncodingError, ResolveCollectionError},
        identifier::{CollectionPath, CollectionRid},
        transport::{HttpResourceReader, ResourceReader},
    },
};

/// [`CollectionResolver`] reading collections from the gateway.
pub type BackendCollectionResolver<R, A> = CollectionResolver<BackendCollectionFetcher<R, A>>;

/// Reads collection metadata through a [`ResourceReader`], signing every
/// request with an [`AuthorizationTokenProvider`].
#[derive(Debug)]
pub struct BackendCollectionFetcher<R, A> {
    reader: R,
    authorization: A,
    api_version: String,
}

impl<R, A> BackendCollectionFetcher<R, A>
where
    R: ResourceReader,
    A: AuthorizationTokenProvider,
{
    #[must_use]
    pub fn new(reader: R, authorization: A, api_version: impl Into<String>) -> Self {
        Self {
            reader,
            authorization,
            api_version: api_version.into(),
        }
    }

    #[must_use]
    pub fn reader(&self) -> &R {
        &self.reader
    }

    #[must_use]
    pub fn authorization(&self) -> &A {
        &self.authorization
    }

    async fn read_collection(
        &self,
        path: &str,
        resource_link: &str,
    ) -> Result<CollectionMetadata, ResolveCollectionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_MS_DATE_HEADER_NAME,
            header_value(&rfc1123_date(chrono::Utc::now()))?,
        );
        headers.insert(X_MS_VERSION_HEADER_NAME, header_value(&self.api_version)?);

        let token = self
            .authorization
            .authorization_token(
                resource_link,
                ResourceType::Collection,
                &Method::GET,
                &headers,
            )
            .await?;
        headers.insert(AUTHORIZATION, header_value(&token)?);

        let body = self.reader.read_resource(path, headers).await?;
        serde_json::from_slice(&body)
            .map_err(|e| PayloadDecodingError::new(path, e.to_string()).into())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, RequestEncodingError> {
    HeaderValue::from_str(value).map_err(|e| {
        RequestEncodingError::new("Header value contains invalid characters").with_source(e)
    })
}

#[async_trait::async_trait]
impl<R, A> CollectionFetcher for BackendCollectionFetcher<R, A>
where
    R: ResourceReader,
    A: AuthorizationTokenProvider,
{
    async fn fetch_by_name(
        &self,
        path: &CollectionPath,
    ) -> Result<CollectionMetadata, ResolveCollectionError> {
        tracing::debug!("Fetching collection `{path}`");
        self.read_collection(path.as_str(), path.as_str()).await
    }

    async fn fetch_by_rid(
        &self,
        rid: &CollectionRid,
    ) -> Result<CollectionMetadata, ResolveCollectionError> {
        tracing::debug!("Fetching collection with rid `{rid}`");
        self.read_collection(&format!("colls/{rid}"), &rid.to_lowercase())
            .await
    }
}

impl BackendCollectionResolver<HttpResourceReader, ConfiguredAuthorization> {
    /// Builds a resolver talking to the configured gateway.
    ///
    /// # Errors
    /// Fails if endpoint or authorization are missing or invalid.
    pub fn from_config(config: &DynAppConfig) -> Result<Self, ClientConfigurationError> {
        let reader = HttpResourceReader::from_config(config)?;
        let authorization = config
            .auth
            .clone()
            .ok_or(ClientConfigurationError::MissingAuthorization)?
            .into_provider()?;
        Ok(CollectionResolver::new(
            BackendCollectionFetcher::new(reader, authorization, config.api_version.clone()),
            config.cache.collection.initial_capacity,
        ))
    }
}
