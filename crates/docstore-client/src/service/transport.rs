use bytes::Bytes;
use docstore_ext::DocstoreErrorResponse;
use http::{HeaderMap, StatusCode};
use url::Url;

use crate::{
    config::{ClientConfigurationError, DynAppConfig},
    request_metadata,
    service::error::{
        CollectionNotFound, RequestEncodingError, ResolveCollectionError, TransportError,
    },
};

/// Reads a single resource from the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ResourceReader: Send + Sync + 'static {
    /// Issues `GET {path}` with `headers` and returns the response body.
    ///
    /// Returns `CollectionNotFound` for a 404 and `TransportError` for every
    /// other failure.
    async fn read_resource(
        &self,
        path: &str,
        headers: HeaderMap,
    ) -> Result<Bytes, ResolveCollectionError>;
}

/// [`ResourceReader`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpResourceReader {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpResourceReader {
    #[must_use]
    pub fn new(client: reqwest::Client, mut endpoint: Url) -> Self {
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Self { client, endpoint }
    }

    /// # Errors
    /// Fails if no endpoint is configured or the HTTP client cannot be built.
    pub fn from_config(config: &DynAppConfig) -> Result<Self, ClientConfigurationError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or(ClientConfigurationError::MissingEndpoint)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ClientConfigurationError::HttpClient)?;
        Ok(Self::new(client, endpoint))
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, path: &str) -> Result<Url, RequestEncodingError> {
        self.endpoint.join(path.trim_start_matches('/')).map_err(|e| {
            RequestEncodingError::new(format!("Invalid resource path `{path}`")).with_source(e)
        })
    }
}

#[async_trait::async_trait]
impl ResourceReader for HttpResourceReader {
    async fn read_resource(
        &self,
        path: &str,
        headers: HeaderMap,
    ) -> Result<Bytes, ResolveCollectionError> {
        let url = self.url(path)?;
        tracing::debug!("Reading `{url}`");

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("Request for `{path}` failed")).with_source(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await.map_err(|e| {
                TransportError::new(format!("Failed to read response body of `{path}`"))
                    .with_status(status, None)
                    .with_source(e)
            })?);
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.unwrap_or_default();
        Err(classify_failure(path, status, &headers, &body))
    }
}

/// Maps a non-success gateway response to the error surfaced to resolvers.
pub(crate) fn classify_failure(
    path: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> ResolveCollectionError {
    let message = serde_json::from_slice::<DocstoreErrorResponse>(body).map_or_else(
        |_| String::from_utf8_lossy(body).into_owned(),
        |response| response.to_string(),
    );

    if status == StatusCode::NOT_FOUND {
        let not_found = CollectionNotFound::new(path);
        return if message.is_empty() {
            not_found.into()
        } else {
            not_found.append_detail(message).into()
        };
    }

    tracing::debug!("Reading `{path}` failed with status {status}: {message}");
    TransportError::new(message)
        .with_status(status, request_metadata::sub_status(headers))
        .append_detail(format!("Resource: {path}"))
        .into()
}
