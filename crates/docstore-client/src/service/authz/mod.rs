mod master_key;

use http::{HeaderMap, Method};
pub use master_key::MasterKeyAuthorization;

use crate::{
    config::{AuthorizationConfig, ClientConfigurationError},
    service::error::RequestEncodingError,
};

/// Resource type segment used when signing a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::AsRefStr,
)]
pub enum ResourceType {
    #[strum(serialize = "colls")]
    Collection,
}

/// Produces the value of the `authorization` header for a request.
///
/// `headers` holds the headers already attached to the request, including
/// `x-ms-date`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuthorizationTokenProvider: Send + Sync + 'static {
    async fn authorization_token(
        &self,
        resource_link: &str,
        resource_type: ResourceType,
        verb: &Method,
        headers: &HeaderMap,
    ) -> Result<String, RequestEncodingError>;
}

/// Hands out a pre-issued resource token unchanged.
#[derive(Clone, veil::Redact)]
pub struct StaticTokenAuthorization {
    #[redact]
    token: String,
}

impl StaticTokenAuthorization {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl AuthorizationTokenProvider for StaticTokenAuthorization {
    async fn authorization_token(
        &self,
        _resource_link: &str,
        _resource_type: ResourceType,
        _verb: &Method,
        _headers: &HeaderMap,
    ) -> Result<String, RequestEncodingError> {
        Ok(self.token.clone())
    }
}

/// Authorization selected by [`AuthorizationConfig`].
#[derive(Debug, Clone)]
pub enum ConfiguredAuthorization {
    MasterKey(MasterKeyAuthorization),
    ResourceToken(StaticTokenAuthorization),
}

#[async_trait::async_trait]
impl AuthorizationTokenProvider for ConfiguredAuthorization {
    async fn authorization_token(
        &self,
        resource_link: &str,
        resource_type: ResourceType,
        verb: &Method,
        headers: &HeaderMap,
    ) -> Result<String, RequestEncodingError> {
        match self {
            ConfiguredAuthorization::MasterKey(provider) => {
                provider
                    .authorization_token(resource_link, resource_type, verb, headers)
                    .await
            }
            ConfiguredAuthorization::ResourceToken(provider) => {
                provider
                    .authorization_token(resource_link, resource_type, verb, headers)
                    .await
            }
        }
    }
}

impl AuthorizationConfig {
    /// Builds the token provider for these credentials.
    ///
    /// # Errors
    /// Fails if a master key is not valid base64.
    pub fn into_provider(self) -> Result<ConfiguredAuthorization, ClientConfigurationError> {
        Ok(match self {
            AuthorizationConfig::MasterKey { key } => ConfiguredAuthorization::MasterKey(
                MasterKeyAuthorization::from_base64(&key)
                    .map_err(ClientConfigurationError::InvalidMasterKey)?,
            ),
            AuthorizationConfig::ResourceToken { token } => {
                ConfiguredAuthorization::ResourceToken(StaticTokenAuthorization::new(token))
            }
        })
    }
}
