use std::{sync::LazyLock, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;
use veil::Redact;

pub static CONFIG: LazyLock<DynAppConfig> = LazyLock::new(get_config);

pub const DEFAULT_API_VERSION: &str = "2018-12-31";

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct DynAppConfig {
    /// Base URL of the docstore gateway, e.g. `https://account.example.com:443/`.
    pub endpoint: Option<Url>,
    /// Credentials used to sign requests. Requests are rejected by the
    /// gateway if this is not set.
    #[serde(default)]
    pub auth: Option<AuthorizationConfig>,
    pub request_timeout_secs: u64,
    /// Value of the `x-ms-version` header.
    pub api_version: String,
    pub cache: CacheConfig,
}

impl Default for DynAppConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth: None,
            request_timeout_secs: 60,
            api_version: DEFAULT_API_VERSION.to_string(),
            cache: CacheConfig::default(),
        }
    }
}

impl DynAppConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub collection: CollectionCacheConfig,
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct CollectionCacheConfig {
    /// Pre-allocated entries per collection cache. Caches grow beyond it.
    pub initial_capacity: usize,
}

impl Default for CollectionCacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Redact)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuthorizationConfig {
    /// Base64 encoded account master key.
    MasterKey {
        #[redact]
        key: String,
    },
    /// Pre-issued resource token, sent verbatim.
    ResourceToken {
        #[redact]
        token: String,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ClientConfigurationError {
    #[error("No docstore endpoint configured")]
    MissingEndpoint,
    #[error("No docstore authorization configured")]
    MissingAuthorization,
    #[error("Configured master key is not valid base64")]
    InvalidMasterKey(#[source] base64::DecodeError),
    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

fn get_config() -> DynAppConfig {
    let defaults = figment::providers::Serialized::defaults(DynAppConfig::default());

    #[cfg(not(test))]
    let prefix = "DOCSTORE__";
    #[cfg(test)]
    let prefix = "DOCSTORE_TEST__";

    let config = figment::Figment::from(defaults)
        .merge(figment::providers::Env::prefixed(prefix).split("__"));

    match config.extract::<DynAppConfig>() {
        Ok(c) => c,
        Err(e) => {
            panic!("Failed to extract docstore client config: {e}");
        }
    }
}
