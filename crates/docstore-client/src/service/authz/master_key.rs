use base64::{Engine as _, prelude::BASE64_STANDARD};
use hmac::{Hmac, Mac};
use http::{HeaderMap, Method};
use sha2::Sha256;

use super::{AuthorizationTokenProvider, ResourceType};
use crate::{request_metadata::X_MS_DATE_HEADER_NAME, service::error::RequestEncodingError};

type HmacSha256 = Hmac<Sha256>;

/// Signs requests with the account master key.
#[derive(Clone, veil::Redact)]
pub struct MasterKeyAuthorization {
    #[redact]
    key: Vec<u8>,
}

impl MasterKeyAuthorization {
    /// # Errors
    /// Fails if `key` is not standard base64.
    pub fn from_base64(key: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self {
            key: BASE64_STANDARD.decode(key.trim())?,
        })
    }

    /// Url-encoded `type=master&ver=1.0&sig=...` token for one request.
    ///
    /// # Errors
    /// Fails if the key cannot initialize the MAC.
    pub fn sign(
        &self,
        verb: &Method,
        resource_type: ResourceType,
        resource_link: &str,
        date: &str,
    ) -> Result<String, RequestEncodingError> {
        let payload = string_to_sign(verb, resource_type, resource_link, date);
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| {
            RequestEncodingError::new("Failed to initialize HMAC with master key")
                .append_detail(e.to_string())
        })?;
        mac.update(payload.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

        Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned())
    }
}

fn string_to_sign(
    verb: &Method,
    resource_type: ResourceType,
    resource_link: &str,
    date: &str,
) -> String {
    format!(
        "{}\n{}\n{resource_link}\n{}\n\n",
        verb.as_str().to_lowercase(),
        resource_type.as_ref().to_lowercase(),
        date.to_lowercase()
    )
}

#[async_trait::async_trait]
impl AuthorizationTokenProvider for MasterKeyAuthorization {
    async fn authorization_token(
        &self,
        resource_link: &str,
        resource_type: ResourceType,
        verb: &Method,
        headers: &HeaderMap,
    ) -> Result<String, RequestEncodingError> {
        let date = headers
            .get(X_MS_DATE_HEADER_NAME)
            .ok_or_else(|| RequestEncodingError::new("Missing `x-ms-date` header"))?
            .to_str()
            .map_err(|e| {
                RequestEncodingError::new("`x-ms-date` header is not valid ASCII").with_source(e)
            })?;
        self.sign(verb, resource_type, resource_link, date)
    }
}
