use std::{
    error::Error as StdError,
    fmt::{Display, Formatter},
    sync::Arc,
};

use docstore_ext::ErrorModel;
use http::StatusCode;

/// Sub-status attached to `410 Gone` when the partition mapping is stale.
pub const SUB_STATUS_NAME_CACHE_IS_STALE: u32 = 1000;

macro_rules! impl_error_stack_methods {
    ($error_type:ty) => {
        impl $error_type {
            #[must_use]
            pub fn append_details(mut self, details: impl IntoIterator<Item = String>) -> Self {
                self.stack.extend(details);
                self
            }

            #[must_use]
            pub fn append_detail(mut self, detail: impl Into<String>) -> Self {
                self.stack.push(detail.into());
                self
            }

            pub fn append_detail_mut(&mut self, detail: impl Into<String>) {
                self.stack.push(detail.into());
            }
        }
    };
}

macro_rules! impl_from_with_detail {
    ($from_type:ty => $to_type:ident::$variant:ident, $detail:expr) => {
        impl From<$from_type> for $to_type {
            fn from(err: $from_type) -> Self {
                $to_type::$variant(err.append_detail($detail))
            }
        }
    };
}

/// Defines a transparent error enum over stack-carrying error structs.
///
/// Generates `From` for every variant (recording `stack_message`), detail
/// appending on the enum and `From<Enum> for ErrorModel`.
macro_rules! define_transparent_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $error_name:ident,
        stack_message: $stack_msg:expr,
        variants: [
            $($variant:ident),* $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(thiserror::Error, Debug)]
        $vis enum $error_name {
            $(
                #[error(transparent)]
                $variant($variant),
            )*
        }

        pastey::paste! {
            const [<$error_name:snake:upper _STACK>]: &str = $stack_msg;

            $(
                impl_from_with_detail!($variant => $error_name::$variant, [<$error_name:snake:upper _STACK>]);
            )*

            impl $error_name {
                #[must_use]
                pub fn append_detail(mut self, detail: impl Into<String>) -> Self {
                    self.append_detail_mut(detail);
                    self
                }

                pub fn append_detail_mut(&mut self, detail: impl Into<String>) -> &mut Self {
                    match self {
                        $(
                            $error_name::$variant(e) => {
                                e.append_detail_mut(detail);
                            }
                        )*
                    }
                    self
                }

                #[must_use]
                pub fn stack(&self) -> &[String] {
                    match self {
                        $(
                            $error_name::$variant(e) => &e.stack,
                        )*
                    }
                }
            }

            impl From<$error_name> for ErrorModel {
                fn from(err: $error_name) -> Self {
                    match err {
                        $(
                            $error_name::$variant(e) => e.into(),
                        )*
                    }
                }
            }
        }
    };
}

pub(crate) use impl_error_stack_methods;

pub(crate) fn error_chain_fmt(
    e: impl StdError,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{e}\n")?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{cause}")?;
        current = cause.source();
    }
    Ok(())
}

fn fmt_stack(stack: &[String], f: &mut Formatter<'_>) -> std::fmt::Result {
    if !stack.is_empty() {
        writeln!(f, "Stack:")?;
        for detail in stack {
            writeln!(f, "  {detail}")?;
        }
    }
    Ok(())
}

type SharedSource = Arc<dyn StdError + Send + Sync + 'static>;

fn shared_source_message(source: SharedSource) -> Box<dyn StdError + Send + Sync + 'static> {
    Box::new(SourceMessage(source.to_string()))
}

define_transparent_error! {
    /// Failure of a collection resolution.
    ///
    /// Every variant is `Clone` so a single failed fetch can be reported to
    /// all callers waiting on it.
    #[derive(Clone)]
    pub enum ResolveCollectionError,
    stack_message: "Error resolving collection",
    variants: [
        TransportError,
        CollectionNotFound,
        InvalidPartition,
        RequestEncodingError,
        PayloadDecodingError,
        InvalidResourceAddress,
        FetchAborted,
    ]
}

impl ResolveCollectionError {
    /// Transient failures that a retry policy may repeat as-is.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResolveCollectionError::TransportError(_) | ResolveCollectionError::FetchAborted(_)
        )
    }

    /// Whether the caller should refresh its name mapping before retrying.
    #[must_use]
    pub fn requires_name_cache_refresh(&self) -> bool {
        matches!(self, ResolveCollectionError::InvalidPartition(_))
    }
}

impl From<tokio::task::JoinError> for ResolveCollectionError {
    fn from(err: tokio::task::JoinError) -> Self {
        FetchAborted::from(err).into()
    }
}

/// Network or backend failure while reading a resource.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub status: Option<StatusCode>,
    pub sub_status: Option<u32>,
    pub message: String,
    pub stack: Vec<String>,
    pub source: Option<SharedSource>,
}

impl_error_stack_methods!(TransportError);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            sub_status: None,
            message: message.into(),
            stack: Vec::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode, sub_status: Option<u32>) -> Self {
        self.status = Some(status);
        self.sub_status = sub_status;
        self
    }

    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.sub_status) {
            (Some(status), Some(sub_status)) => {
                writeln!(f, "TransportError ({status}/{sub_status}): {}", self.message)?;
            }
            (Some(status), None) => writeln!(f, "TransportError ({status}): {}", self.message)?,
            (None, _) => writeln!(f, "TransportError: {}", self.message)?,
        }
        fmt_stack(&self.stack, f)?;

        if let Some(source) = self.source.as_ref() {
            writeln!(f, "Caused by:")?;
            error_chain_fmt(&**source, f)?;
        }
        Ok(())
    }
}

impl From<TransportError> for ErrorModel {
    fn from(err: TransportError) -> Self {
        let TransportError {
            status,
            sub_status,
            message,
            stack,
            source,
        } = err;

        let model = ErrorModel::new(
            format!("Error reading from the docstore gateway: {message}"),
            "TransportError",
            status.unwrap_or(StatusCode::SERVICE_UNAVAILABLE).as_u16(),
            source.map(shared_source_message),
        )
        .append_details(stack);
        match sub_status {
            Some(sub_status) => model.with_sub_status(sub_status),
            None => model,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Collection `{resource}` does not exist")]
pub struct CollectionNotFound {
    pub resource: String,
    pub stack: Vec<String>,
}

impl_error_stack_methods!(CollectionNotFound);

impl CollectionNotFound {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            stack: Vec::new(),
        }
    }
}

impl From<CollectionNotFound> for ErrorModel {
    fn from(err: CollectionNotFound) -> Self {
        ErrorModel::not_found(err.to_string(), "CollectionNotFound", None)
            .append_details(err.stack)
    }
}

/// The partition key range pinned by the caller points at a collection that
/// no longer exists. The caller must refresh its name mapping and retry.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Partition key range `{partition_key_range_id}` of collection `{collection_rid}` is no longer valid")]
pub struct InvalidPartition {
    pub collection_rid: String,
    pub partition_key_range_id: String,
    pub stack: Vec<String>,
}

impl_error_stack_methods!(InvalidPartition);

impl InvalidPartition {
    pub fn new(
        collection_rid: impl Into<String>,
        partition_key_range_id: impl Into<String>,
    ) -> Self {
        Self {
            collection_rid: collection_rid.into(),
            partition_key_range_id: partition_key_range_id.into(),
            stack: Vec::new(),
        }
    }
}

impl From<InvalidPartition> for ErrorModel {
    fn from(err: InvalidPartition) -> Self {
        ErrorModel::gone(err.to_string(), "InvalidPartition", None)
            .with_sub_status(SUB_STATUS_NAME_CACHE_IS_STALE)
            .append_details(err.stack)
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("Failed to encode request: {message}")]
pub struct RequestEncodingError {
    pub message: String,
    pub stack: Vec<String>,
    #[source]
    pub source: Option<SharedSource>,
}

impl_error_stack_methods!(RequestEncodingError);

impl RequestEncodingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Vec::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }
}

impl From<RequestEncodingError> for ErrorModel {
    fn from(err: RequestEncodingError) -> Self {
        let message = err.to_string();
        let RequestEncodingError { stack, source, .. } = err;
        ErrorModel::internal(
            message,
            "RequestEncodingError",
            source.map(shared_source_message),
        )
        .append_details(stack)
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("Failed to decode `{resource}` payload: {message}")]
pub struct PayloadDecodingError {
    pub resource: String,
    pub message: String,
    pub stack: Vec<String>,
}

impl_error_stack_methods!(PayloadDecodingError);

impl PayloadDecodingError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
            stack: Vec::new(),
        }
    }
}

impl From<PayloadDecodingError> for ErrorModel {
    fn from(err: PayloadDecodingError) -> Self {
        ErrorModel::internal(err.to_string(), "PayloadDecodingError", None)
            .append_details(err.stack)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Invalid resource address `{address}`: {reason}")]
pub struct InvalidResourceAddress {
    pub address: String,
    pub reason: String,
    pub stack: Vec<String>,
}

impl_error_stack_methods!(InvalidResourceAddress);

impl InvalidResourceAddress {
    pub fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
            stack: Vec::new(),
        }
    }
}

impl From<InvalidResourceAddress> for ErrorModel {
    fn from(err: InvalidResourceAddress) -> Self {
        ErrorModel::bad_request(err.to_string(), "InvalidResourceAddress", None)
            .append_details(err.stack)
    }
}

/// The spawned fetch panicked or its task was cancelled.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Collection fetch did not complete: {message}")]
pub struct FetchAborted {
    pub message: String,
    pub stack: Vec<String>,
}

impl_error_stack_methods!(FetchAborted);

impl From<tokio::task::JoinError> for FetchAborted {
    fn from(err: tokio::task::JoinError) -> Self {
        let message = if err.is_panic() {
            "fetch task panicked".to_string()
        } else {
            format!("fetch task was cancelled: {err}")
        };
        Self {
            message,
            stack: Vec::new(),
        }
    }
}

impl From<FetchAborted> for ErrorModel {
    fn from(err: FetchAborted) -> Self {
        ErrorModel::service_unavailable(err.to_string(), "FetchAborted", None)
            .append_details(err.stack)
    }
}

/// Owned rendering of a shared source error, as `ErrorModel` needs a `Box`.
#[derive(thiserror::Error, PartialEq, Debug)]
#[error("{0}")]
pub(crate) struct SourceMessage(pub(crate) String);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_error_model_mapping() {
        let cases: Vec<(ResolveCollectionError, u16, Option<u32>, &str)> = vec![
            (
                CollectionNotFound::new("dbs/shop/colls/orders").into(),
                404,
                None,
                "CollectionNotFound",
            ),
            (
                InvalidPartition::new("PaYSAPH7qAo=", "3").into(),
                410,
                Some(SUB_STATUS_NAME_CACHE_IS_STALE),
                "InvalidPartition",
            ),
            (
                TransportError::new("connection refused").into(),
                503,
                None,
                "TransportError",
            ),
            (
                TransportError::new("throttled")
                    .with_status(StatusCode::TOO_MANY_REQUESTS, Some(3200))
                    .into(),
                429,
                Some(3200),
                "TransportError",
            ),
            (
                RequestEncodingError::new("missing date header").into(),
                500,
                None,
                "RequestEncodingError",
            ),
            (
                PayloadDecodingError::new("colls/abc", "expected value").into(),
                500,
                None,
                "PayloadDecodingError",
            ),
            (
                InvalidResourceAddress::new("dbs/shop", "too few segments").into(),
                400,
                None,
                "InvalidResourceAddress",
            ),
        ];

        for (error, code, sub_status, r#type) in cases {
            let model = ErrorModel::from(error);
            assert_eq!(model.code, code);
            assert_eq!(model.sub_status, sub_status);
            assert_eq!(model.r#type, r#type);
            assert_eq!(model.stack, vec!["Error resolving collection".to_string()]);
        }
    }

    #[test]
    fn test_error_model_keeps_source_and_details() {
        let error: ResolveCollectionError = RequestEncodingError::new("bad header")
            .with_source(std::io::Error::other("invalid byte"))
            .append_detail("Resource: colls/abc")
            .into();
        let model = ErrorModel::from(error);
        assert_eq!(model.code, 500);
        assert_eq!(
            model.stack,
            vec![
                "Resource: colls/abc".to_string(),
                "Error resolving collection".to_string()
            ]
        );
        assert_eq!(
            model.source.map(|source| source.to_string()),
            Some("invalid byte".to_string())
        );
    }

    #[test]
    fn test_append_detail_reaches_inner_stack() {
        let error = ResolveCollectionError::from(CollectionNotFound::new("colls/abc"))
            .append_detail("while resolving pin");
        assert_eq!(
            error.stack(),
            &[
                "Error resolving collection".to_string(),
                "while resolving pin".to_string()
            ]
        );
    }

    #[test]
    fn test_classification() {
        let transient: ResolveCollectionError = TransportError::new("reset").into();
        assert!(transient.is_transient());
        assert!(!transient.requires_name_cache_refresh());

        let stale: ResolveCollectionError = InvalidPartition::new("a", "0").into();
        assert!(!stale.is_transient());
        assert!(stale.requires_name_cache_refresh());

        let fatal: ResolveCollectionError = RequestEncodingError::new("bad key").into();
        assert!(!fatal.is_transient());
    }

    #[test]
    fn test_transport_error_display_includes_status_and_source() {
        let error = TransportError::new("read failed")
            .with_status(StatusCode::SERVICE_UNAVAILABLE, Some(21008))
            .with_source(std::io::Error::other("socket closed"))
            .append_detail("colls/abc");
        let display = error.to_string();
        assert!(display.contains("TransportError (503 Service Unavailable/21008): read failed"));
        assert!(display.contains("  colls/abc"));
        assert!(display.contains("socket closed"));
    }

    #[tokio::test]
    async fn test_join_error_becomes_fetch_aborted() {
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("boom") });
        let join_error = handle.await.unwrap_err();
        let error = ResolveCollectionError::from(join_error);
        let ResolveCollectionError::FetchAborted(aborted) = error else {
            panic!("expected FetchAborted, got {error:?}");
        };
        assert_eq!(aborted.message, "fetch task panicked");
    }
}
