use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use pretty_assertions::assert_eq;
use tokio::sync::RwLock;

use crate::{
    request_metadata::{X_MS_DATE_HEADER_NAME, X_MS_VERSION_HEADER_NAME},
    service::{
        BackendCollectionFetcher, BackendCollectionResolver, CollectionRid,
        PartitionKeyRangeIdentity, ResolutionContext, ResourceAddress,
        authz::MasterKeyAuthorization,
        error::ResolveCollectionError,
        transport::{ResourceReader, classify_failure},
    },
};

const MASTER_KEY: &str = "c2VjcmV0LW1hc3Rlci1rZXktZm9yLXRlc3Rz";
const ORDERS_RID: &str = "PaYSAPH7qAo=";
const RECREATED_ORDERS_RID: &str = "PaYSAJ4oNWw=";

/// Serves JSON documents by path and records every request it receives.
#[derive(Debug, Default)]
struct StaticGateway {
    resources: RwLock<HashMap<String, Bytes>>,
    requests: RwLock<Vec<(String, HeaderMap)>>,
}

impl StaticGateway {
    async fn serve(&self, path: &str, body: String) {
        self.resources
            .write()
            .await
            .insert(path.to_string(), Bytes::from(body));
    }

    async fn requested_paths(&self) -> Vec<String> {
        self.requests
            .read()
            .await
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl ResourceReader for StaticGateway {
    async fn read_resource(
        &self,
        path: &str,
        headers: HeaderMap,
    ) -> Result<Bytes, ResolveCollectionError> {
        self.requests
            .write()
            .await
            .push((path.to_string(), headers));
        self.resources.read().await.get(path).cloned().ok_or_else(|| {
            classify_failure(
                path,
                StatusCode::NOT_FOUND,
                &HeaderMap::new(),
                br#"{"code": "NotFound", "message": "Resource Not Found"}"#,
            )
        })
    }
}

fn orders_json(rid: &str) -> String {
    serde_json::json!({
        "id": "orders",
        "_rid": rid,
        "_self": format!("dbs/PaYSAA==/colls/{rid}/"),
        "_etag": "\"00000000-0000-0000-0000-000000000000\"",
        "_ts": 1_700_000_000,
        "partitionKey": {"paths": ["/customerId"], "kind": "Hash"}
    })
    .to_string()
}

async fn resolver(
    gateway: StaticGateway,
) -> BackendCollectionResolver<StaticGateway, MasterKeyAuthorization> {
    gateway
        .serve("dbs/shop/colls/orders", orders_json(ORDERS_RID))
        .await;
    gateway
        .serve(&format!("colls/{ORDERS_RID}"), orders_json(ORDERS_RID))
        .await;
    let authorization = MasterKeyAuthorization::from_base64(MASTER_KEY).unwrap();
    BackendCollectionResolver::new(
        BackendCollectionFetcher::new(gateway, authorization, "2018-12-31"),
        16,
    )
}

fn gateway_of(
    resolver: &BackendCollectionResolver<StaticGateway, MasterKeyAuthorization>,
) -> &StaticGateway {
    resolver.fetcher().reader()
}

fn orders_context() -> ResolutionContext {
    ResolutionContext::new(ResourceAddress::name_based("dbs/shop/colls/orders/docs/1").unwrap())
}

#[tokio::test]
async fn test_name_resolution_seeds_rid_lookups() {
    let resolver = resolver(StaticGateway::default()).await;

    let mut context = orders_context();
    let metadata = resolver.resolve(&mut context).await.unwrap();
    assert_eq!(metadata.name, "orders");
    assert_eq!(metadata.rid, ORDERS_RID);
    assert_eq!(
        context.resolved_collection_rid,
        Some(CollectionRid::new(ORDERS_RID))
    );

    // Retry with the same context and an id-based address for the same collection.
    resolver.resolve(&mut context).await.unwrap();
    let mut by_id = ResolutionContext::new(
        ResourceAddress::id_based(&format!("dbs/PaYSAA==/colls/{ORDERS_RID}/docs/AAAA")).unwrap(),
    );
    let metadata = resolver.resolve(&mut by_id).await.unwrap();
    assert_eq!(metadata.name, "orders");

    let gateway = gateway_of(&resolver);
    assert_eq!(gateway.requested_paths().await, vec!["dbs/shop/colls/orders"]);
    let requests = gateway.requests.read().await;
    let (_, headers) = &requests[0];
    assert!(headers.contains_key(X_MS_DATE_HEADER_NAME));
    assert_eq!(headers[X_MS_VERSION_HEADER_NAME], "2018-12-31");
    assert!(
        headers[AUTHORIZATION]
            .to_str()
            .unwrap()
            .starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D")
    );
}

#[tokio::test]
async fn test_forced_refresh_picks_up_recreated_collection() {
    let resolver = resolver(StaticGateway::default()).await;
    let mut context = orders_context();
    resolver.resolve(&mut context).await.unwrap();

    gateway_of(&resolver)
        .serve("dbs/shop/colls/orders", orders_json(RECREATED_ORDERS_RID))
        .await;
    context.force_name_cache_refresh = true;
    let metadata = resolver.resolve(&mut context).await.unwrap();

    assert_eq!(metadata.rid, RECREATED_ORDERS_RID);
    assert!(!context.force_name_cache_refresh);
    assert_eq!(
        context.resolved_collection_rid,
        Some(CollectionRid::new(RECREATED_ORDERS_RID))
    );
    assert_eq!(
        gateway_of(&resolver).requested_paths().await,
        vec!["dbs/shop/colls/orders", "dbs/shop/colls/orders"]
    );
}

#[tokio::test]
async fn test_pinned_partition_of_deleted_collection_is_invalid() {
    let resolver = resolver(StaticGateway::default()).await;

    let mut context = orders_context();
    context.partition_key_range_identity = Some(PartitionKeyRangeIdentity::new(
        Some(CollectionRid::new(RECREATED_ORDERS_RID)),
        "0",
    ));
    let error = resolver.resolve(&mut context).await.unwrap_err();
    assert!(error.requires_name_cache_refresh());
    let ResolveCollectionError::InvalidPartition(invalid) = error else {
        panic!("expected InvalidPartition, got {error:?}");
    };
    assert_eq!(invalid.collection_rid, RECREATED_ORDERS_RID);
    assert_eq!(invalid.partition_key_range_id, "0");
    assert_eq!(
        gateway_of(&resolver).requested_paths().await,
        vec![format!("colls/{RECREATED_ORDERS_RID}")]
    );
}
