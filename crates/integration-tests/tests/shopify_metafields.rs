//! Variant metafields through the GraphQL `nodes` query against a fake
//! Shopify.

use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use ivy_admin::shopify::ShopifyError;
use ivy_core::{MetafieldKey, ShopifyVariantId};
use ivy_integration_tests::{client, fast_config, serve};

const GRAPHQL_PATH: &str = "/admin/api/2025-01/graphql.json";

/// Answers every requested ID except `gid://shopify/ProductVariant/404`,
/// which comes back as a null node.
async fn nodes(Json(request): Json<Value>) -> Json<Value> {
    let ids = request["variables"]["ids"].as_array().cloned().unwrap_or_default();
    let nodes: Vec<Value> = ids
        .iter()
        .map(|id| {
            let id = id.as_str().unwrap_or_default();
            if id.ends_with("/404") {
                return Value::Null;
            }
            json!({
                "id": id,
                "metafields": {"edges": [
                    {"node": {"namespace": "custom", "key": "Fabric", "value": "Lin"}},
                    {"node": {"namespace": "custom", "key": "weight", "value": "0.4"}},
                    {"node": {"namespace": "internal", "key": "note", "value": "do not copy"}}
                ]}
            })
        })
        .collect();
    Json(json!({"data": {"nodes": nodes}}))
}

#[tokio::test]
async fn test_metafields_filtered_to_configured_keys() {
    let base = serve(Router::new().route(GRAPHQL_PATH, post(nodes))).await;
    let client = client(&base, &fast_config(50, 0));

    let variants = [ShopifyVariantId::new(1), ShopifyVariantId::new(404)];
    let keys = [
        MetafieldKey::new("custom", "fabric"),
        MetafieldKey::new("custom", "weight"),
    ];
    let result = client
        .fetch_variant_metafields(&variants, &keys)
        .await
        .expect("metafields fetched");

    assert_eq!(result.len(), 1, "null nodes are skipped");
    let set = result.get(&ShopifyVariantId::new(1)).expect("variant 1");
    assert_eq!(set.get("custom", "Fabric"), Some("Lin"));
    assert_eq!(set.get("custom", "weight"), Some("0.4"));
    assert_eq!(set.get("internal", "note"), None);
}

#[tokio::test]
async fn test_no_request_without_keys() {
    // No route: any request would fail with 404.
    let base = serve(Router::new()).await;
    let client = client(&base, &fast_config(50, 0));

    let result = client
        .fetch_variant_metafields(&[ShopifyVariantId::new(1)], &[])
        .await
        .expect("nothing to fetch");
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_graphql_errors_are_returned() {
    let router = Router::new().route(
        GRAPHQL_PATH,
        post(|| async {
            Json(json!({"errors": [{"message": "Throttled", "path": []}]}))
        }),
    );
    let base = serve(router).await;
    let client = client(&base, &fast_config(50, 0));

    let result = client
        .fetch_variant_metafields(
            &[ShopifyVariantId::new(1)],
            &[MetafieldKey::new("custom", "fabric")],
        )
        .await;
    match result {
        Err(ShopifyError::GraphQL(errors)) => assert_eq!(errors[0].message, "Throttled"),
        other => panic!("expected GraphQL error, got {other:?}"),
    }
}
