//! Product listing through `Link` header pagination against a fake Shopify.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::json;

use ivy_integration_tests::{authorized, client, fast_config, serve};

const PRODUCTS_PATH: &str = "/admin/api/2025-01/products.json";

fn next_link(headers: &HeaderMap, page_info: &str) -> String {
    let host = headers
        .get("host")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("127.0.0.1");
    format!(r#"<http://{host}{PRODUCTS_PATH}?limit=250&page_info={page_info}>; rel="next""#)
}

fn product(id: i64, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "product_type": "Robe",
        "status": "active",
        "options": [{"name": "Taille", "position": 1}, {"name": "Couleur", "position": 2}],
        "variants": [{
            "id": id * 10,
            "title": "S / Rouge",
            "sku": format!("SKU-{id}"),
            "option1": "S",
            "option2": "Rouge",
            "option3": null,
            "price": "49.00",
            "inventory_item_id": id * 100
        }]
    })
}

async fn paged_products(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match query.get("page_info").map(String::as_str) {
        None => {
            assert_eq!(query.get("status").map(String::as_str), Some("active"));
            assert_eq!(query.get("limit").map(String::as_str), Some("250"));
            assert_eq!(query.get("product_type").map(String::as_str), Some("Robe"));
            (
                [("Link", next_link(&headers, "page2"))],
                Json(json!({"products": [product(1, "Robe Lin"), product(2, "Robe Soie")]})),
            )
                .into_response()
        }
        Some("page2") => Json(json!({"products": [product(3, "Robe Coton")]})).into_response(),
        Some(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

#[tokio::test]
async fn test_follows_link_header_until_last_page() {
    let base = serve(Router::new().route(PRODUCTS_PATH, get(paged_products))).await;
    let client = client(&base, &fast_config(50, 0));

    let pages: Vec<_> = client.list_active_products(Some("Robe")).collect().await;

    assert_eq!(pages.len(), 2);
    let first = pages[0].as_ref().expect("first page");
    let second = pages[1].as_ref().expect("second page");
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].title, "Robe Coton");

    let upsert = first[0].to_upsert();
    assert_eq!(upsert.option_names, vec!["Taille".to_string(), "Couleur".to_string()]);
    let variant = first[0].variants[0].to_upsert();
    assert_eq!(variant.options[1].as_deref(), Some("Rouge"));
}

#[tokio::test]
async fn test_stream_ends_after_failed_page() {
    let router = Router::new().route(
        PRODUCTS_PATH,
        get(
            |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                if query.contains_key("page_info") {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response();
                }
                (
                    [("Link", next_link(&headers, "page2"))],
                    Json(json!({"products": [product(1, "Robe Lin")]})),
                )
                    .into_response()
            },
        ),
    );
    let base = serve(router).await;
    let client = client(&base, &fast_config(50, 0));

    let pages: Vec<_> = client.list_active_products(None).collect().await;

    assert_eq!(pages.len(), 2);
    assert!(pages[0].is_ok());
    let err = pages[1].as_ref().expect_err("second page fails");
    assert!(err.to_string().contains("500"));
}
