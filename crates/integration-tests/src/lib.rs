//! Integration tests for Ivy.
//!
//! # Running Tests
//!
//! ```bash
//! # Fake Shopify server and router tests (no database needed)
//! cargo test -p ivy-integration-tests
//!
//! # Database-backed workflow tests
//! IVY_TEST_DATABASE_URL=postgres://... cargo test -p ivy-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `shopify_*` - Shopify client against an in-process fake Admin API
//! - `api_router` - HTTP routing, extraction and validation
//! - `api_workflow` - Sync, stats and supplier orders against `PostgreSQL`
//!
//! Helpers here are shared by every test binary.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use tokio::sync::mpsc;

use ivy_admin::config::ShopifyConfig;
use ivy_admin::services::ProgressReporter;
use ivy_admin::shopify::{RetryPolicy, ShopifyClient};
use ivy_core::progress::{ProgressEvent, ProgressKind};

/// Access token the fake server expects.
pub const TEST_TOKEN: &str = "shpat_integration_test";

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Shopify settings with millisecond delays so retry tests run fast.
#[must_use]
pub fn fast_config(batch_size: usize, max_retries: u32) -> ShopifyConfig {
    ShopifyConfig {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            batch_size,
            batch_pause: Duration::from_millis(1),
            max_retries,
            first_retry_delay: Duration::from_millis(5),
            backoff_base: Duration::from_millis(5),
        },
        ..ShopifyConfig::default()
    }
}

/// Client for the fake server at `base_url`.
#[must_use]
pub fn client(base_url: &str, config: &ShopifyConfig) -> ShopifyClient {
    ShopifyClient::new(
        reqwest::Client::new(),
        base_url,
        SecretString::from(TEST_TOKEN),
        config,
    )
    .unwrap()
}

/// Reporter whose events are collected by [`collect`].
#[must_use]
pub fn reporter() -> (ProgressReporter, mpsc::UnboundedReceiver<ProgressEvent>) {
    ProgressReporter::channel()
}

/// Drop the reporter and gather everything it emitted.
pub async fn collect(
    reporter: ProgressReporter,
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
) -> Vec<ProgressEvent> {
    drop(reporter);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Events of one kind.
#[must_use]
pub fn of_kind(events: &[ProgressEvent], kind: ProgressKind) -> Vec<&ProgressEvent> {
    events.iter().filter(|e| e.kind == kind).collect()
}

/// Whether the request carried the expected access token.
#[must_use]
pub fn authorized(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get("X-Shopify-Access-Token")
        .and_then(|v| v.to_str().ok())
        == Some(TEST_TOKEN)
}
