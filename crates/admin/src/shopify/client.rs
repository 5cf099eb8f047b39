//! Per-shop HTTP client with 429 retry.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::instrument;
use url::Url;

use super::{GraphQLError, RetryPolicy, ShopifyError};
use crate::config::ShopifyConfig;
use crate::models::Shop;

/// Shopify Admin API client bound to one shop.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    http: reqwest::Client,
    base_url: Url,
    api_version: String,
    access_token: SecretString,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_version", &self.inner.api_version)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Serialize)]
struct GraphQLRequest<'a, V> {
    query: &'a str,
    variables: V,
}

/// Normalize a stored shop URL into an API base URL.
///
/// Bare domains (`my-shop.myshopify.com`) get `https://`; full URLs keep
/// their scheme, host and port.
///
/// # Errors
///
/// Returns `ShopifyError::InvalidShopUrl` if the result is not an HTTP(S)
/// URL with a host.
pub fn shop_base_url(shop_url: &str) -> Result<Url, ShopifyError> {
    let trimmed = shop_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ShopifyError::InvalidShopUrl(shop_url.to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        format!("{trimmed}/")
    } else {
        format!("https://{trimmed}/")
    };

    let url =
        Url::parse(&with_scheme).map_err(|e| ShopifyError::InvalidShopUrl(format!("{shop_url}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ShopifyError::InvalidShopUrl(shop_url.to_string()));
    }
    Ok(url)
}

impl ShopifyClient {
    /// Create a client for a shop URL and access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::InvalidShopUrl` if the URL cannot be used.
    pub fn new(
        http: reqwest::Client,
        shop_url: &str,
        access_token: SecretString,
        config: &ShopifyConfig,
    ) -> Result<Self, ShopifyError> {
        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                http,
                base_url: shop_base_url(shop_url)?,
                api_version: config.api_version.clone(),
                access_token,
                retry: config.retry.clone(),
            }),
        })
    }

    /// Create a client for a registered shop.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::InvalidShopUrl` if the shop URL cannot be used.
    pub fn for_shop(
        http: reqwest::Client,
        shop: &Shop,
        config: &ShopifyConfig,
    ) -> Result<Self, ShopifyError> {
        Self::new(http, &shop.shopify_url, shop.access_token.clone(), config)
    }

    /// Batching and retry settings used by this client.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// `{base}/admin/api/{version}/{path}`.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ShopifyError> {
        self.inner
            .base_url
            .join(&format!("admin/api/{}/{path}", self.inner.api_version))
            .map_err(|e| ShopifyError::InvalidShopUrl(e.to_string()))
    }

    /// GET a URL, retrying on 429.
    pub(crate) async fn get(&self, url: &Url) -> Result<reqwest::Response, ShopifyError> {
        self.send(|http| http.get(url.clone())).await
    }

    /// PUT a JSON body, retrying on 429.
    pub(crate) async fn put_json<B: Serialize>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<reqwest::Response, ShopifyError> {
        self.send(|http| http.put(url.clone()).json(body)).await
    }

    /// Run a GraphQL query, retrying on 429.
    #[instrument(skip(self, query, variables))]
    pub(crate) async fn graphql<V, T>(&self, query: &str, variables: V) -> Result<T, ShopifyError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let endpoint = self.endpoint("graphql.json")?;
        let request = GraphQLRequest { query, variables };

        let response = self
            .send(|http| http.post(endpoint.clone()).json(&request))
            .await?;

        let body = response.text().await?;
        let graphql_response: GraphQLResponse<T> = serde_json::from_str(&body)?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            return Err(ShopifyError::GraphQL(errors));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }

    /// Send the request built by `build` until it succeeds, fails with
    /// something other than a 429, or the retry budget is spent.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, ShopifyError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let policy = &self.inner.retry;
        let mut retries = 0;
        loop {
            let result = match build(&self.inner.http)
                .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
                .send()
                .await
            {
                Ok(response) => check_status(response).await,
                Err(e) => Err(ShopifyError::Http(e)),
            };

            match result {
                Err(ShopifyError::RateLimited(retry_after)) if policy.can_retry(retries) => {
                    let delay = policy.delay_for(retries);
                    retries += 1;
                    tracing::warn!(
                        retry = retries,
                        max_retries = policy.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        retry_after,
                        "Rate limited by Shopify, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

/// Turn a non-success response into the matching error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ShopifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);
        return Err(ShopifyError::RateLimited(retry_after));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ShopifyError::Unauthorized(
            "Invalid or expired access token".to_string(),
        ));
    }

    let body = response.text().await.unwrap_or_default();
    Err(ShopifyError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_domain_gets_https() {
        let url = shop_base_url("atelier.myshopify.com").unwrap();
        assert_eq!(url.as_str(), "https://atelier.myshopify.com/");
    }

    #[test]
    fn test_full_url_keeps_scheme_and_port() {
        let url = shop_base_url("http://127.0.0.1:8181/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8181/");
    }

    #[test]
    fn test_invalid_urls_rejected() {
        assert!(matches!(shop_base_url("  "), Err(ShopifyError::InvalidShopUrl(_))));
        assert!(matches!(
            shop_base_url("ftp://atelier.myshopify.com"),
            Err(ShopifyError::InvalidShopUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_includes_api_version() {
        let client = ShopifyClient::new(
            reqwest::Client::new(),
            "atelier.myshopify.com",
            SecretString::from("shpat_test"),
            &ShopifyConfig::default(),
        )
        .unwrap();
        let url = client.endpoint("products.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://atelier.myshopify.com/admin/api/2025-01/products.json"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = ShopifyClient::new(
            reqwest::Client::new(),
            "atelier.myshopify.com",
            SecretString::from("shpat_super_secret"),
            &ShopifyConfig::default(),
        )
        .unwrap();
        let debug_output = format!("{client:?}");
        assert!(!debug_output.contains("shpat_super_secret"));
    }
}
