//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::IvyConfig;
use crate::services::ServiceContext;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: IvyConfig,
    services: ServiceContext,
}

impl AppState {
    /// Build the state. One outgoing HTTP client is shared by every shop.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: IvyConfig, pool: PgPool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.shopify.timeout)
            .build()?;
        let services = ServiceContext::new(pool, http, config.shopify.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner { config, services }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &IvyConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.services.pool
    }

    /// Handles needed by the services layer.
    #[must_use]
    pub fn services(&self) -> &ServiceContext {
        &self.inner.services
    }
}
