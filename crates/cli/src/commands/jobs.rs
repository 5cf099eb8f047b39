//! Batch jobs run from the command line.
//!
//! Each job runs through the same service code the HTTP API streams, and the
//! progress events are written to the log instead of an SSE response.

use futures::{Stream, StreamExt};
use ivy_admin::config::{ConfigError, IvyConfig};
use ivy_admin::db::create_pool;
use ivy_admin::models::ApplyTarget;
use ivy_admin::error::AppError;
use ivy_admin::services::{
    PriceRuleService, ServiceContext, spawn_with_progress, sync_inventory as run_sync,
};
use ivy_admin::state::AppState;
use ivy_core::progress::{ProgressEvent, ProgressKind};
use ivy_core::{PriceRuleId, ShopId};
use thiserror::Error;

/// Errors that can occur while running a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Job reported {0} error(s)")]
    Failed(usize),
}

async fn context() -> Result<ServiceContext, JobError> {
    let config = IvyConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    let state = AppState::new(config, pool)?;
    Ok(state.services().clone())
}

/// Write events to the log until `DONE`; returns how many were errors.
async fn drain(events: impl Stream<Item = ProgressEvent>) -> usize {
    let mut errors = 0;
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        if event.is_done() {
            break;
        }
        match event.kind {
            ProgressKind::Error => {
                errors += 1;
                tracing::error!("{}", event.message);
            }
            ProgressKind::Warning => tracing::warn!("{}", event.message),
            _ => tracing::info!("{}", event.message),
        }
    }
    errors
}

fn outcome(errors: usize) -> Result<(), JobError> {
    if errors == 0 {
        Ok(())
    } else {
        Err(JobError::Failed(errors))
    }
}

/// Mirror a shop's catalog, costs and stock levels.
///
/// # Errors
///
/// Returns `JobError` if setup fails or the sync reported errors.
pub async fn sync_inventory(shop_id: ShopId, product_type: Option<String>) -> Result<(), JobError> {
    let ctx = context().await?;

    let events = spawn_with_progress(move |progress| async move {
        run_sync(&ctx, shop_id, product_type.as_deref(), &progress)
            .await
            .map(|_| ())
    });

    outcome(drain(events).await)
}

/// Apply one price rule, or all active rules of a shop.
///
/// # Errors
///
/// Returns `JobError` if setup fails or any rule reported errors.
pub async fn apply_price_rules(
    shop_id: ShopId,
    rule_id: Option<PriceRuleId>,
    target: ApplyTarget,
) -> Result<(), JobError> {
    let ctx = context().await?;

    let events = spawn_with_progress(move |progress| async move {
        let service = PriceRuleService::new(&ctx);
        let summary = match rule_id {
            Some(rule_id) => {
                let rule = service.get(rule_id).await?;
                if rule.shop_id != shop_id {
                    return Err(AppError::BadRequest(format!(
                        "price rule {rule_id} does not belong to shop {shop_id}"
                    )));
                }
                service.apply_rule(rule_id, target, &progress).await
            }
            None => service.apply_all(shop_id, target, &progress).await,
        };
        summary.map(|_| ())
    });

    outcome(drain(events).await)
}
