//! Ivy CLI - database migrations, shop registration and batch jobs.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ivy-cli migrate
//!
//! # Register a shop (token may also come from SHOPIFY_ACCESS_TOKEN)
//! ivy-cli shop create -n "Atelier" -u atelier.myshopify.com -t shpat_...
//!
//! # Mirror the Shopify catalog into the database
//! ivy-cli sync inventory --shop <uuid> --product-type Yarn
//!
//! # Apply every active price rule to Shopify costs
//! ivy-cli price-rules apply --shop <uuid> --target shopify
//! ```
//!
//! Batch jobs print the same progress log the dashboard streams.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};
use ivy_admin::models::ApplyTarget;
use ivy_core::{PriceRuleId, ShopId};

mod commands;

#[derive(Parser)]
#[command(name = "ivy-cli")]
#[command(author, version, about = "Ivy CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage connected shops
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
    /// Synchronize data from Shopify
    Sync {
        #[command(subcommand)]
        what: SyncTarget,
    },
    /// Run price rules
    PriceRules {
        #[command(subcommand)]
        action: PriceRuleAction,
    },
}

#[derive(Subcommand)]
enum ShopAction {
    /// Register a Shopify shop
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Shop domain or base URL
        #[arg(short, long)]
        url: String,

        /// Admin API access token
        #[arg(short, long, env = "SHOPIFY_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// List registered shops
    List,
}

#[derive(Subcommand)]
enum SyncTarget {
    /// Mirror products, variants, costs and stock levels
    Inventory {
        #[arg(long)]
        shop: ShopId,

        /// Only sync products of this type
        #[arg(long)]
        product_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum PriceRuleAction {
    /// Apply one rule, or every active rule of the shop
    Apply {
        #[arg(long)]
        shop: ShopId,

        /// Apply only this rule
        #[arg(long)]
        rule: Option<PriceRuleId>,

        #[arg(long, value_enum, default_value_t = Target::Shopify)]
        target: Target,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Shopify,
    Orders,
}

impl From<Target> for ApplyTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Shopify => Self::Shopify,
            Target::Orders => Self::Orders,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Shop { action } => match action {
            ShopAction::Create { name, url, token } => {
                commands::shop::create(&name, &url, token).await?;
            }
            ShopAction::List => commands::shop::list().await?,
        },
        Commands::Sync { what } => match what {
            SyncTarget::Inventory { shop, product_type } => {
                commands::jobs::sync_inventory(shop, product_type).await?;
            }
        },
        Commands::PriceRules { action } => match action {
            PriceRuleAction::Apply { shop, rule, target } => {
                commands::jobs::apply_price_rules(shop, rule, target.into()).await?;
            }
        },
    }
    Ok(())
}
