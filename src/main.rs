use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront_sync::{
    Config, DualSourceFetcher, FileKvStore, JsonRecordStore, KeyValueStore, LocalProductId,
    NewReview, ProductQuery, ReviewId, ReviewPatch, ReviewQuery, SortDirection, Wishlist,
};

#[derive(Parser)]
#[command(name = "storefront-sync")]
#[command(about = "Local-first storefront data access with live/demo fallback")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = ".storefront/config.yml")]
    config: PathBuf,

    /// Override the local data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the remote service base URL
    #[arg(long, env = "STOREFRONT_API_URL")]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products {
        #[arg(long, default_value_t = 0)]
        page: u64,

        #[arg(long, default_value_t = 20)]
        size: u64,

        #[arg(long, default_value = "createdAt")]
        sort_by: String,

        #[arg(long, default_value = "DESC")]
        sort_dir: SortDirection,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        min_rating: Option<f64>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,
    },

    /// Show one product
    Product {
        /// Local product ID
        id: u64,
    },

    /// List a product's reviews
    Reviews {
        /// Local product ID
        product_id: u64,

        #[arg(long, default_value_t = 0)]
        page: u64,

        #[arg(long, default_value_t = 20)]
        size: u64,

        #[arg(long, default_value = "createdAt")]
        sort_by: String,

        #[arg(long, default_value = "DESC")]
        sort_dir: SortDirection,

        #[arg(long)]
        min_rating: Option<u8>,
    },

    /// Write a review
    ReviewCreate {
        /// Local product ID
        product_id: u64,

        #[arg(long)]
        rating: u8,

        #[arg(long)]
        comment: Option<String>,

        #[arg(long, env = "USER")]
        name: Option<String>,

        #[arg(long)]
        device_id: Option<String>,
    },

    /// Edit a review
    ReviewUpdate {
        id: u64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        rating: Option<u8>,

        #[arg(long)]
        comment: Option<String>,

        #[arg(long)]
        device_id: Option<String>,
    },

    /// Delete a review
    ReviewDelete {
        id: u64,

        #[arg(long)]
        device_id: Option<String>,
    },

    /// Toggle a helpful vote on a review
    Helpful {
        id: u64,

        #[arg(long)]
        device_id: Option<String>,
    },

    /// Show or toggle favorite products
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },

    /// Print the last known data source mode
    Mode,

    /// Replace the local catalog with a JSON product array
    Seed { file: PathBuf },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Print favorite product IDs
    List,

    /// Add or remove a product ID
    Toggle { id: u64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("storefront_sync=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(url) = cli.base_url {
        config.api.base_url = url;
    }

    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKvStore::new(&config.storage.data_dir)?);
    let store = Arc::new(JsonRecordStore::open(Arc::clone(&kv))?);

    if let Some(seed) = &config.storage.seed_file {
        if store.is_empty()? {
            store
                .seed_from_file(seed)
                .with_context(|| format!("Failed to seed catalog from {}", seed.display()))?;
        }
    }

    let fetcher = DualSourceFetcher::from_config(Arc::clone(&store), &config);

    match cli.command {
        Commands::Products {
            page,
            size,
            sort_by,
            sort_dir,
            category,
            search,
            min_rating,
            min_price,
            max_price,
        } => {
            let query = ProductQuery {
                page,
                size,
                sort_by,
                sort_dir,
                category,
                search,
                min_rating,
                min_price,
                max_price,
            };
            print_json(&fetcher.list_products(&query).await?)?;
        }
        Commands::Product { id } => {
            print_json(&fetcher.get_product(LocalProductId(id)).await?)?;
        }
        Commands::Reviews {
            product_id,
            page,
            size,
            sort_by,
            sort_dir,
            min_rating,
        } => {
            let query = ReviewQuery {
                page,
                size,
                sort_by,
                sort_dir,
                min_rating,
            };
            print_json(
                &fetcher
                    .list_reviews(LocalProductId(product_id), &query)
                    .await?,
            )?;
        }
        Commands::ReviewCreate {
            product_id,
            rating,
            comment,
            name,
            device_id,
        } => {
            let review = NewReview {
                product_id: LocalProductId(product_id),
                reviewer_name: name,
                rating,
                comment,
                device_id: Some(resolve_device_id(kv.as_ref(), device_id)?),
            };
            print_json(&fetcher.create_review(review).await?)?;
        }
        Commands::ReviewUpdate {
            id,
            name,
            rating,
            comment,
            device_id,
        } => {
            let patch = ReviewPatch {
                reviewer_name: name,
                rating,
                comment,
                device_id,
            };
            print_json(&fetcher.update_review(ReviewId(id), patch).await?)?;
        }
        Commands::ReviewDelete { id, device_id } => {
            let device_id = resolve_device_id(kv.as_ref(), device_id)?;
            print_json(&fetcher.delete_review(ReviewId(id), &device_id).await?)?;
        }
        Commands::Helpful { id, device_id } => {
            let device_id = resolve_device_id(kv.as_ref(), device_id)?;
            print_json(&fetcher.toggle_helpful(ReviewId(id), &device_id).await?)?;
        }
        Commands::Wishlist { action } => {
            let wishlist = Wishlist::new(Arc::clone(&kv));
            let ids = match action {
                WishlistAction::List => wishlist.ids()?,
                WishlistAction::Toggle { id } => wishlist.toggle(id)?,
            };
            print_json(&ids)?;
        }
        Commands::Mode => {
            println!("{}", fetcher.mode());
            return Ok(());
        }
        Commands::Seed { file } => {
            store.seed_from_file(&file)?;
            println!("Seeded catalog from {}", file.display());
            return Ok(());
        }
    }

    info!(mode = %fetcher.mode(), "Done");

    Ok(())
}

const DEVICE_ID_KEY: &str = "device_id";

/// Explicit id, else the persisted one, else a fresh one that gets persisted
fn resolve_device_id(kv: &dyn KeyValueStore, explicit: Option<String>) -> Result<String> {
    if let Some(id) = explicit {
        return Ok(id);
    }
    if let Some(id) = kv.get(DEVICE_ID_KEY)? {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    kv.set(DEVICE_ID_KEY, &id)?;
    Ok(id)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_update_accepts_name() {
        let cli = Cli::try_parse_from([
            "storefront-sync",
            "review-update",
            "4",
            "--name",
            "Kim",
            "--rating",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::ReviewUpdate {
                id, name, rating, ..
            } => {
                assert_eq!(id, 4);
                assert_eq!(name.as_deref(), Some("Kim"));
                assert_eq!(rating, Some(5));
            }
            _ => panic!("expected review-update"),
        }
    }

    #[test]
    fn test_wishlist_subcommands() {
        let cli = Cli::try_parse_from(["storefront-sync", "wishlist", "toggle", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Wishlist {
                action: WishlistAction::Toggle { id: 7 }
            }
        ));

        let cli = Cli::try_parse_from(["storefront-sync", "wishlist", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Wishlist {
                action: WishlistAction::List
            }
        ));

        assert!(Cli::try_parse_from(["storefront-sync", "wishlist", "7"]).is_err());
    }
}
