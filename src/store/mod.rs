pub mod json;
pub mod kv;
pub mod query;

pub use json::JsonRecordStore;
pub use kv::{FileKvStore, KeyValueStore};

use anyhow::Result;

use crate::models::{
    LocalProductId, NewReview, Page, Product, ProductQuery, Review, ReviewId, ReviewPatch,
    ReviewQuery,
};

/// Durable key holding the demo-mode flag
pub const DEMO_MODE_KEY: &str = "demo_mode";
/// Durable key holding the bundled catalog
pub const CATALOG_KEY: &str = "demo_catalog_v1";
/// Durable key holding the favorite product ids
pub const WISHLIST_KEY: &str = "wishlist_product_ids_v1";

/// Trait for the local (demo) record backends
///
/// Lookups never fail for lack of data: an unknown product is `None`, an
/// empty result is a well-formed empty page.
pub trait RecordStore: Send + Sync {
    /// Page of the catalog filtered and sorted like the remote listing
    fn products_page(&self, query: &ProductQuery) -> Result<Page<Product>>;

    /// Load a product by its local id
    fn product(&self, id: LocalProductId) -> Result<Option<Product>>;

    /// Page of a product's reviews, `None` when the product is unknown
    fn reviews_page(&self, id: LocalProductId, query: &ReviewQuery)
        -> Result<Option<Page<Review>>>;

    /// Attach a new review to a product
    fn append_review(&self, id: LocalProductId, review: NewReview) -> Result<Review>;

    /// Apply a patch to an existing review, `None` when it does not exist
    fn update_review(&self, id: ReviewId, patch: ReviewPatch) -> Result<Option<Review>>;

    /// Remove a review, returning whether anything was removed
    fn delete_review(&self, id: ReviewId) -> Result<bool>;

    /// Persisted demo-mode flag, `true` until a remote call succeeds
    fn demo_mode(&self) -> Result<bool>;

    fn set_demo_mode(&self, demo: bool) -> Result<()>;
}
