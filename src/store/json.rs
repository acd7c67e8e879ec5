use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, ensure, Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::query::{product_page, review_page};
use super::{KeyValueStore, RecordStore, CATALOG_KEY, DEMO_MODE_KEY};
use crate::models::{
    rating_is_valid, LocalProductId, NewReview, Page, Product, ProductQuery, Review, ReviewId,
    ReviewPatch, ReviewQuery, RATING_RANGE,
};

/// Demo catalog serialized as JSON under a single durable key
///
/// Mutations are applied to a copy and only become visible once the copy
/// has been persisted.
pub struct JsonRecordStore {
    kv: Arc<dyn KeyValueStore>,
    catalog: Mutex<Vec<Product>>,
}

impl JsonRecordStore {
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let catalog = match kv.get(CATALOG_KEY)? {
            Some(raw) => serde_json::from_str(&raw).context("Failed to parse stored catalog")?,
            None => Vec::new(),
        };

        let store = Self {
            kv,
            catalog: Mutex::new(catalog),
        };

        info!(products = store.lock()?.len(), "Opened local record store");

        Ok(store)
    }

    /// Replace the catalog with a bundled dataset
    pub fn seed(&self, mut products: Vec<Product>) -> Result<()> {
        for product in &mut products {
            if !product.reviews.is_empty() {
                product.refresh_aggregates();
            }
        }

        let mut catalog = self.lock()?;
        self.persist(&products)?;
        *catalog = products;

        info!(products = catalog.len(), "Seeded local catalog");

        Ok(())
    }

    /// Seed from a JSON file holding an array of products
    pub fn seed_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
        let products: Vec<Product> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file: {}", path.display()))?;
        self.seed(products)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Product>>> {
        self.catalog
            .lock()
            .map_err(|_| anyhow!("local catalog lock poisoned"))
    }

    fn persist(&self, catalog: &[Product]) -> Result<()> {
        let content = serde_json::to_string(catalog)?;
        self.kv.set(CATALOG_KEY, &content)
    }

    fn next_review_id(catalog: &[Product]) -> ReviewId {
        let max = catalog
            .iter()
            .flat_map(|p| p.reviews.iter())
            .map(|r| r.id.0)
            .max()
            .unwrap_or(0);
        ReviewId(max + 1)
    }
}

impl RecordStore for JsonRecordStore {
    fn products_page(&self, query: &ProductQuery) -> Result<Page<Product>> {
        let catalog = self.lock()?.clone();
        Ok(product_page(catalog, query))
    }

    fn product(&self, id: LocalProductId) -> Result<Option<Product>> {
        let catalog = self.lock()?;
        Ok(catalog.iter().find(|p| p.local_id() == id).cloned())
    }

    fn reviews_page(
        &self,
        id: LocalProductId,
        query: &ReviewQuery,
    ) -> Result<Option<Page<Review>>> {
        let reviews = {
            let catalog = self.lock()?;
            match catalog.iter().find(|p| p.local_id() == id) {
                Some(product) => product.reviews.clone(),
                None => return Ok(None),
            }
        };
        Ok(Some(review_page(reviews, query)))
    }

    fn append_review(&self, id: LocalProductId, review: NewReview) -> Result<Review> {
        ensure!(
            rating_is_valid(review.rating),
            "Rating {} is outside {}..={}",
            review.rating,
            RATING_RANGE.start(),
            RATING_RANGE.end()
        );

        let mut catalog = self.lock()?;
        let mut next = catalog.clone();
        let review_id = Self::next_review_id(&next);
        let now = Utc::now();

        let product = next
            .iter_mut()
            .find(|p| p.local_id() == id)
            .with_context(|| format!("Product {} is not in the local catalog", id))?;

        let created = Review {
            id: review_id,
            product_id: id.0,
            reviewer_name: review.reviewer_name,
            rating: review.rating,
            comment: review.comment,
            helpful_count: 0,
            device_id: review.device_id,
            created_at: Some(now),
            updated_at: Some(now),
        };

        product.reviews.push(created.clone());
        product.refresh_aggregates();
        self.persist(&next)?;
        *catalog = next;

        debug!(product = %id, review = %created.id, "Appended local review");

        Ok(created)
    }

    fn update_review(&self, id: ReviewId, patch: ReviewPatch) -> Result<Option<Review>> {
        if let Some(rating) = patch.rating {
            ensure!(
                rating_is_valid(rating),
                "Rating {} is outside {}..={}",
                rating,
                RATING_RANGE.start(),
                RATING_RANGE.end()
            );
        }

        let mut catalog = self.lock()?;
        let mut next = catalog.clone();

        let Some(product) = next
            .iter_mut()
            .find(|p| p.reviews.iter().any(|r| r.id == id))
        else {
            warn!(review = %id, "Review not found in local catalog");
            return Ok(None);
        };

        let updated = {
            let Some(review) = product.reviews.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            if let Some(name) = patch.reviewer_name {
                review.reviewer_name = Some(name);
            }
            if let Some(rating) = patch.rating {
                review.rating = rating;
            }
            if let Some(comment) = patch.comment {
                review.comment = Some(comment);
            }
            if let Some(device_id) = patch.device_id {
                review.device_id = Some(device_id);
            }
            review.updated_at = Some(Utc::now());
            review.clone()
        };

        product.refresh_aggregates();
        self.persist(&next)?;
        *catalog = next;

        debug!(review = %id, "Updated local review");

        Ok(Some(updated))
    }

    fn delete_review(&self, id: ReviewId) -> Result<bool> {
        let mut catalog = self.lock()?;
        let mut next = catalog.clone();

        let mut removed = false;
        for product in next.iter_mut() {
            let before = product.reviews.len();
            product.reviews.retain(|r| r.id != id);
            if product.reviews.len() != before {
                product.refresh_aggregates();
                removed = true;
            }
        }

        if removed {
            self.persist(&next)?;
            *catalog = next;
            debug!(review = %id, "Deleted local review");
        }

        Ok(removed)
    }

    fn demo_mode(&self) -> Result<bool> {
        let raw = self.kv.get(DEMO_MODE_KEY)?;
        Ok(raw
            .and_then(|v| serde_json::from_str::<bool>(v.trim()).ok())
            .unwrap_or(true))
    }

    fn set_demo_mode(&self, demo: bool) -> Result<()> {
        self.kv.set(DEMO_MODE_KEY, &demo.to_string())
    }
}
