use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::mode::{Mode, ModeController};
use crate::models::{
    rating_is_valid, HelpfulVote, LocalProductId, NewReview, Page, Product, ProductQuery,
    RemoteProductId, Review, ReviewId, ReviewPatch, ReviewQuery, RATING_RANGE,
};
use crate::remote::RemoteClient;
use crate::resolver::IdentityResolver;
use crate::store::RecordStore;

/// Local-first data access with an opportunistic remote call
///
/// Reads compute the local candidate first and return the remote result
/// only when the service answers successfully. Writes go to the service
/// first and fall back to the local store. Each operation makes exactly one
/// remote attempt and records its outcome in the [`ModeController`].
pub struct DualSourceFetcher<S: RecordStore> {
    store: Arc<S>,
    remote: RemoteClient,
    resolver: IdentityResolver,
    mode: ModeController<S>,
}

impl<S: RecordStore> DualSourceFetcher<S> {
    pub fn new(store: Arc<S>, remote: RemoteClient, resolver: IdentityResolver) -> Self {
        let mode = ModeController::new(Arc::clone(&store));
        Self {
            store,
            remote,
            resolver,
            mode,
        }
    }

    pub fn from_config(store: Arc<S>, config: &Config) -> Self {
        let remote = RemoteClient::from_config(&config.api);
        let resolver = IdentityResolver::new(remote.clone(), &config.resolver);
        Self::new(store, remote, resolver)
    }

    pub fn mode(&self) -> Mode {
        self.mode.current()
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record the outcome of a remote attempt in the mode flag
    fn settle<T>(&self, result: FetchResult<T>) -> FetchResult<T> {
        match &result {
            Ok(_) => self.mode.record_success(),
            Err(_) => self.mode.record_failure(),
        }
        result
    }

    /// Out-of-range ratings never reach the service or the local store
    fn check_rating(rating: u8) -> FetchResult<()> {
        if rating_is_valid(rating) {
            return Ok(());
        }
        Err(FetchError::InvalidInput(format!(
            "rating {} is outside {}..={}",
            rating,
            RATING_RANGE.start(),
            RATING_RANGE.end()
        )))
    }

    /// Remote id to use for a local product; falls back to the local id
    async fn remote_id(&self, id: LocalProductId, local: Option<&Product>) -> RemoteProductId {
        let resolved = match local {
            Some(product) => self.resolver.resolve(product).await,
            None => self.resolver.cached(id),
        };
        resolved.unwrap_or_else(|| RemoteProductId::assume_same(id))
    }

    /// List products, preferring the live catalog
    #[instrument(skip(self, query), fields(page = query.page, size = query.size))]
    pub async fn list_products(&self, query: &ProductQuery) -> FetchResult<Page<Product>> {
        let local = self.store.products_page(query)?;

        match self.settle(self.remote.list_products(query).await) {
            Ok(page) => {
                info!(items = page.content.len(), "Serving live products");
                Ok(page)
            }
            Err(e) => {
                info!(error = %e, "Live products unavailable, serving demo data");
                Ok(local)
            }
        }
    }

    /// Fetch one product
    ///
    /// Fails with [`FetchError::NotFound`] only when neither source has it.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: LocalProductId) -> FetchResult<Product> {
        let local = self.store.product(id)?;
        let remote_id = self.remote_id(id, local.as_ref()).await;

        match self.settle(self.remote.get_product(remote_id).await) {
            Ok(product) => {
                info!(%remote_id, "Serving live product");
                Ok(product)
            }
            Err(e) => match local {
                Some(product) => {
                    info!(error = %e, "Live product unavailable, serving demo data");
                    Ok(product)
                }
                None => {
                    warn!(error = %e, "Product unavailable from either source");
                    Err(FetchError::NotFound(format!("product {} ({})", id, e)))
                }
            },
        }
    }

    /// List a product's reviews
    #[instrument(skip(self, query), fields(page = query.page, size = query.size))]
    pub async fn list_reviews(
        &self,
        id: LocalProductId,
        query: &ReviewQuery,
    ) -> FetchResult<Page<Review>> {
        let local = self.store.reviews_page(id, query)?;
        let product = self.store.product(id)?;
        let remote_id = self.remote_id(id, product.as_ref()).await;

        match self.settle(self.remote.list_reviews(remote_id, query).await) {
            Ok(page) => {
                info!(%remote_id, items = page.content.len(), "Serving live reviews");
                Ok(page)
            }
            Err(e) => match local {
                Some(page) => {
                    info!(error = %e, "Live reviews unavailable, serving demo reviews");
                    Ok(page)
                }
                None => {
                    warn!(error = %e, "Reviews unavailable from either source");
                    Err(FetchError::NotFound(format!("reviews of product {} ({})", id, e)))
                }
            },
        }
    }

    /// Create a review, saving it locally when the service is unreachable
    #[instrument(skip(self, review), fields(product = %review.product_id, rating = review.rating))]
    pub async fn create_review(&self, review: NewReview) -> FetchResult<Review> {
        Self::check_rating(review.rating)?;
        let local_product = self.store.product(review.product_id)?;
        let remote_id = self.remote_id(review.product_id, local_product.as_ref()).await;

        match self.settle(self.remote.create_review(remote_id, &review).await) {
            Ok(created) => {
                info!(review = %created.id, "Review created on live service");
                Ok(created)
            }
            Err(e) => {
                if local_product.is_none() {
                    warn!(error = %e, "Review creation failed and product is not local");
                    return Err(FetchError::NotFound(format!(
                        "product {} ({})",
                        review.product_id, e
                    )));
                }
                info!(error = %e, "Review creation failed, saving locally");
                Ok(self.store.append_review(review.product_id, review)?)
            }
        }
    }

    /// Update a review, patching the local copy when the service is unreachable
    #[instrument(skip(self, patch))]
    pub async fn update_review(&self, id: ReviewId, patch: ReviewPatch) -> FetchResult<Review> {
        if let Some(rating) = patch.rating {
            Self::check_rating(rating)?;
        }
        match self.settle(self.remote.update_review(id, &patch).await) {
            Ok(updated) => {
                info!("Review updated on live service");
                Ok(updated)
            }
            Err(e) => {
                info!(error = %e, "Review update failed, updating locally");
                self.store
                    .update_review(id, patch)?
                    .ok_or_else(|| FetchError::NotFound(format!("review {} ({})", id, e)))
            }
        }
    }

    /// Delete a review; the local result is returned when the service is unreachable
    #[instrument(skip(self))]
    pub async fn delete_review(&self, id: ReviewId, device_id: &str) -> FetchResult<bool> {
        match self.settle(self.remote.delete_review(id, device_id).await) {
            Ok(()) => {
                info!("Review deleted on live service");
                Ok(true)
            }
            Err(e) => {
                info!(error = %e, "Review delete failed, deleting locally");
                Ok(self.store.delete_review(id)?)
            }
        }
    }

    /// Toggle a helpful vote; there is no local fallback
    #[instrument(skip(self))]
    pub async fn toggle_helpful(&self, id: ReviewId, device_id: &str) -> FetchResult<HelpfulVote> {
        let result = self.settle(self.remote.mark_helpful(id, device_id).await);
        if let Err(e) = &result {
            warn!(error = %e, "Helpful vote failed");
        }
        result
    }
}
