use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::ApiConfig;
use crate::error::{FetchError, FetchResult};
use crate::models::{
    HelpfulVote, NewReview, Page, Product, ProductQuery, RemoteProductId, Review, ReviewId,
    ReviewPatch, ReviewQuery,
};

/// Client for the product-review service
///
/// Every call is bounded by `timeout`; when it expires the in-flight request
/// is dropped and reported as [`FetchError::Timeout`]. Nothing is retried.
#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

/// Wire form of a new review, carrying the service's product id
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReviewBody<'a> {
    product_id: RemoteProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    reviewer_name: Option<&'a str>,
    rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.base_url.clone(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header(CONTENT_TYPE, "application/json")
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(CONTENT_TYPE, "application/json")
    }

    /// Send within the timeout and map non-success statuses to errors
    async fn send(&self, request: RequestBuilder, what: &str) -> FetchResult<Response> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let status = response.status();
        debug!(status = status.as_u16(), what, "Remote response");

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// Send and decode the JSON body, the whole exchange sharing one timeout
    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> FetchResult<T> {
        let exchange = async {
            let response = self.send(request, what).await?;
            let bytes = response.bytes().await?;
            let value = serde_json::from_slice::<T>(&bytes)
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            Ok::<T, FetchError>(value)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }

    /// `GET /products`
    #[instrument(skip(self, query), fields(page = query.page, size = query.size))]
    pub async fn list_products(&self, query: &ProductQuery) -> FetchResult<Page<Product>> {
        let request = self.get("/products").query(&query.to_params());
        self.fetch_json(request, "product listing").await
    }

    /// `GET /products/{id}`
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: RemoteProductId) -> FetchResult<Product> {
        let request = self.get(&format!("/products/{}", id));
        self.fetch_json(request, &format!("product {}", id)).await
    }

    /// `GET /reviews/product/{productId}`
    #[instrument(skip(self, query), fields(page = query.page, size = query.size))]
    pub async fn list_reviews(
        &self,
        id: RemoteProductId,
        query: &ReviewQuery,
    ) -> FetchResult<Page<Review>> {
        let request = self
            .get(&format!("/reviews/product/{}", id))
            .query(&query.to_params());
        self.fetch_json(request, &format!("reviews of product {}", id))
            .await
    }

    /// `POST /reviews`
    #[instrument(skip(self, review), fields(rating = review.rating))]
    pub async fn create_review(
        &self,
        product_id: RemoteProductId,
        review: &NewReview,
    ) -> FetchResult<Review> {
        let body = CreateReviewBody {
            product_id,
            reviewer_name: review.reviewer_name.as_deref(),
            rating: review.rating,
            comment: review.comment.as_deref(),
            device_id: review.device_id.as_deref(),
        };
        let request = self.request(reqwest::Method::POST, "/reviews").json(&body);
        self.fetch_json(request, "review creation").await
    }

    /// `PUT /reviews/{id}`
    #[instrument(skip(self, patch))]
    pub async fn update_review(&self, id: ReviewId, patch: &ReviewPatch) -> FetchResult<Review> {
        let request = self
            .request(reqwest::Method::PUT, &format!("/reviews/{}", id))
            .json(patch);
        self.fetch_json(request, &format!("review {}", id)).await
    }

    /// `DELETE /reviews/{id}?deviceId=`
    #[instrument(skip(self))]
    pub async fn delete_review(&self, id: ReviewId, device_id: &str) -> FetchResult<()> {
        let request = self
            .request(reqwest::Method::DELETE, &format!("/reviews/{}", id))
            .query(&[("deviceId", device_id)]);
        self.send(request, &format!("review {}", id)).await?;
        Ok(())
    }

    /// `POST /reviews/{id}/helpful?deviceId=`
    #[instrument(skip(self))]
    pub async fn mark_helpful(&self, id: ReviewId, device_id: &str) -> FetchResult<HelpfulVote> {
        let request = self
            .request(reqwest::Method::POST, &format!("/reviews/{}/helpful", id))
            .query(&[("deviceId", device_id)]);
        self.fetch_json(request, &format!("review {}", id)).await
    }
}
