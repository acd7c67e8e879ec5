use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a product in the locally bundled catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalProductId(pub u64);

/// Identifier of a product on the remote service
///
/// The two id spaces are not aligned, so there is no `From` impl between
/// them. Use [`RemoteProductId::assume_same`] when there is nothing better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteProductId(pub u64);

impl RemoteProductId {
    /// Reuse a local id verbatim against the remote service.
    pub fn assume_same(local: LocalProductId) -> Self {
        Self(local.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub u64);

impl fmt::Display for LocalProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RemoteProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Star ratings a review may carry
pub const RATING_RANGE: RangeInclusive<u8> = 1..=5;

pub fn rating_is_valid(rating: u8) -> bool {
    RATING_RANGE.contains(&rating)
}

/// Product snapshot, shaped like the service's product payload
///
/// `id` is a raw number in the id space of whichever source produced the
/// record: a [`LocalProductId`] for catalog records, a [`RemoteProductId`]
/// for live ones. The fetcher's read methods return either, so only wrap a
/// returned `id` in [`LocalProductId`] when the record came from the local
/// store. [`Product::local_id`] and [`Product::remote_id`] make that choice
/// explicit at the call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub review_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
}

impl Product {
    /// `id` read as a catalog id; only meaningful for local records
    pub fn local_id(&self) -> LocalProductId {
        LocalProductId(self.id)
    }

    /// `id` read as a service id; only meaningful for live records
    pub fn remote_id(&self) -> RemoteProductId {
        RemoteProductId(self.id)
    }

    /// Recompute the rating aggregates from the embedded reviews
    pub fn refresh_aggregates(&mut self) {
        self.review_count = self.reviews.len() as u64;
        self.average_rating = if self.reviews.is_empty() {
            0.0
        } else {
            let sum: u64 = self.reviews.iter().map(|r| u64::from(r.rating)).sum();
            sum as f64 / self.reviews.len() as f64
        };
    }
}

/// A review as stored locally or returned by the service
///
/// Like [`Product::id`], `product_id` belongs to the id space of the source
/// that produced the review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: u64,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub helpful_count: u64,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /reviews`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub product_id: LocalProductId,
    pub reviewer_name: Option<String>,
    pub rating: u8,
    pub comment: Option<String>,
    pub device_id: Option<String>,
}

/// Body of `PUT /reviews/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Response of `POST /reviews/{id}/helpful`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpfulVote {
    pub review_id: ReviewId,
    pub helpful_count: u64,
    pub helpful_by_me: bool,
}

/// One page of results, identical whether built locally or by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub size: u64,
    pub number: u64,
    pub first: bool,
    pub last: bool,
}

impl<T> Page<T> {
    /// Slice `items` down to page `number` of `size` and fill in the counters
    pub fn from_items(items: Vec<T>, number: u64, size: u64) -> Self {
        let total_elements = items.len() as u64;
        let total_pages = total_pages(total_elements, size);
        let start = number.saturating_mul(size).min(total_elements);

        let content = items
            .into_iter()
            .skip(start as usize)
            .take(size as usize)
            .collect();

        Self {
            content,
            total_elements,
            total_pages,
            size,
            number,
            first: number == 0,
            last: number.saturating_add(1) >= total_pages,
        }
    }

    pub fn empty(number: u64, size: u64) -> Self {
        Self::from_items(Vec::new(), number, size)
    }
}

/// `max(1, ceil(total / size))`, or 1 when `size` is zero
pub fn total_pages(total_elements: u64, size: u64) -> u64 {
    if size == 0 {
        return 1;
    }
    total_elements.div_ceil(size).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(format!("invalid sort direction: {s}"))
        }
    }
}

pub const DEFAULT_SORT_KEY: &str = "createdAt";

/// Filters and paging for a product listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub page: u64,
    pub size: u64,
    pub sort_by: String,
    pub sort_dir: SortDirection,
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_rating: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: 20,
            sort_by: DEFAULT_SORT_KEY.to_string(),
            sort_dir: SortDirection::Desc,
            category: None,
            search: None,
            min_rating: None,
            min_price: None,
            max_price: None,
        }
    }
}

impl ProductQuery {
    /// Query parameters for `GET /products`, unset filters omitted
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("size", self.size.to_string()),
            ("sortBy", self.sort_by.clone()),
            ("sortDir", self.sort_dir.as_str().to_string()),
        ];
        if let Some(category) = self.category.as_ref().filter(|c| !c.is_empty()) {
            params.push(("category", category.clone()));
        }
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            params.push(("search", search.clone()));
        }
        if let Some(v) = self.min_rating {
            params.push(("minRating", v.to_string()));
        }
        if let Some(v) = self.min_price {
            params.push(("minPrice", v.to_string()));
        }
        if let Some(v) = self.max_price {
            params.push(("maxPrice", v.to_string()));
        }
        params
    }
}

/// Paging and filtering for a product's reviews
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewQuery {
    pub page: u64,
    pub size: u64,
    pub sort_by: String,
    pub sort_dir: SortDirection,
    pub min_rating: Option<u8>,
}

impl Default for ReviewQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: 20,
            sort_by: DEFAULT_SORT_KEY.to_string(),
            sort_dir: SortDirection::Desc,
            min_rating: None,
        }
    }
}

impl ReviewQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("size", self.size.to_string()),
            ("sortBy", self.sort_by.clone()),
            ("sortDir", self.sort_dir.as_str().to_string()),
        ];
        if let Some(v) = self.min_rating {
            params.push(("minRating", v.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(5, 2), 3);
        assert_eq!(total_pages(4, 2), 2);
        assert_eq!(total_pages(7, 0), 1);
    }

    #[test]
    fn test_page_from_items_slices() {
        let page = Page::from_items(vec![1, 2, 3, 4, 5], 1, 2);
        assert_eq!(page.content, vec![3, 4]);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        assert!(!page.first);
        assert!(!page.last);

        let page = Page::from_items(vec![1, 2, 3, 4, 5], 2, 2);
        assert_eq!(page.content, vec![5]);
        assert!(page.last);
    }

    #[test]
    fn test_rating_range() {
        assert!(!rating_is_valid(0));
        assert!(rating_is_valid(1));
        assert!(rating_is_valid(5));
        assert!(!rating_is_valid(6));
    }

    #[test]
    fn test_page_past_the_end() {
        let page = Page::from_items(vec![1, 2, 3], 9, 2);
        assert!(page.content.is_empty());
        assert_eq!(page.total_pages, 2);
        assert!(page.last);
    }

    #[test]
    fn test_page_zero_size() {
        let page = Page::from_items(vec![1, 2, 3], 0, 0);
        assert!(page.content.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(page.first);
        assert!(page.last);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let page: Page<u32> = Page::empty(0, 20);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalElements"], 0);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["first"], true);
    }

    #[test]
    fn test_product_query_params_omit_unset() {
        let query = ProductQuery {
            category: Some("Audio".to_string()),
            min_price: Some(10.0),
            ..Default::default()
        };
        let params = query.to_params();
        assert!(params.contains(&("category", "Audio".to_string())));
        assert!(params.contains(&("minPrice", "10".to_string())));
        assert!(params.iter().all(|(k, _)| *k != "search"));
        assert!(params.contains(&("sortDir", "DESC".to_string())));
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn test_refresh_aggregates() {
        let mut product = Product {
            id: 1,
            name: "Lamp".to_string(),
            description: None,
            category: None,
            price: 10.0,
            image_url: None,
            average_rating: 0.0,
            review_count: 0,
            created_at: None,
            reviews: Vec::new(),
        };
        for (i, rating) in [5u8, 4].into_iter().enumerate() {
            product.reviews.push(Review {
                id: ReviewId(i as u64),
                product_id: 1,
                reviewer_name: None,
                rating,
                comment: None,
                helpful_count: 0,
                device_id: None,
                created_at: None,
                updated_at: None,
            });
        }
        product.refresh_aggregates();
        assert_eq!(product.review_count, 2);
        assert!((product.average_rating - 4.5).abs() < f64::EPSILON);
    }
}
