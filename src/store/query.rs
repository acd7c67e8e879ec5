use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{
    Page, Product, ProductQuery, Review, ReviewQuery, SortDirection, DEFAULT_SORT_KEY,
};

fn timestamp(at: Option<DateTime<Utc>>) -> i64 {
    at.map(|t| t.timestamp_millis()).unwrap_or(0)
}

fn directed(ordering: Ordering, dir: SortDirection) -> Ordering {
    match dir {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Filter, sort and page a product's reviews.
///
/// A `min_rating` of zero means no filter. Only `createdAt` is honored as a
/// sort key; any other key keeps the stored order.
pub fn review_page(reviews: Vec<Review>, query: &ReviewQuery) -> Page<Review> {
    let min_rating = query.min_rating.filter(|r| *r > 0);

    let mut items: Vec<Review> = reviews
        .into_iter()
        .filter(|r| min_rating.map_or(true, |min| r.rating >= min))
        .collect();

    if query.sort_by == DEFAULT_SORT_KEY {
        items.sort_by(|a, b| {
            directed(
                timestamp(a.created_at).cmp(&timestamp(b.created_at)),
                query.sort_dir,
            )
        });
    }

    Page::from_items(items, query.page, query.size)
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

fn matches(product: &Product, query: &ProductQuery) -> bool {
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        let same = product
            .category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category));
        if !same {
            return false;
        }
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let hit = contains_ignore_case(Some(&product.name), &needle)
            || contains_ignore_case(product.description.as_deref(), &needle)
            || contains_ignore_case(product.category.as_deref(), &needle);
        if !hit {
            return false;
        }
    }

    if query.min_rating.is_some_and(|min| product.average_rating < min) {
        return false;
    }
    if query.min_price.is_some_and(|min| product.price < min) {
        return false;
    }
    if query.max_price.is_some_and(|max| product.price > max) {
        return false;
    }

    true
}

fn by_created_at(a: &Product, b: &Product) -> Ordering {
    timestamp(a.created_at).cmp(&timestamp(b.created_at))
}

fn by_name(a: &Product, b: &Product) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn by_price(a: &Product, b: &Product) -> Ordering {
    a.price.total_cmp(&b.price)
}

fn by_rating(a: &Product, b: &Product) -> Ordering {
    a.average_rating.total_cmp(&b.average_rating)
}

fn by_review_count(a: &Product, b: &Product) -> Ordering {
    a.review_count.cmp(&b.review_count)
}

/// Filter, sort and page the catalog.
///
/// Sort keys: `createdAt`, `name`, `price`, `averageRating`, `reviewCount`.
/// Anything else keeps catalog order.
pub fn product_page(products: Vec<Product>, query: &ProductQuery) -> Page<Product> {
    let mut items: Vec<Product> = products.into_iter().filter(|p| matches(p, query)).collect();

    let key: Option<fn(&Product, &Product) -> Ordering> = match query.sort_by.as_str() {
        "createdAt" => Some(by_created_at),
        "name" => Some(by_name),
        "price" => Some(by_price),
        "averageRating" | "rating" => Some(by_rating),
        "reviewCount" => Some(by_review_count),
        _ => None,
    };

    if let Some(cmp) = key {
        items.sort_by(|a, b| directed(cmp(a, b), query.sort_dir));
    }

    // Listings never carry embedded reviews
    for item in &mut items {
        item.reviews.clear();
    }

    Page::from_items(items, query.page, query.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewId;
    use chrono::TimeZone;

    fn review(id: u64, rating: u8, day: u32) -> Review {
        Review {
            id: ReviewId(id),
            product_id: 1,
            reviewer_name: None,
            rating,
            comment: None,
            helpful_count: 0,
            device_id: None,
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    fn product(id: u64, name: &str, category: &str, price: f64, rating: f64) -> Product {
        Product {
            id,
            name: name.to_string(),
            description: None,
            category: Some(category.to_string()),
            price,
            image_url: None,
            average_rating: rating,
            review_count: 0,
            created_at: Some(Utc.with_ymd_and_hms(2024, 2, id as u32, 0, 0, 0).unwrap()),
            reviews: Vec::new(),
        }
    }

    fn ids(page: &Page<Review>) -> Vec<u64> {
        page.content.iter().map(|r| r.id.0).collect()
    }

    #[test]
    fn test_reviews_default_newest_first() {
        let reviews = vec![review(1, 5, 1), review(2, 3, 3), review(3, 4, 2)];
        let page = review_page(reviews, &ReviewQuery::default());
        assert_eq!(ids(&page), vec![2, 3, 1]);
    }

    #[test]
    fn test_reviews_ascending() {
        let reviews = vec![review(1, 5, 1), review(2, 3, 3), review(3, 4, 2)];
        let query = ReviewQuery {
            sort_dir: SortDirection::Asc,
            ..Default::default()
        };
        assert_eq!(ids(&review_page(reviews, &query)), vec![1, 3, 2]);
    }

    #[test]
    fn test_reviews_other_sort_key_keeps_order() {
        let reviews = vec![review(1, 1, 1), review(2, 5, 3), review(3, 3, 2)];
        let query = ReviewQuery {
            sort_by: "rating".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&review_page(reviews, &query)), vec![1, 2, 3]);
    }

    #[test]
    fn test_reviews_min_rating_inclusive() {
        let reviews = vec![review(1, 5, 1), review(2, 3, 3), review(3, 4, 2), review(4, 2, 4)];
        let query = ReviewQuery {
            min_rating: Some(4),
            ..Default::default()
        };
        let page = review_page(reviews, &query);
        assert_eq!(ids(&page), vec![3, 1]);
        assert_eq!(page.total_elements, 2);
    }

    #[test]
    fn test_reviews_zero_min_rating_is_no_filter() {
        let reviews = vec![review(1, 1, 1), review(2, 2, 2)];
        let query = ReviewQuery {
            min_rating: Some(0),
            ..Default::default()
        };
        assert_eq!(review_page(reviews, &query).total_elements, 2);
    }

    #[test]
    fn test_products_filtering() {
        let products = vec![
            product(1, "Desk Lamp", "Home", 25.0, 4.5),
            product(2, "Headphones", "Audio", 120.0, 4.8),
            product(3, "Speaker", "audio", 60.0, 3.9),
        ];

        let query = ProductQuery {
            category: Some("AUDIO".to_string()),
            min_rating: Some(4.0),
            ..Default::default()
        };
        let page = product_page(products.clone(), &query);
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].id, 2);

        let query = ProductQuery {
            search: Some("lamp".to_string()),
            ..Default::default()
        };
        assert_eq!(product_page(products.clone(), &query).content[0].id, 1);

        let query = ProductQuery {
            min_price: Some(25.0),
            max_price: Some(60.0),
            sort_by: "price".to_string(),
            sort_dir: SortDirection::Asc,
            ..Default::default()
        };
        let page = product_page(products, &query);
        let got: Vec<u64> = page.content.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![1, 3]);
    }

    #[test]
    fn test_products_unknown_sort_key_keeps_order() {
        let products = vec![
            product(2, "B", "x", 1.0, 1.0),
            product(1, "A", "x", 2.0, 2.0),
        ];
        let query = ProductQuery {
            sort_by: "popularity".to_string(),
            ..Default::default()
        };
        let got: Vec<u64> = product_page(products, &query).content.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![2, 1]);
    }
}
