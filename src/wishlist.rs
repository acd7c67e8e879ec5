use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::store::{KeyValueStore, WISHLIST_KEY};

/// Favorite product ids, stored as a JSON array under one durable key
pub struct Wishlist {
    kv: Arc<dyn KeyValueStore>,
}

fn parse_ids(raw: &str) -> Vec<u64> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn dedup(ids: impl IntoIterator<Item = u64>) -> Vec<u64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl Wishlist {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Stored ids; a missing or corrupt entry reads as empty
    pub fn ids(&self) -> Result<Vec<u64>> {
        Ok(self
            .kv
            .get(WISHLIST_KEY)?
            .map(|raw| parse_ids(&raw))
            .unwrap_or_default())
    }

    /// Replace the stored ids, dropping duplicates
    pub fn set_ids(&self, ids: &[u64]) -> Result<Vec<u64>> {
        let unique = dedup(ids.iter().copied());
        self.kv.set(WISHLIST_KEY, &serde_json::to_string(&unique)?)?;
        Ok(unique)
    }

    pub fn is_favorite(&self, product_id: u64) -> Result<bool> {
        Ok(self.ids()?.contains(&product_id))
    }

    /// Add or remove a product, returning the new list
    pub fn toggle(&self, product_id: u64) -> Result<Vec<u64>> {
        let mut ids = dedup(self.ids()?);
        if let Some(pos) = ids.iter().position(|id| *id == product_id) {
            ids.remove(pos);
            debug!(product_id, "Removed from wishlist");
        } else {
            ids.push(product_id);
            debug!(product_id, "Added to wishlist");
        }
        self.set_ids(&ids)
    }
}
