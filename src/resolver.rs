use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::models::{LocalProductId, Product, ProductQuery, RemoteProductId};
use crate::remote::RemoteClient;

/// Lowercase, collapse whitespace, drop everything outside `[a-z0-9 ]`, trim.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }

    collapsed
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

fn search_term(name: &str) -> String {
    name.replace(['"', '\''], "").trim().to_string()
}

/// Maps local catalog products onto their remote counterparts by name
///
/// Results are memoized for the resolver's lifetime. Lookups never fail:
/// any remote error degrades to "no mapping".
pub struct IdentityResolver {
    remote: RemoteClient,
    search_size: u64,
    scan_size: u64,
    table: RwLock<HashMap<LocalProductId, RemoteProductId>>,
}

impl IdentityResolver {
    pub fn new(remote: RemoteClient, config: &ResolverConfig) -> Self {
        Self {
            remote,
            search_size: config.search_size,
            scan_size: config.scan_size,
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Memoized mapping for `local`, without touching the network
    pub fn cached(&self, local: LocalProductId) -> Option<RemoteProductId> {
        self.table
            .read()
            .ok()
            .and_then(|table| table.get(&local).copied())
    }

    pub fn forget_all(&self) {
        if let Ok(mut table) = self.table.write() {
            table.clear();
        }
    }

    fn remember(&self, local: LocalProductId, remote: RemoteProductId) {
        if let Ok(mut table) = self.table.write() {
            table.insert(local, remote);
        }
    }

    /// Find the remote id of a local catalog product
    pub async fn resolve(&self, product: &Product) -> Option<RemoteProductId> {
        let local = product.local_id();
        if let Some(hit) = self.cached(local) {
            return Some(hit);
        }

        let target = normalize_name(&product.name);

        let found = match self.search(&product.name, &target).await {
            Some(id) => Some(id),
            None => self.scan(&target).await,
        };

        match found {
            Some(remote) => {
                self.remember(local, remote);
                info!(%local, %remote, "Resolved product identity");
                Some(remote)
            }
            None => {
                debug!(%local, name = %product.name, "No remote product matched");
                None
            }
        }
    }

    /// Name search; prefers an exact normalized match, else the first hit
    async fn search(&self, raw_name: &str, target: &str) -> Option<RemoteProductId> {
        let query = ProductQuery {
            page: 0,
            size: self.search_size,
            search: Some(search_term(raw_name)),
            ..Default::default()
        };

        let page = match self.remote.list_products(&query).await {
            Ok(page) => page,
            Err(e) => {
                debug!(error = %e, "Identity search failed");
                return None;
            }
        };

        page.content
            .iter()
            .find(|p| normalize_name(&p.name) == target)
            .or_else(|| page.content.first())
            .map(Product::remote_id)
    }

    /// Linear scan over a large unfiltered page
    async fn scan(&self, target: &str) -> Option<RemoteProductId> {
        let query = ProductQuery {
            page: 0,
            size: self.scan_size,
            ..Default::default()
        };

        match self.remote.list_products(&query).await {
            Ok(page) => page
                .content
                .iter()
                .find(|p| normalize_name(&p.name) == target)
                .map(Product::remote_id),
            Err(e) => {
                debug!(error = %e, "Identity scan failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_product(id: u64, name: &str) -> Product {
        serde_json::from_value(serde_json::json!({ "id": id, "name": name })).unwrap()
    }

    fn page(items: serde_json::Value) -> serde_json::Value {
        let n = items.as_array().map(|a| a.len()).unwrap_or(0);
        serde_json::json!({
            "content": items, "totalElements": n, "totalPages": 1,
            "size": 20, "number": 0, "first": true, "last": true
        })
    }

    fn resolver(server: &MockServer) -> IdentityResolver {
        let remote = RemoteClient::new(server.uri(), Duration::from_millis(500));
        IdentityResolver::new(remote, &ResolverConfig::default())
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Sony   WH-1000XM5 "), "sony wh1000xm5");
        assert_eq!(normalize_name("Café\tDeluxe"), "caf deluxe");
        assert_eq!(normalize_name("\"Pro\" Mouse!"), "pro mouse");
    }

    #[test]
    fn test_search_term_strips_quotes() {
        assert_eq!(search_term(" \"Kid's\" Tent "), "Kids Tent");
    }

    #[tokio::test]
    async fn test_prefers_exact_normalized_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("search", "Desk Lamp"))
            .and(query_param("size", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(serde_json::json!([
                {"id": 501, "name": "Desk Lamp Pro"},
                {"id": 502, "name": "desk  lamp"}
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server);
        let got = resolver.resolve(&local_product(3, "Desk Lamp")).await;
        assert_eq!(got, Some(RemoteProductId(502)));
    }

    #[tokio::test]
    async fn test_falls_back_to_first_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("size", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(serde_json::json!([
                {"id": 601, "name": "Desk Lamp Pro"}
            ]))))
            .mount(&server)
            .await;

        let got = resolver(&server).resolve(&local_product(3, "Desk Lamp")).await;
        assert_eq!(got, Some(RemoteProductId(601)));
    }

    #[tokio::test]
    async fn test_scans_catalog_when_search_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("size", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(serde_json::json!([]))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("size", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(serde_json::json!([
                {"id": 700, "name": "Kettle"},
                {"id": 701, "name": "DESK LAMP"}
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let got = resolver(&server).resolve(&local_product(3, "Desk Lamp")).await;
        assert_eq!(got, Some(RemoteProductId(701)));
    }

    #[tokio::test]
    async fn test_memoized_second_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(serde_json::json!([
                {"id": 800, "name": "Desk Lamp"}
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server);
        let product = local_product(3, "Desk Lamp");
        assert_eq!(resolver.resolve(&product).await, Some(RemoteProductId(800)));
        assert_eq!(resolver.resolve(&product).await, Some(RemoteProductId(800)));
        assert_eq!(resolver.cached(LocalProductId(3)), Some(RemoteProductId(800)));

        resolver.forget_all();
        assert_eq!(resolver.cached(LocalProductId(3)), None);
    }

    #[tokio::test]
    async fn test_failures_degrade_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = resolver(&server);
        assert_eq!(resolver.resolve(&local_product(3, "Desk Lamp")).await, None);
        assert_eq!(resolver.cached(LocalProductId(3)), None);
    }
}
