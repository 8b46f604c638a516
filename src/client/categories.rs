//! Client-side category cache with create-on-demand semantics.
//!
//! The server is the eventual source of truth. The store keeps two layers:
//! `confirmed` mirrors the last successful server load, `pending` holds
//! names accepted locally after a failed remote create. Pending names are
//! reconciled away on the next load that includes them. Nothing here ever
//! blocks a post from being finished.

use tracing::warn;

use crate::client::api::{AuthContext, BackendApi};
use crate::models::category::normalize_name;

#[derive(Debug, Clone)]
pub struct CategoryStore {
    api: BackendApi,
    auth: AuthContext,
    confirmed: Vec<String>,
    pending: Vec<String>,
}

impl CategoryStore {
    pub fn new(api: BackendApi, auth: AuthContext) -> Self {
        Self {
            api,
            auth,
            confirmed: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Fetch every category from the backend, normalized, de-duplicated
    /// case-insensitively, and sorted. A failed load degrades to an empty
    /// result with a warning; existing local state is left untouched so the
    /// form stays usable with manual entry.
    pub async fn load_all(&mut self) -> Vec<String> {
        match self.api.list_categories().await {
            Ok(records) => {
                let mut seen: Vec<String> = Vec::new();
                let mut names = Vec::new();
                for record in records {
                    let normalized = normalize_name(&record.name);
                    if normalized.is_empty() {
                        continue;
                    }
                    let lowered = normalized.to_lowercase();
                    if seen.contains(&lowered) {
                        continue;
                    }
                    seen.push(lowered);
                    names.push(normalized);
                }
                names.sort();
                self.confirmed = names;

                // Pending names the server now knows stop being pending.
                let confirmed = &self.confirmed;
                self.pending.retain(|p| {
                    let lowered = p.to_lowercase();
                    !confirmed.iter().any(|c| c.to_lowercase() == lowered)
                });

                self.known()
            }
            Err(err) => {
                warn!("category load failed: {}", err);
                Vec::new()
            }
        }
    }

    /// Return the canonical form of `name`, creating it remotely if it is
    /// new. A failed remote create accepts the name locally (optimistic)
    /// and flags it for later sync; this method never errors.
    pub async fn ensure(&mut self, name: &str) -> String {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return normalized;
        }

        let lowered = normalized.to_lowercase();
        if let Some(existing) = self.find_known(&lowered) {
            return existing.to_string();
        }

        match self.api.create_category(&self.auth, &normalized).await {
            Ok(record) => {
                let server_form = normalize_name(&record.name);
                let canonical = if server_form.is_empty() {
                    normalized
                } else {
                    server_form
                };
                push_unique(&mut self.confirmed, canonical.clone());
                canonical
            }
            Err(err) => {
                warn!(
                    "category create for `{}` failed, keeping it locally: {}",
                    normalized, err
                );
                push_unique(&mut self.pending, normalized.clone());
                normalized
            }
        }
    }

    /// Every name the store believes in: server-confirmed plus locally
    /// pending, sorted.
    pub fn known(&self) -> Vec<String> {
        let mut all = self.confirmed.clone();
        for p in &self.pending {
            let lowered = p.to_lowercase();
            if !all.iter().any(|c| c.to_lowercase() == lowered) {
                all.push(p.clone());
            }
        }
        all.sort();
        all
    }

    /// Names accepted locally but not yet confirmed by the server.
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    fn find_known(&self, lowered: &str) -> Option<&str> {
        self.confirmed
            .iter()
            .chain(self.pending.iter())
            .find(|n| n.to_lowercase() == lowered)
            .map(String::as_str)
    }
}

fn push_unique(list: &mut Vec<String>, name: String) {
    let lowered = name.to_lowercase();
    if !list.iter().any(|n| n.to_lowercase() == lowered) {
        list.push(name);
        list.sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn store_for(server: &Server) -> CategoryStore {
        CategoryStore::new(BackendApi::new(server.url()), AuthContext::default())
    }

    #[tokio::test]
    async fn load_normalizes_dedups_and_sorts() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/categories")
            .with_status(200)
            .with_body(r#"[{"name":"powder"},{"name":"POWDER "},{"name":"back  country"}]"#)
            .create_async()
            .await;

        let mut store = store_for(&server);
        let names = store.load_all().await;
        assert_eq!(names, ["Back Country", "Powder"]);
    }

    #[tokio::test]
    async fn failed_load_degrades_to_empty_and_keeps_state() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/categories")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut store = store_for(&server);
        store.pending.push("Night Ski".to_string());

        let names = store.load_all().await;
        assert!(names.is_empty());
        assert_eq!(store.pending(), ["Night Ski"]);
        assert_eq!(store.known(), ["Night Ski"]);
    }

    #[tokio::test]
    async fn ensure_normalizes_and_returns_known_form_without_a_request() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/api/categories")
            .expect(0)
            .create_async()
            .await;

        let mut store = store_for(&server);
        store.confirmed.push("Ski Trip".to_string());

        assert_eq!(store.ensure("  ski  TRIP ").await, "Ski Trip");
        assert_eq!(store.ensure("Ski Trip").await, "Ski Trip");
        assert_eq!(store.known(), ["Ski Trip"]);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn ensure_creates_new_names_remotely() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/api/categories")
            .with_status(201)
            .with_body(r#"{"name":"Freeride"}"#)
            .expect(1)
            .create_async()
            .await;

        let mut store = store_for(&server);
        assert_eq!(store.ensure("freeride").await, "Freeride");
        assert_eq!(store.known(), ["Freeride"]);
        assert!(store.pending().is_empty());
        create.assert_async().await;
    }

    #[tokio::test]
    async fn failed_create_falls_back_to_pending_without_erroring() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/api/categories")
            .with_status(503)
            .with_body("unavailable")
            .expect(1)
            .create_async()
            .await;

        let mut store = store_for(&server);
        assert_eq!(store.ensure("night ski").await, "Night Ski");
        assert_eq!(store.pending(), ["Night Ski"]);

        // The second ensure finds the pending entry and stays local.
        assert_eq!(store.ensure("NIGHT SKI").await, "Night Ski");
        assert_eq!(store.known(), ["Night Ski"]);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn successful_load_reconciles_pending_names() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/categories")
            .with_status(200)
            .with_body(r#"[{"name":"Night Ski"},{"name":"Powder"}]"#)
            .create_async()
            .await;

        let mut store = store_for(&server);
        store.pending.push("Night Ski".to_string());

        let names = store.load_all().await;
        assert_eq!(names, ["Night Ski", "Powder"]);
        assert!(store.pending().is_empty());
    }
}
