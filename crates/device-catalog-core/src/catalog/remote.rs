//! Read-only access to the published catalog over raw.githubusercontent.com
//!
//! Every read degrades to "nothing": a failed fetch never stops discovery,
//! it only means already-cataloged types may be proposed again.

use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::catalog::document::ClassDocument;
use crate::catalog::index::{ClassIndex, BY_CLASS_DIR};
use crate::catalog::{KnownProfiles, KnownSet};
use crate::error::Result;
use crate::http::{build_client, send_json};

/// Where the published catalog lives
#[derive(Debug, Clone)]
pub struct RemoteCatalogConfig {
    /// e.g. `https://raw.githubusercontent.com`
    pub raw_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: Option<String>,
}

impl RemoteCatalogConfig {
    /// `<raw_base>/<owner>/<repo>/<branch>/catalog`
    pub fn catalog_url(&self) -> String {
        format!(
            "{}/{}/{}/{}/catalog",
            self.raw_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.branch
        )
    }
}

pub struct RemoteCatalog {
    config: RemoteCatalogConfig,
    client: Client,
}

impl RemoteCatalog {
    pub fn new(config: RemoteCatalogConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: build_client(false)?,
        })
    }

    pub fn index_url(&self) -> String {
        format!("{}/_index.json", self.config.catalog_url())
    }

    pub fn class_url(&self, file_name: &str) -> String {
        format!("{}/{}/{}", self.config.catalog_url(), BY_CLASS_DIR, file_name)
    }

    fn get(&self, url: &str) -> Result<serde_json::Value> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }
        send_json(request, url)
    }

    /// `_index.json`, or `None` when it cannot be fetched or parsed
    pub fn fetch_index(&self) -> Option<ClassIndex> {
        let url = self.index_url();
        match self
            .get(&url)
            .and_then(|v| serde_json::from_value(v).map_err(Into::into))
        {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(url = %url, error = %e, "could not fetch catalog index");
                None
            }
        }
    }

    /// One class document, or `None` when it cannot be fetched or parsed
    pub fn fetch_class_document(&self, file_name: &str) -> Option<ClassDocument> {
        let url = self.class_url(file_name);
        match self
            .get(&url)
            .and_then(|v| serde_json::from_value(v).map_err(Into::into))
        {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!(url = %url, error = %e, "could not fetch class document");
                None
            }
        }
    }
}

impl KnownProfiles for RemoteCatalog {
    fn known_profiles(&self) -> Result<KnownSet> {
        Ok(match self.fetch_index() {
            Some(index) => KnownSet::new(index.profile_keys()),
            None => KnownSet::degraded(
                "Could not fetch the catalog index. Discovery will proceed but may \
                 propose device types that are already cataloged.",
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(raw_base: &str) -> RemoteCatalogConfig {
        RemoteCatalogConfig {
            raw_base: raw_base.to_string(),
            owner: "simons-plugins".to_string(),
            repo: "indigo-device-catalog".to_string(),
            branch: "main".to_string(),
            token: None,
        }
    }

    #[test]
    fn builds_urls() {
        let remote = RemoteCatalog::new(config("https://raw.githubusercontent.com/")).unwrap();
        assert_eq!(
            remote.index_url(),
            "https://raw.githubusercontent.com/simons-plugins/indigo-device-catalog/main/catalog/_index.json"
        );
        assert_eq!(
            remote.class_url("relay.json"),
            "https://raw.githubusercontent.com/simons-plugins/indigo-device-catalog/main/catalog/by-class/relay.json"
        );
    }

    #[test]
    fn unreachable_catalog_degrades_to_empty_set() {
        // Port 9 (discard) on localhost: refused or unreachable either way
        let remote = RemoteCatalog::new(config("http://127.0.0.1:9")).unwrap();
        let known = remote.known_profiles().unwrap();
        assert!(known.is_empty());
        assert!(known.warning.is_some());
        assert!(remote.fetch_class_document("relay.json").is_none());
    }
}
