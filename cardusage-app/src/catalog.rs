use async_trait::async_trait;
use cardusage_core::{CoreError, SetFetcher};
use serde::Deserialize;
use std::collections::HashMap;

const API_BASE: &str = "https://api.swu-db.com/cards";

#[derive(Debug, Deserialize)]
struct SetListing {
    #[serde(default)]
    data: Vec<CatalogCard>,
}

#[derive(Debug, Deserialize)]
struct CatalogCard {
    #[serde(rename = "Number")]
    number: String,
    #[serde(rename = "Name")]
    name: String,
}

/// Per-set card listings from the swu-db card API.
pub struct SwuDbFetcher {
    client: reqwest::Client,
    base: String,
}

impl SwuDbFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base: API_BASE.to_string(),
        }
    }
}

#[async_trait]
impl SetFetcher for SwuDbFetcher {
    async fn fetch_set(&self, set: &str) -> Result<HashMap<String, String>, CoreError> {
        let url = format!("{}/{}", self.base, set.to_lowercase());
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Source(format!("{url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(CoreError::Source(format!("{url}: status {}", resp.status())));
        }
        let listing: SetListing = resp
            .json()
            .await
            .map_err(|e| CoreError::Source(format!("{url}: {e}")))?;
        Ok(listing
            .data
            .into_iter()
            .map(|c| (c.number, c.name))
            .collect())
    }
}
