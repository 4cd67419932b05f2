use futures_util::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::Record;

pub const API_BASE_URL: &str = "https://pokeapi.co/api/v2";

// Detail look-ups per page, and the pacing delay between pages.
const BATCH_SIZE: usize = 20;
const BATCH_DELAY: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to fetch Pokemon list: {0}")]
    List(#[source] reqwest::Error),

    #[error("Failed to fetch Pokemon details for {name}: {source}")]
    Details {
        name: String,
        source: reqwest::Error,
    },
}

#[derive(Deserialize, Clone, Debug)]
pub struct ListItem {
    pub name: String,
    pub url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ListResponse {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<ListItem>,
}

pub struct PokeApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for PokeApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PokeApiClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_list(&self, limit: usize, offset: usize) -> Result<ListResponse, FetchError> {
        let url = format!("{}/pokemon?limit={}&offset={}", self.base_url, limit, offset);
        self.http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(FetchError::List)?
            .json()
            .await
            .map_err(FetchError::List)
    }

    pub async fn fetch_details(&self, name_or_id: &str) -> Result<Record, FetchError> {
        let url = format!("{}/pokemon/{}", self.base_url, name_or_id);
        let wrap = |source| FetchError::Details {
            name: name_or_id.to_string(),
            source,
        };
        self.http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(wrap)?
            .json()
            .await
            .map_err(wrap)
    }

    /// Fetch the whole dataset: one count probe, then pages of 20 with
    /// the detail look-ups of each page fanned out concurrently. A
    /// failed item is logged and dropped, never retried and never
    /// blocking the rest of the batch; partial success is the normal
    /// case. Progress is reported after every page.
    pub async fn fetch_all<F>(&self, mut on_progress: F) -> Result<Vec<Record>, FetchError>
    where
        F: FnMut(usize, usize),
    {
        let total = self.fetch_list(1, 0).await?.count;
        debug!("Fetching {} Pokemon in batches of {}", total, BATCH_SIZE);

        let mut all = Vec::with_capacity(total);
        for offset in batch_offsets(total) {
            let page = self.fetch_list(BATCH_SIZE, offset).await?;
            let lookups = page
                .results
                .iter()
                .map(|item| self.fetch_details(&item.name));
            for result in join_all(lookups).await {
                match result {
                    Ok(record) => all.push(record),
                    Err(e) => warn!("{}", e),
                }
            }
            on_progress(all.len(), total);

            // stay polite to the public API
            tokio::time::sleep(BATCH_DELAY).await;
        }
        Ok(all)
    }
}

// Page offsets covering [0, total) in BATCH_SIZE steps.
fn batch_offsets(total: usize) -> impl Iterator<Item = usize> {
    (0..total).step_by(BATCH_SIZE.max(1))
}
