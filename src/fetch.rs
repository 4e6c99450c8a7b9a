//! Wiki page source.
//!
//! [`WikiClient`] fetches every page in a space through the wiki's REST API:
//! a paginated CQL content search (`space='KEY' AND type=page`) followed by
//! a per-page body fetch with storage markup expanded. Fetching is idempotent
//! and safe to repeat; a failed body fetch for one page logs an error and
//! yields an empty body rather than aborting the whole scan.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::WikiConfig;
use crate::models::Page;

/// Environment variable holding the wiki API token.
pub const TOKEN_ENV: &str = "WIKIDEX_API_TOKEN";

/// The fetch collaborator the ingestion pipeline depends on.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch all pages in the given space scope.
    async fn fetch_all(&self, space_key: &str) -> Result<Vec<Page>>;
}

/// REST client for a Confluence-style wiki.
pub struct WikiClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    token: String,
    page_limit: usize,
}

impl WikiClient {
    pub fn new(config: &WikiConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            bail!("wiki.base_url must be set to fetch pages");
        }
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", TOKEN_ENV))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            token,
            page_limit: config.page_limit.max(1),
        })
    }

    /// Fetch the full storage markup of one page. Any failure logs and
    /// yields an empty body; the page is still indexed by title.
    async fn fetch_body(&self, page_id: &str) -> String {
        let url = format!("{}/rest/api/content/{}", self.base_url, page_id);
        let result = async {
            let response = self
                .http
                .get(&url)
                .basic_auth(&self.username, Some(&self.token))
                .query(&[("expand", "body.storage")])
                .send()
                .await?
                .error_for_status()?;
            let body: PageResponse = response.json().await?;
            anyhow::Ok(body.body.and_then(|b| b.storage).map(|s| s.value).unwrap_or_default())
        }
        .await;

        match result {
            Ok(body) => body,
            Err(e) => {
                error!(page_id, error = format!("{e:#}"), "failed to fetch page body");
                String::new()
            }
        }
    }
}

#[async_trait]
impl PageSource for WikiClient {
    async fn fetch_all(&self, space_key: &str) -> Result<Vec<Page>> {
        let cql = format!("space='{}' AND type=page", space_key);
        let mut pages = Vec::new();
        let mut start = 0usize;

        loop {
            debug!(%cql, start, limit = self.page_limit, "running content search");

            let response = self
                .http
                .get(format!("{}/rest/api/content/search", self.base_url))
                .basic_auth(&self.username, Some(&self.token))
                .query(&[
                    ("cql", cql.as_str()),
                    ("start", &start.to_string()),
                    ("limit", &self.page_limit.to_string()),
                ])
                .send()
                .await
                .context("content search request failed")?
                .error_for_status()
                .context("content search returned an error status")?;

            let batch: SearchResponse = response
                .json()
                .await
                .context("decoding content search response")?;

            if batch.results.is_empty() {
                break;
            }

            for hit in &batch.results {
                let id = hit
                    .content
                    .as_ref()
                    .map(|c| c.id.clone())
                    .unwrap_or_default();
                let body = self.fetch_body(&id).await;
                pages.push(Page {
                    id,
                    title: hit.title.clone().unwrap_or_default(),
                    body,
                });
            }

            if batch.size < self.page_limit {
                break;
            }
            start += self.page_limit;
        }

        info!(space = space_key, count = pages.len(), "fetched pages");
        Ok(pages)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
    #[serde(default)]
    size: usize,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: Option<String>,
    content: Option<HitContent>,
}

#[derive(Debug, Deserialize)]
struct HitContent {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    body: Option<PageBody>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    storage: Option<StorageValue>,
}

#[derive(Debug, Deserialize)]
struct StorageValue {
    #[serde(default)]
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let parsed: SearchResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.results.is_empty());
        assert_eq!(parsed.size, 0);

        let parsed: SearchResponse = serde_json::from_str(
            r#"{"results":[{"title":"Home","content":{"id":"7"}},{"title":null,"content":null}],"size":2}"#,
        )
        .unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].content.as_ref().unwrap().id, "7");
        assert!(parsed.results[1].content.is_none());
    }

    #[test]
    fn test_page_response_unwraps_storage_value() {
        let parsed: PageResponse = serde_json::from_str(
            r#"{"body":{"storage":{"value":"<p>hello</p>"}}}"#,
        )
        .unwrap();
        assert_eq!(parsed.body.unwrap().storage.unwrap().value, "<p>hello</p>");

        let parsed: PageResponse = serde_json::from_str(r#"{"body":null}"#).unwrap();
        assert!(parsed.body.is_none());
    }

    #[test]
    fn test_client_requires_base_url() {
        let config = WikiConfig::default();
        assert!(WikiClient::new(&config).is_err());
    }
}
