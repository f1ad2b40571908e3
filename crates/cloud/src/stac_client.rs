//! Async STAC client for scene discovery and asset download.
//!
//! Supports Planetary Computer and Earth Search out of the box, plus
//! arbitrary STAC API endpoints via [`StacCatalog::Custom`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CloudError, Result};
use crate::stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

const PC_SIGN_URL: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";

// ---------------------------------------------------------------------------
// Catalog enum
// ---------------------------------------------------------------------------

/// Well-known STAC catalogs plus custom endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacCatalog {
    /// Microsoft Planetary Computer STAC API.
    PlanetaryComputer,
    /// AWS Earth Search (Element 84).
    EarthSearch,
    /// Any STAC API root URL, e.g. `"https://my-stac.example.com/api/v1"`.
    Custom(String),
}

impl StacCatalog {
    /// Full POST `/search` URL for this catalog.
    pub fn search_url(&self) -> String {
        match self {
            Self::PlanetaryComputer => {
                "https://planetarycomputer.microsoft.com/api/stac/v1/search".to_string()
            }
            Self::EarthSearch => "https://earth-search.aws.element84.com/v1/search".to_string(),
            Self::Custom(base) => {
                let base = base.trim_end_matches('/');
                if base.ends_with("/search") {
                    base.to_string()
                } else {
                    format!("{}/search", base)
                }
            }
        }
    }

    /// Parse a shorthand (`"pc"`, `"es"`, ...) or treat the string as a URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Whether asset hrefs need a SAS token before download.
    pub fn needs_signing(&self) -> bool {
        matches!(self, Self::PlanetaryComputer)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`StacClient`].
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    /// Per-request timeout (default 30 s; asset downloads get 10x).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
    /// Maximum total items to fetch across pages (default 100).
    pub max_items: usize,
    /// Base delay of the exponential backoff (default 500 ms).
    pub retry_base_delay: Duration,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            max_items: 100,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Async client for STAC Item Search and asset download.
pub struct StacClient {
    catalog: StacCatalog,
    client: reqwest::Client,
    options: StacClientOptions,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            catalog,
            client,
            options,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &StacClientOptions {
        &self.options
    }

    /// Execute a single search request and return one page of results.
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        self.post_search(&self.catalog.search_url(), params).await
    }

    /// Search with automatic pagination, collecting up to `max_items` items.
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let max = self.options.max_items;
        let mut items: Vec<StacItem> = Vec::new();
        let mut page = self.search(params).await?;

        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);
            debug!(items = items.len(), "STAC page received");

            if items.len() >= max {
                break;
            }
            let Some(link) = next else { break };
            page = self.follow_next(&link, params).await?;
            if page.is_empty() {
                break;
            }
        }

        items.truncate(max);
        Ok(items)
    }

    /// Sign an asset href when the catalog requires it; otherwise return it unchanged.
    pub async fn sign_href(&self, href: &str) -> Result<String> {
        if !self.catalog.needs_signing() {
            return Ok(href.to_string());
        }

        let resp = self
            .send_with_retries("asset signing", || {
                self.client
                    .get(PC_SIGN_URL)
                    .query(&[("href", href)])
                    .timeout(self.options.request_timeout)
            })
            .await
            .map_err(|e| CloudError::Auth(e.to_string()))?;

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CloudError::Auth(format!("parsing sign response: {e}")))?;

        body["href"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CloudError::Auth("sign response missing 'href' field".into()))
    }

    /// Download a whole asset into memory.
    pub async fn download(&self, href: &str) -> Result<Vec<u8>> {
        let resp = self
            .send_with_retries("asset download", || {
                self.client
                    .get(href)
                    .timeout(self.options.request_timeout * 10)
            })
            .await?;
        let bytes = resp.bytes().await?;
        debug!(href, bytes = bytes.len(), "asset downloaded");
        Ok(bytes.to_vec())
    }

    // ── Private helpers ─────────────────────────────────────────────

    async fn post_search(&self, url: &str, params: &StacSearchParams) -> Result<StacItemCollection> {
        let resp = self
            .send_with_retries("STAC search", || {
                self.client
                    .post(url)
                    .json(params)
                    .timeout(self.options.request_timeout)
            })
            .await?;
        parse_collection(resp).await
    }

    /// Follow a pagination link. Handles both POST (body/merge) and GET links.
    async fn follow_next(&self, link: &StacLink, previous: &StacSearchParams) -> Result<StacItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();
        if method != "POST" {
            let resp = self
                .send_with_retries("STAC pagination", || {
                    self.client
                        .get(&link.href)
                        .timeout(self.options.request_timeout)
                })
                .await?;
            return parse_collection(resp).await;
        }

        let mut body = serde_json::to_value(previous)
            .map_err(|e| CloudError::Network(format!("serializing params: {e}")))?;
        match (&link.body, link.merge.unwrap_or(false)) {
            (Some(link_body), true) => {
                if let (Some(base), Some(overlay)) = (body.as_object_mut(), link_body.as_object()) {
                    for (k, v) in overlay {
                        base.insert(k.clone(), v.clone());
                    }
                }
            }
            (Some(link_body), false) => body = link_body.clone(),
            (None, _) => {}
        }

        let next: StacSearchParams = serde_json::from_value(body)
            .map_err(|e| CloudError::Network(format!("parsing pagination body: {e}")))?;
        self.post_search(&link.href, &next).await
    }

    /// Send a request with exponential backoff on transient failures.
    ///
    /// Client errors (4xx) are returned immediately.
    async fn send_with_retries<F>(&self, what: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = self.options.retry_base_delay * (1 << (attempt - 1));
                warn!(what, attempt, ?delay, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(r) if r.status().is_success() => return Ok(r),
                Ok(r) => {
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    last_err = Some(CloudError::Network(format!(
                        "{what} returned HTTP {}: {}",
                        status,
                        body.chars().take(500).collect::<String>()
                    )));
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_err = Some(CloudError::Network(format!("{what} failed: {e}")));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network(format!("{what} failed"))))
    }
}

async fn parse_collection(resp: reqwest::Response) -> Result<StacItemCollection> {
    let body = resp
        .text()
        .await
        .map_err(|e| CloudError::Network(format!("reading response body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| CloudError::Decode {
        what: "STAC response".into(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_search_urls() {
        assert_eq!(
            StacCatalog::PlanetaryComputer.search_url(),
            "https://planetarycomputer.microsoft.com/api/stac/v1/search"
        );
        assert_eq!(
            StacCatalog::EarthSearch.search_url(),
            "https://earth-search.aws.element84.com/v1/search"
        );
        assert_eq!(
            StacCatalog::Custom("https://example.com/stac/".into()).search_url(),
            "https://example.com/stac/search"
        );
        assert_eq!(
            StacCatalog::Custom("https://example.com/stac/search".into()).search_url(),
            "https://example.com/stac/search"
        );
    }

    #[test]
    fn test_catalog_from_str_keeps_url_case() {
        assert_eq!(StacCatalog::from_str_or_url("PC"), StacCatalog::PlanetaryComputer);
        assert_eq!(StacCatalog::from_str_or_url("es"), StacCatalog::EarthSearch);
        assert_eq!(
            StacCatalog::from_str_or_url("https://My-Stac.com/v1"),
            StacCatalog::Custom("https://My-Stac.com/v1".into())
        );
    }

    #[test]
    fn test_only_planetary_computer_signs() {
        assert!(StacCatalog::PlanetaryComputer.needs_signing());
        assert!(!StacCatalog::EarthSearch.needs_signing());
    }

    #[tokio::test]
    async fn test_unreachable_catalog_fails_after_retries() {
        let options = StacClientOptions {
            request_timeout: Duration::from_millis(200),
            max_retries: 1,
            retry_base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        // Port 9 (discard) on localhost is closed in test environments
        let client = StacClient::new(StacCatalog::Custom("http://127.0.0.1:9".into()), options).unwrap();
        let err = client.search(&StacSearchParams::new()).await.unwrap_err();
        assert!(matches!(err, CloudError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_non_pc_href_is_not_signed() {
        let client = StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default()).unwrap();
        let href = "https://example.com/a.tif";
        assert_eq!(client.sign_href(href).await.unwrap(), href);
    }
}
