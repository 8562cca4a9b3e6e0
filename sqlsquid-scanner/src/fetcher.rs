use crate::error::{Result, ScanError};
use crate::result::FetchedPage;
use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Thin wrapper around a pooled `reqwest::Client`. Cloning is cheap and
/// shares the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("SQLSquid/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ScanError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub async fn get(&self, url: &str) -> Result<FetchedPage> {
        debug!("GET {}", url);
        self.send(url, self.client.get(url)).await
    }

    pub async fn get_with_query(&self, url: &str, fields: &[(String, String)]) -> Result<FetchedPage> {
        debug!("GET {} with {} query fields", url, fields.len());
        self.send(url, self.client.get(url).query(fields)).await
    }

    pub async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<FetchedPage> {
        debug!("POST {} with {} form fields", url, fields.len());
        self.send(url, self.client.post(url).form(fields)).await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<FetchedPage> {
        let start = Instant::now();
        let response = request.send().await?;

        let mut page = FetchedPage::new(url.to_string());
        page.status_code = response.status().as_u16();
        page.content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        page.body = response.text().await?;
        page.response_time = start.elapsed();

        Ok(page)
    }
}
