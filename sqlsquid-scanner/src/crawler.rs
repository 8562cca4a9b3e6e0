use crate::fetcher::Fetcher;
use crate::normalize::{NormalizedUrl, normalize};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Polled before each page is visited; returning true ends the crawl early.
pub type StopCallback = Arc<dyn Fn() -> bool + Send + Sync>;

pub const DEFAULT_PAGE_BUDGET: usize = 30;

/// Links are only followed when their normalized form contains one of these.
pub const AUTH_KEYWORDS: [&str; 6] = ["login", "signin", "admin", "account", "auth", "user"];

/// Keyword-gated crawler. The frontier is a stack, so discovery is
/// depth-first rather than breadth-first.
pub struct Crawler {
    fetcher: Fetcher,
    page_budget: usize,
    keywords: Vec<String>,
    progress_callback: Option<ProgressCallback>,
    stop_callback: Option<StopCallback>,
}

impl Crawler {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            page_budget: DEFAULT_PAGE_BUDGET,
            keywords: AUTH_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            progress_callback: None,
            stop_callback: None,
        }
    }

    pub fn with_page_budget(mut self, page_budget: usize) -> Self {
        self.page_budget = page_budget;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_stop_callback(mut self, callback: StopCallback) -> Self {
        self.stop_callback = Some(callback);
        self
    }

    fn should_stop(&self) -> bool {
        self.stop_callback.as_ref().is_some_and(|stop| stop())
    }

    /// Visit pages starting at `seed_url` until the frontier is empty or
    /// `page_budget` pages were visited. Returns every visited URL, seed
    /// first, in the form it was fetched with. Fetch failures still count
    /// as visits.
    pub async fn crawl(&self, seed_url: &str) -> Vec<String> {
        info!("Starting crawl of {} (budget {})", seed_url, self.page_budget);

        let mut frontier: Vec<String> = vec![seed_url.to_string()];
        let mut queued: HashSet<NormalizedUrl> = HashSet::from([normalize(seed_url)]);
        let mut visited: HashSet<NormalizedUrl> = HashSet::new();
        let mut pages: Vec<String> = Vec::new();

        while visited.len() < self.page_budget {
            if self.should_stop() {
                info!("Crawl stopped after {} pages", pages.len());
                break;
            }
            let Some(url) = frontier.pop() else {
                break;
            };

            let key = normalize(&url);
            queued.remove(&key);
            if !visited.insert(key) {
                continue;
            }
            pages.push(url.clone());

            if let Some(ref callback) = self.progress_callback {
                callback(visited.len(), url.clone());
            }

            let page = match self.fetcher.get(&url).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("Crawl fetch failed for {}: {}", url, e);
                    continue;
                }
            };

            if !page.is_html() {
                debug!("Not following links in non-HTML page {}", url);
                continue;
            }

            for link in extract_links(&page.body, &url) {
                let link_key = normalize(&link);
                if visited.contains(&link_key) || queued.contains(&link_key) {
                    continue;
                }
                if !self.matches_keyword(&link_key) {
                    debug!("  -> No keyword match, skipping {}", link);
                    continue;
                }
                debug!("  -> Queuing {}", link);
                queued.insert(link_key);
                frontier.push(link);
            }
        }

        info!("Crawl complete. Visited {} pages", pages.len());
        pages
    }

    fn matches_keyword(&self, url: &NormalizedUrl) -> bool {
        self.keywords.iter().any(|k| url.contains(k))
    }
}

/// Absolute targets of every `a[href]` in `html`, in document order.
pub fn extract_links(html: &str, current_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_url(current_url, href))
        .collect()
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, etc.
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut url = base_url.join(href).ok()?;
    url.set_fragment(None);

    Some(url.to_string())
}
