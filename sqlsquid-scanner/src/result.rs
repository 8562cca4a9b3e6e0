use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub response_time: Duration,
    pub body: String,
}

impl FetchedPage {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            content_type: None,
            response_time: Duration::from_secs(0),
            body: String::new(),
        }
    }

    /// Pages without a content-type header are given the benefit of the doubt.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_ref()
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(true)
    }
}
