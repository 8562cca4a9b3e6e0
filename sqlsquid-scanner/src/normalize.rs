//! URL canonicalization used as the crawler's dedup key.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Lower-cased `scheme://host[:port]/path` with query, fragment and one
/// trailing slash removed. Only ever used as a set key; requests are made
/// with the original URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a URL. Never fails: input that does not parse as an absolute
/// URL is canonicalized textually.
pub fn normalize(url: &str) -> NormalizedUrl {
    let canonical = match Url::parse(url.trim()) {
        Ok(parsed) => {
            let mut out = format!("{}://", parsed.scheme());
            if !parsed.username().is_empty() {
                out.push_str(parsed.username());
                if let Some(password) = parsed.password() {
                    out.push(':');
                    out.push_str(password);
                }
                out.push('@');
            }
            out.push_str(parsed.host_str().unwrap_or(""));
            if let Some(port) = parsed.port() {
                out.push_str(&format!(":{}", port));
            }
            out.push_str(strip_one_slash(parsed.path()));
            out
        }
        Err(_) => {
            let without_fragment = url.trim().split('#').next().unwrap_or("");
            let without_query = without_fragment.split('?').next().unwrap_or("");
            strip_one_slash(without_query).to_string()
        }
    };

    NormalizedUrl(canonical.to_lowercase())
}

fn strip_one_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}
