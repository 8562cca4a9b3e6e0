// Payload sources: the built-in list or a newline-delimited file

use sqlsquid_scanner::error::{Result, ScanError};
use std::fs;
use std::path::Path;
use tracing::info;

pub const DEFAULT_PAYLOADS: [&str; 4] = ["' OR '1'='1", "admin'--", "' OR 1=1--", "' OR 'a'='a"];

pub fn default_payloads() -> Vec<String> {
    DEFAULT_PAYLOADS.iter().map(|p| p.to_string()).collect()
}

/// Load payloads from file, one per non-blank line, trimmed, order kept.
/// Lines starting with `#` are payloads too (SQL comment syntax).
pub fn load_payloads(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| ScanError::PayloadFileUnreadable {
        path: path.display().to_string(),
        source: e,
    })?;

    let payloads = parse_payloads(&content);
    if payloads.is_empty() {
        return Err(ScanError::EmptyPayloadFile(path.display().to_string()));
    }

    info!("Loaded {} payloads from {}", payloads.len(), path.display());
    Ok(payloads)
}

pub fn parse_payloads(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
