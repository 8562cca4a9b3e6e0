//! Hand-off of confirmed-vulnerable action URLs to an external
//! enumeration tool (sqlmap).
//!
//! The scan only ever calls [`DeepScanNotifier::submit`]; what happens with
//! the URL afterwards is up to the notifier.

use crate::events::{EventSender, ScanEvent, emit};
use sqlsquid_scanner::error::{Result, ScanError};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const NO_DATABASES: &str = "No databases found.";

pub trait DeepScanNotifier: Send + Sync {
    /// Must return immediately; the scan does not wait for the deep scan.
    fn submit(&self, action_url: &str);
}

/// Deep scanning disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl DeepScanNotifier for NoopNotifier {
    fn submit(&self, action_url: &str) {
        info!("Deep scan disabled, not submitting {}", action_url);
    }
}

/// Forwards action URLs to a channel for someone else to act on.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DeepScanNotifier for ChannelNotifier {
    fn submit(&self, action_url: &str) {
        if self.tx.send(action_url.to_string()).is_err() {
            warn!("Deep scan receiver dropped, {} not submitted", action_url);
        }
    }
}

/// How to invoke the external tool: `program script -u <url> --batch --dbs`
#[derive(Debug, Clone)]
pub struct DeepScanTool {
    pub program: String,
    pub script: PathBuf,
}

impl DeepScanTool {
    pub fn new(script: PathBuf) -> Self {
        Self {
            program: "python".to_string(),
            script,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run the tool and return the databases it listed.
    pub async fn enumerate_databases(&self, url: &str) -> Result<Vec<String>> {
        info!("Running deep scan against {}", url);

        let output = Command::new(&self.program)
            .arg(&self.script)
            .args(["-u", url, "--batch", "--dbs"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ScanError::DeepScanToolFailure(format!("failed to launch {}: {}", self.program, e)))?;

        let databases = parse_database_listing(&String::from_utf8_lossy(&output.stdout));
        if databases.is_empty() && !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::DeepScanToolFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(databases)
    }

    /// Like `enumerate_databases` but folds every outcome into the list
    /// shown to the user.
    pub async fn run(&self, url: &str) -> Vec<String> {
        match self.enumerate_databases(url).await {
            Ok(dbs) if dbs.is_empty() => vec![NO_DATABASES.to_string()],
            Ok(dbs) => dbs,
            Err(e) => {
                warn!("Deep scan of {} failed: {}", url, e);
                vec![format!("Error: {}", e)]
            }
        }
    }
}

/// Lines of the form `[*] name`, prefix stripped.
pub fn parse_database_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("[*]"))
        .map(|rest| rest.trim().to_string())
        .collect()
}

/// Spawns one background task per submitted URL and reports the outcome as
/// a `DeepScanFinished` event.
pub struct SqlmapNotifier {
    tool: DeepScanTool,
    events: Option<EventSender>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SqlmapNotifier {
    pub fn new(tool: DeepScanTool) -> Self {
        Self {
            tool,
            events: None,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .map(|handles| handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Wait for every deep scan submitted so far.
    pub async fn drain(&self) -> Result<()> {
        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => return Err(ScanError::Other("deep scan task list poisoned".to_string())),
        };

        for handle in handles {
            handle.await?;
        }
        Ok(())
    }
}

impl DeepScanNotifier for SqlmapNotifier {
    fn submit(&self, action_url: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, deep scan of {} skipped", action_url);
            return;
        };

        let tool = self.tool.clone();
        let events = self.events.clone();
        let action_url = action_url.to_string();

        let handle = runtime.spawn(async move {
            let databases = tool.run(&action_url).await;
            emit(
                &events,
                ScanEvent::DeepScanFinished {
                    action_url,
                    databases,
                },
            );
        });

        if let Ok(mut handles) = self.handles.lock() {
            handles.push(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_listing() {
        let output = "\
[12:00:01] [INFO] testing connection to the target URL
available databases [2]:
[*] information_schema
[*] shop
";
        assert_eq!(
            parse_database_listing(output),
            vec!["information_schema".to_string(), "shop".to_string()]
        );
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_database_listing("[INFO] nothing here\n").is_empty());
    }
}
