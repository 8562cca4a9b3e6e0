pub mod deep_scan;
pub mod detect;
pub mod events;
pub mod inject;
pub mod model;
pub mod payload;
pub mod scan;

use colored::Colorize;

pub use sqlsquid_scanner::error::{Result, ScanError};

pub use deep_scan::{ChannelNotifier, DeepScanNotifier, DeepScanTool, NoopNotifier, SqlmapNotifier};
pub use detect::{Detection, detect};
pub use events::ScanEvent;
pub use model::{InjectionAttempt, ScanResult, ScanState, ScanSummary, StatusOrError};
pub use scan::{CancelHandle, ScanConfiguration, ScanOrchestrator, ScanOutcome};

pub fn print_banner() {
    let banner = r#"
   ____   ___  _       ____                   _     _
  / ___| / _ \| |     / ___|  __ _ _   _ (_) __| |
  \___ \| | | | |     \___ \ / _` | | | || |/ _` |
   ___) | |_| | |___   ___) | (_| | |_| || | (_| |
  |____/ \__\_\_____| |____/ \__, |\__,_||_|\__,_|
                                |_|
"#;
    println!("{}", banner.bright_magenta().bold());
    println!(
        "  {} {}\n",
        "form-crawling SQL injection scanner".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
