use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use sqlsquid_core::deep_scan::{DeepScanNotifier, DeepScanTool, NoopNotifier, SqlmapNotifier};
use sqlsquid_core::events::{self, EventReceiver, ScanEvent};
use sqlsquid_core::model::ScanSummary;
use sqlsquid_core::payload::{default_payloads, load_payloads};
use sqlsquid_core::{CancelHandle, ScanConfiguration, ScanOrchestrator, ScanOutcome, ScanResult};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Options of the `scan` subcommand
#[derive(Debug, Clone)]
pub struct ScanArgs {
    pub url: String,
    pub payloads: Option<String>,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub threads: usize,
    pub sqlmap: Option<String>,
    pub python: String,
    pub output: Option<String>,
    pub wait: bool,
}

impl ScanArgs {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            url: matches.get_one::<String>("url").cloned().unwrap_or_default(),
            payloads: matches.get_one::<String>("payloads").cloned(),
            max_pages: *matches.get_one::<usize>("max-pages").unwrap_or(&30),
            timeout_secs: *matches.get_one::<u64>("timeout").unwrap_or(&10),
            threads: *matches.get_one::<usize>("threads").unwrap_or(&1),
            sqlmap: matches.get_one::<String>("sqlmap").cloned(),
            python: matches
                .get_one::<String>("python")
                .cloned()
                .unwrap_or_else(|| "python".to_string()),
            output: matches.get_one::<String>("output").cloned(),
            wait: matches.get_flag("wait"),
        }
    }

    /// Resolve payloads and validate the seed. Errors here stop the scan before it starts.
    pub fn configuration(&self) -> Result<ScanConfiguration> {
        let payloads = resolve_payloads(self.payloads.as_deref())?;
        let config = ScanConfiguration::new(&self.url, payloads)
            .with_context(|| format!("Cannot scan '{}'", self.url))?
            .with_page_budget(self.max_pages)
            .with_timeout(self.timeout_secs)
            .with_workers(self.threads);
        Ok(config)
    }

    pub fn deep_scan_tool(&self) -> Option<DeepScanTool> {
        self.sqlmap
            .as_deref()
            .map(|script| DeepScanTool::new(expand_path(script)).with_program(self.python.clone()))
    }
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Built-in payloads when no file is given, otherwise the file's non-blank lines
pub fn resolve_payloads(path: Option<&str>) -> Result<Vec<String>> {
    match path {
        Some(path) => {
            let payload_path = expand_path(path);
            let payloads = load_payloads(&payload_path)?;
            debug!("Loaded {} payloads from {}", payloads.len(), payload_path.display());
            Ok(payloads)
        }
        None => Ok(default_payloads()),
    }
}

pub fn result_header() -> String {
    format!(
        "{:<28} {:<40} {:<4} {:<18} {:<14} {:<14} {}",
        "PAYLOAD", "ACTION URL", "VULN", "ERROR CATEGORY", "SQLI TYPE", "STATUS/ERROR", "DB GUESS"
    )
}

/// One display line per result. Vulnerable rows are highlighted.
pub fn format_result_row(result: &ScanResult) -> String {
    let [payload, action_url, vulnerable, category, sqli_type, status, db_guess] = result.as_row();
    let vulnerable = format!("{:<4}", vulnerable);
    let vulnerable = if result.vulnerable {
        vulnerable.red().bold()
    } else {
        vulnerable.green()
    };

    format!(
        "{:<28} {:<40} {} {:<18} {:<14} {:<14} {}",
        payload, action_url, vulnerable, category, sqli_type, status, db_guess
    )
}

/// Distinct action URLs with at least one vulnerable result, sorted
pub fn vulnerable_actions(results: &[ScanResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.vulnerable)
        .map(|r| r.action_url.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Serialize the outcome of a scan as pretty JSON
pub fn export_report(path: &Path, outcome: &ScanOutcome) -> Result<()> {
    let report = json!({
        "scan_id": outcome.summary.scan_id,
        "state": outcome.state.as_str(),
        "summary": outcome.summary,
        "pages": outcome.pages,
        "vulnerable_actions": vulnerable_actions(&outcome.results),
        "results": outcome.results,
    });
    let body = serde_json::to_string_pretty(&report)?;
    fs::write(path, body).with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn progress_bar(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// Print above the progress bar. Works when the bar is hidden too.
fn print_line(bar: &ProgressBar, line: String) {
    bar.suspend(|| println!("{}", line));
}

fn deep_scan_lines(action_url: &str, databases: &[String]) -> Vec<String> {
    let mut lines = vec![format!(
        "{} sqlmap finished for {}",
        "◆".magenta().bold(),
        action_url.bright_white()
    )];
    lines.extend(databases.iter().map(|db| format!("    {} {}", "•".magenta(), db)));
    lines
}

/// Drive the display from the event stream until the scan reports completion
async fn follow_scan(rx: &mut EventReceiver, bar: &ProgressBar, quiet: bool) -> Result<()> {
    let mut header_printed = false;

    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::StateChanged(state) => debug!("Scan is now {}", state.as_str()),
            ScanEvent::PageVisited { visited, url } => {
                bar.set_message(format!("Crawling [{}] {}", visited, url));
            }
            ScanEvent::CrawlComplete { pages } => {
                if !quiet {
                    print_line(bar, format!(
                        "{} Crawl complete: {} page(s)",
                        "✓".green().bold(),
                        pages.len()
                    ));
                }
            }
            ScanEvent::ProgressTotal { total } => {
                bar.set_length(total as u64);
                bar.set_position(0);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                        .progress_chars("█▓░"),
                );
                bar.set_message("Probing forms");
            }
            ScanEvent::Result(result) => {
                if !header_printed {
                    print_line(bar, result_header().bold().to_string());
                    header_printed = true;
                }
                print_line(bar, format_result_row(&result));
            }
            ScanEvent::Progress { completed, .. } => bar.set_position(completed as u64),
            ScanEvent::DeepScanTriggered { action_url } => {
                print_line(bar, format!(
                    "{} Vulnerable form at {}, deep scan queued",
                    "⚠".yellow().bold(),
                    action_url.bright_white()
                ));
            }
            ScanEvent::DeepScanFinished {
                action_url,
                databases,
            } => {
                for line in deep_scan_lines(&action_url, &databases) {
                    print_line(bar, line);
                }
            }
            ScanEvent::Complete(_) => break,
        }
    }

    Ok(())
}

fn print_summary(outcome: &ScanOutcome) {
    let ScanSummary {
        scan_id,
        pages_crawled,
        payloads_tested,
        attempts,
        vulnerability_count,
        cancelled,
        ..
    } = &outcome.summary;

    println!();
    print_divider();
    if *cancelled {
        println!("{}", "  SCAN CANCELLED".yellow().bold());
    } else {
        println!("{}", "  SCAN COMPLETE".green().bold());
    }
    print_divider();
    println!("{} Scan ID: {}", "→".blue(), scan_id.dimmed());
    println!("{} Pages crawled: {}", "→".blue(), pages_crawled);
    println!("{} Payloads tested: {}", "→".blue(), payloads_tested);
    println!("{} Attempts: {}", "→".blue(), attempts);

    if *vulnerability_count == 0 {
        println!("{} No SQL injection indicators found", "✓".green().bold());
    } else {
        println!(
            "{} {} vulnerable result(s):",
            "✗".red().bold(),
            vulnerability_count
        );
        for action in vulnerable_actions(&outcome.results) {
            println!("  {} {}", "•".red(), action.bright_white());
        }
    }
    println!();
}

/// First Ctrl-C cancels the scan and lets it wind down, a second one exits.
async fn watch_interrupts(cancel: CancelHandle) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupted, cancelling scan (press Ctrl-C again to quit)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("{} Aborted", "✗".red().bold());
        std::process::exit(130);
    }
}

pub async fn handle_scan(args: ScanArgs, quiet: bool) -> Result<()> {
    let config = args.configuration()?;

    if !quiet {
        println!("\n🦑 Scanning {}", config.seed.bright_white());
        println!("Payloads: {}", config.payloads.len());
        println!("Page budget: {}", config.page_budget);
        println!("Workers: {}", config.workers);
        println!(
            "Deep scan: {}\n",
            args.sqlmap.as_deref().unwrap_or("disabled")
        );
    }

    let (tx, mut rx) = events::channel();
    let sqlmap = args
        .deep_scan_tool()
        .map(|tool| Arc::new(SqlmapNotifier::new(tool).with_events(tx.clone())));
    let notifier: Arc<dyn DeepScanNotifier> = match &sqlmap {
        Some(sqlmap) => sqlmap.clone(),
        None => Arc::new(NoopNotifier),
    };

    let orchestrator = ScanOrchestrator::new(config)?
        .with_notifier(notifier)
        .with_events(tx);

    let cancel = orchestrator.cancel_handle();
    let interrupt = tokio::spawn(watch_interrupts(cancel));

    let scan = tokio::spawn(async move { orchestrator.run().await });

    let bar = progress_bar(quiet)?;
    let followed = follow_scan(&mut rx, &bar, quiet).await;
    let outcome = scan.await.context("Scan task failed")?;
    interrupt.abort();
    followed?;
    bar.finish_and_clear();

    if let Some(sqlmap) = &sqlmap {
        let pending = sqlmap.pending();
        if args.wait && pending > 0 {
            let spinner = progress_bar(quiet)?;
            spinner.set_message(format!("Waiting for {} deep scan(s)", pending));
            tokio::select! {
                drained = sqlmap.drain() => drained?,
                _ = tokio::signal::ctrl_c() => warn!("Stopped waiting for deep scans"),
            }
            spinner.finish_and_clear();
        } else if pending > 0 && !quiet {
            println!(
                "{} {} deep scan(s) still running will be abandoned on exit (use --wait)",
                "ℹ".blue(),
                pending
            );
        }

        while let Ok(event) = rx.try_recv() {
            if let ScanEvent::DeepScanFinished {
                action_url,
                databases,
            } = event
            {
                for line in deep_scan_lines(&action_url, &databases) {
                    println!("{}", line);
                }
            }
        }
    }

    print_summary(&outcome);

    if let Some(output) = &args.output {
        let path = expand_path(output);
        export_report(&path, &outcome)?;
        println!(
            "{} Report written to {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }

    Ok(())
}

pub async fn handle_dbs(matches: &ArgMatches) -> Result<()> {
    let url = matches
        .get_one::<Url>("url")
        .context("--url is required")?;
    let script = matches
        .get_one::<String>("sqlmap")
        .context("--sqlmap is required")?;
    let python = matches
        .get_one::<String>("python")
        .map(String::as_str)
        .unwrap_or("python");

    let tool = DeepScanTool::new(expand_path(script)).with_program(python);

    let spinner = progress_bar(false)?;
    spinner.set_message(format!("Enumerating databases at {}", url));
    let databases = tool.run(url.as_str()).await;
    spinner.finish_and_clear();

    println!("{} {}", "DATABASES".bright_blue().bold(), url.as_str().dimmed());
    for db in &databases {
        println!("  {} {}", "•".magenta(), db);
    }

    Ok(())
}
