use crate::deep_scan::{DeepScanNotifier, NoopNotifier};
use crate::events::{EventSender, ScanEvent, emit};
use crate::inject::{build_attempts, probe};
use crate::model::{ScanResult, ScanState, ScanSummary};
use futures::stream::{self, StreamExt};
use sqlsquid_scanner::crawler::DEFAULT_PAGE_BUDGET;
use sqlsquid_scanner::error::{Result, ScanError};
use sqlsquid_scanner::fetcher::DEFAULT_TIMEOUT_SECS;
use sqlsquid_scanner::{Crawler, Fetcher, ProgressCallback, StopCallback, extract_forms};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Everything a scan needs, fixed before it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfiguration {
    pub seed: String,
    pub payloads: Vec<String>,
    pub page_budget: usize,
    pub timeout_secs: u64,
    /// Pages probed concurrently. 1 reproduces strictly sequential probing.
    pub workers: usize,
}

impl ScanConfiguration {
    pub fn new(seed: &str, payloads: Vec<String>) -> Result<Self> {
        let seed = normalize_seed(seed)?;
        if payloads.is_empty() {
            return Err(ScanError::Other("No payloads to test".to_string()));
        }

        Ok(Self {
            seed,
            payloads,
            page_budget: DEFAULT_PAGE_BUDGET,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: 1,
        })
    }

    pub fn with_page_budget(mut self, page_budget: usize) -> Self {
        self.page_budget = page_budget;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Trim the seed and prepend `http://` when it has no scheme.
pub fn normalize_seed(input: &str) -> Result<String> {
    let seed = input.trim();
    if seed.is_empty() {
        return Err(ScanError::MissingSeed);
    }

    if seed.starts_with("http://") || seed.starts_with("https://") {
        Ok(seed.to_string())
    } else {
        Ok(format!("http://{}", seed))
    }
}

/// Cooperative cancellation, checked before every payload attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub state: ScanState,
    pub pages: Vec<String>,
    pub results: Vec<ScanResult>,
    pub summary: ScanSummary,
}

/// State owned by a single `run`; dropped when the run ends.
struct ProbeRun {
    results: Mutex<Vec<ScanResult>>,
    vulnerable_urls: Mutex<HashSet<String>>,
    completed: AtomicUsize,
    total: usize,
}

pub struct ScanOrchestrator {
    config: ScanConfiguration,
    fetcher: Fetcher,
    notifier: Arc<dyn DeepScanNotifier>,
    events: Option<EventSender>,
    cancel: CancelHandle,
    state: StdMutex<ScanState>,
}

impl ScanOrchestrator {
    pub fn new(config: ScanConfiguration) -> Result<Self> {
        let fetcher = Fetcher::with_timeout(config.timeout_secs)?;
        Ok(Self {
            config,
            fetcher,
            notifier: Arc::new(NoopNotifier),
            events: None,
            cancel: CancelHandle::default(),
            state: StdMutex::new(ScanState::Idle),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn DeepScanNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        debug!("Scan state -> {}", state.as_str());
        emit(&self.events, ScanEvent::StateChanged(state));
    }

    /// Crawl, then probe every form on every crawled page with every payload.
    pub async fn run(&self) -> ScanOutcome {
        let scan_id = Uuid::new_v4().to_string();
        info!("Scan {} starting at {}", scan_id, self.config.seed);

        self.set_state(ScanState::Crawling);
        let events = self.events.clone();
        let on_visit: ProgressCallback = Arc::new(move |visited: usize, url: String| {
            emit(&events, ScanEvent::PageVisited { visited, url });
        });
        let cancel = self.cancel.clone();
        let stop: StopCallback = Arc::new(move || cancel.is_cancelled());
        let crawler = Crawler::new(self.fetcher.clone())
            .with_page_budget(self.config.page_budget)
            .with_progress_callback(on_visit)
            .with_stop_callback(stop);
        let pages = crawler.crawl(&self.config.seed).await;
        emit(
            &self.events,
            ScanEvent::CrawlComplete {
                pages: pages.clone(),
            },
        );

        // Pages without forms still count toward the denominator.
        let total = self.config.payloads.len() * pages.len();
        emit(&self.events, ScanEvent::ProgressTotal { total });

        self.set_state(ScanState::Probing);
        let run = ProbeRun {
            results: Mutex::new(Vec::new()),
            vulnerable_urls: Mutex::new(HashSet::new()),
            completed: AtomicUsize::new(0),
            total,
        };

        let shared = &run;
        stream::iter(pages.clone())
            .map(|page| async move { self.probe_page(&page, shared).await })
            .buffer_unordered(self.config.workers.max(1))
            .collect::<Vec<()>>()
            .await;

        let cancelled = self.cancel.is_cancelled();
        let results = run.results.into_inner();
        let summary = ScanSummary {
            scan_id,
            pages_crawled: pages.len(),
            payloads_tested: self.config.payloads.len(),
            attempts: results.len(),
            progress_total: total,
            vulnerability_count: results.iter().filter(|r| r.vulnerable).count(),
            cancelled,
        };

        let state = if cancelled {
            ScanState::Cancelled
        } else {
            ScanState::Completed
        };
        self.set_state(state);
        info!(
            "Scan {} {}: {} attempts, {} vulnerable",
            summary.scan_id,
            state.as_str(),
            summary.attempts,
            summary.vulnerability_count
        );
        emit(&self.events, ScanEvent::Complete(summary.clone()));

        ScanOutcome {
            state,
            pages,
            results,
            summary,
        }
    }

    async fn probe_page(&self, page_url: &str, run: &ProbeRun) {
        if self.cancel.is_cancelled() {
            return;
        }

        let forms = extract_forms(&self.fetcher, page_url).await;
        debug!("{} forms on {}", forms.len(), page_url);

        for form in &forms {
            for attempt in build_attempts(form, &self.config.payloads) {
                if self.cancel.is_cancelled() {
                    debug!("Cancelled, skipping remaining attempts on {}", page_url);
                    return;
                }
                let result = probe(&self.fetcher, &attempt).await;
                self.record(result, run).await;
            }
        }
    }

    async fn record(&self, result: ScanResult, run: &ProbeRun) {
        if result.vulnerable {
            // insert() is the check; only the inserting caller notifies
            let first_hit = run
                .vulnerable_urls
                .lock()
                .await
                .insert(result.action_url.clone());
            if first_hit {
                info!("{} looks injectable, submitting for deep scan", result.action_url);
                self.notifier.submit(&result.action_url);
                emit(
                    &self.events,
                    ScanEvent::DeepScanTriggered {
                        action_url: result.action_url.clone(),
                    },
                );
            }
        }

        // emit under the lock so event order matches log order and
        // progress never goes backwards
        let mut results = run.results.lock().await;
        results.push(result.clone());
        emit(&self.events, ScanEvent::Result(result));

        let completed = run.completed.fetch_add(1, Ordering::SeqCst) + 1;
        emit(
            &self.events,
            ScanEvent::Progress {
                completed,
                total: run.total,
            },
        );
    }
}
