// End-to-end tests for the scan orchestrator against mock servers

use sqlsquid_core::events::{self, ScanEvent};
use sqlsquid_core::{
    CancelHandle, ChannelNotifier, DeepScanNotifier, ScanConfiguration, ScanError, ScanOrchestrator, ScanState,
};
use sqlsquid_core::scan::normalize_seed;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const MYSQL_ERROR: &str = "<b>Warning</b>: mysql_fetch_array() expects parameter 1 to be resource";

async fn mount_html(server: &MockServer, at: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(at.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_bytes(html.into_bytes()),
        )
        .mount(server)
        .await;
}

async fn mount_response(server: &MockServer, verb: &str, at: &str, status: u16, body: &str) {
    Mock::given(method(verb))
        .and(path(at.to_string()))
        .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

fn drain_events(rx: &mut events::EventReceiver) -> Vec<ScanEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_seed_without_scheme_gets_http() {
    assert_eq!(normalize_seed("test.local/login").unwrap(), "http://test.local/login");
    assert_eq!(normalize_seed("  https://test.local ").unwrap(), "https://test.local");
}

#[test]
fn test_blank_seed_blocks_scan() {
    assert!(matches!(normalize_seed("   "), Err(ScanError::MissingSeed)));
    assert!(ScanConfiguration::new("", vec!["'".to_string()]).is_err());
}

#[test]
fn test_configuration_defaults() {
    let config = ScanConfiguration::new("example.com", vec!["'".to_string()]).unwrap();

    assert_eq!(config.seed, "http://example.com");
    assert_eq!(config.page_budget, 30);
    assert_eq!(config.timeout_secs, 10);
    assert_eq!(config.workers, 1);
    assert_eq!(config.with_workers(0).workers, 1);
}

#[test]
fn test_empty_payload_list_blocks_scan() {
    assert!(ScanConfiguration::new("example.com", Vec::new()).is_err());
}

// ============================================================================
// End-to-end Tests
// ============================================================================

#[tokio::test]
async fn test_login_form_with_mysql_error_is_flagged() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/login",
        r#"<html><body>
            <form action="/do_login" method="post">
                <input type="text" name="user">
                <input type="password" name="pass">
            </form>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_response(&mock_server, "POST", "/do_login", 200, MYSQL_ERROR).await;

    let seed = format!("{}/login", mock_server.uri());
    let config = ScanConfiguration::new(&seed, vec!["' OR '1'='1".to_string()]).unwrap();
    let (notifier, mut deep_rx) = ChannelNotifier::new();
    let orchestrator = ScanOrchestrator::new(config)
        .unwrap()
        .with_notifier(Arc::new(notifier));

    let outcome = orchestrator.run().await;

    let action = format!("{}/do_login", mock_server.uri());
    assert_eq!(outcome.state, ScanState::Completed);
    assert_eq!(orchestrator.state(), ScanState::Completed);
    assert_eq!(outcome.pages, vec![seed]);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(
        outcome.results[0].as_row(),
        [
            "' OR '1'='1".to_string(),
            action.clone(),
            "Yes".to_string(),
            "MySQL Error".to_string(),
            "Boolean-based".to_string(),
            "200".to_string(),
            "MySQL".to_string(),
        ]
    );
    assert_eq!(outcome.summary.vulnerability_count, 1);
    assert_eq!(outcome.summary.payloads_tested, 1);
    assert_eq!(deep_rx.try_recv().unwrap(), action);
    assert!(deep_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_deep_scan_fires_once_per_action_url() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/login",
        r#"<form action="/vuln" method="post"><input name="user"></form>
           <form action="/vuln" method="post"><input name="email" type="email"></form>"#
            .to_string(),
    )
    .await;
    mount_response(&mock_server, "POST", "/vuln", 200, MYSQL_ERROR).await;

    let seed = format!("{}/login", mock_server.uri());
    let payloads = vec!["'".to_string(), "\"".to_string(), "admin'--".to_string()];
    let config = ScanConfiguration::new(&seed, payloads).unwrap();
    let (notifier, mut deep_rx) = ChannelNotifier::new();
    let (tx, mut rx) = events::channel();
    let orchestrator = ScanOrchestrator::new(config)
        .unwrap()
        .with_notifier(Arc::new(notifier))
        .with_events(tx);

    let outcome = orchestrator.run().await;

    assert_eq!(outcome.results.len(), 6);
    assert!(outcome.results.iter().all(|r| r.vulnerable));
    assert_eq!(deep_rx.try_recv().unwrap(), format!("{}/vuln", mock_server.uri()));
    assert!(deep_rx.try_recv().is_err());

    let triggered = drain_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ScanEvent::DeepScanTriggered { .. }))
        .count();
    assert_eq!(triggered, 1);
}

/// Pages without forms add to the progress total but produce no rows
#[tokio::test]
async fn test_progress_total_counts_formless_pages() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();
    mount_html(
        &mock_server,
        "/",
        format!(r#"<a href="{uri}/login">Login</a><a href="{uri}/account">Account</a>"#),
    )
    .await;
    mount_html(
        &mock_server,
        "/login",
        r#"<form method="get"><input name="q"></form>"#.to_string(),
    )
    .await;
    mount_html(&mock_server, "/account", "<p>no forms here</p>".to_string()).await;

    let config = ScanConfiguration::new(&uri, vec!["a'".to_string(), "b'".to_string()]).unwrap();
    let (tx, mut rx) = events::channel();
    let orchestrator = ScanOrchestrator::new(config).unwrap().with_events(tx);

    let outcome = orchestrator.run().await;

    assert_eq!(outcome.pages.len(), 3);
    assert_eq!(outcome.summary.progress_total, 6);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.iter().all(|r| !r.vulnerable));

    let events = drain_events(&mut rx);
    let states: Vec<ScanState> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![ScanState::Crawling, ScanState::Probing, ScanState::Completed]);

    let progress: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Progress { completed, total } => Some((*completed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 6), (2, 6)]);

    let visits = events
        .iter()
        .filter(|e| matches!(e, ScanEvent::PageVisited { .. }))
        .count();
    assert_eq!(visits, 3);
    assert!(matches!(events.last(), Some(ScanEvent::Complete(s)) if s.attempts == 2));
}

#[tokio::test]
async fn test_network_errors_do_not_abort_scan() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/login",
        r#"<form action="http://127.0.0.1:1/gone" method="post"><input name="user"></form>"#.to_string(),
    )
    .await;

    let seed = format!("{}/login", mock_server.uri());
    let config = ScanConfiguration::new(&seed, vec!["'".to_string(), "''".to_string()]).unwrap();
    let orchestrator = ScanOrchestrator::new(config).unwrap();

    let outcome = orchestrator.run().await;

    assert_eq!(outcome.state, ScanState::Completed);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.iter().all(|r| r.error_category == "Network Error"));
    assert_eq!(outcome.summary.vulnerability_count, 0);
}

/// Concurrent page probing keeps one row per attempt and one trigger per URL
#[tokio::test]
async fn test_concurrent_workers_share_vulnerable_set() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();

    let mut root_html = String::new();
    for i in 1..=5 {
        root_html.push_str(&format!(r#"<a href="{uri}/login{i}">Login {i}</a>"#));
    }
    mount_html(&mock_server, "/", root_html).await;
    for i in 1..=5 {
        mount_html(
            &mock_server,
            &format!("/login{i}"),
            r#"<form action="/vuln" method="post"><input name="user"></form>"#.to_string(),
        )
        .await;
    }
    mount_response(&mock_server, "POST", "/vuln", 200, "SQLSTATE[42000]").await;

    let config = ScanConfiguration::new(&uri, vec!["'".to_string(), "\"".to_string()])
        .unwrap()
        .with_workers(4);
    let (notifier, mut deep_rx) = ChannelNotifier::new();
    let (tx, mut rx) = events::channel();
    let orchestrator = ScanOrchestrator::new(config)
        .unwrap()
        .with_notifier(Arc::new(notifier))
        .with_events(tx);

    let outcome = orchestrator.run().await;

    assert_eq!(outcome.pages.len(), 6);
    assert_eq!(outcome.summary.progress_total, 12);
    assert_eq!(outcome.results.len(), 10);
    assert!(deep_rx.try_recv().is_ok());
    assert!(deep_rx.try_recv().is_err());

    // progress arrives in order even with several workers
    let completed: Vec<usize> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ScanEvent::Progress { completed, .. } => Some(completed),
            _ => None,
        })
        .collect();
    assert_eq!(completed, (1..=10).collect::<Vec<_>>());
}

/// The scan can be driven from a background task while events are consumed
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_runs_on_spawned_task() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/login",
        r#"<form action="/do_login" method="post"><input name="user"></form>"#.to_string(),
    )
    .await;
    mount_response(&mock_server, "POST", "/do_login", 500, MYSQL_ERROR).await;

    let seed = format!("{}/login", mock_server.uri());
    let config = ScanConfiguration::new(&seed, vec!["'".to_string(), "admin'--".to_string()])
        .unwrap()
        .with_workers(2);
    let (tx, mut rx) = events::channel();
    let orchestrator = ScanOrchestrator::new(config).unwrap().with_events(tx);

    let handle = tokio::spawn(async move { orchestrator.run().await });

    let mut rows = 0;
    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::Result(_) => rows += 1,
            ScanEvent::Complete(summary) => {
                assert_eq!(summary.attempts, 2);
                break;
            }
            _ => {}
        }
    }

    let outcome = handle.await.unwrap();
    assert_eq!(rows, 2);
    assert_eq!(outcome.state, ScanState::Completed);
    assert_eq!(outcome.summary.vulnerability_count, 2);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

struct CancelOnSubmit {
    handle: CancelHandle,
    submitted: AtomicUsize,
}

impl DeepScanNotifier for CancelOnSubmit {
    fn submit(&self, _action_url: &str) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.handle.cancel();
    }
}

#[tokio::test]
async fn test_cancel_before_run_skips_crawl() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/login",
        r#"<form method="post"><input name="user"></form>"#.to_string(),
    )
    .await;

    let seed = format!("{}/login", mock_server.uri());
    let config = ScanConfiguration::new(&seed, vec!["'".to_string()]).unwrap();
    let orchestrator = ScanOrchestrator::new(config).unwrap();
    orchestrator.cancel_handle().cancel();

    let outcome = orchestrator.run().await;

    assert_eq!(outcome.state, ScanState::Cancelled);
    assert!(outcome.pages.is_empty());
    assert!(outcome.results.is_empty());
    assert!(outcome.summary.cancelled);
    // cancellation also stops the crawl, so nothing was fetched
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_cancel_mid_scan_keeps_collected_results() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/login",
        r#"<form action="/vuln" method="post"><input name="user"></form>"#.to_string(),
    )
    .await;
    mount_response(&mock_server, "POST", "/vuln", 200, MYSQL_ERROR).await;

    let seed = format!("{}/login", mock_server.uri());
    let payloads = vec!["1'".to_string(), "2'".to_string(), "3'".to_string()];
    let config = ScanConfiguration::new(&seed, payloads).unwrap();
    let orchestrator = ScanOrchestrator::new(config).unwrap();
    let notifier = Arc::new(CancelOnSubmit {
        handle: orchestrator.cancel_handle(),
        submitted: AtomicUsize::new(0),
    });
    let orchestrator = orchestrator.with_notifier(notifier.clone());

    let outcome = orchestrator.run().await;

    assert_eq!(outcome.state, ScanState::Cancelled);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].payload, "1'");
    assert_eq!(notifier.submitted.load(Ordering::SeqCst), 1);
}
