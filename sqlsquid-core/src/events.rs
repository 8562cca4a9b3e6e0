use crate::model::{ScanResult, ScanState, ScanSummary};
use tokio::sync::mpsc;

/// Messages streamed from a running scan to whatever is displaying it
#[derive(Debug, Clone)]
pub enum ScanEvent {
    StateChanged(ScanState),
    /// A page was popped from the frontier
    PageVisited {
        visited: usize,
        url: String,
    },
    CrawlComplete {
        pages: Vec<String>,
    },
    /// Progress denominator, fixed once crawling is done
    ProgressTotal {
        total: usize,
    },
    Result(ScanResult),
    Progress {
        completed: usize,
        total: usize,
    },
    DeepScanTriggered {
        action_url: String,
    },
    DeepScanFinished {
        action_url: String,
        databases: Vec<String>,
    },
    Complete(ScanSummary),
}

pub type EventSender = mpsc::UnboundedSender<ScanEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ScanEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send if anyone is listening. A closed receiver is not an error.
pub(crate) fn emit(sender: &Option<EventSender>, event: ScanEvent) {
    if let Some(tx) = sender {
        let _ = tx.send(event);
    }
}
