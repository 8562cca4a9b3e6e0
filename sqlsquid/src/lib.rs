pub mod handlers;

pub use handlers::{
    ScanArgs, export_report, expand_path, format_result_row, resolve_payloads, result_header,
    vulnerable_actions,
};
