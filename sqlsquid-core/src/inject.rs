use crate::detect::detect;
use crate::model::{InjectionAttempt, ScanResult, StatusOrError};
use sqlsquid_scanner::error::Result;
use sqlsquid_scanner::{FetchedPage, Fetcher, FormDescriptor, FormMethod};
use tracing::{debug, warn};

/// Input types that receive the payload. Everything else keeps its default.
pub const TEXTUAL_INPUT_TYPES: [&str; 5] = ["text", "password", "search", "email", "url"];

pub fn is_textual(input_type: &str) -> bool {
    TEXTUAL_INPUT_TYPES.contains(&input_type)
}

/// One attempt per payload, in payload order.
pub fn build_attempts(form: &FormDescriptor, payloads: &[String]) -> Vec<InjectionAttempt> {
    payloads
        .iter()
        .map(|payload| InjectionAttempt {
            payload: payload.clone(),
            form_action: form.action.clone(),
            method: form.method,
            submitted_fields: submitted_fields(form, payload),
        })
        .collect()
}

/// A repeated name keeps its first position and takes the last value.
fn submitted_fields(form: &FormDescriptor, payload: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::with_capacity(form.inputs.len());
    for input in &form.inputs {
        let value = if is_textual(&input.input_type) {
            payload.to_string()
        } else {
            input.default_value.clone()
        };

        match fields.iter_mut().find(|(name, _)| *name == input.name) {
            Some(existing) => existing.1 = value,
            None => fields.push((input.name.clone(), value)),
        }
    }
    fields
}

pub async fn dispatch(fetcher: &Fetcher, attempt: &InjectionAttempt) -> Result<FetchedPage> {
    match attempt.method {
        FormMethod::Post => {
            fetcher
                .post_form(&attempt.form_action, &attempt.submitted_fields)
                .await
        }
        FormMethod::Get => {
            fetcher
                .get_with_query(&attempt.form_action, &attempt.submitted_fields)
                .await
        }
    }
}

/// Send the attempt and classify the response. Transport failures become a
/// `Network Error` row rather than an error.
pub async fn probe(fetcher: &Fetcher, attempt: &InjectionAttempt) -> ScanResult {
    match dispatch(fetcher, attempt).await {
        Ok(page) => {
            let detection = detect(&page.body);
            debug!(
                "{} {} [{}] -> {} vulnerable={}",
                attempt.method, attempt.form_action, attempt.payload, page.status_code, detection.is_vulnerable
            );
            ScanResult {
                payload: attempt.payload.clone(),
                action_url: attempt.form_action.clone(),
                vulnerable: detection.is_vulnerable,
                error_category: detection.error_category().to_string(),
                sqli_type: detection.sqli_type().to_string(),
                status_or_error: StatusOrError::Status(page.status_code),
                db_guess: detection.db_guess().to_string(),
            }
        }
        Err(e) => {
            warn!("Probe of {} failed: {}", attempt.form_action, e);
            ScanResult::network_error(attempt, e.to_string())
        }
    }
}
