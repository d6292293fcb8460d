//! Maps the outcome of one transport attempt to a typed error and a retry
//! decision.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value as JsonValue;

use crate::{ApiError, ManapoolError, NetworkError};

/// Raw result of one round trip.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Success {
        status: u16,
        body: Vec<u8>,
    },
    TransportFailure(reqwest::Error),
    HttpFailure {
        status: u16,
        body: Vec<u8>,
        request_id: Option<String>,
        retry_after: Option<Duration>,
    },
}

#[derive(Debug)]
pub(crate) enum Classification {
    Success(Vec<u8>),
    Failure {
        error: ManapoolError,
        retryable: bool,
        retry_after: Option<Duration>,
    },
}

pub(crate) fn classify(outcome: AttemptOutcome) -> Classification {
    match outcome {
        AttemptOutcome::Success { body, .. } => Classification::Success(body),
        AttemptOutcome::TransportFailure(err) => {
            let retryable = is_retryable_transport(&err);
            Classification::Failure {
                error: NetworkError::transport(describe_transport(&err), err).into(),
                retryable,
                retry_after: None,
            }
        }
        AttemptOutcome::HttpFailure {
            status,
            body,
            request_id,
            retry_after,
        } => Classification::Failure {
            error: api_error(status, &body, request_id).into(),
            retryable: is_retryable_status(status),
            retry_after: (status == 429).then_some(retry_after).flatten(),
        },
    }
}

/// Returns `true` for statuses worth another attempt: 429 and any 5xx.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Returns `true` for transport failures worth another attempt.
///
/// Only request-construction errors are terminal: retrying them would fail
/// identically.
pub(crate) fn is_retryable_transport(err: &reqwest::Error) -> bool {
    !err.is_builder()
}

fn describe_transport(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "failed to read response body"
    } else if err.is_builder() {
        "invalid request"
    } else {
        "request failed"
    }
}

/// Builds an [`ApiError`] from a non-success response.
///
/// Message and request id come from the JSON body when it has them; anything
/// else falls back to the status text and the raw body.
pub(crate) fn api_error(status: u16, body: &[u8], header_request_id: Option<String>) -> ApiError {
    let raw = String::from_utf8_lossy(body).into_owned();
    let parsed = serde_json::from_slice::<JsonValue>(body).ok();

    let message = parsed
        .as_ref()
        .and_then(extract_message)
        .unwrap_or_else(|| fallback_message(status, &raw));
    let request_id = parsed
        .as_ref()
        .and_then(extract_request_id)
        .or(header_request_id);

    ApiError {
        status,
        message,
        request_id,
        body: raw,
    }
}

fn extract_message(value: &JsonValue) -> Option<String> {
    let object = value.as_object()?;
    for key in ["error", "message", "detail"] {
        match object.get(key) {
            Some(JsonValue::String(text)) if !text.is_empty() => return Some(text.clone()),
            Some(nested @ JsonValue::Object(_)) => {
                if let Some(text) = extract_message(nested) {
                    return Some(text);
                }
            }
            _ => {}
        }
    }
    None
}

fn extract_request_id(value: &JsonValue) -> Option<String> {
    let object = value.as_object()?;
    ["request_id", "requestId"]
        .iter()
        .find_map(|key| object.get(*key)?.as_str().map(str::to_owned))
}

fn fallback_message(status: u16, raw: &str) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {status}"));
    let raw = raw.trim();
    if raw.is_empty() {
        reason
    } else {
        format!("{reason}: {raw}")
    }
}

/// Parses a delta-seconds `Retry-After` value. HTTP-date values are ignored.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
