//! Error normalization
//!
//! Maps every raw transport outcome to the single [`ApiError`] shape callers
//! see. Three cases are distinguished:
//!
//! - a response arrived with a non-success status
//! - the request was sent but nothing came back
//! - the request could not be dispatched at all

use quire_domain::constants::{NO_CONNECTIVITY_MESSAGE, UNKNOWN_ERROR_MESSAGE};
use quire_domain::{ApiError, FieldErrors};
use serde_json::Value;

use super::ports::{TransportError, TransportResponse};

/// Raw failure before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawError {
    /// Server answered with a non-success status
    Response { status: u16, body: Option<Value> },
    /// Request sent, no response received
    NoResponse { message: String },
    /// Request never left the client
    Dispatch { message: String },
}

impl RawError {
    /// Capture a non-success response; the body is kept only if it is JSON.
    pub fn from_response(response: &TransportResponse) -> Self {
        Self::Response { status: response.status, body: response.json_body() }
    }

    /// HTTP status, when a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for RawError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NoResponse(message) => Self::NoResponse { message },
            TransportError::Dispatch(message) => Self::Dispatch { message },
        }
    }
}

/// Convert a raw failure into the uniform [`ApiError`].
pub fn normalize(raw: &RawError) -> ApiError {
    match raw {
        RawError::Response { status, body } => {
            let message = body
                .as_ref()
                .and_then(server_message)
                .unwrap_or_else(|| format!("Request failed with status code {status}"));
            let error = ApiError::new(*status, message);
            match body.as_ref().and_then(server_errors) {
                Some(errors) => error.with_errors(errors),
                None => error,
            }
        }
        RawError::NoResponse { .. } => ApiError::network(NO_CONNECTIVITY_MESSAGE),
        RawError::Dispatch { message } => {
            let message = message.trim();
            if message.is_empty() {
                ApiError::internal(UNKNOWN_ERROR_MESSAGE)
            } else {
                ApiError::internal(message)
            }
        }
    }
}

/// Server-provided `message`; string arrays (validation pipes) are joined.
fn server_message(body: &Value) -> Option<String> {
    match body.get("message")? {
        Value::String(message) if !message.is_empty() => Some(message.clone()),
        Value::Array(parts) => {
            let parts: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

/// Server-provided `errors` map. Single strings are promoted to one-element lists.
fn server_errors(body: &Value) -> Option<FieldErrors> {
    let Value::Object(fields) = body.get("errors")? else {
        return None;
    };

    let errors: FieldErrors = fields
        .iter()
        .filter_map(|(field, messages)| {
            let messages = match messages {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => {
                    items.iter().filter_map(Value::as_str).map(str::to_string).collect()
                }
                _ => return None,
            };
            Some((field.clone(), messages))
        })
        .collect();

    (!errors.is_empty()).then_some(errors)
}
