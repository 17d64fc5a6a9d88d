//! Shared HTTP helpers for the task-service style APIs.
//!
//! The image backends wrap every payload in the same envelope:
//! `{ "code": 200, "msg": "success", "data": { ... } }`. A non-200 `code`
//! is a rejection even when the HTTP status was 200.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ProviderError;

/// Envelope code that means success.
const ENVELOPE_OK: i64 = 200;

/// Upper bound on how much of an error body is kept in messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

/// Read the body of `response` and unwrap its envelope into `T`.
pub async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    parse_envelope(status, &body)
}

/// Pure envelope parsing, split out from [`read_envelope`] for testing.
pub fn parse_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ProviderError> {
    if !(200..300).contains(&status) {
        return Err(ProviderError::Rejected {
            status,
            message: truncate(body),
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("{e}: {}", truncate(body))))?;

    if envelope.code != ENVELOPE_OK {
        return Err(ProviderError::Rejected {
            status: u16::try_from(envelope.code).unwrap_or(status),
            message: envelope.msg.unwrap_or_else(|| "no message".to_string()),
        });
    }

    envelope
        .data
        .ok_or_else(|| ProviderError::Malformed("envelope without data".to_string()))
}

/// Ensure a plain JSON response succeeded and decode it.
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    if !(200..300).contains(&status) {
        return Err(ProviderError::Rejected {
            status,
            message: truncate(&body),
        });
    }
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Malformed(format!("{e}: {}", truncate(&body))))
}

/// Parse a progress value that may arrive as a number or a numeric string.
pub fn progress_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Created {
        task_id: String,
    }

    #[test]
    fn envelope_success_unwraps_data() {
        let created: Created =
            parse_envelope(200, r#"{"code":200,"msg":"success","data":{"taskId":"t1"}}"#).unwrap();
        assert_eq!(created.task_id, "t1");
    }

    #[test]
    fn envelope_code_is_a_rejection() {
        let err = parse_envelope::<Created>(200, r#"{"code":402,"msg":"Insufficient credits"}"#)
            .unwrap_err();
        assert_matches!(err, ProviderError::Rejected { status: 402, ref message } if message == "Insufficient credits");
    }

    #[test]
    fn http_error_is_a_rejection() {
        let err = parse_envelope::<Created>(401, "unauthorized").unwrap_err();
        assert_matches!(err, ProviderError::Rejected { status: 401, .. });
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_envelope::<Created>(200, "<html>").unwrap_err();
        assert_matches!(err, ProviderError::Malformed(_));

        let err = parse_envelope::<Created>(200, r#"{"code":200,"msg":"ok"}"#).unwrap_err();
        assert_matches!(err, ProviderError::Malformed(_));
    }

    #[test]
    fn progress_accepts_strings_and_numbers() {
        assert_eq!(progress_value(&serde_json::json!("0.45")), Some(0.45));
        assert_eq!(progress_value(&serde_json::json!(30)), Some(30.0));
        assert_eq!(progress_value(&serde_json::json!("80%")), Some(80.0));
        assert_eq!(progress_value(&serde_json::json!(null)), None);
    }

    #[test]
    fn long_bodies_truncated_on_char_boundary() {
        let body = "猫".repeat(400);
        let t = truncate(&body);
        assert!(t.ends_with("..."));
        assert!(t.len() <= MAX_ERROR_BODY + 3);
    }
}
