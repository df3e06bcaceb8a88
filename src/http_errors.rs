// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP status code mapping for resource manager responses.
//!
//! The client tells apart, from the status code alone, a success, a missing
//! resource, a synchronous rejection of the request, a credential the service
//! refused, and a transient server condition worth retrying. This module owns
//! that mapping so the client, the retry loop, and reports agree on it.
//!
//! A refused credential is not an answer about the request: 401 and 403 are
//! transport failures, never rejections a negative scenario could match.
//!
//! # Usage
//!
//! ```rust
//! use hcpverify::http_errors::{classify_status, map_http_error_to_reason, ResponseClass};
//!
//! assert_eq!(classify_status(404), ResponseClass::NotFound);
//! assert_eq!(classify_status(409), ResponseClass::Rejected);
//! assert_eq!(classify_status(401), ResponseClass::AuthFailed);
//!
//! let (reason, message) = map_http_error_to_reason(503);
//! assert_eq!(reason, "ServiceUnavailable");
//! assert!(message.contains("503"));
//! ```

pub const REASON_BAD_REQUEST: &str = "BadRequest";
pub const REASON_AUTH_FAILED: &str = "AuthFailed";
pub const REASON_NOT_FOUND: &str = "NotFound";
pub const REASON_CONFLICT: &str = "Conflict";
pub const REASON_THROTTLED: &str = "Throttled";
pub const REASON_INTERNAL_ERROR: &str = "InternalError";
pub const REASON_SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";
pub const REASON_UNEXPECTED: &str = "Unexpected";

/// Coarse category of an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx
    Success,
    /// 404
    NotFound,
    /// 401, 403: the credential was refused before the request was considered
    AuthFailed,
    /// Other 4xx except 408 and 429: the service refused the request as sent
    Rejected,
    /// 408, 429, 500, 502, 503, 504: transient, worth retrying
    Retryable,
    /// Anything else (1xx, 3xx, other 5xx)
    Unexpected,
}

/// Categorize an HTTP status code.
#[must_use]
pub fn classify_status(status_code: u16) -> ResponseClass {
    match status_code {
        200..=299 => ResponseClass::Success,
        404 => ResponseClass::NotFound,
        401 | 403 => ResponseClass::AuthFailed,
        408 | 429 | 500 | 502 | 503 | 504 => ResponseClass::Retryable,
        400..=499 => ResponseClass::Rejected,
        _ => ResponseClass::Unexpected,
    }
}

/// Map HTTP status code to a short reason and a human-readable message.
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Reason |
/// |-----------|--------|
/// | 400, 422 | `BadRequest` |
/// | 401, 403 | `AuthFailed` |
/// | 404 | `NotFound` |
/// | 409 | `Conflict` |
/// | 429 | `Throttled` |
/// | 500 | `InternalError` |
/// | 502, 503, 504 | `ServiceUnavailable` |
/// | Other | `Unexpected` |
#[must_use]
pub fn map_http_error_to_reason(status_code: u16) -> (&'static str, String) {
    match status_code {
        400 | 422 => (
            REASON_BAD_REQUEST,
            format!("Request rejected as invalid ({status_code})"),
        ),
        401 => (
            REASON_AUTH_FAILED,
            "Authentication required (401)".into(),
        ),
        403 => (REASON_AUTH_FAILED, "Authorization failed (403)".into()),
        404 => (REASON_NOT_FOUND, "Resource not found (404)".into()),
        409 => (
            REASON_CONFLICT,
            "Request conflicts with current resource state (409)".into(),
        ),
        429 => (REASON_THROTTLED, "Request throttled (429)".into()),
        500 => (
            REASON_INTERNAL_ERROR,
            "Resource manager internal error (500)".into(),
        ),
        502 => (REASON_SERVICE_UNAVAILABLE, "Bad gateway (502)".into()),
        503 => (
            REASON_SERVICE_UNAVAILABLE,
            "Service unavailable (503)".into(),
        ),
        504 => (REASON_SERVICE_UNAVAILABLE, "Gateway timeout (504)".into()),
        _ => (
            REASON_UNEXPECTED,
            format!("Unexpected HTTP status ({status_code})"),
        ),
    }
}
