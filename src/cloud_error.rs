// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource manager error payloads.
//!
//! Every error response from the resource manager (and the `error` member of
//! a failed operation status document) has the shape
//! `{"error": {"code", "message", "target", "details": [...]}}`. The rendered
//! form produced by [`CloudErrorBody`]'s `Display` is the text negative
//! scenarios match their error patterns against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known error codes returned by the service
pub const CODE_CONFLICT: &str = "Conflict";
pub const CODE_NOT_FOUND: &str = "NotFound";
pub const CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
pub const CODE_RESOURCE_GROUP_NOT_FOUND: &str = "ResourceGroupNotFound";
pub const CODE_MULTIPLE_ERRORS: &str = "MultipleErrorsOccurred";

/// Envelope of an error response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
}

/// Structured error detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<CloudErrorBody>,
}

impl CloudErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            target: None,
            details: Vec::new(),
        }
    }

    /// Parse an error response body, falling back to the raw text as the message
    /// when the body is not a well-formed error envelope.
    #[must_use]
    pub fn from_response_body(status_code: u16, body: &str) -> Self {
        match serde_json::from_str::<CloudError>(body) {
            Ok(CloudError { error: Some(inner) }) => inner,
            _ => Self::new(format!("HTTP{status_code}"), body.trim()),
        }
    }

    /// `true` when the code identifies a missing resource or parent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code.as_str(),
            CODE_NOT_FOUND | CODE_RESOURCE_NOT_FOUND | CODE_RESOURCE_GROUP_NOT_FOUND
        )
    }
}

impl fmt::Display for CloudErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.code)?;
        if let Some(target) = self.target.as_deref().filter(|t| !t.is_empty()) {
            write!(f, "{target}: ")?;
        }
        f.write_str(&self.message)?;

        if !self.details.is_empty() {
            f.write_str(" Details: ")?;
            for (i, detail) in self.details.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{detail}")?;
            }
        }
        Ok(())
    }
}
