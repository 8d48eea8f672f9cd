//! Sanitization result value object.

use crate::violation::SecurityViolation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of sanitizing one piece of content.
///
/// Built once per computation and never mutated afterwards; the cache stores
/// and hands out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedResult {
    pub sanitized_content: String,
    pub original_content: String,
    /// Tag names present in the input but absent from the output, sorted
    pub removed_elements: Vec<String>,
    /// Violations in detection order
    pub security_violations: Vec<SecurityViolation>,
    pub processing_time_ms: f64,
    /// `true` exactly when `security_violations` is empty
    pub is_valid: bool,
}

impl SanitizedResult {
    pub fn new(
        original_content: impl Into<String>,
        sanitized_content: impl Into<String>,
        removed_elements: Vec<String>,
        security_violations: Vec<SecurityViolation>,
        processing_time: Duration,
    ) -> Self {
        let is_valid = security_violations.is_empty();
        Self {
            sanitized_content: sanitized_content.into(),
            original_content: original_content.into(),
            removed_elements,
            security_violations,
            processing_time_ms: processing_time.as_micros() as f64 / 1000.0,
            is_valid,
        }
    }

    /// Fail-secure result: empty output and a single critical violation.
    pub fn failed(
        original_content: impl Into<String>,
        reason: impl std::fmt::Display,
        processing_time: Duration,
    ) -> Self {
        Self::new(
            original_content,
            String::new(),
            Vec::new(),
            vec![SecurityViolation::sanitization_failed(reason)],
            processing_time,
        )
    }

    /// Highest severity among the violations.
    pub fn max_severity(&self) -> Option<crate::Severity> {
        self.security_violations.iter().map(|v| v.severity).max()
    }
}
