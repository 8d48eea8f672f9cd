//! Security violation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest fragment kept on a violation record, in characters.
pub const MAX_FRAGMENT_CHARS: usize = 200;

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// `<script>` element
    ScriptTag,
    /// Event handler or dangerous URL scheme in an attribute
    DangerousAttribute,
    /// Embed-like element or other suspicious construct
    SuspiciousPattern,
    /// The enforcement sanitizer itself failed
    SanitizationFailed,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::ScriptTag => "script_tag",
            ViolationType::DangerousAttribute => "dangerous_attribute",
            ViolationType::SuspiciousPattern => "suspicious_pattern",
            ViolationType::SanitizationFailed => "sanitization_failed",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected violation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityViolation {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub original_fragment: String,
    pub sanitized_fragment: String,
    pub severity: Severity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityViolation {
    pub fn new(
        violation_type: ViolationType,
        severity: Severity,
        original_fragment: &str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            violation_type,
            original_fragment: truncate_fragment(original_fragment),
            sanitized_fragment: String::new(),
            severity,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    /// Critical violation recorded when enforcement fails.
    pub fn sanitization_failed(reason: impl fmt::Display) -> Self {
        Self::new(
            ViolationType::SanitizationFailed,
            Severity::Critical,
            "",
            format!("Sanitization failed, content discarded: {}", reason),
        )
    }

    /// Attach what the fragment became after enforcement.
    pub fn with_sanitized_fragment(mut self, fragment: &str) -> Self {
        self.sanitized_fragment = truncate_fragment(fragment);
        self
    }
}

fn truncate_fragment(fragment: &str) -> String {
    match fragment.char_indices().nth(MAX_FRAGMENT_CHARS) {
        Some((idx, _)) => fragment[..idx].to_string(),
        None => fragment.to_string(),
    }
}
