//! Audit event structures and types

use chrono::{DateTime, Utc};
use petshield_xss::{SecurityViolation, Severity, ViolationType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Kind of audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventType {
    /// One per sanitization request, hit or miss
    #[serde(rename = "content.sanitized")]
    ContentSanitized,
    /// One per detected violation
    #[serde(rename = "security.violation")]
    SecurityViolation,
    /// Request refused by the rate limiter
    #[serde(rename = "rate_limit.exceeded")]
    RateLimitExceeded,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::ContentSanitized => "content.sanitized",
            AuditEventType::SecurityViolation => "security.violation",
            AuditEventType::RateLimitExceeded => "rate_limit.exceeded",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level for audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
    /// Critical events
    Critical,
}

impl From<Severity> for AuditSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => AuditSeverity::Info,
            Severity::Medium => AuditSeverity::Warning,
            Severity::High => AuditSeverity::Error,
            Severity::Critical => AuditSeverity::Critical,
        }
    }
}

/// Audit event structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,

    /// Timestamp when event occurred
    pub timestamp: DateTime<Utc>,

    pub event_type: AuditEventType,

    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub endpoint: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,

    /// Policy key of the sanitized content
    pub content_type: Option<String>,

    pub severity: AuditSeverity,

    /// Set on `security.violation` events
    pub violation_type: Option<ViolationType>,

    pub description: Option<String>,

    /// Sanitization time in milliseconds
    pub duration_ms: Option<f64>,

    /// Whether the result came from the cache
    pub cache_hit: Option<bool>,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AuditEvent {
    /// Create a new audit event
    ///
    /// # Examples
    ///
    /// ```
    /// use petshield_audit::*;
    ///
    /// let event = AuditEvent::new(AuditEventType::ContentSanitized)
    ///     .user("alice")
    ///     .content_type("petCardMetadata")
    ///     .cache_hit(true);
    /// assert_eq!(event.user_id.as_deref(), Some("alice"));
    /// ```
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            ip_address: None,
            endpoint: None,
            session_id: None,
            request_id: None,
            content_type: None,
            severity: AuditSeverity::Info,
            violation_type: None,
            description: None,
            duration_ms: None,
            cache_hit: None,
            metadata: HashMap::new(),
        }
    }

    /// `security.violation` event describing one violation.
    pub fn violation(violation: &SecurityViolation) -> Self {
        Self::new(AuditEventType::SecurityViolation)
            .severity(violation.severity.into())
            .violation_type(violation.violation_type)
            .description(violation.description.clone())
            .metadata("originalFragment", violation.original_fragment.clone())
            .metadata("violationSeverity", violation.severity.as_str())
    }

    /// Set user ID
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set IP address
    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set severity
    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn violation_type(mut self, violation_type: ViolationType) -> Self {
        self.violation_type = Some(violation_type);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn cache_hit(mut self, hit: bool) -> Self {
        self.cache_hit = Some(hit);
        self
    }

    /// Add metadata
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether this event counts towards a user's violation total.
    ///
    /// Enforcement failures are recorded against the request but are not
    /// the user's doing, so they never count.
    pub fn is_violation_by(&self, user_id: &str) -> bool {
        self.event_type == AuditEventType::SecurityViolation
            && self.violation_type != Some(ViolationType::SanitizationFailed)
            && self.user_id.as_deref() == Some(user_id)
    }

    /// Convert to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_event() {
        let violation = SecurityViolation::new(
            ViolationType::ScriptTag,
            Severity::Critical,
            "<script>x</script>",
            "Script tag detected",
        );
        let event = AuditEvent::violation(&violation).user("bob");

        assert_eq!(event.event_type, AuditEventType::SecurityViolation);
        assert_eq!(event.severity, AuditSeverity::Critical);
        assert_eq!(event.violation_type, Some(ViolationType::ScriptTag));
        assert!(event.is_violation_by("bob"));
        assert!(!event.is_violation_by("alice"));
    }

    #[test]
    fn test_enforcement_failure_does_not_count() {
        let violation = SecurityViolation::sanitization_failed("sanitizer unavailable");
        let event = AuditEvent::violation(&violation).user("bob");

        assert_eq!(event.event_type, AuditEventType::SecurityViolation);
        assert_eq!(event.severity, AuditSeverity::Critical);
        assert!(!event.is_violation_by("bob"));
    }

    #[test]
    fn test_sanitized_event_does_not_count() {
        let event = AuditEvent::new(AuditEventType::ContentSanitized).user("bob");
        assert!(!event.is_violation_by("bob"));
    }

    #[test]
    fn test_serialized_event_type() {
        let event = AuditEvent::new(AuditEventType::SecurityViolation)
            .metadata("slow", true)
            .duration_ms(1.5);
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(json["eventType"], "security.violation");
        assert_eq!(json["metadata"]["slow"], true);
        assert_eq!(json["durationMs"], 1.5);
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(AuditSeverity::from(Severity::Low), AuditSeverity::Info);
        assert_eq!(AuditSeverity::from(Severity::Medium), AuditSeverity::Warning);
        assert_eq!(AuditSeverity::from(Severity::High), AuditSeverity::Error);
    }
}
