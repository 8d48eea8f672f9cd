//! Integration tests for petshield-audit

use chrono::{Duration, Utc};
use petshield_audit::*;
use petshield_xss::ViolationDetector;
use std::sync::Arc;

#[tokio::test]
async fn test_detected_violations_are_counted() {
    let store: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
    let violations = ViolationDetector::new()
        .scan(r#"<script>x</script><img src=x onerror=alert(1)>"#);
    assert_eq!(violations.len(), 2);

    for v in &violations {
        store.append(&AuditEvent::violation(v).user("mallory")).await.unwrap();
    }

    let now = Utc::now();
    let count = store
        .count_by_user_and_window("mallory", now - Duration::hours(1), now)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_file_store_shared_between_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let writer = FileAuditStore::new(&path);
    let reader = FileAuditStore::new(&path);

    writer
        .append(&AuditEvent::new(AuditEventType::SecurityViolation).user("bob"))
        .await
        .unwrap();
    writer
        .append(&AuditEvent::new(AuditEventType::ContentSanitized).user("bob"))
        .await
        .unwrap();

    let now = Utc::now();
    let count = reader
        .count_by_user_and_window("bob", now - Duration::minutes(5), now + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_error_display() {
    let err = AuditStoreError::Unavailable("connection refused".to_string());
    assert!(err.to_string().contains("connection refused"));
}
