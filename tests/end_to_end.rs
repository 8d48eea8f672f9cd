//! End-to-end tests for the sanitization pipeline

use async_trait::async_trait;
use petshield::prelude::*;
use petshield::petshield_audit::AuditSeverity;
use petshield::petshield_xss::{EnforcementConfig, XssError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Enforcer that fails a fixed number of times, then delegates to ammonia.
struct FlakyEnforcer {
    failures_left: AtomicUsize,
}

impl FlakyEnforcer {
    fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl Enforcer for FlakyEnforcer {
    async fn enforce(
        &self,
        content: &str,
        config: &EnforcementConfig,
    ) -> petshield::petshield_xss::Result<String> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(XssError::EnforcementFailed("worker pool exhausted".into()));
        }
        AmmoniaEnforcer::new().enforce(content, config).await
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_pet_card_scenario() {
    let audit = MemoryAuditStore::new();
    let coordinator = SanitizationCoordinator::builder()
        .audit_store(Arc::new(audit.clone()))
        .build()
        .unwrap();
    let options = SanitizeOptions::new(ContentType::PetCardMetadata)
        .user("alice")
        .ip("203.0.113.9")
        .endpoint("/pets/42")
        .request("req-1");

    let first = coordinator
        .sanitize("Fluffy<script>alert(1)</script>", &options)
        .await
        .unwrap();
    assert_eq!(first.sanitized_content, "Fluffy");
    assert!(!first.is_valid);
    assert_eq!(first.security_violations.len(), 1);
    assert_eq!(first.security_violations[0].severity, Severity::Critical);
    assert_eq!(
        first.security_violations[0].violation_type,
        ViolationType::ScriptTag
    );

    let second = coordinator
        .sanitize("Fluffy<script>alert(1)</script>", &options)
        .await
        .unwrap();
    assert_eq!(second.sanitized_content, "Fluffy");
    assert_eq!(coordinator.cache().stats().hits, 1);

    let events = audit.events().await;
    let sanitized: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == AuditEventType::ContentSanitized)
        .collect();
    let violations: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == AuditEventType::SecurityViolation)
        .collect();

    assert_eq!(sanitized.len(), 2);
    assert_eq!(sanitized[0].cache_hit, Some(false));
    assert_eq!(sanitized[1].cache_hit, Some(true));
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().all(|e| e.is_violation_by("alice")));
    assert!(violations.iter().all(|e| e.severity == AuditSeverity::Critical));
    assert_eq!(sanitized[0].endpoint.as_deref(), Some("/pets/42"));
    assert_eq!(sanitized[0].ip_address.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_repeat_offender_is_refused() {
    let audit = MemoryAuditStore::new();
    let coordinator = SanitizationCoordinator::builder()
        .audit_store(Arc::new(audit.clone()))
        .rate_limit(RateLimitConfig {
            max_violations: 3,
            ..RateLimitConfig::default()
        })
        .build()
        .unwrap();
    let options = SanitizeOptions::new(ContentType::Comments).user("mallory");

    for i in 0..3 {
        let payload = format!("<script>steal({})</script>", i);
        coordinator.sanitize(&payload, &options).await.unwrap();
    }

    match coordinator.sanitize("hello", &options).await {
        Err(ShieldError::RateLimited { user_id, status }) => {
            assert_eq!(user_id, "mallory");
            assert_eq!(status.violation_count, 3);
            assert_eq!(status.remaining(), 0);
        }
        other => panic!("expected rate limit refusal, got {:?}", other),
    }

    // Other users are unaffected
    let other = SanitizeOptions::new(ContentType::Comments).user("alice");
    assert!(coordinator.sanitize("hello", &other).await.is_ok());
}

#[tokio::test]
async fn test_transient_failure_is_not_cached() {
    let coordinator = SanitizationCoordinator::builder()
        .enforcer(Arc::new(FlakyEnforcer::new(1)))
        .build()
        .unwrap();
    let options = SanitizeOptions::new(ContentType::Comments);

    let failed = coordinator.sanitize("<b>Rex</b>", &options).await.unwrap();
    assert_eq!(failed.sanitized_content, "");
    assert!(!failed.is_valid);
    assert_eq!(
        failed.security_violations[0].violation_type,
        ViolationType::SanitizationFailed
    );

    let recovered = coordinator.sanitize("<b>Rex</b>", &options).await.unwrap();
    assert_eq!(recovered.sanitized_content, "<b>Rex</b>");
    assert!(recovered.is_valid);
    assert_eq!(coordinator.cache().stats().hits, 0);
}

#[tokio::test]
async fn test_policy_update_reaches_other_instances() {
    let bus = LocalBus::default();
    let settings = ShieldSettings::default();

    let build = |id: &str| {
        let mut settings = settings.clone();
        settings.cache.instance_id = Some(id.to_string());
        SanitizationCoordinator::from_settings(
            &settings,
            Arc::new(AmmoniaEnforcer::new()),
            Arc::new(MemoryAuditStore::new()),
            Some(Arc::new(bus.clone())),
        )
        .unwrap()
    };
    let a = build("node-a");
    let b = build("node-b");
    a.start().await;
    b.start().await;

    let options = SanitizeOptions::new(ContentType::Comments);
    b.sanitize("<i>Rex</i>", &options).await.unwrap();
    assert_eq!(b.cache().len(), 1);

    a.update_policy(PolicyDocument::builtin()).await.unwrap();
    settle().await;
    assert_eq!(b.cache().version(), 2);

    b.sanitize("<i>Rex</i>", &options).await.unwrap();
    assert_eq!(b.cache().stats().hits, 0);

    a.stop();
    b.stop();
}

#[tokio::test]
async fn test_from_settings_with_policy_file() {
    let dir = tempfile::tempdir().unwrap();
    let policy_path = dir.path().join("policy.json");
    std::fs::write(
        &policy_path,
        r#"{
            "defaultPolicy": {"allowedTags": []},
            "comments": {"allowedTags": ["em"]},
            "performanceThresholds": {"maxProcessingTimeMs": 250}
        }"#,
    )
    .unwrap();

    let settings_path = dir.path().join("petshield.toml");
    std::fs::write(
        &settings_path,
        format!(
            "policyPath = {:?}\n\n[cache]\nmaxSize = 2\n",
            policy_path.display().to_string()
        ),
    )
    .unwrap();

    let settings = ShieldSettings::from_file(&settings_path).unwrap();
    let coordinator = SanitizationCoordinator::from_settings(
        &settings,
        Arc::new(AmmoniaEnforcer::new()),
        Arc::new(FileAuditStore::new(dir.path().join("audit.jsonl"))),
        None,
    )
    .unwrap();

    assert_eq!(coordinator.cache().config().max_size, 2);
    assert_eq!(
        coordinator.policies().max_processing_time(),
        std::time::Duration::from_millis(250)
    );

    let result = coordinator
        .sanitize(
            "<em>good</em> <b>boy</b>",
            &SanitizeOptions::new(ContentType::Comments),
        )
        .await
        .unwrap();
    assert_eq!(result.sanitized_content, "<em>good</em> boy");
    assert_eq!(result.removed_elements, vec!["b".to_string()]);
}

#[tokio::test]
async fn test_invalid_settings_are_fatal() {
    let mut settings = ShieldSettings::default();
    settings.cache.max_size = 0;

    let result = SanitizationCoordinator::from_settings(
        &settings,
        Arc::new(AmmoniaEnforcer::new()),
        Arc::new(MemoryAuditStore::new()),
        None,
    );
    assert!(matches!(result, Err(ShieldError::Config(_))));
}
