//! Request orchestration.
//!
//! Per request: rate limit check, cache lookup, and on a miss detection
//! plus enforcement followed by a cache write. Every request that is not
//! refused produces a `content.sanitized` audit record and one
//! `security.violation` record per violation, whether or not it was served
//! from the cache.

use crate::error::{ShieldError, ShieldResult};
use crate::settings::ShieldSettings;
use petshield_audit::{AuditEvent, AuditEventType, AuditSeverity, AuditStore, MemoryAuditStore};
use petshield_cache::{CacheOptions, InvalidationBus, ResultCache, ResultCacheConfig};
use petshield_policy::{ContentType, PolicyDocument, PolicyLoader, PolicyStore};
use petshield_ratelimit::{RateLimitConfig, ViolationRateLimiter};
use petshield_xss::{
    AmmoniaEnforcer, EnforcementConfig, Enforcer, SanitizedResult, SecurityViolation,
    ViolationDetector,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Per-request options.
///
/// Only the content type influences the result; the identifiers are carried
/// into audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeOptions {
    pub content_type: ContentType,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub endpoint: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
}

impl SanitizeOptions {
    /// Options for a content type with no request identifiers.
    ///
    /// # Examples
    ///
    /// ```
    /// use petshield::{ContentType, SanitizeOptions};
    ///
    /// let options = SanitizeOptions::new(ContentType::Comments)
    ///     .user("alice")
    ///     .request("req-1");
    /// assert_eq!(options.user_id.as_deref(), Some("alice"));
    /// ```
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            ..Self::default()
        }
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
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

    /// The options that take part in the cache key.
    pub fn cache_options(&self) -> CacheOptions {
        let mut options = CacheOptions::new();
        options.insert(
            "contentType".to_string(),
            self.content_type.policy_key().to_string(),
        );
        options
    }

    /// Copy the request identifiers onto an audit event.
    fn annotate(&self, mut event: AuditEvent) -> AuditEvent {
        event = event.content_type(self.content_type.policy_key());
        if let Some(user_id) = &self.user_id {
            event = event.user(user_id.as_str());
        }
        if let Some(ip) = &self.ip_address {
            event = event.ip(ip.as_str());
        }
        if let Some(endpoint) = &self.endpoint {
            event = event.endpoint(endpoint.as_str());
        }
        if let Some(session_id) = &self.session_id {
            event = event.session(session_id.as_str());
        }
        if let Some(request_id) = &self.request_id {
            event = event.request(request_id.as_str());
        }
        event
    }
}

/// Orchestrates policies, cache, detector, enforcer, audit and rate limit.
pub struct SanitizationCoordinator {
    policies: Arc<PolicyStore>,
    cache: Arc<ResultCache>,
    detector: ViolationDetector,
    enforcer: Arc<dyn Enforcer>,
    audit: Arc<dyn AuditStore>,
    limiter: ViolationRateLimiter,
}

impl SanitizationCoordinator {
    /// Create a new builder
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Build every component from settings.
    ///
    /// Loads the policy document from `policy_path` when set. The audit
    /// store is shared with the rate limiter.
    pub fn from_settings(
        settings: &ShieldSettings,
        enforcer: Arc<dyn Enforcer>,
        audit: Arc<dyn AuditStore>,
        bus: Option<Arc<dyn InvalidationBus>>,
    ) -> ShieldResult<Self> {
        settings.validate()?;

        let policies = match &settings.policy_path {
            Some(path) => {
                info!(path = %path.display(), "Loading policy document");
                PolicyStore::new(PolicyLoader::load_path(path)?)?
            }
            None => PolicyStore::builtin(),
        };

        let mut cache = ResultCache::new(settings.cache_config())?;
        if let Some(bus) = bus {
            cache = cache.with_bus(bus);
        }

        Self::builder()
            .policies(Arc::new(policies))
            .cache(Arc::new(cache))
            .enforcer(enforcer)
            .audit_store(audit)
            .rate_limit(settings.rate_limit_config())
            .build()
    }

    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn audit_store(&self) -> &Arc<dyn AuditStore> {
        &self.audit
    }

    pub fn rate_limiter(&self) -> &ViolationRateLimiter {
        &self.limiter
    }

    /// Start the cache sweep and invalidation subscriber.
    pub async fn start(&self) {
        self.cache.start().await;
    }

    /// Stop the cache background tasks.
    pub fn stop(&self) {
        self.cache.stop();
    }

    /// Sanitize `content` under the policy for `options.content_type`.
    ///
    /// The only error is [`ShieldError::RateLimited`], returned before any
    /// work when a known user is over the violation limit. Enforcement
    /// failures produce an empty, invalid result that is not cached.
    pub async fn sanitize(
        &self,
        content: &str,
        options: &SanitizeOptions,
    ) -> ShieldResult<SanitizedResult> {
        let started = Instant::now();
        let content_type = options.content_type;

        if let Some(user_id) = options.user_id.as_deref() {
            let status = self.limiter.check(user_id).await;
            if status.is_exceeded {
                let event = options
                    .annotate(AuditEvent::new(AuditEventType::RateLimitExceeded))
                    .severity(AuditSeverity::Warning)
                    .description("Request refused: violation limit exceeded")
                    .metadata("violationCount", status.violation_count)
                    .metadata("limit", status.limit)
                    .metadata("resetTime", status.reset_time.to_rfc3339());
                self.record(event).await;

                return Err(ShieldError::RateLimited {
                    user_id: user_id.to_string(),
                    status,
                });
            }
        }

        let cache_options = options.cache_options();
        if let Some(result) = self.cache.get(content, &cache_options, content_type) {
            self.audit_result(&result, options, true, started.elapsed())
                .await;
            return Ok(result);
        }

        // Read the cache version before the policy so a result computed
        // under a policy replaced meanwhile is discarded.
        let version = self.cache.version();
        let snapshot = self.policies.snapshot();
        let config = EnforcementConfig::from_policy(snapshot.policy_for(content_type));

        let violations = self.detector.scan(content);
        let result = match self.enforcer.enforce(content, &config).await {
            Ok(sanitized) => {
                let removed = ViolationDetector::removed_elements(content, &sanitized);
                let violations = self.sanitize_fragments(violations, &config).await;
                let result = SanitizedResult::new(
                    content,
                    sanitized,
                    removed,
                    violations,
                    started.elapsed(),
                );
                self.cache.set_at_version(
                    content,
                    &cache_options,
                    content_type,
                    result.clone(),
                    version,
                );
                result
            }
            Err(e) => {
                error!(
                    content_type = %content_type,
                    policy_version = snapshot.version,
                    error = %e,
                    "Enforcement failed, discarding content"
                );
                SanitizedResult::failed(content, &e, started.elapsed())
            }
        };

        self.audit_result(&result, options, false, started.elapsed())
            .await;
        Ok(result)
    }

    /// Record what each violating fragment becomes under the same policy.
    /// A fragment the enforcer cannot handle keeps an empty value.
    async fn sanitize_fragments(
        &self,
        violations: Vec<SecurityViolation>,
        config: &EnforcementConfig,
    ) -> Vec<SecurityViolation> {
        let mut enforced = Vec::with_capacity(violations.len());
        for violation in violations {
            match self.enforcer.enforce(&violation.original_fragment, config).await {
                Ok(fragment) => enforced.push(violation.with_sanitized_fragment(&fragment)),
                Err(e) => {
                    debug!(error = %e, "Fragment enforcement failed");
                    enforced.push(violation);
                }
            }
        }
        enforced
    }

    /// Replace the policy document and invalidate every cached result.
    ///
    /// Returns the new policy version. An invalid document is rejected and
    /// leaves both policy and cache untouched.
    pub async fn update_policy(&self, document: PolicyDocument) -> ShieldResult<u64> {
        let policy_version = self.policies.replace(document)?;
        let cache_version = self.cache.bump_version().await;
        info!(policy_version, cache_version, "Policy updated");
        Ok(policy_version)
    }

    async fn audit_result(
        &self,
        result: &SanitizedResult,
        options: &SanitizeOptions,
        cache_hit: bool,
        elapsed: Duration,
    ) {
        let severity = result
            .max_severity()
            .map(AuditSeverity::from)
            .unwrap_or(AuditSeverity::Info);

        let mut event = options
            .annotate(AuditEvent::new(AuditEventType::ContentSanitized))
            .severity(severity)
            .duration_ms(elapsed.as_micros() as f64 / 1000.0)
            .cache_hit(cache_hit)
            .metadata("isValid", result.is_valid)
            .metadata("violationCount", result.security_violations.len())
            .metadata("removedElements", result.removed_elements.clone());

        let threshold = self.policies.max_processing_time();
        if elapsed > threshold {
            warn!(
                content_type = %options.content_type,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                cache_hit,
                "Slow sanitization"
            );
            event = event.metadata("slow", true);
        }
        self.record(event).await;

        for violation in &result.security_violations {
            let event = options
                .annotate(AuditEvent::violation(violation))
                .cache_hit(cache_hit);
            self.record(event).await;
        }

        debug!(
            content_type = %options.content_type,
            cache_hit,
            violations = result.security_violations.len(),
            "Sanitization audited"
        );
    }

    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.append(&event).await {
            warn!(
                event_type = %event.event_type,
                error = %e,
                "Failed to append audit event"
            );
        }
    }
}

/// Builder for [`SanitizationCoordinator`]
///
/// Unset components default to the built-in policies, a default cache,
/// the ammonia enforcer and an in-memory audit store.
#[derive(Default)]
pub struct CoordinatorBuilder {
    policies: Option<Arc<PolicyStore>>,
    cache: Option<Arc<ResultCache>>,
    enforcer: Option<Arc<dyn Enforcer>>,
    audit: Option<Arc<dyn AuditStore>>,
    rate_limit: RateLimitConfig,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policies(mut self, policies: Arc<PolicyStore>) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn enforcer(mut self, enforcer: Arc<dyn Enforcer>) -> Self {
        self.enforcer = Some(enforcer);
        self
    }

    /// Audit store, also used by the rate limiter for violation counts
    pub fn audit_store(mut self, audit: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn build(self) -> ShieldResult<SanitizationCoordinator> {
        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(ResultCache::new(ResultCacheConfig::new())?),
        };
        let audit: Arc<dyn AuditStore> = self
            .audit
            .unwrap_or_else(|| Arc::new(MemoryAuditStore::new()));
        let limiter = ViolationRateLimiter::builder()
            .store(audit.clone())
            .config(self.rate_limit)
            .build()?;

        Ok(SanitizationCoordinator {
            policies: self.policies.unwrap_or_default(),
            cache,
            detector: ViolationDetector::new(),
            enforcer: self
                .enforcer
                .unwrap_or_else(|| Arc::new(AmmoniaEnforcer::new())),
            audit,
            limiter,
        })
    }
}
