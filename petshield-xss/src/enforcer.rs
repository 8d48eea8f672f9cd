//! Allow-list enforcement.
//!
//! The [`Enforcer`] trait is the narrow seam to the sanitizer that actually
//! removes markup. [`AmmoniaEnforcer`] backs it with `ammonia`.

use crate::encoder::HtmlEncoder;
use crate::error::{Result, XssError};
use ammonia::Builder;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use petshield_policy::{ContentPolicy, DISCARDED_CONTENT_TAGS};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::trace;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*>").unwrap()
});

/// Sanitizer configuration derived from a [`ContentPolicy`].
///
/// Names are lower-cased and de-duplicated. Forbidden entries win over
/// allowed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementConfig {
    pub allowed_tags: BTreeSet<String>,
    pub allowed_attributes: BTreeSet<String>,
    pub allowed_schemes: BTreeSet<String>,
    pub forbid_tags: BTreeSet<String>,
    pub forbid_attr: BTreeSet<String>,
    pub strip_ignore_tag: bool,
    pub keep_content: bool,
}

impl EnforcementConfig {
    pub fn from_policy(policy: &ContentPolicy) -> Self {
        fn lower(items: &[String]) -> BTreeSet<String> {
            items.iter().map(|s| s.trim().to_ascii_lowercase()).collect()
        }

        Self {
            allowed_tags: lower(&policy.allowed_tags),
            allowed_attributes: lower(&policy.allowed_attributes),
            allowed_schemes: lower(&policy.allowed_schemes),
            forbid_tags: lower(&policy.forbid_tags),
            forbid_attr: lower(&policy.forbid_attr),
            strip_ignore_tag: policy.strip_ignore_tag,
            keep_content: policy.keep_content,
        }
    }

    /// Allowed tags minus forbidden tags
    pub fn effective_tags(&self) -> BTreeSet<&str> {
        self.allowed_tags
            .difference(&self.forbid_tags)
            .map(String::as_str)
            .collect()
    }

    /// Allowed attributes minus forbidden attributes
    pub fn effective_attributes(&self) -> BTreeSet<&str> {
        self.allowed_attributes
            .difference(&self.forbid_attr)
            .map(String::as_str)
            .collect()
    }

    /// Reject configurations the sanitizer cannot honour.
    pub fn validate(&self) -> Result<()> {
        let effective = self.effective_tags();
        if let Some(tag) = DISCARDED_CONTENT_TAGS.iter().find(|t| effective.contains(*t)) {
            return Err(XssError::InvalidConfig(format!(
                "tag '{}' can never be allowed",
                tag
            )));
        }
        Ok(())
    }
}

impl From<&ContentPolicy> for EnforcementConfig {
    fn from(policy: &ContentPolicy) -> Self {
        Self::from_policy(policy)
    }
}

/// Allow-list sanitizer seam.
///
/// An error means the sanitizer itself failed; callers treat that as
/// fail-secure and discard the content.
#[async_trait]
pub trait Enforcer: Send + Sync {
    async fn enforce(&self, content: &str, config: &EnforcementConfig) -> Result<String>;
}

/// [`Enforcer`] backed by `ammonia`.
///
/// Sanitization runs on the blocking pool; a panic inside the sanitizer is
/// reported as [`XssError::EnforcementFailed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AmmoniaEnforcer;

impl AmmoniaEnforcer {
    pub fn new() -> Self {
        Self
    }

    /// Sanitize synchronously on the current thread.
    pub fn clean(content: &str, config: &EnforcementConfig) -> Result<String> {
        config.validate()?;

        let tags: HashSet<&str> = config.effective_tags().into_iter().collect();
        let attributes: HashSet<&str> = config.effective_attributes().into_iter().collect();
        let schemes: HashSet<&str> = config.allowed_schemes.iter().map(String::as_str).collect();

        let mut clean_content: HashSet<&str> = DISCARDED_CONTENT_TAGS.into_iter().collect();
        if !config.keep_content {
            clean_content.extend(config.forbid_tags.iter().map(String::as_str));
        }

        let input = if config.strip_ignore_tag {
            content.to_string()
        } else {
            escape_ignored_tags(content, &tags, &clean_content, &config.forbid_tags)
        };

        let mut builder = Builder::default();
        builder
            .tags(tags)
            .clean_content_tags(clean_content)
            .generic_attributes(attributes)
            .tag_attributes(HashMap::new())
            .url_schemes(schemes)
            .link_rel(None)
            .strip_comments(true);

        let cleaned = builder.clean(&input).to_string();
        trace!(
            input_len = content.len(),
            output_len = cleaned.len(),
            "Content enforced"
        );
        Ok(cleaned)
    }
}

#[async_trait]
impl Enforcer for AmmoniaEnforcer {
    async fn enforce(&self, content: &str, config: &EnforcementConfig) -> Result<String> {
        let content = content.to_string();
        let config = config.clone();

        tokio::task::spawn_blocking(move || Self::clean(&content, &config))
            .await
            .map_err(|e| XssError::EnforcementFailed(e.to_string()))?
    }
}

/// Turn markup of tags the sanitizer would silently drop into visible text.
/// Forbidden and clean-content tags are left for the sanitizer to remove.
fn escape_ignored_tags(
    content: &str,
    tags: &HashSet<&str>,
    clean_content: &HashSet<&str>,
    forbidden: &BTreeSet<String>,
) -> String {
    MARKUP_TAG
        .replace_all(content, |caps: &Captures<'_>| {
            let name = caps[1].to_ascii_lowercase();
            if tags.contains(name.as_str())
                || clean_content.contains(name.as_str())
                || forbidden.contains(&name)
            {
                caps[0].to_string()
            } else {
                HtmlEncoder::encode_html(&caps[0])
            }
        })
        .into_owned()
}
