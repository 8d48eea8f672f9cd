//! Policy document model.

use crate::content_type::ContentType;
use serde::{Deserialize, Serialize};

/// Allow-list policy for one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentPolicy {
    /// Tags the enforcement sanitizer keeps
    pub allowed_tags: Vec<String>,
    /// Attributes kept on allowed tags
    pub allowed_attributes: Vec<String>,
    /// URL schemes accepted in URL-bearing attributes
    pub allowed_schemes: Vec<String>,
    /// Tags always removed, even when also allowed
    pub forbid_tags: Vec<String>,
    /// Attributes always removed, even when also allowed
    pub forbid_attr: Vec<String>,
    /// Drop markup of tags outside the allow-list (otherwise it is escaped)
    pub strip_ignore_tag: bool,
    /// Keep the text content of removed tags
    pub keep_content: bool,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            allowed_tags: strings(&[
                "a", "b", "br", "code", "em", "i", "li", "ol", "p", "span", "strong", "ul",
            ]),
            allowed_attributes: strings(&["href", "title", "class"]),
            allowed_schemes: strings(&["http", "https", "mailto"]),
            forbid_tags: strings(&["script", "style", "iframe", "object", "embed", "form"]),
            forbid_attr: strings(&["style", "onerror", "onload", "onclick", "onmouseover"]),
            strip_ignore_tag: true,
            keep_content: true,
        }
    }
}

impl ContentPolicy {
    /// Plain text only: every tag is removed, text is kept.
    pub fn text_only() -> Self {
        Self {
            allowed_tags: Vec::new(),
            allowed_attributes: Vec::new(),
            allowed_schemes: strings(&["https"]),
            ..Self::default()
        }
    }

    /// Light inline formatting only.
    pub fn inline_formatting() -> Self {
        Self {
            allowed_tags: strings(&["b", "br", "em", "i", "strong"]),
            allowed_attributes: Vec::new(),
            allowed_schemes: strings(&["https"]),
            ..Self::default()
        }
    }

    /// Whether a tag survives enforcement under this policy.
    pub fn allows_tag(&self, tag: &str) -> bool {
        let tag = tag.to_ascii_lowercase();
        self.allowed_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag))
            && !self.forbid_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag))
    }
}

/// Global performance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceThresholds {
    /// Sanitization slower than this is reported
    pub max_processing_time_ms: u64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            max_processing_time_ms: 100,
        }
    }
}

/// Complete policy configuration document.
///
/// Content types without an entry fall back to `defaultPolicy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    /// Policy used for [`ContentType::Default`] and as fallback
    #[serde(default)]
    pub default_policy: ContentPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profiles: Option<ContentPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_card_metadata: Option<ContentPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<ContentPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_sharing: Option<ContentPolicy>,

    #[serde(default)]
    pub performance_thresholds: PerformanceThresholds,
}

impl PolicyDocument {
    /// Built-in document covering every reserved content type.
    pub fn builtin() -> Self {
        Self {
            default_policy: ContentPolicy::default(),
            user_profiles: Some(ContentPolicy {
                allowed_tags: strings(&["b", "br", "em", "i", "p", "strong", "a"]),
                allowed_attributes: strings(&["href", "title"]),
                allowed_schemes: strings(&["https", "mailto"]),
                ..ContentPolicy::default()
            }),
            pet_card_metadata: Some(ContentPolicy::inline_formatting()),
            comments: Some(ContentPolicy {
                allowed_tags: strings(&["a", "b", "br", "code", "em", "i", "p", "strong"]),
                allowed_attributes: strings(&["href"]),
                allowed_schemes: strings(&["http", "https"]),
                ..ContentPolicy::default()
            }),
            social_sharing: Some(ContentPolicy::text_only()),
            performance_thresholds: PerformanceThresholds::default(),
        }
    }

    /// Resolve the policy for a content type.
    pub fn policy_for(&self, content_type: ContentType) -> &ContentPolicy {
        let specific = match content_type {
            ContentType::Default => None,
            ContentType::UserProfiles => self.user_profiles.as_ref(),
            ContentType::PetCardMetadata => self.pet_card_metadata.as_ref(),
            ContentType::Comments => self.comments.as_ref(),
            ContentType::SocialSharing => self.social_sharing.as_ref(),
        };
        specific.unwrap_or(&self.default_policy)
    }

    /// Iterate over every explicitly configured policy.
    pub fn policies(&self) -> impl Iterator<Item = (ContentType, &ContentPolicy)> {
        ContentType::ALL.into_iter().filter_map(move |ct| {
            let policy = match ct {
                ContentType::Default => Some(&self.default_policy),
                ContentType::UserProfiles => self.user_profiles.as_ref(),
                ContentType::PetCardMetadata => self.pet_card_metadata.as_ref(),
                ContentType::Comments => self.comments.as_ref(),
                ContentType::SocialSharing => self.social_sharing.as_ref(),
            };
            policy.map(|p| (ct, p))
        })
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
