// Policy validation

use crate::document::{ContentPolicy, PolicyDocument};
use crate::{PolicyError, Result};

/// Tags whose content is always discarded; a policy may not keep them.
pub const DISCARDED_CONTENT_TAGS: [&str; 2] = ["script", "style"];

/// Trait for validating policy values
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules
pub struct PolicyValidator;

impl PolicyValidator {
    /// Validate that every name is a non-empty markup identifier
    pub fn identifiers(values: &[String], field: &str) -> Result<()> {
        for value in values {
            let valid = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_');
            if !valid {
                return Err(PolicyError::ValidationError(format!(
                    "{} contains invalid name '{}'",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// Validate URL schemes (bare names, no trailing colon)
    pub fn schemes(values: &[String], field: &str) -> Result<()> {
        for value in values {
            let mut chars = value.chars();
            let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
            if !valid {
                return Err(PolicyError::ValidationError(format!(
                    "{} contains invalid scheme '{}'",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// Validate that a value is strictly positive
    pub fn positive(value: u64, field: &str) -> Result<()> {
        if value == 0 {
            return Err(PolicyError::ValidationError(format!(
                "{} must be greater than 0",
                field
            )));
        }
        Ok(())
    }
}

impl Validate for ContentPolicy {
    fn validate(&self) -> Result<()> {
        PolicyValidator::identifiers(&self.allowed_tags, "allowedTags")?;
        PolicyValidator::identifiers(&self.allowed_attributes, "allowedAttributes")?;
        PolicyValidator::identifiers(&self.forbid_tags, "forbidTags")?;
        PolicyValidator::identifiers(&self.forbid_attr, "forbidAttr")?;
        PolicyValidator::schemes(&self.allowed_schemes, "allowedSchemes")?;

        if let Some(tag) = DISCARDED_CONTENT_TAGS.iter().find(|t| self.allows_tag(t)) {
            return Err(PolicyError::ValidationError(format!(
                "allowedTags may not keep '{}' unless forbidTags also lists it",
                tag
            )));
        }
        Ok(())
    }
}

impl Validate for PolicyDocument {
    fn validate(&self) -> Result<()> {
        for (content_type, policy) in self.policies() {
            policy.validate().map_err(|e| match e {
                PolicyError::ValidationError(msg) => {
                    PolicyError::ValidationError(format!("{}: {}", content_type, msg))
                }
                other => other,
            })?;
        }

        PolicyValidator::positive(
            self.performance_thresholds.max_processing_time_ms,
            "performanceThresholds.maxProcessingTimeMs",
        )
    }
}
