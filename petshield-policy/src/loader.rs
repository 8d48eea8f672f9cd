// Policy document loaders

use crate::document::PolicyDocument;
use crate::validation::Validate;
use crate::{PolicyError, Result};
use std::fs;
use std::path::Path;

/// Supported policy file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Policy document loader
///
/// Every document returned by the loader has passed validation.
pub struct PolicyLoader {
    format: FileFormat,
}

impl PolicyLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PolicyError::LoadError("No file extension found".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| PolicyError::LoadError(format!("Unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    /// Load a document from a file, detecting the format from its extension
    pub fn load_path(path: impl AsRef<Path>) -> Result<PolicyDocument> {
        let path = path.as_ref();
        Self::auto(path)?.load_file(path)
    }

    /// Load a document from a file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<PolicyDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PolicyError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let document = self.parse(&content)?;
        tracing::info!(path = %path.display(), "Loaded policy document");
        Ok(document)
    }

    /// Parse and validate a document from a string
    pub fn parse(&self, content: &str) -> Result<PolicyDocument> {
        let document = match self.format {
            FileFormat::Json => serde_json::from_str::<PolicyDocument>(content)
                .map_err(|e| PolicyError::ParseError(format!("JSON parse error: {}", e)))?,
            FileFormat::Toml => toml::from_str::<PolicyDocument>(content)
                .map_err(|e| PolicyError::ParseError(format!("TOML parse error: {}", e)))?,
        };

        document.validate()?;
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentType;
    use std::io::Write;

    #[test]
    fn test_parse_json() {
        let loader = PolicyLoader::new(FileFormat::Json);
        let json = r#"{"comments": {"allowedTags": ["p", "a"], "allowedSchemes": ["https"]}}"#;

        let doc = loader.parse(json).unwrap();
        assert_eq!(
            doc.policy_for(ContentType::Comments).allowed_tags,
            vec!["p".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn test_parse_toml() {
        let loader = PolicyLoader::new(FileFormat::Toml);
        let toml = r#"
            [petCardMetadata]
            allowedTags = ["b", "i"]
            keepContent = true

            [performanceThresholds]
            maxProcessingTimeMs = 50
        "#;

        let doc = loader.parse(toml).unwrap();
        assert_eq!(doc.performance_thresholds.max_processing_time_ms, 50);
        assert_eq!(
            doc.policy_for(ContentType::PetCardMetadata).allowed_tags.len(),
            2
        );
    }

    #[test]
    fn test_parse_rejects_invalid_document() {
        let loader = PolicyLoader::new(FileFormat::Json);
        let json = r#"{"performanceThresholds": {"maxProcessingTimeMs": 0}}"#;
        assert!(matches!(
            loader.parse(json),
            Err(PolicyError::ValidationError(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        let loader = PolicyLoader::new(FileFormat::Json);
        assert!(matches!(
            loader.parse("{not json"),
            Err(PolicyError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"socialSharing": {{"allowedTags": []}}}}"#).unwrap();

        let doc = PolicyLoader::load_path(file.path()).unwrap();
        assert!(doc.social_sharing.is_some());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("TOML"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("yaml"), None);
        assert!(PolicyLoader::auto("policy").is_err());
    }
}
