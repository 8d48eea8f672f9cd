//! Integration tests for petshield-policy

use petshield_policy::*;
use std::io::Write;

#[test]
fn test_store_from_toml_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[defaultPolicy]
allowedTags = ["p", "b"]
allowedSchemes = ["https"]

[comments]
allowedTags = ["p"]
forbidAttr = ["style"]
"#
    )
    .unwrap();

    let doc = PolicyLoader::load_path(file.path()).unwrap();
    let store = PolicyStore::new(doc).unwrap();

    assert!(store.policy_for(ContentType::Comments).allows_tag("p"));
    // Missing entries resolve to the default policy
    assert!(store.policy_for(ContentType::SocialSharing).allows_tag("b"));
}

#[test]
fn test_unknown_content_type_uses_default_policy() {
    let store = PolicyStore::builtin();
    let ct = ContentType::from_key("someNewSurface");

    assert_eq!(ct, ContentType::Default);
    assert_eq!(
        store.policy_for(ct),
        store.snapshot().document.default_policy
    );
}

#[test]
fn test_invalid_document_is_fatal_at_startup() {
    let mut doc = PolicyDocument::builtin();
    doc.default_policy.allowed_schemes = vec!["java script".to_string()];

    let err = PolicyStore::new(doc).unwrap_err();
    assert!(err.to_string().contains("allowedSchemes"));
}

#[test]
fn test_policy_error_display() {
    let err = PolicyError::LoadError("missing file".to_string());
    assert!(format!("{}", err).contains("missing file"));
}
