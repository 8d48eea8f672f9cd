use crate::violation::{SecurityViolation, Severity, ViolationType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Heuristic markup-injection scanner.
///
/// Advisory only: it reports what looks like an attack so it can be audited
/// and alerted on, while the allow-list enforcer does the actual removal.
/// Scanning is pure and never fails; empty or malformed input yields no
/// violations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViolationDetector;

static SCRIPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<script\b[^>]*>").unwrap()
});

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<[a-z][a-z0-9-]*\b[^>]*>").unwrap()
});

static EVENT_HANDLER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)[\s/"'](on[a-z]+)\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

static URL_ATTRIBUTE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)[\s/"'](href|src|action|formaction|xlink:href|background|poster|data)\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#,
    )
    .unwrap()
});

static SUSPICIOUS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<(iframe|object|embed|applet|meta|base|form)\b[^>]*>|data:\s*text/html|expression\s*\(",
    )
    .unwrap()
});

static TAG_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([a-zA-Z][a-zA-Z0-9-]*)").unwrap()
});

impl ViolationDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan content and return violations in rule order, then match order.
    ///
    /// Rules run as script tags, dangerous attributes, then suspicious
    /// patterns. A fragment matched by several rules is reported once per rule.
    pub fn scan(&self, content: &str) -> Vec<SecurityViolation> {
        if content.is_empty() {
            return Vec::new();
        }

        let mut violations = Vec::new();
        violations.extend(Self::script_tags(content));
        violations.extend(Self::dangerous_attributes(content));
        violations.extend(Self::suspicious_patterns(content));
        violations
    }

    /// Fast check for any rule match
    pub fn contains_violation(&self, content: &str) -> bool {
        SCRIPT_PATTERN.is_match(content)
            || SUSPICIOUS_PATTERN.is_match(content)
            || !Self::dangerous_attributes(content).is_empty()
    }

    /// Lower-cased tag names found in `original` but not in `sanitized`
    pub fn removed_elements(original: &str, sanitized: &str) -> Vec<String> {
        let remaining = Self::tag_names(sanitized);
        Self::tag_names(original)
            .into_iter()
            .filter(|tag| !remaining.contains(tag))
            .collect()
    }

    fn tag_names(content: &str) -> BTreeSet<String> {
        TAG_NAME_PATTERN
            .captures_iter(content)
            .map(|c| c[1].to_ascii_lowercase())
            .collect()
    }

    fn script_tags(content: &str) -> Vec<SecurityViolation> {
        SCRIPT_PATTERN
            .find_iter(content)
            .map(|m| {
                SecurityViolation::new(
                    ViolationType::ScriptTag,
                    Severity::Critical,
                    m.as_str(),
                    "Script tag detected",
                )
            })
            .collect()
    }

    fn dangerous_attributes(content: &str) -> Vec<SecurityViolation> {
        let mut found: Vec<(usize, SecurityViolation)> = Vec::new();

        for tag in TAG_PATTERN.find_iter(content) {
            let tag_text = tag.as_str();

            for caps in EVENT_HANDLER_PATTERN.captures_iter(tag_text) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let value = normalize_value(&caps[2]);
                let severity = if value.contains("javascript:") {
                    Severity::High
                } else {
                    Severity::Medium
                };
                found.push((
                    tag.start() + whole.start(),
                    SecurityViolation::new(
                        ViolationType::DangerousAttribute,
                        severity,
                        whole.as_str().trim_start(),
                        format!("Event handler attribute '{}'", name.as_str().to_lowercase()),
                    ),
                ));
            }

            for caps in URL_ATTRIBUTE_PATTERN.captures_iter(tag_text) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let value = normalize_value(&caps[2]);
                let (severity, scheme) = if value.starts_with("javascript:") {
                    (Severity::High, "javascript:")
                } else if value.starts_with("vbscript:") {
                    (Severity::Medium, "vbscript:")
                } else {
                    continue;
                };
                found.push((
                    tag.start() + whole.start(),
                    SecurityViolation::new(
                        ViolationType::DangerousAttribute,
                        severity,
                        whole.as_str().trim_start(),
                        format!(
                            "{} URL in '{}' attribute",
                            scheme,
                            name.as_str().to_lowercase()
                        ),
                    ),
                ));
            }
        }

        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, v)| v).collect()
    }

    fn suspicious_patterns(content: &str) -> Vec<SecurityViolation> {
        SUSPICIOUS_PATTERN
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let description = match caps.get(1) {
                    Some(tag) => format!("Embedded <{}> element", tag.as_str().to_lowercase()),
                    None if whole.as_str().to_lowercase().starts_with("data:") => {
                        "HTML data URL".to_string()
                    }
                    None => "CSS expression".to_string(),
                };
                Some(SecurityViolation::new(
                    ViolationType::SuspiciousPattern,
                    Severity::Medium,
                    whole.as_str(),
                    description,
                ))
            })
            .collect()
    }
}

/// Unquote an attribute value and drop whitespace/control characters that
/// browsers ignore inside URL schemes (`java\tscript:`).
fn normalize_value(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(content: &str) -> Vec<SecurityViolation> {
        ViolationDetector::new().scan(content)
    }

    #[test]
    fn test_script_injection() {
        let v = scan("<p>Hi</p><script>alert(1)</script>");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].violation_type, ViolationType::ScriptTag);
        assert_eq!(v[0].severity, Severity::Critical);
        assert_eq!(v[0].original_fragment, "<script>alert(1)</script>");
    }

    #[test]
    fn test_unclosed_script_tag() {
        let v = scan("<SCRIPT src=//evil.example>");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].violation_type, ViolationType::ScriptTag);
    }

    #[test]
    fn test_onclick_is_medium() {
        let v = scan(r#"<div onclick="x()">hi</div>"#);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].violation_type, ViolationType::DangerousAttribute);
        assert_eq!(v[0].severity, Severity::Medium);
    }

    #[test]
    fn test_handler_with_javascript_is_high() {
        let v = scan(r#"<div onclick="javascript:x()">hi</div>"#);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].severity, Severity::High);
    }

    #[test]
    fn test_javascript_and_vbscript_urls() {
        let v = scan(r#"<a href="java	script:alert(1)">a</a><a href='vbscript:msgbox'>b</a>"#);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].severity, Severity::High);
        assert_eq!(v[1].severity, Severity::Medium);
        assert!(v.iter().all(|x| x.violation_type == ViolationType::DangerousAttribute));
    }

    #[test]
    fn test_multiple_handlers_in_order() {
        let v = scan(r#"<img src=x onerror=alert(1) onload="y()">"#);
        assert_eq!(v.len(), 2);
        assert!(v[0].original_fragment.starts_with("onerror"));
        assert!(v[1].original_fragment.starts_with("onload"));
    }

    #[test]
    fn test_suspicious_patterns() {
        let v = scan(r#"<iframe src="https://x.example"></iframe><embed src=a.swf>"#);
        assert_eq!(v.len(), 2);
        assert!(v.iter().all(|x| x.violation_type == ViolationType::SuspiciousPattern));
        assert!(v.iter().all(|x| x.severity == Severity::Medium));
        assert!(v[0].description.contains("iframe"));
    }

    #[test]
    fn test_overlapping_rules_reported_per_rule() {
        // The iframe carries an event handler: one attribute and one embed violation.
        let v = scan(r#"<iframe onload="x()"></iframe>"#);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].violation_type, ViolationType::DangerousAttribute);
        assert_eq!(v[1].violation_type, ViolationType::SuspiciousPattern);
    }

    #[test]
    fn test_rule_order_is_stable() {
        let v = scan(r#"<object data="x"></object><a onclick=1>x</a><script>1</script>"#);
        let types: Vec<_> = v.iter().map(|x| x.violation_type).collect();
        assert_eq!(
            types,
            vec![
                ViolationType::ScriptTag,
                ViolationType::DangerousAttribute,
                ViolationType::SuspiciousPattern,
            ]
        );
    }

    #[test]
    fn test_safe_and_empty_content() {
        assert!(scan("").is_empty());
        assert!(scan("<p>Hello <strong>world</strong>!</p>").is_empty());
        assert!(scan("one = two, upon=three").is_empty());
        assert!(scan("<<<>>>\"'<a").is_empty());
    }

    #[test]
    fn test_contains_violation() {
        let detector = ViolationDetector::new();
        assert!(detector.contains_violation("<img src=x onerror=alert(1)>"));
        assert!(detector.contains_violation("url: data:text/html,<b>"));
        assert!(!detector.contains_violation("<b>Fluffy</b>"));
    }

    #[test]
    fn test_removed_elements() {
        let removed =
            ViolationDetector::removed_elements("<p>Hi</p><script>alert(1)</script>", "<p>Hi</p>");
        assert_eq!(removed, vec!["script".to_string()]);

        let removed = ViolationDetector::removed_elements("<B>x</B><IFRAME></IFRAME>", "x");
        assert_eq!(removed, vec!["b".to_string(), "iframe".to_string()]);
    }
}
