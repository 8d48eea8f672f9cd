//! # Petshield XSS
//!
//! Markup-injection detection and allow-list enforcement.
//!
//! Two independent stages look at the same input:
//!
//! - [`ViolationDetector`] heuristically reports script tags, dangerous
//!   attributes and suspicious embeds. It is advisory and never fails.
//! - [`Enforcer`] is the allow-list sanitizer that produces the output.
//!   [`AmmoniaEnforcer`] implements it with `ammonia`, configured from a
//!   policy through [`EnforcementConfig`].
//!
//! ## Quick Start
//!
//! ```rust
//! use petshield_policy::ContentPolicy;
//! use petshield_xss::{AmmoniaEnforcer, EnforcementConfig, ViolationDetector};
//!
//! let input = "<p>Hi</p><script>alert(1)</script>";
//!
//! let violations = ViolationDetector::new().scan(input);
//! assert_eq!(violations.len(), 1);
//!
//! let config = EnforcementConfig::from_policy(&ContentPolicy::default());
//! let clean = AmmoniaEnforcer::clean(input, &config).unwrap();
//! assert_eq!(clean, "<p>Hi</p>");
//! ```

pub mod detector;
pub mod encoder;
pub mod enforcer;
pub mod error;
pub mod result;
pub mod violation;

pub use detector::ViolationDetector;
pub use encoder::HtmlEncoder;
pub use enforcer::{AmmoniaEnforcer, EnforcementConfig, Enforcer};
pub use error::{Result, XssError};
pub use result::SanitizedResult;
pub use violation::{MAX_FRAGMENT_CHARS, SecurityViolation, Severity, ViolationType};
