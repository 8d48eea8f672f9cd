//! Content types and their reserved policy keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of user content being sanitized.
///
/// Each variant selects one reserved entry of the policy document. Keys that
/// are not recognised resolve to [`ContentType::Default`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    /// Generic content (`defaultPolicy`)
    #[default]
    #[serde(rename = "defaultPolicy")]
    Default,
    /// User profile bios and display names (`userProfiles`)
    UserProfiles,
    /// Pet card names and descriptions (`petCardMetadata`)
    PetCardMetadata,
    /// Comment threads (`comments`)
    Comments,
    /// Text attached to social shares (`socialSharing`)
    SocialSharing,
}

impl ContentType {
    /// All content types, in policy document order.
    pub const ALL: [ContentType; 5] = [
        ContentType::Default,
        ContentType::UserProfiles,
        ContentType::PetCardMetadata,
        ContentType::Comments,
        ContentType::SocialSharing,
    ];

    /// Reserved policy key for this content type.
    pub fn policy_key(&self) -> &'static str {
        match self {
            ContentType::Default => "defaultPolicy",
            ContentType::UserProfiles => "userProfiles",
            ContentType::PetCardMetadata => "petCardMetadata",
            ContentType::Comments => "comments",
            ContentType::SocialSharing => "socialSharing",
        }
    }

    /// Resolve a key to a content type.
    ///
    /// Matching ignores case, `_` and `-`, so `pet_card_metadata` and
    /// `pet-card-metadata` both resolve. Unknown keys fall back to
    /// [`ContentType::Default`].
    pub fn from_key(key: &str) -> Self {
        let normalized: String = key
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "userprofiles" | "userprofile" => ContentType::UserProfiles,
            "petcardmetadata" | "petcard" => ContentType::PetCardMetadata,
            "comments" | "comment" => ContentType::Comments,
            "socialsharing" | "social" => ContentType::SocialSharing,
            _ => ContentType::Default,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.policy_key())
    }
}
