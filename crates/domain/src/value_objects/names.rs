//! Validated name newtypes for domain entities
//!
//! These newtypes ensure that names are valid by construction:
//! - Non-empty
//! - Within length limits
//! - Trimmed of leading/trailing whitespace

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Maximum length for name fields
const MAX_NAME_LENGTH: usize = 200;

// ============================================================================
// NpcName
// ============================================================================

/// A validated NPC display name (non-empty, <=200 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NpcName(String);

impl NpcName {
    /// Create a new validated NPC name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if:
    /// - The name is empty after trimming
    /// - The name exceeds 200 characters after trimming
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("NPC name cannot be empty"));
        }
        if trimmed.len() > MAX_NAME_LENGTH {
            return Err(DomainError::validation(format!(
                "NPC name cannot exceed {} characters",
                MAX_NAME_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NpcName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for NpcName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<NpcName> for String {
    fn from(name: NpcName) -> String {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_name() {
        let name = NpcName::new("Dock Watchman").unwrap();
        assert_eq!(name.as_str(), "Dock Watchman");
        assert_eq!(name.to_string(), "Dock Watchman");
    }

    #[test]
    fn empty_name_rejected() {
        let result = NpcName::new("");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn too_long_name_rejected() {
        let long_name = "a".repeat(201);
        assert!(NpcName::new(long_name).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let name = NpcName::new("Fisherman").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"Fisherman\"");
        let back: NpcName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
