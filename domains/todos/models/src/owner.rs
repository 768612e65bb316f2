use std::fmt;

use serde::{Deserialize, Serialize};

const MAX_LEN: usize = 64;

/// Identifier of the user owning a record, as issued by the auth service.
///
/// Restricted to `[A-Za-z0-9_-]` so an owner id can be spliced into cache
/// key globs without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOwnerId {
    #[error("owner id is empty")]
    Empty,
    #[error("owner id is longer than 64 characters")]
    TooLong,
    #[error("owner id contains {0:?}")]
    BadCharacter(char),
}

impl OwnerId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidOwnerId> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidOwnerId::Empty);
        }
        if trimmed.len() > MAX_LEN {
            return Err(InvalidOwnerId::TooLong);
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(InvalidOwnerId::BadCharacter(c));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = InvalidOwnerId;

    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self { value.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(OwnerId::parse(" 42 ").unwrap().as_str(), "42");
        assert!(OwnerId::parse("65f1c0ffee_ab-CD").is_ok());
        assert_eq!(OwnerId::parse(""), Err(InvalidOwnerId::Empty));
        assert_eq!(OwnerId::parse("   "), Err(InvalidOwnerId::Empty));
        assert_eq!(OwnerId::parse("u*"), Err(InvalidOwnerId::BadCharacter('*')));
        assert_eq!(OwnerId::parse("a:b"), Err(InvalidOwnerId::BadCharacter(':')));
        assert_eq!(OwnerId::parse("x".repeat(65)), Err(InvalidOwnerId::TooLong));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<OwnerId>(r#""ok-1""#).is_ok());
        assert!(serde_json::from_str::<OwnerId>(r#""users:*""#).is_err());
    }
}
