//! Verified user identity.
//!
//! # Invariants
//! - Stored form is trimmed and ASCII-lowercased.
//! - Exactly one `@` with non-empty local part and domain.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Email-shaped identity handed out by the OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    Empty,
    Malformed(String),
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "email address cannot be empty"),
            Self::Malformed(value) => write!(f, "`{value}` is not a valid email address"),
        }
    }
}

impl Error for IdentityError {}

impl Identity {
    /// Parses and normalizes an email address.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(IdentityError::Empty);
        }

        let mut parts = normalized.split('@');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
        );
        if !well_formed || normalized.chars().any(char::is_whitespace) {
            return Err(IdentityError::Malformed(raw.trim().to_string()));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain part only; safe to put in logs.
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Identity, IdentityError};

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let identity = Identity::parse("  Alice@Example.COM ").unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
        assert_eq!(identity.domain(), "example.com");
    }

    #[test]
    fn parse_rejects_blank_and_malformed_values() {
        assert_eq!(Identity::parse("   "), Err(IdentityError::Empty));
        for raw in ["nobody", "@x.com", "a@", "a@b@c", "a b@x.com"] {
            assert!(
                matches!(Identity::parse(raw), Err(IdentityError::Malformed(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn deserialization_goes_through_parse() {
        let identity: Identity = serde_json::from_str("\" Bob@X.com\"").unwrap();
        assert_eq!(identity.as_str(), "bob@x.com");
        assert_eq!(serde_json::to_string(&identity).unwrap(), "\"bob@x.com\"");
        assert!(serde_json::from_str::<Identity>("\"not-an-email\"").is_err());
    }
}
