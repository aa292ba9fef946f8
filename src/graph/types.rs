//! Concept identifiers
//!
//! New concepts carry run-local negative placeholders until the terminology
//! service issues real SCTIDs. Both live in one sum type so a placeholder can
//! never be mistaken for a real id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CompilerError;

/// A real SCTID or a run-local placeholder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Identifier {
    /// Strictly negative, unique within one compilation run
    Placeholder(i64),
    Real(String),
}

impl Identifier {
    pub fn real(id: impl Into<String>) -> Self {
        Identifier::Real(id.into())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Identifier::Placeholder(_))
    }

    pub fn placeholder(&self) -> Option<i64> {
        match self {
            Identifier::Placeholder(id) => Some(*id),
            Identifier::Real(_) => None,
        }
    }

    pub fn as_real(&self) -> Option<&str> {
        match self {
            Identifier::Real(id) => Some(id),
            Identifier::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Placeholder(id) => write!(f, "{}", id),
            Identifier::Real(id) => write!(f, "{}", id),
        }
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for Identifier {
    type Error = CompilerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(digits) = value.strip_prefix('-') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(id) = value.parse::<i64>() {
                    return Ok(Identifier::Placeholder(id));
                }
            }
        } else if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Identifier::Real(value));
        }
        Err(CompilerError::Validation(format!(
            "{:?} is neither an SCTID nor a placeholder",
            value
        )))
    }
}

impl TryFrom<&str> for Identifier {
    type Error = CompilerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::try_from(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(Identifier::try_from("-3").unwrap(), Identifier::Placeholder(-3));
        assert_eq!(
            Identifier::try_from("763158003").unwrap(),
            Identifier::real("763158003")
        );
        assert!(Identifier::try_from("abc").is_err());
        assert!(Identifier::try_from("-").is_err());
        assert!(Identifier::try_from("").is_err());
    }

    #[test]
    fn test_identifier_serde_as_string() {
        let json = serde_json::to_string(&vec![Identifier::Placeholder(-2), Identifier::real("123")]).unwrap();
        assert_eq!(json, r#"["-2","123"]"#);
        let back: Vec<Identifier> = serde_json::from_str(&json).unwrap();
        assert!(back[0].is_placeholder());
        assert_eq!(back[1].as_real(), Some("123"));
    }
}
