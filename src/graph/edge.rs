//! Labelled edges between graph nodes

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Identifier;

/// Closed set of edge labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeLabel {
    #[serde(rename = "is a")]
    IsA,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "has product name")]
    HasProductName,
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeLabel::IsA => write!(f, "is a"),
            EdgeLabel::Contains => write!(f, "contains"),
            EdgeLabel::HasProductName => write!(f, "has product name"),
        }
    }
}

/// Directed edge `source -[label]-> target`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: Identifier,
    pub target: Identifier,
    pub label: EdgeLabel,
}

impl Edge {
    pub fn new(source: Identifier, target: Identifier, label: EdgeLabel) -> Self {
        Self {
            source,
            target,
            label,
        }
    }

    pub fn is_a(source: Identifier, target: Identifier) -> Self {
        Self::new(source, target, EdgeLabel::IsA)
    }

    pub fn contains(source: Identifier, target: Identifier) -> Self {
        Self::new(source, target, EdgeLabel::Contains)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.label, self.target)
    }
}
