//! Error types for the product graph compiler
//!
//! Every failure falls into one of four categories (see [`ErrorKind`]):
//! caller validation problems, internal inconsistencies, external service
//! failures and "nothing to compile" lookups.

use product_graph_algorithms::TopologyError;
use terminology_sdk::TerminologyError;
use thiserror::Error;

/// Compiler errors
#[derive(Error, Debug)]
pub enum CompilerError {
    /// Malformed attribute combination
    #[error("Validation error: {0}")]
    Validation(String),

    /// No validator is registered for the requested model type
    #[error("No validator for model type {0}")]
    NoValidatorForModelType(String),

    /// More than one candidate concept was selected for a node
    #[error("Ambiguous selection for {level}: {selected:?}")]
    AmbiguousSelection { level: String, selected: Vec<String> },

    /// Units that must agree do not
    #[error("Mismatched units: {0}")]
    MismatchedUnits(String),

    /// Values for one attribute carry more than one concrete datatype
    #[error("Mixed concrete data types for attribute {0}")]
    MixedConcreteTypes(String),

    /// A node id was added twice under different level labels
    #[error("Node {id} already exists with label {existing}, cannot add it as {incoming}")]
    ConflictingNode {
        id: String,
        existing: String,
        incoming: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A relationship still points at a placeholder nothing was created for
    #[error("Placeholder {placeholder} referenced by {referenced_by} has no committed identifier")]
    DanglingPlaceholder {
        placeholder: i64,
        referenced_by: String,
    },

    /// New concepts reference each other in a cycle
    #[error("Circular placeholder dependency through {0:?}")]
    CircularDependency(Vec<i64>),

    /// Terminology service call failed
    #[error("Terminology service failed while {context}: {source}")]
    Terminology {
        context: String,
        #[source]
        source: TerminologyError,
    },

    /// A concurrent compilation task panicked or was aborted
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// No concepts match a root-level extraction query
    #[error("Nothing to compile: {0}")]
    NothingToCompile(String),

    /// The compilation was cancelled before it completed
    #[error("Compilation cancelled")]
    Cancelled,
}

/// Error category, used by callers to decide how to surface a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Inconsistency,
    External,
    NotFound,
}

impl CompilerError {
    /// Wrap a terminology error with the node/query context it occurred in
    pub fn terminology(context: impl Into<String>) -> impl FnOnce(TerminologyError) -> Self {
        let context = context.into();
        move |source| CompilerError::Terminology { context, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CompilerError::Validation(_)
            | CompilerError::NoValidatorForModelType(_)
            | CompilerError::AmbiguousSelection { .. }
            | CompilerError::MismatchedUnits(_)
            | CompilerError::MixedConcreteTypes(_)
            | CompilerError::ConflictingNode { .. }
            | CompilerError::InvalidConfiguration(_) => ErrorKind::Validation,
            CompilerError::DanglingPlaceholder { .. } | CompilerError::CircularDependency(_) => {
                ErrorKind::Inconsistency
            }
            CompilerError::Terminology {
                source: TerminologyError::NotFound(_),
                ..
            }
            | CompilerError::NothingToCompile(_) => ErrorKind::NotFound,
            CompilerError::Terminology { .. }
            | CompilerError::TaskFailed(_)
            | CompilerError::Cancelled => ErrorKind::External,
        }
    }

    /// Whether rerunning the compilation could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CompilerError::Terminology { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<TopologyError> for CompilerError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::CycleDetected(ids) => CompilerError::CircularDependency(ids),
        }
    }
}

pub type CompilerResult<T> = Result<T, CompilerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(CompilerError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            CompilerError::DanglingPlaceholder { placeholder: -3, referenced_by: "-4".into() }.kind(),
            ErrorKind::Inconsistency
        );
        assert_eq!(CompilerError::NothingToCompile("123".into()).kind(), ErrorKind::NotFound);
        let timeout = CompilerError::terminology("querying MPUU")(TerminologyError::Timeout("slow".into()));
        assert_eq!(timeout.kind(), ErrorKind::External);
        assert!(timeout.is_retryable());
        assert!(timeout.to_string().contains("querying MPUU"));
    }

    #[test]
    fn test_cycle_maps_to_circular_dependency() {
        let err: CompilerError = TopologyError::CycleDetected(vec![-2, -3]).into();
        assert!(matches!(err, CompilerError::CircularDependency(ref ids) if ids == &vec![-2, -3]));
        assert!(!err.is_retryable());
    }
}
