//! Product Graph Compiler
//!
//! Turns pharmaceutical product descriptions into graphs of SNOMED CT
//! concepts across the hierarchy levels of a medicines model (AMT or NMPC):
//! medicinal product, clinical drug, packaged clinical drug and their
//! branded forms.
//!
//! # Pipeline
//!
//! - [`ecl::QuerySynthesizer`] turns a candidate relationship set into an ECL query
//! - [`resolver::ConceptResolver`] binds one hierarchy position to an existing
//!   concept, a list of candidates, or a new concept proposal
//! - [`assembler::GraphAssembler`] resolves every position of a package, wires
//!   `is a` / `contains` / `has product name` edges and closes them
//! - [`sequencer::CreationSequencer`] commits new concepts in dependency order
//!   and replaces placeholder ids with real ones
//!
//! ## Example Usage
//!
//! ```rust
//! use product_graph::{CompilationContext, GraphAssembler, ModelConfiguration};
//! use std::sync::Arc;
//! use terminology_sdk::InMemoryTerminology;
//!
//! let terminology = Arc::new(InMemoryTerminology::default());
//! let ctx = CompilationContext::new("MAIN", ModelConfiguration::amt(), terminology);
//! let assembler = GraphAssembler::new(ctx);
//! assert_eq!(assembler.context().branch, "MAIN");
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod assembler;
pub mod config;
pub mod context;
pub mod details;
pub mod ecl;
pub mod error;
pub mod graph;
pub mod model;
pub mod naming;
pub mod placeholder;
pub mod resolver;
pub mod sequencer;
pub mod validation;

// Re-export main types for convenience
pub use assembler::GraphAssembler;
pub use config::{CompilerConfig, NamingConfig, TerminologyConfig};
pub use context::CompilationContext;
pub use details::{
    ConceptRef, Ingredient, MedicationProductDetails, PackageDetails, PackageQuantity, ProductQuantity, Quantity,
};
pub use ecl::{QueryOptions, QuerySynthesizer};
pub use error::{CompilerError, CompilerResult, ErrorKind};
pub use graph::{
    Axiom, ClosureReasoner, Edge, EdgeLabel, Identifier, NewConceptProposal, Node, NonDefiningProperty,
    ProductGraph, Relationship,
};
pub use model::{ModelConfiguration, ModelLevel, ModelLevelType, ModelType};
pub use naming::{NameGenerationService, NameGenerator, RemoteNameGenerator};
pub use placeholder::PlaceholderIdentityCache;
pub use resolver::{ConceptResolver, NodeRequest};
pub use sequencer::{CommitReport, CreationSequencer};
pub use validation::{DetailsValidator, ValidatorRegistry};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), "0.3.0");
    }
}
