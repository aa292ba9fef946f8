//! Product graph model
//!
//! Nodes are hierarchy positions bound either to an existing concept or to a
//! new concept proposal; edges are `is a`, `contains` and `has product name`.

pub mod axiom;
pub mod closure;
pub mod edge;
pub mod node;
pub mod summary;
pub mod types;

pub use axiom::{Axiom, Relationship, RelationshipTarget};
pub use closure::{ClosureReasoner, CompositionRule};
pub use edge::{Edge, EdgeLabel};
pub use node::{HistoricalAssociation, NewConceptProposal, Node, NonDefiningProperty, OriginalNode};
pub use summary::ProductGraph;
pub use types::Identifier;
