//! Terminology SDK: Client library for SNOMED CT terminology servers
//!
//! Provides two client implementations:
//!
//! - **`InMemoryTerminology`**: In-process, no network. Query answers are
//!   registered up front. Ideal for tests, demos, and offline calculation.
//!
//! - **`RemoteClient`**: Connects to a running Snowstorm-style server via HTTP.
//!   For production use.
//!
//! Both implement the `TerminologyService` trait for a unified API.
//!
//! # Quick Start
//!
//! ```rust
//! use terminology_sdk::{InMemoryTerminology, TerminologyService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = InMemoryTerminology::default();
//!
//!     let found = client.query_concepts("MAIN", "(<763158003)", 50)
//!         .await.unwrap();
//!     println!("Found {} concepts", found.len());
//! }
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod models;
pub mod remote;

pub use client::TerminologyService;
pub use error::{TerminologyError, TerminologyResult};
pub use memory::{sctid, InMemoryTerminology, WriteEvent};
pub use models::{
    Axiom, BatchState, BatchStatus, ConceptDetail, ConceptDraft, ConceptSummary,
    ConcreteDataType, ConcreteValue, DefinitionStatus, DescriptionDraft, DescriptionType, Page,
    RefsetMember, Relationship, TermValue, STATED_RELATIONSHIP,
};
pub use remote::{RemoteClient, RemoteOptions};
