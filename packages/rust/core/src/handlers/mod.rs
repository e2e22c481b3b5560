//! Event-driven entry points.
//!
//! Both take their collaborators through an explicit context so the local
//! CLI, tests and any hosted runtime can wire them differently.

pub mod ingest;
pub mod query;

pub use ingest::{IngestContext, IngestOutcome, IngestSettings, StorageEvent, handle_ingest};
pub use query::{QueryContext, QueryRequest, QueryResponse, QuerySettings, handle_query};
