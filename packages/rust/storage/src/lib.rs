//! Storage-side collaborators for Deckhand.
//!
//! Each collaborator is a trait with a local implementation and an in-memory one:
//! - [`ObjectStore`]: location-scoped object listing, fetch and write
//!   ([`FsObjectStore`], [`MemoryObjectStore`])
//! - [`StackOutputs`]: resolves which location holds the source content
//!   ([`FileStackOutputs`], [`StaticStackOutputs`])
//! - [`CdnInvalidator`]: evicts published paths from edge caches
//!   ([`FsCdnInvalidator`], [`MemoryCdnInvalidator`])
//! - [`TemplateSource`]: the presentation page template
//!   ([`FileTemplate`], [`StaticTemplate`])

pub mod cdn;
pub mod fs;
pub mod memory;
pub mod object;
pub mod outputs;
pub mod template;

pub use cdn::{
    CdnInvalidator, FsCdnInvalidator, InvalidationReceipt, InvalidationRequest,
    MemoryCdnInvalidator,
};
pub use fs::FsObjectStore;
pub use memory::{MemoryObjectStore, StoredObject};
pub use object::{
    ListPage, ListRequest, ObjectStore, ObjectSummary, PutReceipt, PutRequest, sha256_hex,
};
pub use outputs::{FileStackOutputs, StackOutputs, StaticStackOutputs};
pub use template::{FileTemplate, StaticTemplate, TemplateSource};
