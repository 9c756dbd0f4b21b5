//! The transition engine: the only writer of order stage state.
//!
//! The engine sequences one transition end to end: load the order, check the
//! caller's expected version, prefetch collaborator data into a snapshot, run
//! the stage gate, let the aggregate decide, persist atomically (both orders
//! of a split in one commit), and emit audit records. Gate failures come back
//! as data ([`TransitionOutcome::Blocked`]); errors are reserved for broken
//! invariants, stale versions, and collaborator failures.

pub mod collaborators;
pub mod engine;
pub mod repository;

pub use collaborators::{
    DocumentProvider, ForwardingCostSource, InMemoryDocumentStore, InMemoryForwardingCosts,
    OrderNumberSource, PackagingDefaultsProvider, SequenceNumbers, StaticPackagingDefaults,
    StaticWarehouseDirectory, WarehouseDirectory, WarehouseEntry,
};
pub use engine::{ReceiveRequest, TransitionEngine, TransitionOutcome, TransitionPayload, TransitionRequest};
pub use repository::{InMemoryOrderRepository, OrderRepository};
