//! `portledge-events` — event and audit contracts.

pub mod audit;
pub mod event;

pub use audit::{AuditError, AuditRecord, AuditSink, InMemoryAuditSink};
pub use event::Event;
