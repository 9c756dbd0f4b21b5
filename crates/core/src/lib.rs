//! `portledge-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).
//! Monetary amounts across the workspace are `i64` in the smallest currency
//! unit (e.g. cents) next to an ISO currency code, following the convention
//! of the wider stack.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, LineId, TenantId, UserId, WarehouseId};
