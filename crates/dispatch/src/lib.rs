//! Split dispatch allocation.
//!
//! When cargo leaves manufacturing partially, the order's carton quantities
//! are partitioned between the advancing order and a newly spawned sibling in
//! the same split group. The allocator here is pure: it turns a ship-now plan
//! into the retained quantities for the original and (when any line ships
//! partially) a fully formed sibling seed. Cartons are neither created nor
//! destroyed by splitting.

pub mod allocator;

pub use allocator::{allocate, validate_plan, Allocation, ShipNow, SplitPlan};
