//! Cost tracking for purchase orders: forwarding (cargo) charges rated from
//! a warehouse catalog, the single supplier adjustment, and the landed-cost
//! ledger aggregation.
//!
//! The ledger is derived, never stored; it is recomputed on demand from the
//! order's lines, the cost sheet, the duty captured at the warehouse, and the
//! inbound breakdown supplied by the receiving-cost collaborator.

pub mod adjustment;
pub mod forwarding;
pub mod ledger;

pub use adjustment::{AdjustmentCategory, SupplierAdjustment};
pub use forwarding::{dedup_rates, CostSheet, ForwardingCost, RateCard, RateCatalog, RateCategory};
pub use ledger::{compute_ledger, CostLine, CostLedgerSummary, InboundCostProvider, StorageCost};
