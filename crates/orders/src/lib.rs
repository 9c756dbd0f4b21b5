//! Purchase order domain module (lifecycle-staged, event-sourced).
//!
//! This crate contains business rules for purchase orders, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage). Completeness
//! gates that decide whether a stage transition may proceed live in the gates
//! crate; this crate enforces the structural invariants (stage adjacency,
//! read-only after posting, positive quantities, single PO number assignment).

pub mod line;
pub mod order;
pub mod stage;

pub use line::{
    carton_quantity, check_units, line_total_cost, LinePatch, LineStatus, NewLine, OrderLine,
    DEFAULT_LOT,
};
pub use order::{
    AddLine, ArriveAtWarehouse, ArrivedAtWarehouse, CancelOrder, CommercialTerms, CreateOrder,
    CreateSplitSibling, DetailsUpdated, DispatchToOcean, DispatchedToOcean, IssueOrder, LineAdded,
    LinePatched, LineRemoved, ManufacturingStarted, MarkShipped, OrderCancelled, OrderCreated,
    OrderIssued, OrderReceived, OrderRejected, OrderReopened, OrderShipped, OrderSplit, OrderType,
    PatchLine, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId,
    ReceiveOrder, ReceivedLine, RejectOrder, RemoveLine, ReopenOrder, RetainedLine, SiblingSeed,
    SplitSiblingCreated, StartManufacturing, SupplierSnapshot, UpdateDetails,
};
pub use stage::{ManufacturingData, OceanData, ShippedData, Stage, StageData, WarehouseData};
