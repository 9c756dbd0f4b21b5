use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use portledge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LineId, TenantId};
use portledge_events::Event;

use crate::line::{check_units, LinePatch, LineStatus, NewLine, OrderLine};
use crate::stage::{ManufacturingData, OceanData, ShippedData, Stage, StageData, WarehouseData};

/// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Purchase,
    Adjustment,
}

/// Supplier details resolved onto the order (not owned by it).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupplierSnapshot {
    pub name: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub banking_reference: Option<String>,
}

/// Commercial terms agreed with the supplier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommercialTerms {
    pub incoterms: Option<String>,
    pub payment_terms: Option<String>,
    pub expected_date: Option<chrono::NaiveDate>,
}

/// Per-line carton count the original order keeps on dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedLine {
    pub line_id: LineId,
    pub cartons: u32,
}

/// Seed for the sibling order spawned by a partial dispatch.
///
/// Lines carry fresh ids and remainder quantities; the allocator in the
/// dispatch crate builds this from the ship-now plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiblingSeed {
    pub sibling_id: PurchaseOrderId,
    pub order_number: String,
    /// Inherited commercial reference; siblings never pass through Issued.
    pub po_number: Option<String>,
    pub split_group_id: AggregateId,
    pub split_parent_id: PurchaseOrderId,
    pub lines: Vec<OrderLine>,
}

/// Per-line received quantity captured at warehouse finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_id: LineId,
    pub quantity_received: u32,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    order_number: String,
    po_number: Option<String>,
    order_type: OrderType,
    stage: Stage,
    supplier: SupplierSnapshot,
    terms: CommercialTerms,
    warehouse_code: Option<String>,
    warehouse_name: Option<String>,
    receive_type: Option<String>,
    split_group_id: Option<AggregateId>,
    split_parent_id: Option<PurchaseOrderId>,
    posted_at: Option<DateTime<Utc>>,
    stage_data: StageData,
    notes: Option<String>,
    lines: Vec<OrderLine>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            order_number: String::new(),
            po_number: None,
            order_type: OrderType::Purchase,
            stage: Stage::Draft,
            supplier: SupplierSnapshot::default(),
            terms: CommercialTerms::default(),
            warehouse_code: None,
            warehouse_name: None,
            receive_type: None,
            split_group_id: None,
            split_parent_id: None,
            posted_at: None,
            stage_data: StageData::default(),
            notes: None,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn po_number(&self) -> Option<&str> {
        self.po_number.as_deref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn supplier(&self) -> &SupplierSnapshot {
        &self.supplier
    }

    pub fn terms(&self) -> &CommercialTerms {
        &self.terms
    }

    pub fn warehouse_code(&self) -> Option<&str> {
        self.warehouse_code.as_deref()
    }

    pub fn warehouse_name(&self) -> Option<&str> {
        self.warehouse_name.as_deref()
    }

    pub fn receive_type(&self) -> Option<&str> {
        self.receive_type.as_deref()
    }

    pub fn split_group_id(&self) -> Option<AggregateId> {
        self.split_group_id
    }

    pub fn split_parent_id(&self) -> Option<PurchaseOrderId> {
        self.split_parent_id
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    pub fn stage_data(&self) -> &StageData {
        &self.stage_data
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn line(&self, line_id: LineId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Total units ordered over non-cancelled lines.
    pub fn total_units(&self) -> u64 {
        self.lines
            .iter()
            .filter(|l| !l.is_cancelled())
            .map(|l| u64::from(l.units_ordered))
            .sum()
    }

    /// Total cartons over non-cancelled lines.
    pub fn total_cartons(&self) -> u64 {
        self.lines
            .iter()
            .filter(|l| !l.is_cancelled())
            .map(|l| u64::from(l.quantity))
            .sum()
    }

    /// Once inventory is posted or the order is in a terminal/rejected stage,
    /// order and lines are read-only (the Rejected → Draft reopen is the one
    /// way back into the workflow).
    pub fn is_read_only(&self) -> bool {
        self.posted_at.is_some()
            || matches!(self.stage, Stage::Shipped | Stage::Cancelled | Stage::Rejected)
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub order_type: OrderType,
    pub supplier: SupplierSnapshot,
    pub terms: CommercialTerms,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails (supplier, terms, notes; Draft/Issued only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub supplier: Option<SupplierSnapshot>,
    pub terms: Option<CommercialTerms>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (Draft or Issued only; Issued exists to add PI numbers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line: NewLine,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PatchLine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_id: LineId,
    pub patch: LinePatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine (hard-delete in Draft, soft-cancel afterwards).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_id: LineId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueOrder (Draft → Issued; assigns the PO number once).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    /// Proposed number; `None` keeps an existing assignment (re-issue after reopen).
    pub po_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartManufacturing (Issued → Manufacturing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartManufacturing {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub data: ManufacturingData,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DispatchToOcean (Manufacturing → Ocean, with split allocation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchToOcean {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub data: OceanData,
    /// Cartons this order keeps, per non-cancelled line.
    pub retained: Vec<RetainedLine>,
    /// Present iff any line ships partially.
    pub sibling: Option<SiblingSeed>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArriveAtWarehouse (Ocean → Warehouse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArriveAtWarehouse {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub warehouse_code: Option<String>,
    pub warehouse_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveOrder (warehouse finalize; posts inventory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub receive_type: String,
    pub data: WarehouseData,
    pub received: Vec<ReceivedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkShipped (Warehouse → Shipped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkShipped {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub data: ShippedData,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder (Draft/Issued only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectOrder (Issued only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReopenOrder (Rejected → Draft; clears forward stage data only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReopenOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CreateSplitSibling (materializes the remainder order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSplitSibling {
    pub tenant_id: TenantId,
    pub order_type: OrderType,
    pub supplier: SupplierSnapshot,
    pub terms: CommercialTerms,
    pub seed: SiblingSeed,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreateOrder(CreateOrder),
    UpdateDetails(UpdateDetails),
    AddLine(AddLine),
    PatchLine(PatchLine),
    RemoveLine(RemoveLine),
    IssueOrder(IssueOrder),
    StartManufacturing(StartManufacturing),
    DispatchToOcean(DispatchToOcean),
    ArriveAtWarehouse(ArriveAtWarehouse),
    ReceiveOrder(ReceiveOrder),
    MarkShipped(MarkShipped),
    CancelOrder(CancelOrder),
    RejectOrder(RejectOrder),
    ReopenOrder(ReopenOrder),
    CreateSplitSibling(CreateSplitSibling),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub order_type: OrderType,
    pub supplier: SupplierSnapshot,
    pub terms: CommercialTerms,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DetailsUpdated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsUpdated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub supplier: Option<SupplierSnapshot>,
    pub terms: Option<CommercialTerms>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded (carries the fully derived line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line: OrderLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinePatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePatched {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_id: LineId,
    pub patch: LinePatch,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_id: LineId,
    /// Hard removal only ever happens in Draft.
    pub hard: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderIssued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIssued {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    /// `None` on re-issue after reopen (number already assigned).
    pub po_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ManufacturingStarted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingStarted {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub data: ManufacturingData,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DispatchedToOcean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchedToOcean {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub data: OceanData,
    pub retained: Vec<RetainedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderSplit (on the original; the sibling gets its own created event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSplit {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub sibling_id: PurchaseOrderId,
    pub split_group_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SplitSiblingCreated (applied to a fresh aggregate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSiblingCreated {
    pub tenant_id: TenantId,
    pub order_type: OrderType,
    pub supplier: SupplierSnapshot,
    pub terms: CommercialTerms,
    pub seed: SiblingSeed,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ArrivedAtWarehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivedAtWarehouse {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub warehouse_code: Option<String>,
    pub warehouse_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReceived (inventory posting; lines become read-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceived {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub receive_type: String,
    pub data: WarehouseData,
    pub received: Vec<ReceivedLine>,
    pub posted_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderShipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub data: ShippedData,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReopened {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    OrderCreated(OrderCreated),
    DetailsUpdated(DetailsUpdated),
    LineAdded(LineAdded),
    LinePatched(LinePatched),
    LineRemoved(LineRemoved),
    OrderIssued(OrderIssued),
    ManufacturingStarted(ManufacturingStarted),
    DispatchedToOcean(DispatchedToOcean),
    OrderSplit(OrderSplit),
    SplitSiblingCreated(SplitSiblingCreated),
    ArrivedAtWarehouse(ArrivedAtWarehouse),
    OrderReceived(OrderReceived),
    OrderShipped(OrderShipped),
    OrderCancelled(OrderCancelled),
    OrderRejected(OrderRejected),
    OrderReopened(OrderReopened),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::OrderCreated(_) => "orders.order.created",
            PurchaseOrderEvent::DetailsUpdated(_) => "orders.order.details_updated",
            PurchaseOrderEvent::LineAdded(_) => "orders.line.added",
            PurchaseOrderEvent::LinePatched(_) => "orders.line.patched",
            PurchaseOrderEvent::LineRemoved(_) => "orders.line.removed",
            PurchaseOrderEvent::OrderIssued(_) => "orders.order.issued",
            PurchaseOrderEvent::ManufacturingStarted(_) => "orders.order.manufacturing_started",
            PurchaseOrderEvent::DispatchedToOcean(_) => "orders.order.dispatched_to_ocean",
            PurchaseOrderEvent::OrderSplit(_) => "orders.order.split",
            PurchaseOrderEvent::SplitSiblingCreated(_) => "orders.order.split_sibling_created",
            PurchaseOrderEvent::ArrivedAtWarehouse(_) => "orders.order.arrived_at_warehouse",
            PurchaseOrderEvent::OrderReceived(_) => "orders.order.received",
            PurchaseOrderEvent::OrderShipped(_) => "orders.order.shipped",
            PurchaseOrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            PurchaseOrderEvent::OrderRejected(_) => "orders.order.rejected",
            PurchaseOrderEvent::OrderReopened(_) => "orders.order.reopened",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::OrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::DetailsUpdated(e) => e.occurred_at,
            PurchaseOrderEvent::LineAdded(e) => e.occurred_at,
            PurchaseOrderEvent::LinePatched(e) => e.occurred_at,
            PurchaseOrderEvent::LineRemoved(e) => e.occurred_at,
            PurchaseOrderEvent::OrderIssued(e) => e.occurred_at,
            PurchaseOrderEvent::ManufacturingStarted(e) => e.occurred_at,
            PurchaseOrderEvent::DispatchedToOcean(e) => e.occurred_at,
            PurchaseOrderEvent::OrderSplit(e) => e.occurred_at,
            PurchaseOrderEvent::SplitSiblingCreated(e) => e.occurred_at,
            PurchaseOrderEvent::ArrivedAtWarehouse(e) => e.occurred_at,
            PurchaseOrderEvent::OrderReceived(e) => e.occurred_at,
            PurchaseOrderEvent::OrderShipped(e) => e.occurred_at,
            PurchaseOrderEvent::OrderCancelled(e) => e.occurred_at,
            PurchaseOrderEvent::OrderRejected(e) => e.occurred_at,
            PurchaseOrderEvent::OrderReopened(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_number = e.order_number.clone();
                self.order_type = e.order_type;
                self.supplier = e.supplier.clone();
                self.terms = e.terms.clone();
                self.notes = e.notes.clone();
                self.stage = Stage::Draft;
                self.lines.clear();
                self.created = true;
            }
            PurchaseOrderEvent::DetailsUpdated(e) => {
                if let Some(supplier) = &e.supplier {
                    self.supplier = supplier.clone();
                }
                if let Some(terms) = &e.terms {
                    self.terms = terms.clone();
                }
                if let Some(notes) = &e.notes {
                    self.notes = Some(notes.clone());
                }
            }
            PurchaseOrderEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            PurchaseOrderEvent::LinePatched(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.id == e.line_id) {
                    e.patch.apply_to(line);
                }
            }
            PurchaseOrderEvent::LineRemoved(e) => {
                if e.hard {
                    self.lines.retain(|l| l.id != e.line_id);
                } else if let Some(line) = self.lines.iter_mut().find(|l| l.id == e.line_id) {
                    line.status = LineStatus::Cancelled;
                }
            }
            PurchaseOrderEvent::OrderIssued(e) => {
                if let Some(po_number) = &e.po_number {
                    self.po_number = Some(po_number.clone());
                }
                self.stage = Stage::Issued;
            }
            PurchaseOrderEvent::ManufacturingStarted(e) => {
                self.stage_data.manufacturing = e.data.clone();
                self.stage = Stage::Manufacturing;
            }
            PurchaseOrderEvent::DispatchedToOcean(e) => {
                for retained in &e.retained {
                    let Some(line) = self.lines.iter_mut().find(|l| l.id == retained.line_id)
                    else {
                        continue;
                    };
                    if retained.cartons == 0 {
                        // The entire line moved to the sibling.
                        line.status = LineStatus::Cancelled;
                    } else if retained.cartons < line.quantity {
                        line.quantity = retained.cartons;
                        line.units_ordered = retained.cartons * line.units_per_carton;
                        if line.unit_cost.is_some() {
                            line.total_cost =
                                crate::line_total_cost(line.unit_cost, line.units_ordered);
                        }
                    }
                }
                self.stage_data.ocean = e.data.clone();
                self.stage = Stage::Ocean;
            }
            PurchaseOrderEvent::OrderSplit(e) => {
                if self.split_group_id.is_none() {
                    self.split_group_id = Some(e.split_group_id);
                }
            }
            PurchaseOrderEvent::SplitSiblingCreated(e) => {
                self.id = e.seed.sibling_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_number = e.seed.order_number.clone();
                self.po_number = e.seed.po_number.clone();
                self.order_type = e.order_type;
                self.supplier = e.supplier.clone();
                self.terms = e.terms.clone();
                self.split_group_id = Some(e.seed.split_group_id);
                self.split_parent_id = Some(e.seed.split_parent_id);
                self.lines = e.seed.lines.clone();
                self.stage = Stage::Manufacturing;
                self.created = true;
            }
            PurchaseOrderEvent::ArrivedAtWarehouse(e) => {
                if e.warehouse_code.is_some() {
                    self.warehouse_code = e.warehouse_code.clone();
                }
                if e.warehouse_name.is_some() {
                    self.warehouse_name = e.warehouse_name.clone();
                }
                self.stage = Stage::Warehouse;
            }
            PurchaseOrderEvent::OrderReceived(e) => {
                self.warehouse_code = Some(e.warehouse_code.clone());
                self.warehouse_name = Some(e.warehouse_name.clone());
                self.receive_type = Some(e.receive_type.clone());
                self.stage_data.warehouse = e.data.clone();
                for received in &e.received {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.id == received.line_id) {
                        line.quantity_received = Some(received.quantity_received);
                        line.posted_quantity = Some(received.quantity_received);
                        line.status = LineStatus::Posted;
                    }
                }
                self.posted_at = Some(e.posted_at);
            }
            PurchaseOrderEvent::OrderShipped(e) => {
                self.stage_data.shipped = e.data.clone();
                self.stage = Stage::Shipped;
            }
            PurchaseOrderEvent::OrderCancelled(_) => {
                self.stage = Stage::Cancelled;
            }
            PurchaseOrderEvent::OrderRejected(_) => {
                self.stage = Stage::Rejected;
            }
            PurchaseOrderEvent::OrderReopened(_) => {
                // Forward-looking stage data only; lines, costs, documents,
                // and the assigned po_number survive the reopen.
                self.stage_data = StageData::default();
                self.stage = Stage::Draft;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::UpdateDetails(cmd) => self.handle_update_details(cmd),
            PurchaseOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::PatchLine(cmd) => self.handle_patch_line(cmd),
            PurchaseOrderCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            PurchaseOrderCommand::IssueOrder(cmd) => self.handle_issue(cmd),
            PurchaseOrderCommand::StartManufacturing(cmd) => self.handle_start_manufacturing(cmd),
            PurchaseOrderCommand::DispatchToOcean(cmd) => self.handle_dispatch(cmd),
            PurchaseOrderCommand::ArriveAtWarehouse(cmd) => self.handle_arrive(cmd),
            PurchaseOrderCommand::ReceiveOrder(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::MarkShipped(cmd) => self.handle_mark_shipped(cmd),
            PurchaseOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            PurchaseOrderCommand::RejectOrder(cmd) => self.handle_reject(cmd),
            PurchaseOrderCommand::ReopenOrder(cmd) => self.handle_reopen(cmd),
            PurchaseOrderCommand::CreateSplitSibling(cmd) => self.handle_create_sibling(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_order_id(order_id)
    }

    fn ensure_stage(&self, expected: Stage, action: &str) -> Result<(), DomainError> {
        if self.stage != expected {
            return Err(DomainError::invariant(format!(
                "cannot {action} while order is in {} (requires {expected})",
                self.stage
            )));
        }
        Ok(())
    }

    fn ensure_not_read_only(&self) -> Result<(), DomainError> {
        if self.is_read_only() {
            return Err(DomainError::invariant(
                "order is read-only once posted or in a terminal stage",
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order_number must not be empty"));
        }

        Ok(vec![PurchaseOrderEvent::OrderCreated(OrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            order_type: cmd.order_type,
            supplier: cmd.supplier.clone(),
            terms: cmd.terms.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(
        &self,
        cmd: &UpdateDetails,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_not_read_only()?;
        if !matches!(self.stage, Stage::Draft | Stage::Issued) {
            return Err(DomainError::invariant(
                "supplier and terms can only change in draft or issued",
            ));
        }

        Ok(vec![PurchaseOrderEvent::DetailsUpdated(DetailsUpdated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            supplier: cmd.supplier.clone(),
            terms: cmd.terms.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_not_read_only()?;
        if !matches!(self.stage, Stage::Draft | Stage::Issued) {
            return Err(DomainError::invariant(
                "lines can only be added in draft or issued",
            ));
        }

        if cmd.line.sku_code.trim().is_empty() {
            return Err(DomainError::validation("sku_code must not be empty"));
        }
        if cmd.line.lot.trim().is_empty() {
            return Err(DomainError::validation(
                "lot must be set (use DEFAULT for unbatched)",
            ));
        }
        check_units(cmd.line.units_ordered, cmd.line.units_per_carton)?;
        if self.lines.iter().any(|l| l.id == cmd.line.line_id) {
            return Err(DomainError::conflict("line id already present"));
        }

        Ok(vec![PurchaseOrderEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line: cmd.line.clone().into_line(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_patch_line(&self, cmd: &PatchLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_not_read_only()?;

        let line = self
            .line(cmd.line_id)
            .ok_or_else(DomainError::not_found)?;
        if line.status != LineStatus::Pending {
            return Err(DomainError::invariant(
                "only pending lines can be patched",
            ));
        }

        let units_ordered = cmd.patch.units_ordered.unwrap_or(line.units_ordered);
        let units_per_carton = cmd.patch.units_per_carton.unwrap_or(line.units_per_carton);
        check_units(units_ordered, units_per_carton)?;

        Ok(vec![PurchaseOrderEvent::LinePatched(LinePatched {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_id: cmd.line_id,
            patch: cmd.patch.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_not_read_only()?;

        let line = self
            .line(cmd.line_id)
            .ok_or_else(DomainError::not_found)?;
        if line.status == LineStatus::Cancelled {
            return Err(DomainError::invariant("line is already cancelled"));
        }

        Ok(vec![PurchaseOrderEvent::LineRemoved(LineRemoved {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_id: cmd.line_id,
            hard: self.stage == Stage::Draft,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_stage(Stage::Draft, "issue")?;

        let po_number = match (&self.po_number, &cmd.po_number) {
            // First issue: the number is assigned here, exactly once.
            (None, Some(po_number)) => Some(po_number.clone()),
            (None, None) => {
                return Err(DomainError::invariant("po_number required on first issue"));
            }
            // Re-issue after reopen keeps the original number.
            (Some(_), None) => None,
            (Some(existing), Some(proposed)) if existing == proposed => None,
            (Some(_), Some(_)) => {
                return Err(DomainError::invariant(
                    "po_number is assigned exactly once and never changes",
                ));
            }
        };

        Ok(vec![PurchaseOrderEvent::OrderIssued(OrderIssued {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            po_number,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_manufacturing(
        &self,
        cmd: &StartManufacturing,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_stage(Stage::Issued, "start manufacturing")?;

        Ok(vec![PurchaseOrderEvent::ManufacturingStarted(
            ManufacturingStarted {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                data: cmd.data.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_dispatch(&self, cmd: &DispatchToOcean) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_stage(Stage::Manufacturing, "dispatch to ocean")?;

        let mut any_shipped = false;
        let mut any_partial = false;
        for retained in &cmd.retained {
            let line = self
                .line(retained.line_id)
                .ok_or_else(DomainError::not_found)?;
            if line.is_cancelled() {
                return Err(DomainError::invariant(
                    "cancelled lines cannot appear in a dispatch plan",
                ));
            }
            if retained.cartons > line.quantity {
                return Err(DomainError::invariant(
                    "ship-now cartons exceed the line's carton quantity",
                ));
            }
            if retained.cartons > 0 {
                any_shipped = true;
            }
            if retained.cartons < line.quantity {
                any_partial = true;
            }
        }
        if !any_shipped {
            return Err(DomainError::validation(
                "at least one line must ship cartons",
            ));
        }
        if any_partial && cmd.sibling.is_none() {
            return Err(DomainError::invariant(
                "partial dispatch requires a sibling seed",
            ));
        }
        if !any_partial && cmd.sibling.is_some() {
            return Err(DomainError::invariant(
                "full dispatch must not spawn a sibling",
            ));
        }

        let mut events = vec![PurchaseOrderEvent::DispatchedToOcean(DispatchedToOcean {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            data: cmd.data.clone(),
            retained: cmd.retained.clone(),
            occurred_at: cmd.occurred_at,
        })];

        if let Some(sibling) = &cmd.sibling {
            events.push(PurchaseOrderEvent::OrderSplit(OrderSplit {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                sibling_id: sibling.sibling_id,
                split_group_id: sibling.split_group_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_arrive(&self, cmd: &ArriveAtWarehouse) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_stage(Stage::Ocean, "arrive at warehouse")?;

        Ok(vec![PurchaseOrderEvent::ArrivedAtWarehouse(
            ArrivedAtWarehouse {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                warehouse_code: cmd.warehouse_code.clone(),
                warehouse_name: cmd.warehouse_name.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_receive(&self, cmd: &ReceiveOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_stage(Stage::Warehouse, "receive")?;
        if self.posted_at.is_some() {
            return Err(DomainError::invariant("order has already been received"));
        }

        for received in &cmd.received {
            let line = self
                .line(received.line_id)
                .ok_or_else(DomainError::not_found)?;
            if line.is_cancelled() {
                return Err(DomainError::invariant(
                    "cancelled lines cannot be received",
                ));
            }
        }

        Ok(vec![PurchaseOrderEvent::OrderReceived(OrderReceived {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            warehouse_code: cmd.warehouse_code.clone(),
            warehouse_name: cmd.warehouse_name.clone(),
            receive_type: cmd.receive_type.clone(),
            data: cmd.data.clone(),
            received: cmd.received.clone(),
            posted_at: cmd.occurred_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_shipped(&self, cmd: &MarkShipped) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_stage(Stage::Warehouse, "mark shipped")?;

        Ok(vec![PurchaseOrderEvent::OrderShipped(OrderShipped {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            data: cmd.data.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        if !self.stage.allows_transition_to(Stage::Cancelled) {
            return Err(DomainError::invariant(
                "only draft or issued orders can be cancelled",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderCancelled(OrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        if !self.stage.allows_transition_to(Stage::Rejected) {
            return Err(DomainError::invariant(
                "only issued orders can be rejected",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderRejected(OrderRejected {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reopen(&self, cmd: &ReopenOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        if !self.stage.allows_transition_to(Stage::Draft) {
            return Err(DomainError::invariant(
                "only rejected orders can be reopened",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderReopened(OrderReopened {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create_sibling(
        &self,
        cmd: &CreateSplitSibling,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.seed.lines.is_empty() {
            return Err(DomainError::invariant(
                "a split sibling must hold at least one remainder line",
            ));
        }
        for line in &cmd.seed.lines {
            check_units(line.units_ordered, line.units_per_carton)?;
        }

        Ok(vec![PurchaseOrderEvent::SplitSiblingCreated(
            SplitSiblingCreated {
                tenant_id: cmd.tenant_id,
                order_type: cmd.order_type,
                supplier: cmd.supplier.clone(),
                terms: cmd.terms.clone(),
                seed: cmd.seed.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portledge_core::AggregateId;
    use portledge_packaging::PackagingSnapshot;

    use crate::line::DEFAULT_LOT;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn apply_all(order: &mut PurchaseOrder, events: &[PurchaseOrderEvent]) {
        for event in events {
            order.apply(event);
        }
    }

    fn new_line(sku: &str, units_ordered: u32, units_per_carton: u32) -> NewLine {
        NewLine {
            line_id: LineId::new(),
            sku_code: sku.to_string(),
            sku_description: None,
            lot: DEFAULT_LOT.to_string(),
            pi_number: None,
            commodity_code: None,
            country_of_origin: None,
            material: None,
            net_weight_kg: None,
            packaging: PackagingSnapshot::default(),
            carton_gross_weight_kg: None,
            packaging_type: None,
            units_ordered,
            units_per_carton,
            unit_cost: Some(250),
            currency: Some("USD".to_string()),
        }
    }

    fn draft_order(tenant_id: TenantId, order_id: PurchaseOrderId) -> PurchaseOrder {
        let mut order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&PurchaseOrderCommand::CreateOrder(CreateOrder {
                tenant_id,
                order_id,
                order_number: "ON-1001".to_string(),
                order_type: OrderType::Purchase,
                supplier: SupplierSnapshot {
                    name: Some("Acme Manufacturing".to_string()),
                    ..Default::default()
                },
                terms: CommercialTerms {
                    incoterms: Some("FOB".to_string()),
                    payment_terms: Some("NET30".to_string()),
                    expected_date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1),
                },
                notes: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        order
    }

    fn add_test_line(
        order: &mut PurchaseOrder,
        tenant_id: TenantId,
        line: NewLine,
    ) -> LineId {
        let line_id = line.line_id;
        let events = order
            .handle(&PurchaseOrderCommand::AddLine(AddLine {
                tenant_id,
                order_id: order.id_typed(),
                line,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(order, &events);
        line_id
    }

    fn issue(order: &mut PurchaseOrder, tenant_id: TenantId) {
        let events = order
            .handle(&PurchaseOrderCommand::IssueOrder(IssueOrder {
                tenant_id,
                order_id: order.id_typed(),
                po_number: Some("PO-1001".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(order, &events);
    }

    fn advance_to_manufacturing(order: &mut PurchaseOrder, tenant_id: TenantId) {
        issue(order, tenant_id);
        let events = order
            .handle(&PurchaseOrderCommand::StartManufacturing(StartManufacturing {
                tenant_id,
                order_id: order.id_typed(),
                data: ManufacturingData::default(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(order, &events);
    }

    #[test]
    fn issue_assigns_po_number_exactly_once() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = draft_order(tenant_id, order_id);
        add_test_line(&mut order, tenant_id, new_line("SKU-1", 100, 10));

        issue(&mut order, tenant_id);
        assert_eq!(order.stage(), Stage::Issued);
        assert_eq!(order.po_number(), Some("PO-1001"));

        // Re-issue with a different number is an invariant violation, not a
        // form error.
        let err = order
            .handle(&PurchaseOrderCommand::IssueOrder(IssueOrder {
                tenant_id,
                order_id,
                po_number: Some("PO-9999".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn line_quantity_is_derived_as_ceiling() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        let line_id = add_test_line(&mut order, tenant_id, new_line("SKU-1", 55, 10));

        let line = order.line(line_id).unwrap();
        assert_eq!(line.quantity, 6);
        assert_eq!(line.total_cost, Some(250 * 55));

        // Patching units_per_carton recomputes the derived quantity.
        let events = order
            .handle(&PurchaseOrderCommand::PatchLine(PatchLine {
                tenant_id,
                order_id: order.id_typed(),
                line_id,
                patch: LinePatch {
                    units_per_carton: Some(20),
                    ..Default::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        assert_eq!(order.line(line_id).unwrap().quantity, 3);
    }

    #[test]
    fn non_positive_units_are_rejected_not_coerced() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());

        let err = order
            .handle(&PurchaseOrderCommand::AddLine(AddLine {
                tenant_id,
                order_id: order.id_typed(),
                line: new_line("SKU-1", 0, 10),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let line_id = add_test_line(&mut order, tenant_id, new_line("SKU-2", 10, 10));
        let err = order
            .handle(&PurchaseOrderCommand::PatchLine(PatchLine {
                tenant_id,
                order_id: order.id_typed(),
                line_id,
                patch: LinePatch {
                    units_per_carton: Some(0),
                    ..Default::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn remove_is_hard_in_draft_and_soft_afterwards() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        let first = add_test_line(&mut order, tenant_id, new_line("SKU-1", 10, 10));
        let second = add_test_line(&mut order, tenant_id, new_line("SKU-2", 10, 10));

        let events = order
            .handle(&PurchaseOrderCommand::RemoveLine(RemoveLine {
                tenant_id,
                order_id: order.id_typed(),
                line_id: first,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        assert!(order.line(first).is_none());

        issue(&mut order, tenant_id);
        let events = order
            .handle(&PurchaseOrderCommand::RemoveLine(RemoveLine {
                tenant_id,
                order_id: order.id_typed(),
                line_id: second,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        let line = order.line(second).unwrap();
        assert_eq!(line.status, LineStatus::Cancelled);
        assert_eq!(order.total_cartons(), 0);
    }

    #[test]
    fn lines_cannot_be_added_once_manufacturing() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        add_test_line(&mut order, tenant_id, new_line("SKU-1", 10, 10));
        advance_to_manufacturing(&mut order, tenant_id);

        let err = order
            .handle(&PurchaseOrderCommand::AddLine(AddLine {
                tenant_id,
                order_id: order.id_typed(),
                line: new_line("SKU-2", 10, 10),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn dispatch_applies_retained_quantities() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        let full = add_test_line(&mut order, tenant_id, new_line("SKU-1", 100, 10));
        let partial = add_test_line(&mut order, tenant_id, new_line("SKU-2", 55, 10));
        advance_to_manufacturing(&mut order, tenant_id);

        let sibling_id = test_order_id();
        let group_id = AggregateId::from_uuid(*order.id_typed().0.as_uuid());
        let remainder = OrderLine {
            id: LineId::new(),
            units_ordered: 25,
            quantity: 3,
            total_cost: Some(250 * 25),
            ..order.line(partial).unwrap().clone()
        };
        let events = order
            .handle(&PurchaseOrderCommand::DispatchToOcean(DispatchToOcean {
                tenant_id,
                order_id: order.id_typed(),
                data: OceanData {
                    vessel_name: Some("MV Caspian".to_string()),
                    port_of_loading: Some("CNSHA".to_string()),
                    port_of_discharge: Some("USLAX".to_string()),
                    etd: None,
                    eta: None,
                },
                retained: vec![
                    RetainedLine { line_id: full, cartons: 10 },
                    RetainedLine { line_id: partial, cartons: 3 },
                ],
                sibling: Some(SiblingSeed {
                    sibling_id,
                    order_number: "ON-1001-2".to_string(),
                    po_number: order.po_number().map(str::to_string),
                    split_group_id: group_id,
                    split_parent_id: order.id_typed(),
                    lines: vec![remainder],
                }),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 2);
        apply_all(&mut order, &events);

        assert_eq!(order.stage(), Stage::Ocean);
        assert_eq!(order.split_group_id(), Some(group_id));
        assert_eq!(order.line(full).unwrap().quantity, 10);
        let kept = order.line(partial).unwrap();
        assert_eq!(kept.quantity, 3);
        assert_eq!(kept.units_ordered, 30);
        assert_eq!(kept.total_cost, Some(250 * 30));
    }

    #[test]
    fn full_dispatch_with_sibling_is_rejected() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        let line_id = add_test_line(&mut order, tenant_id, new_line("SKU-1", 100, 10));
        advance_to_manufacturing(&mut order, tenant_id);

        let err = order
            .handle(&PurchaseOrderCommand::DispatchToOcean(DispatchToOcean {
                tenant_id,
                order_id: order.id_typed(),
                data: OceanData::default(),
                retained: vec![RetainedLine { line_id, cartons: 10 }],
                sibling: Some(SiblingSeed {
                    sibling_id: test_order_id(),
                    order_number: "ON-1001-2".to_string(),
                    po_number: None,
                    split_group_id: AggregateId::new(),
                    split_parent_id: order.id_typed(),
                    lines: vec![],
                }),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn receive_posts_lines_and_freezes_the_order() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        let line_id = add_test_line(&mut order, tenant_id, new_line("SKU-1", 100, 10));
        advance_to_manufacturing(&mut order, tenant_id);

        let events = order
            .handle(&PurchaseOrderCommand::DispatchToOcean(DispatchToOcean {
                tenant_id,
                order_id: order.id_typed(),
                data: OceanData::default(),
                retained: vec![RetainedLine { line_id, cartons: 10 }],
                sibling: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);

        let events = order
            .handle(&PurchaseOrderCommand::ArriveAtWarehouse(ArriveAtWarehouse {
                tenant_id,
                order_id: order.id_typed(),
                warehouse_code: Some("LAX1".to_string()),
                warehouse_name: Some("Los Angeles 1".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);

        let events = order
            .handle(&PurchaseOrderCommand::ReceiveOrder(ReceiveOrder {
                tenant_id,
                order_id: order.id_typed(),
                warehouse_code: "LAX1".to_string(),
                warehouse_name: "Los Angeles 1".to_string(),
                receive_type: "standard".to_string(),
                data: WarehouseData {
                    customs_entry_number: Some("CE-77".to_string()),
                    customs_cleared_date: chrono::NaiveDate::from_ymd_opt(2025, 7, 1),
                    received_date: chrono::NaiveDate::from_ymd_opt(2025, 7, 2),
                    duty_amount: Some(12_000),
                    discrepancy_notes: None,
                },
                received: vec![ReceivedLine { line_id, quantity_received: 10 }],
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);

        assert!(order.posted_at().is_some());
        let line = order.line(line_id).unwrap();
        assert_eq!(line.status, LineStatus::Posted);
        assert_eq!(line.quantity_received, Some(10));
        assert_eq!(line.posted_quantity, Some(10));

        // Posted orders are read-only.
        let err = order
            .handle(&PurchaseOrderCommand::PatchLine(PatchLine {
                tenant_id,
                order_id: order.id_typed(),
                line_id,
                patch: LinePatch::default(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn reopen_clears_forward_stage_data_and_keeps_lines() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        let line_id = add_test_line(&mut order, tenant_id, new_line("SKU-1", 100, 10));
        issue(&mut order, tenant_id);

        // Simulate stale ocean data captured before the supplier rejected the RFQ.
        order.stage_data.ocean.vessel_name = Some("MV Stale".to_string());

        let events = order
            .handle(&PurchaseOrderCommand::RejectOrder(RejectOrder {
                tenant_id,
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        assert_eq!(order.stage(), Stage::Rejected);
        assert!(order.is_read_only());

        let events = order
            .handle(&PurchaseOrderCommand::ReopenOrder(ReopenOrder {
                tenant_id,
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);

        assert_eq!(order.stage(), Stage::Draft);
        assert_eq!(order.stage_data().ocean.vessel_name, None);
        assert!(order.line(line_id).is_some());
        assert_eq!(order.po_number(), Some("PO-1001"));

        // Re-issue keeps the original number.
        let events = order
            .handle(&PurchaseOrderCommand::IssueOrder(IssueOrder {
                tenant_id,
                order_id: order.id_typed(),
                po_number: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        assert_eq!(order.po_number(), Some("PO-1001"));
    }

    #[test]
    fn cancel_is_only_available_early() {
        let tenant_id = test_tenant_id();
        let mut order = draft_order(tenant_id, test_order_id());
        add_test_line(&mut order, tenant_id, new_line("SKU-1", 10, 10));
        advance_to_manufacturing(&mut order, tenant_id);

        let err = order
            .handle(&PurchaseOrderCommand::CancelOrder(CancelOrder {
                tenant_id,
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn sibling_rehydrates_from_its_created_event() {
        let tenant_id = test_tenant_id();
        let parent_id = test_order_id();
        let sibling_id = test_order_id();
        let seed = SiblingSeed {
            sibling_id,
            order_number: "ON-1001-2".to_string(),
            po_number: Some("PO-1001".to_string()),
            split_group_id: AggregateId::from_uuid(*parent_id.0.as_uuid()),
            split_parent_id: parent_id,
            lines: vec![new_line("SKU-2", 25, 10).into_line()],
        };

        let mut sibling = PurchaseOrder::empty(sibling_id);
        let events = sibling
            .handle(&PurchaseOrderCommand::CreateSplitSibling(CreateSplitSibling {
                tenant_id,
                order_type: OrderType::Purchase,
                supplier: SupplierSnapshot::default(),
                terms: CommercialTerms::default(),
                seed: seed.clone(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut sibling, &events);

        assert_eq!(sibling.stage(), Stage::Manufacturing);
        assert_eq!(sibling.split_parent_id(), Some(parent_id));
        assert_eq!(sibling.split_group_id(), Some(seed.split_group_id));
        assert_eq!(sibling.po_number(), Some("PO-1001"));
        assert_eq!(sibling.total_cartons(), 3);
    }
}
