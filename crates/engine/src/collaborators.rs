//! Collaborator boundaries the engine reads from.
//!
//! Documents, warehouse directory entries, catalog packaging defaults and
//! forwarding costs are owned by other systems. The engine prefetches them
//! through these traits before a gate runs; a failed fetch aborts the
//! transition upstream rather than letting a gate evaluate against guessed
//! data. The in-memory implementations back tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use portledge_core::{DomainResult, TenantId, WarehouseId};
use portledge_costing::ForwardingCost;
use portledge_gates::{DocumentRecord, PackagingDefaults};
use portledge_orders::{PurchaseOrder, PurchaseOrderId};

/// One warehouse known to the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseEntry {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
}

/// Warehouse directory (owned by the warehousing system).
pub trait WarehouseDirectory: Send + Sync {
    fn list_warehouses(&self, tenant_id: TenantId) -> DomainResult<Vec<WarehouseEntry>>;
}

/// Documents uploaded against an order (owned by document storage).
pub trait DocumentProvider: Send + Sync {
    fn documents_for(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<DocumentRecord>>;
}

/// Catalog packaging defaults for the order's lines (batch and SKU levels).
pub trait PackagingDefaultsProvider: Send + Sync {
    fn defaults_for(
        &self,
        tenant_id: TenantId,
        order: &PurchaseOrder,
    ) -> DomainResult<PackagingDefaults>;
}

/// Forwarding cost rows recorded against an order.
pub trait ForwardingCostSource: Send + Sync {
    fn forwarding_costs(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<ForwardingCost>>;
}

/// Source of commercial numbering: the PO number assigned at first issue and
/// the order number given to a split sibling.
pub trait OrderNumberSource: Send + Sync {
    fn next_po_number(&self, tenant_id: TenantId) -> DomainResult<String>;
    fn sibling_order_number(&self, tenant_id: TenantId, original: &str) -> DomainResult<String>;
}

/// Fixed directory for tests and local runs.
#[derive(Debug, Default)]
pub struct StaticWarehouseDirectory {
    entries: Vec<WarehouseEntry>,
}

impl StaticWarehouseDirectory {
    pub fn new(entries: Vec<WarehouseEntry>) -> Self {
        Self { entries }
    }
}

impl WarehouseDirectory for StaticWarehouseDirectory {
    fn list_warehouses(&self, _tenant_id: TenantId) -> DomainResult<Vec<WarehouseEntry>> {
        Ok(self.entries.clone())
    }
}

/// Append-only in-memory document store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    by_order: Mutex<HashMap<PurchaseOrderId, Vec<DocumentRecord>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(&self, order_id: PurchaseOrderId, record: DocumentRecord) {
        self.by_order
            .lock()
            .expect("document store poisoned")
            .entry(order_id)
            .or_default()
            .push(record);
    }
}

impl DocumentProvider for InMemoryDocumentStore {
    fn documents_for(
        &self,
        _tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<DocumentRecord>> {
        Ok(self
            .by_order
            .lock()
            .expect("document store poisoned")
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Fixed packaging defaults, applied to every order.
#[derive(Debug, Default)]
pub struct StaticPackagingDefaults {
    defaults: PackagingDefaults,
}

impl StaticPackagingDefaults {
    pub fn new(defaults: PackagingDefaults) -> Self {
        Self { defaults }
    }
}

impl PackagingDefaultsProvider for StaticPackagingDefaults {
    fn defaults_for(
        &self,
        _tenant_id: TenantId,
        _order: &PurchaseOrder,
    ) -> DomainResult<PackagingDefaults> {
        Ok(self.defaults.clone())
    }
}

/// In-memory forwarding cost rows.
#[derive(Debug, Default)]
pub struct InMemoryForwardingCosts {
    by_order: Mutex<HashMap<PurchaseOrderId, Vec<ForwardingCost>>>,
}

impl InMemoryForwardingCosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, order_id: PurchaseOrderId, cost: ForwardingCost) {
        self.by_order
            .lock()
            .expect("forwarding costs poisoned")
            .entry(order_id)
            .or_default()
            .push(cost);
    }
}

impl ForwardingCostSource for InMemoryForwardingCosts {
    fn forwarding_costs(
        &self,
        _tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<ForwardingCost>> {
        Ok(self
            .by_order
            .lock()
            .expect("forwarding costs poisoned")
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Monotonic number source. PO numbers are `PO-<n>` from the given floor;
/// sibling order numbers suffix the original with the split ordinal.
#[derive(Debug)]
pub struct SequenceNumbers {
    next_po: AtomicU64,
    next_split: AtomicU64,
}

impl SequenceNumbers {
    pub fn starting_at(po_floor: u64) -> Self {
        Self {
            next_po: AtomicU64::new(po_floor),
            next_split: AtomicU64::new(2),
        }
    }
}

impl Default for SequenceNumbers {
    fn default() -> Self {
        Self::starting_at(1000)
    }
}

impl OrderNumberSource for SequenceNumbers {
    fn next_po_number(&self, _tenant_id: TenantId) -> DomainResult<String> {
        let n = self.next_po.fetch_add(1, Ordering::SeqCst);
        Ok(format!("PO-{n}"))
    }

    fn sibling_order_number(&self, _tenant_id: TenantId, original: &str) -> DomainResult<String> {
        let n = self.next_split.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{original}-{n}"))
    }
}
