//! Order persistence boundary.
//!
//! Saves are compare-and-swap on the aggregate version the caller loaded:
//! a concurrent transition bumps the stored version and the late writer gets
//! a conflict instead of silently overwriting. A split commits both orders
//! in one atomic operation so the group is never observable half-written.

use std::collections::HashMap;
use std::sync::Mutex;

use portledge_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion, TenantId};
use portledge_orders::{PurchaseOrder, PurchaseOrderId};

pub trait OrderRepository: Send + Sync {
    /// Load one order, or `NotFound`.
    fn load(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder>;

    /// Persist one order. `expected` is checked against the stored version
    /// (0 when the order is new).
    fn save(
        &self,
        tenant_id: TenantId,
        expected: ExpectedVersion,
        order: &PurchaseOrder,
    ) -> DomainResult<()>;

    /// Persist the advancing original and its freshly spawned sibling
    /// atomically. `expected` applies to the original; the sibling must be
    /// new. Neither write survives if either check fails.
    fn save_split(
        &self,
        tenant_id: TenantId,
        expected: ExpectedVersion,
        original: &PurchaseOrder,
        sibling: &PurchaseOrder,
    ) -> DomainResult<()>;
}

/// Mutex-guarded map, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<(TenantId, PurchaseOrderId), PurchaseOrder>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stored_version(
    orders: &HashMap<(TenantId, PurchaseOrderId), PurchaseOrder>,
    key: &(TenantId, PurchaseOrderId),
) -> u64 {
    orders.get(key).map_or(0, AggregateRoot::version)
}

impl OrderRepository for InMemoryOrderRepository {
    fn load(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        self.orders
            .lock()
            .expect("order repository poisoned")
            .get(&(tenant_id, order_id))
            .cloned()
            .ok_or_else(DomainError::not_found)
    }

    fn save(
        &self,
        tenant_id: TenantId,
        expected: ExpectedVersion,
        order: &PurchaseOrder,
    ) -> DomainResult<()> {
        let mut orders = self.orders.lock().expect("order repository poisoned");
        let key = (tenant_id, order.id_typed());
        expected.check(stored_version(&orders, &key))?;
        orders.insert(key, order.clone());
        Ok(())
    }

    fn save_split(
        &self,
        tenant_id: TenantId,
        expected: ExpectedVersion,
        original: &PurchaseOrder,
        sibling: &PurchaseOrder,
    ) -> DomainResult<()> {
        let mut orders = self.orders.lock().expect("order repository poisoned");
        let original_key = (tenant_id, original.id_typed());
        let sibling_key = (tenant_id, sibling.id_typed());
        expected.check(stored_version(&orders, &original_key))?;
        if orders.contains_key(&sibling_key) {
            return Err(DomainError::conflict("sibling order id already exists"));
        }
        orders.insert(original_key, original.clone());
        orders.insert(sibling_key, sibling.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portledge_core::{Aggregate, AggregateId};
    use portledge_orders::{
        CommercialTerms, CreateOrder, OrderType, PurchaseOrderCommand, SupplierSnapshot,
    };

    fn created_order(tenant_id: TenantId) -> PurchaseOrder {
        let order_id = PurchaseOrderId::new(AggregateId::new());
        let mut order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&PurchaseOrderCommand::CreateOrder(CreateOrder {
                tenant_id,
                order_id,
                order_number: "ON-9001".to_string(),
                order_type: OrderType::Purchase,
                supplier: SupplierSnapshot::default(),
                terms: CommercialTerms::default(),
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for event in events {
            order.apply(&event);
        }
        order
    }

    #[test]
    fn save_checks_the_stored_version_not_the_incoming_one() {
        let repo = InMemoryOrderRepository::new();
        let tenant_id = TenantId::new();
        let order = created_order(tenant_id);

        repo.save(tenant_id, ExpectedVersion::Exact(0), &order).unwrap();

        // A writer that loaded version 0 loses to the committed version 1.
        let stale = repo
            .save(tenant_id, ExpectedVersion::Exact(0), &order)
            .unwrap_err();
        assert!(matches!(stale, DomainError::Conflict(_)));

        repo.save(tenant_id, ExpectedVersion::Exact(1), &order).unwrap();
    }

    #[test]
    fn split_save_is_all_or_nothing() {
        let repo = InMemoryOrderRepository::new();
        let tenant_id = TenantId::new();
        let original = created_order(tenant_id);
        let sibling = created_order(tenant_id);

        let stale = repo
            .save_split(tenant_id, ExpectedVersion::Exact(5), &original, &sibling)
            .unwrap_err();
        assert!(matches!(stale, DomainError::Conflict(_)));
        // The sibling was not written either.
        assert!(repo.load(tenant_id, sibling.id_typed()).is_err());

        repo.save_split(tenant_id, ExpectedVersion::Exact(0), &original, &sibling)
            .unwrap();
        assert!(repo.load(tenant_id, sibling.id_typed()).is_ok());
    }
}
