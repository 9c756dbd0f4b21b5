//! Transition sequencing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};

use portledge_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, TenantId,
    UserId,
};
use portledge_dispatch::{allocate, SplitPlan};
use portledge_events::{AuditRecord, AuditSink, Event};
use portledge_gates::{
    validate_receiving, validate_transition, DocumentIndex, GateReport, GateSnapshot,
};
use portledge_orders::{
    ArriveAtWarehouse, CancelOrder, CreateSplitSibling, DispatchToOcean, IssueOrder,
    ManufacturingData, MarkShipped, OceanData, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderId, ReceiveOrder, ReceivedLine, RejectOrder, ReopenOrder,
    ShippedData, Stage, StartManufacturing, WarehouseData,
};

use crate::collaborators::{
    DocumentProvider, ForwardingCostSource, OrderNumberSource, PackagingDefaultsProvider,
    WarehouseDirectory,
};
use crate::repository::OrderRepository;

/// Stage-specific payload accompanying a transition request.
#[derive(Debug, Clone, Default)]
pub enum TransitionPayload {
    #[default]
    None,
    Manufacturing(ManufacturingData),
    Dispatch {
        data: OceanData,
        plan: SplitPlan,
    },
    Arrival {
        warehouse_code: Option<String>,
    },
    Shipping(ShippedData),
}

/// One stage transition, as requested by a caller.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub tenant_id: TenantId,
    pub actor: UserId,
    pub order_id: PurchaseOrderId,
    pub target: Stage,
    /// Version of the order the caller last saw. `Any` skips the check.
    pub expected_version: ExpectedVersion,
    pub payload: TransitionPayload,
    pub occurred_at: DateTime<Utc>,
}

/// Warehouse receiving (finalize), a distinct action within the Warehouse
/// stage rather than a stage transition.
#[derive(Debug, Clone)]
pub struct ReceiveRequest {
    pub tenant_id: TenantId,
    pub actor: UserId,
    pub order_id: PurchaseOrderId,
    pub expected_version: ExpectedVersion,
    pub warehouse_code: String,
    pub receive_type: String,
    pub data: WarehouseData,
    pub received: Vec<ReceivedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// How a transition attempt ended. A blocked gate is a normal outcome, not
/// an error; nothing was persisted.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Blocked(GateReport),
    Completed {
        order: PurchaseOrder,
        /// Present only when a partial dispatch spawned a split sibling.
        sibling: Option<PurchaseOrder>,
    },
}

/// Sequences transitions over the repository and collaborator boundaries.
pub struct TransitionEngine {
    repository: Arc<dyn OrderRepository>,
    documents: Arc<dyn DocumentProvider>,
    packaging: Arc<dyn PackagingDefaultsProvider>,
    forwarding: Arc<dyn ForwardingCostSource>,
    warehouses: Arc<dyn WarehouseDirectory>,
    numbers: Arc<dyn OrderNumberSource>,
    audit_sink: Arc<dyn AuditSink>,
}

impl TransitionEngine {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        documents: Arc<dyn DocumentProvider>,
        packaging: Arc<dyn PackagingDefaultsProvider>,
        forwarding: Arc<dyn ForwardingCostSource>,
        warehouses: Arc<dyn WarehouseDirectory>,
        numbers: Arc<dyn OrderNumberSource>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            repository,
            documents,
            packaging,
            forwarding,
            warehouses,
            numbers,
            audit_sink: audit,
        }
    }

    /// Run one stage transition end to end.
    ///
    /// Order of operations: load → version check → snapshot assembly → gate →
    /// aggregate decision → atomic persist → audit. The gate sees the same
    /// snapshot on a retry, so a blocked transition leaves nothing behind.
    pub fn transition(&self, request: TransitionRequest) -> DomainResult<TransitionOutcome> {
        let order = self.repository.load(request.tenant_id, request.order_id)?;
        let loaded_version = order.version();
        request.expected_version.check(loaded_version)?;

        let span = tracing::info_span!(
            "order_transition",
            order_id = %request.order_id,
            from = %order.stage(),
            to = %request.target,
        );
        let _guard = span.enter();

        let documents = DocumentIndex::new(
            self.documents
                .documents_for(request.tenant_id, request.order_id)?,
        );
        let packaging_defaults = self.packaging.defaults_for(request.tenant_id, &order)?;
        let forwarding = self
            .forwarding
            .forwarding_costs(request.tenant_id, request.order_id)?;

        let (split_plan, ocean_data, selected_warehouse) = match &request.payload {
            TransitionPayload::Dispatch { data, plan } => (Some(plan), Some(data), None),
            TransitionPayload::Arrival { warehouse_code } => {
                (None, None, warehouse_code.as_deref())
            }
            TransitionPayload::None
            | TransitionPayload::Manufacturing(_)
            | TransitionPayload::Shipping(_) => (None, None, None),
        };
        let snapshot = GateSnapshot {
            order: &order,
            documents: &documents,
            forwarding: &forwarding,
            packaging_defaults: &packaging_defaults,
            split_plan,
            ocean_data,
            selected_warehouse,
        };

        let report = validate_transition(&snapshot, request.target);
        if !report.is_empty() {
            tracing::info!(issues = report.issues().len(), "transition blocked by gate");
            return Ok(TransitionOutcome::Blocked(report));
        }

        let (command, sibling_seed) = self.build_command(&order, &request)?;
        let events = order.handle(&command)?;

        let mut updated = order.clone();
        let before = state_summary(&order);
        for event in &events {
            updated.apply(event);
        }

        let sibling = match sibling_seed {
            None => None,
            Some(seed) => {
                let mut sibling = PurchaseOrder::empty(seed.sibling_id);
                let create = PurchaseOrderCommand::CreateSplitSibling(CreateSplitSibling {
                    tenant_id: request.tenant_id,
                    order_type: order.order_type(),
                    supplier: order.supplier().clone(),
                    terms: order.terms().clone(),
                    seed,
                    occurred_at: request.occurred_at,
                });
                let sibling_events = sibling.handle(&create)?;
                for event in &sibling_events {
                    sibling.apply(event);
                }
                Some((sibling, sibling_events))
            }
        };

        match &sibling {
            Some((sibling_order, _)) => self.repository.save_split(
                request.tenant_id,
                ExpectedVersion::Exact(loaded_version),
                &updated,
                sibling_order,
            )?,
            None => self.repository.save(
                request.tenant_id,
                ExpectedVersion::Exact(loaded_version),
                &updated,
            )?,
        }

        let after = state_summary(&updated);
        for event in &events {
            self.audit_event(&request, &updated, event, &before, &after)?;
        }
        if let Some((sibling_order, sibling_events)) = &sibling {
            let sibling_after = state_summary(sibling_order);
            for event in sibling_events {
                self.audit_event(&request, sibling_order, event, &JsonValue::Null, &sibling_after)?;
            }
        }

        tracing::info!(
            version = updated.version(),
            split = sibling.is_some(),
            "transition committed"
        );
        Ok(TransitionOutcome::Completed {
            order: updated,
            sibling: sibling.map(|(order, _)| order),
        })
    }

    /// Finalize receiving at the warehouse: gate the receipt payload, post
    /// the order, persist, audit.
    pub fn receive(&self, request: ReceiveRequest) -> DomainResult<TransitionOutcome> {
        let order = self.repository.load(request.tenant_id, request.order_id)?;
        let loaded_version = order.version();
        request.expected_version.check(loaded_version)?;

        let span = tracing::info_span!(
            "order_receive",
            order_id = %request.order_id,
            warehouse = %request.warehouse_code,
        );
        let _guard = span.enter();

        let warehouse_name = if request.warehouse_code.trim().is_empty() {
            String::new()
        } else {
            self.warehouse_name(request.tenant_id, &request.warehouse_code)?
        };

        let command = ReceiveOrder {
            tenant_id: request.tenant_id,
            order_id: request.order_id,
            warehouse_code: request.warehouse_code.clone(),
            warehouse_name,
            receive_type: request.receive_type.clone(),
            data: request.data.clone(),
            received: request.received.clone(),
            occurred_at: request.occurred_at,
        };

        let report = validate_receiving(&order, &command);
        if !report.is_empty() {
            tracing::info!(issues = report.issues().len(), "receiving blocked by gate");
            return Ok(TransitionOutcome::Blocked(report));
        }

        let events = order.handle(&PurchaseOrderCommand::ReceiveOrder(command))?;
        let mut updated = order.clone();
        let before = state_summary(&order);
        for event in &events {
            updated.apply(event);
        }
        self.repository.save(
            request.tenant_id,
            ExpectedVersion::Exact(loaded_version),
            &updated,
        )?;

        let after = state_summary(&updated);
        for event in &events {
            self.audit(
                request.tenant_id,
                request.actor,
                &updated,
                event,
                &before,
                &after,
                request.occurred_at,
            )?;
        }

        tracing::info!(version = updated.version(), "order received");
        Ok(TransitionOutcome::Completed {
            order: updated,
            sibling: None,
        })
    }

    fn build_command(
        &self,
        order: &PurchaseOrder,
        request: &TransitionRequest,
    ) -> DomainResult<(PurchaseOrderCommand, Option<portledge_orders::SiblingSeed>)> {
        let tenant_id = request.tenant_id;
        let order_id = request.order_id;
        let occurred_at = request.occurred_at;

        let command = match (request.target, &request.payload) {
            (Stage::Issued, _) => {
                // The PO number is assigned exactly once, at first issue; a
                // re-issue after reopen keeps the existing one.
                let po_number = match order.po_number() {
                    None => Some(self.numbers.next_po_number(tenant_id)?),
                    Some(_) => None,
                };
                PurchaseOrderCommand::IssueOrder(IssueOrder {
                    tenant_id,
                    order_id,
                    po_number,
                    occurred_at,
                })
            }
            (Stage::Manufacturing, payload) => {
                let data = match payload {
                    TransitionPayload::Manufacturing(data) => data.clone(),
                    _ => ManufacturingData::default(),
                };
                PurchaseOrderCommand::StartManufacturing(StartManufacturing {
                    tenant_id,
                    order_id,
                    data,
                    occurred_at,
                })
            }
            (Stage::Ocean, payload) => {
                let (data, plan) = match payload {
                    TransitionPayload::Dispatch { data, plan } => (data.clone(), plan.clone()),
                    _ => (OceanData::default(), SplitPlan::ship_all()),
                };
                let sibling_id = PurchaseOrderId::new(AggregateId::new());
                let sibling_number = self
                    .numbers
                    .sibling_order_number(tenant_id, order.order_number())?;
                let allocation = allocate(order, &plan, sibling_id, sibling_number)?;
                let seed = allocation.sibling.clone();
                return Ok((
                    PurchaseOrderCommand::DispatchToOcean(DispatchToOcean {
                        tenant_id,
                        order_id,
                        data,
                        retained: allocation.retained,
                        sibling: allocation.sibling,
                        occurred_at,
                    }),
                    seed,
                ));
            }
            (Stage::Warehouse, payload) => {
                let warehouse_code = match payload {
                    TransitionPayload::Arrival { warehouse_code } => warehouse_code.clone(),
                    _ => None,
                };
                let warehouse_name = match &warehouse_code {
                    Some(code) => Some(self.warehouse_name(tenant_id, code)?),
                    None => None,
                };
                PurchaseOrderCommand::ArriveAtWarehouse(ArriveAtWarehouse {
                    tenant_id,
                    order_id,
                    warehouse_code,
                    warehouse_name,
                    occurred_at,
                })
            }
            (Stage::Shipped, payload) => {
                let data = match payload {
                    TransitionPayload::Shipping(data) => data.clone(),
                    _ => ShippedData::default(),
                };
                PurchaseOrderCommand::MarkShipped(MarkShipped {
                    tenant_id,
                    order_id,
                    data,
                    occurred_at,
                })
            }
            (Stage::Cancelled, _) => PurchaseOrderCommand::CancelOrder(CancelOrder {
                tenant_id,
                order_id,
                occurred_at,
            }),
            (Stage::Rejected, _) => PurchaseOrderCommand::RejectOrder(RejectOrder {
                tenant_id,
                order_id,
                occurred_at,
            }),
            (Stage::Draft, _) => PurchaseOrderCommand::ReopenOrder(ReopenOrder {
                tenant_id,
                order_id,
                occurred_at,
            }),
        };
        Ok((command, None))
    }

    fn warehouse_name(&self, tenant_id: TenantId, code: &str) -> DomainResult<String> {
        self.warehouses
            .list_warehouses(tenant_id)?
            .into_iter()
            .find(|entry| entry.code == code)
            .map(|entry| entry.name)
            .ok_or_else(|| DomainError::validation(format!("unknown warehouse code: {code}")))
    }

    fn audit_event(
        &self,
        request: &TransitionRequest,
        order: &PurchaseOrder,
        event: &PurchaseOrderEvent,
        before: &JsonValue,
        after: &JsonValue,
    ) -> DomainResult<()> {
        self.audit(
            request.tenant_id,
            request.actor,
            order,
            event,
            before,
            after,
            request.occurred_at,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn audit(
        &self,
        tenant_id: TenantId,
        actor: UserId,
        order: &PurchaseOrder,
        event: &PurchaseOrderEvent,
        before: &JsonValue,
        after: &JsonValue,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<()> {
        let old_value = (!before.is_null()).then(|| before.clone());
        self.audit_sink
            .record(AuditRecord {
                tenant_id,
                entity_type: "purchase_order".to_string(),
                entity_id: order.id_typed().to_string(),
                action: event.event_type().to_string(),
                old_value,
                new_value: Some(after.clone()),
                actor,
                timestamp,
            })
            .map_err(|e| DomainError::upstream(e.to_string()))
    }
}

fn state_summary(order: &PurchaseOrder) -> JsonValue {
    json!({
        "stage": order.stage().to_string(),
        "poNumber": order.po_number(),
        "orderNumber": order.order_number(),
        "version": order.version(),
        "totalCartons": order.total_cartons(),
    })
}
