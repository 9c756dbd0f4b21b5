//! Landed-cost ledger aggregation.

use serde::{Deserialize, Serialize};

use portledge_core::{DomainError, DomainResult};
use portledge_orders::{OrderLine, PurchaseOrderId};

use crate::adjustment::SupplierAdjustment;
use crate::forwarding::ForwardingCost;

/// One named cost total from the receiving-cost collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    pub cost_name: String,
    pub total_cost: i64,
}

/// Warehouse-side receiving cost engine. Answers only once the order has
/// been received; `None` before that.
pub trait InboundCostProvider {
    fn inbound_cost_breakdown(
        &self,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Option<Vec<CostLine>>>;
}

/// Storage accrues over time via an external daily job. Until an accrual
/// source exists it is reported as an explicit unavailable state, never
/// defaulted to zero, so a partial total is never presented as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageCost {
    Unavailable,
}

/// Derived landed-cost summary. Storage is intentionally excluded from the
/// grand total while it is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLedgerSummary {
    pub product_subtotal: i64,
    pub forwarding_subtotal: i64,
    /// `None` until the order has been received.
    pub inbound_subtotal: Option<i64>,
    pub storage: StorageCost,
    pub duty: i64,
    pub supplier_adjustment: i64,
    pub grand_total: i64,
}

fn to_i64(value: i128, what: &str) -> DomainResult<i64> {
    i64::try_from(value).map_err(|_| DomainError::invariant(format!("{what} overflows")))
}

/// Aggregate the five cost categories into one summary.
///
/// Absent optional inputs count as zero, except storage, which is carried
/// as [`StorageCost::Unavailable`].
pub fn compute_ledger(
    lines: &[OrderLine],
    forwarding: &[ForwardingCost],
    inbound: Option<&[CostLine]>,
    duty_amount: Option<i64>,
    adjustment: Option<&SupplierAdjustment>,
) -> DomainResult<CostLedgerSummary> {
    let product: i128 = lines
        .iter()
        .filter(|line| !line.is_cancelled())
        .map(|line| i128::from(line.total_cost.unwrap_or(0)))
        .sum();

    let forwarding_total: i128 = forwarding
        .iter()
        .map(|cost| i128::from(cost.total_cost))
        .sum();

    let inbound_total: Option<i128> = inbound.map(|breakdown| {
        breakdown
            .iter()
            .map(|cost| i128::from(cost.total_cost))
            .sum()
    });

    let duty = i128::from(duty_amount.unwrap_or(0));
    let supplier_adjustment = i128::from(adjustment.map_or(0, |a| a.amount));

    let grand_total =
        product + forwarding_total + inbound_total.unwrap_or(0) + duty + supplier_adjustment;

    Ok(CostLedgerSummary {
        product_subtotal: to_i64(product, "product subtotal")?,
        forwarding_subtotal: to_i64(forwarding_total, "forwarding subtotal")?,
        inbound_subtotal: inbound_total
            .map(|total| to_i64(total, "inbound subtotal"))
            .transpose()?,
        storage: StorageCost::Unavailable,
        duty: to_i64(duty, "duty")?,
        supplier_adjustment: to_i64(supplier_adjustment, "supplier adjustment")?,
        grand_total: to_i64(grand_total, "grand total")?,
    })
}
