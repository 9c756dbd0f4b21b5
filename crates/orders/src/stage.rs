//! Lifecycle stages and the per-stage data blocks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One state in the purchase-order lifecycle.
///
/// Forward path: Draft → Issued → Manufacturing → Ocean → Warehouse → Shipped.
/// Side branches: Draft/Issued → Cancelled, Issued → Rejected → Draft (reopen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Draft,
    Issued,
    Manufacturing,
    Ocean,
    Warehouse,
    Shipped,
    Rejected,
    Cancelled,
}

impl Stage {
    /// Terminal stages admit no transition at all. Rejected is terminal too,
    /// except for the explicit reopen action (not a plain advance).
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Shipped | Stage::Cancelled)
    }

    /// Whether `target` is a legal transition from this stage.
    pub fn allows_transition_to(self, target: Stage) -> bool {
        matches!(
            (self, target),
            (Stage::Draft, Stage::Issued)
                | (Stage::Issued, Stage::Manufacturing)
                | (Stage::Manufacturing, Stage::Ocean)
                | (Stage::Ocean, Stage::Warehouse)
                | (Stage::Warehouse, Stage::Shipped)
                | (Stage::Draft, Stage::Cancelled)
                | (Stage::Issued, Stage::Cancelled)
                | (Stage::Issued, Stage::Rejected)
                | (Stage::Rejected, Stage::Draft)
        )
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Stage::Draft => "draft",
            Stage::Issued => "issued",
            Stage::Manufacturing => "manufacturing",
            Stage::Ocean => "ocean",
            Stage::Warehouse => "warehouse",
            Stage::Shipped => "shipped",
            Stage::Rejected => "rejected",
            Stage::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Data captured while the order is in production.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManufacturingData {
    pub production_started: Option<NaiveDate>,
    pub estimated_completion: Option<NaiveDate>,
    pub factory_notes: Option<String>,
}

/// Data captured when cargo goes on the water.
///
/// Vessel and ports are required together: supplying any of them at the
/// Ocean gate requires all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OceanData {
    pub vessel_name: Option<String>,
    pub port_of_loading: Option<String>,
    pub port_of_discharge: Option<String>,
    pub etd: Option<NaiveDate>,
    pub eta: Option<NaiveDate>,
}

impl OceanData {
    pub fn is_empty(&self) -> bool {
        self.vessel_name.is_none()
            && self.port_of_loading.is_none()
            && self.port_of_discharge.is_none()
            && self.etd.is_none()
            && self.eta.is_none()
    }
}

/// Data captured at the warehouse, including customs clearance and the
/// duty amount that feeds the cost ledger (smallest currency unit).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarehouseData {
    pub customs_entry_number: Option<String>,
    pub customs_cleared_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub duty_amount: Option<i64>,
    pub discrepancy_notes: Option<String>,
}

/// Data captured when the order leaves the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippedData {
    pub shipped_date: Option<NaiveDate>,
    pub carrier: Option<String>,
    pub tracking_reference: Option<String>,
}

/// All stage-scoped blocks on one order. Each block is written by its own
/// transition and cleared together on the Rejected → Draft reopen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageData {
    pub manufacturing: ManufacturingData,
    pub ocean: OceanData,
    pub warehouse: WarehouseData,
    pub shipped: ShippedData,
}
