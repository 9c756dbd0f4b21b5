//! Order lines: ordered/posted/received quantities plus packaging attributes.

use serde::{Deserialize, Serialize};

use portledge_core::{DomainError, DomainResult, LineId};
use portledge_packaging::PackagingSnapshot;

/// Sentinel lot reference meaning "unbatched".
pub const DEFAULT_LOT: &str = "DEFAULT";

/// Line lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    Pending,
    Posted,
    Cancelled,
}

/// One order line.
///
/// `quantity` (cartons) is always derived as ceil(units_ordered /
/// units_per_carton); it is never stored independently of that derivation
/// outside of receiving reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: LineId,
    pub sku_code: String,
    pub sku_description: Option<String>,
    /// Lot/batch reference; [`DEFAULT_LOT`] means unbatched.
    pub lot: String,

    pub pi_number: Option<String>,
    pub commodity_code: Option<String>,
    pub country_of_origin: Option<String>,
    pub material: Option<String>,
    pub net_weight_kg: Option<f64>,

    /// Per-line packaging override; batch and SKU defaults live outside the
    /// order and are merged in by the dimension resolver.
    pub packaging: PackagingSnapshot,
    pub carton_gross_weight_kg: Option<f64>,
    pub packaging_type: Option<String>,

    pub units_ordered: u32,
    pub units_per_carton: u32,
    /// Derived carton count.
    pub quantity: u32,

    /// Smallest currency unit (e.g. cents).
    pub unit_cost: Option<i64>,
    pub total_cost: Option<i64>,
    pub currency: Option<String>,

    pub status: LineStatus,
    pub posted_quantity: Option<u32>,
    pub quantity_received: Option<u32>,
}

impl OrderLine {
    pub fn is_cancelled(&self) -> bool {
        self.status == LineStatus::Cancelled
    }
}

/// Derive the carton count for a line.
///
/// Both inputs must be positive; callers validate before deriving.
pub fn carton_quantity(units_ordered: u32, units_per_carton: u32) -> u32 {
    units_ordered.div_ceil(units_per_carton)
}

/// Line total cost in the smallest currency unit. `None` when no unit cost
/// is set or the product overflows i64.
pub fn line_total_cost(unit_cost: Option<i64>, units_ordered: u32) -> Option<i64> {
    unit_cost.and_then(|unit| unit.checked_mul(i64::from(units_ordered)))
}

/// Validate the positive-integer guarantee on line quantities.
pub fn check_units(units_ordered: u32, units_per_carton: u32) -> DomainResult<()> {
    if units_ordered == 0 {
        return Err(DomainError::validation("units_ordered must be positive"));
    }
    if units_per_carton == 0 {
        return Err(DomainError::validation("units_per_carton must be positive"));
    }
    Ok(())
}

/// Payload for adding a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLine {
    pub line_id: LineId,
    pub sku_code: String,
    pub sku_description: Option<String>,
    pub lot: String,
    pub pi_number: Option<String>,
    pub commodity_code: Option<String>,
    pub country_of_origin: Option<String>,
    pub material: Option<String>,
    pub net_weight_kg: Option<f64>,
    pub packaging: PackagingSnapshot,
    pub carton_gross_weight_kg: Option<f64>,
    pub packaging_type: Option<String>,
    pub units_ordered: u32,
    pub units_per_carton: u32,
    pub unit_cost: Option<i64>,
    pub currency: Option<String>,
}

impl NewLine {
    pub(crate) fn into_line(self) -> OrderLine {
        let quantity = carton_quantity(self.units_ordered, self.units_per_carton);
        let total_cost = line_total_cost(self.unit_cost, self.units_ordered);
        OrderLine {
            id: self.line_id,
            sku_code: self.sku_code,
            sku_description: self.sku_description,
            lot: self.lot,
            pi_number: self.pi_number,
            commodity_code: self.commodity_code,
            country_of_origin: self.country_of_origin,
            material: self.material,
            net_weight_kg: self.net_weight_kg,
            packaging: self.packaging,
            carton_gross_weight_kg: self.carton_gross_weight_kg,
            packaging_type: self.packaging_type,
            units_ordered: self.units_ordered,
            units_per_carton: self.units_per_carton,
            quantity,
            unit_cost: self.unit_cost,
            total_cost,
            currency: self.currency,
            status: LineStatus::Pending,
            posted_quantity: None,
            quantity_received: None,
        }
    }
}

/// Partial line update; absent fields are left untouched.
///
/// Changing `units_ordered` or `units_per_carton` recomputes the derived
/// carton `quantity` and the total cost.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinePatch {
    pub sku_description: Option<String>,
    pub lot: Option<String>,
    pub pi_number: Option<String>,
    pub commodity_code: Option<String>,
    pub country_of_origin: Option<String>,
    pub material: Option<String>,
    pub net_weight_kg: Option<f64>,
    pub packaging: Option<PackagingSnapshot>,
    pub carton_gross_weight_kg: Option<f64>,
    pub packaging_type: Option<String>,
    pub units_ordered: Option<u32>,
    pub units_per_carton: Option<u32>,
    pub unit_cost: Option<i64>,
    pub currency: Option<String>,
}

impl LinePatch {
    pub(crate) fn apply_to(&self, line: &mut OrderLine) {
        if let Some(v) = &self.sku_description {
            line.sku_description = Some(v.clone());
        }
        if let Some(v) = &self.lot {
            line.lot = v.clone();
        }
        if let Some(v) = &self.pi_number {
            line.pi_number = Some(v.clone());
        }
        if let Some(v) = &self.commodity_code {
            line.commodity_code = Some(v.clone());
        }
        if let Some(v) = &self.country_of_origin {
            line.country_of_origin = Some(v.clone());
        }
        if let Some(v) = &self.material {
            line.material = Some(v.clone());
        }
        if let Some(v) = self.net_weight_kg {
            line.net_weight_kg = Some(v);
        }
        if let Some(v) = &self.packaging {
            line.packaging = v.clone();
        }
        if let Some(v) = self.carton_gross_weight_kg {
            line.carton_gross_weight_kg = Some(v);
        }
        if let Some(v) = &self.packaging_type {
            line.packaging_type = Some(v.clone());
        }
        if let Some(v) = self.units_ordered {
            line.units_ordered = v;
        }
        if let Some(v) = self.units_per_carton {
            line.units_per_carton = v;
        }
        if let Some(v) = self.unit_cost {
            line.unit_cost = Some(v);
        }
        if let Some(v) = &self.currency {
            line.currency = Some(v.clone());
        }

        line.quantity = carton_quantity(line.units_ordered, line.units_per_carton);
        if line.unit_cost.is_some() {
            line.total_cost = line_total_cost(line.unit_cost, line.units_ordered);
        }
    }
}
