//! Forwarding ("cargo") costs and the rate catalog boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use portledge_core::{DomainError, DomainResult, WarehouseId};
use portledge_orders::Stage;

/// Rate categories a warehouse publishes charges under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateCategory {
    Forwarding,
    Inbound,
    Outbound,
    Storage,
}

/// One active rate from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCard {
    pub cost_name: String,
    pub unit_of_measure: String,
    /// Smallest currency unit per unit of measure.
    pub cost_value: i64,
}

/// Rate catalog lookup, owned by the warehouse side of the system.
///
/// Called during snapshot assembly only; the ledger and gates never reach
/// out mid-computation.
pub trait RateCatalog {
    fn active_rates(
        &self,
        warehouse_id: WarehouseId,
        category: RateCategory,
    ) -> DomainResult<Vec<RateCard>>;
}

/// Deduplicate rates by cost name; the first match wins for duplicates.
pub fn dedup_rates(rates: Vec<RateCard>) -> Vec<RateCard> {
    let mut seen = std::collections::HashSet::new();
    rates
        .into_iter()
        .filter(|rate| seen.insert(rate.cost_name.clone()))
        .collect()
}

/// One forwarding charge on an order.
///
/// `unit_rate` is copied from the catalog at creation and is not re-resolved
/// when the catalog changes later; only renaming or requantifying the row
/// re-reads the current rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingCost {
    pub id: Uuid,
    pub warehouse_id: WarehouseId,
    pub cost_name: String,
    pub quantity: u32,
    pub unit_rate: i64,
    pub total_cost: i64,
    pub currency: String,
    pub notes: Option<String>,
}

/// The per-order cost sheet: forwarding rows plus the single supplier
/// adjustment. Editability is gated on the order's current stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostSheet {
    forwarding: Vec<ForwardingCost>,
    adjustment: Option<crate::adjustment::SupplierAdjustment>,
}

fn ensure_forwarding_editable(stage: Stage) -> DomainResult<()> {
    if !matches!(stage, Stage::Ocean | Stage::Warehouse) {
        return Err(DomainError::invariant(
            "forwarding costs are editable only while the order is in ocean or warehouse",
        ));
    }
    Ok(())
}

fn resolve_rate(
    catalog: &dyn RateCatalog,
    warehouse_id: WarehouseId,
    cost_name: &str,
) -> DomainResult<i64> {
    let rates = dedup_rates(catalog.active_rates(warehouse_id, RateCategory::Forwarding)?);
    rates
        .iter()
        .find(|rate| rate.cost_name == cost_name)
        .map(|rate| rate.cost_value)
        .ok_or_else(|| {
            DomainError::validation(format!(
                "cost name {cost_name:?} does not match an active forwarding rate"
            ))
        })
}

impl CostSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(&self) -> &[ForwardingCost] {
        &self.forwarding
    }

    pub fn adjustment(&self) -> Option<&crate::adjustment::SupplierAdjustment> {
        self.adjustment.as_ref()
    }

    /// Add a forwarding cost, copying the unit rate from the current catalog.
    pub fn add_forwarding(
        &mut self,
        stage: Stage,
        catalog: &dyn RateCatalog,
        warehouse_id: WarehouseId,
        cost_name: String,
        quantity: u32,
        currency: String,
        notes: Option<String>,
    ) -> DomainResult<&ForwardingCost> {
        ensure_forwarding_editable(stage)?;
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let unit_rate = resolve_rate(catalog, warehouse_id, &cost_name)?;
        let total_cost = unit_rate
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| DomainError::invariant("forwarding total overflows"))?;
        self.forwarding.push(ForwardingCost {
            id: Uuid::now_v7(),
            warehouse_id,
            cost_name,
            quantity,
            unit_rate,
            total_cost,
            currency,
            notes,
        });
        Ok(self.forwarding.last().expect("just pushed"))
    }

    /// Update a forwarding cost. Changing the cost name or quantity
    /// re-resolves the unit rate from the current catalog; notes never do.
    pub fn update_forwarding(
        &mut self,
        stage: Stage,
        catalog: &dyn RateCatalog,
        id: Uuid,
        cost_name: Option<String>,
        quantity: Option<u32>,
        notes: Option<String>,
    ) -> DomainResult<&ForwardingCost> {
        ensure_forwarding_editable(stage)?;
        let row = self
            .forwarding
            .iter_mut()
            .find(|cost| cost.id == id)
            .ok_or_else(DomainError::not_found)?;

        let rerate = cost_name.is_some() || quantity.is_some();
        if let Some(cost_name) = cost_name {
            row.cost_name = cost_name;
        }
        if let Some(quantity) = quantity {
            if quantity == 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            row.quantity = quantity;
        }
        if let Some(notes) = notes {
            row.notes = Some(notes);
        }

        if rerate {
            row.unit_rate = resolve_rate(catalog, row.warehouse_id, &row.cost_name)?;
            row.total_cost = row
                .unit_rate
                .checked_mul(i64::from(row.quantity))
                .ok_or_else(|| DomainError::invariant("forwarding total overflows"))?;
        }
        Ok(&self.forwarding[self
            .forwarding
            .iter()
            .position(|cost| cost.id == id)
            .expect("row exists")])
    }

    pub fn remove_forwarding(&mut self, stage: Stage, id: Uuid) -> DomainResult<()> {
        ensure_forwarding_editable(stage)?;
        let before = self.forwarding.len();
        self.forwarding.retain(|cost| cost.id != id);
        if self.forwarding.len() == before {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// Set the single supplier adjustment. Editable only once the order has
    /// reached the warehouse.
    pub fn set_adjustment(
        &mut self,
        stage: Stage,
        adjustment: crate::adjustment::SupplierAdjustment,
    ) -> DomainResult<()> {
        if !matches!(stage, Stage::Warehouse | Stage::Shipped) {
            return Err(DomainError::invariant(
                "supplier adjustment is editable only once the order has reached warehouse",
            ));
        }
        self.adjustment = Some(adjustment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Catalog stub whose rates can be swapped mid-test.
    struct StubCatalog {
        rates: RefCell<Vec<RateCard>>,
    }

    impl StubCatalog {
        fn with(rates: Vec<RateCard>) -> Self {
            Self {
                rates: RefCell::new(rates),
            }
        }

        fn set(&self, rates: Vec<RateCard>) {
            *self.rates.borrow_mut() = rates;
        }
    }

    impl RateCatalog for StubCatalog {
        fn active_rates(
            &self,
            _warehouse_id: WarehouseId,
            _category: RateCategory,
        ) -> DomainResult<Vec<RateCard>> {
            Ok(self.rates.borrow().clone())
        }
    }

    fn rate(name: &str, value: i64) -> RateCard {
        RateCard {
            cost_name: name.to_string(),
            unit_of_measure: "cbm".to_string(),
            cost_value: value,
        }
    }

    #[test]
    fn duplicate_rate_names_first_match_wins() {
        let deduped = dedup_rates(vec![
            rate("drayage", 100),
            rate("drayage", 999),
            rate("devanning", 50),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].cost_value, 100);
    }

    #[test]
    fn add_copies_rate_from_catalog_at_creation() {
        let catalog = StubCatalog::with(vec![rate("drayage", 100)]);
        let mut sheet = CostSheet::new();
        let warehouse = WarehouseId::new();

        let cost = sheet
            .add_forwarding(
                Stage::Ocean,
                &catalog,
                warehouse,
                "drayage".to_string(),
                3,
                "USD".to_string(),
                None,
            )
            .unwrap();
        assert_eq!(cost.unit_rate, 100);
        assert_eq!(cost.total_cost, 300);

        // A later catalog change does not retroactively re-rate the row.
        catalog.set(vec![rate("drayage", 500)]);
        assert_eq!(sheet.forwarding()[0].unit_rate, 100);
    }

    #[test]
    fn requantifying_rereads_the_current_rate() {
        let catalog = StubCatalog::with(vec![rate("drayage", 100)]);
        let mut sheet = CostSheet::new();
        let warehouse = WarehouseId::new();
        let id = sheet
            .add_forwarding(
                Stage::Warehouse,
                &catalog,
                warehouse,
                "drayage".to_string(),
                3,
                "USD".to_string(),
                None,
            )
            .unwrap()
            .id;

        catalog.set(vec![rate("drayage", 120)]);
        let cost = sheet
            .update_forwarding(Stage::Warehouse, &catalog, id, None, Some(4), None)
            .unwrap();
        assert_eq!(cost.unit_rate, 120);
        assert_eq!(cost.total_cost, 480);

        // Notes-only edits keep the stored rate.
        catalog.set(vec![rate("drayage", 999)]);
        let cost = sheet
            .update_forwarding(
                Stage::Warehouse,
                &catalog,
                id,
                None,
                None,
                Some("rush".to_string()),
            )
            .unwrap();
        assert_eq!(cost.unit_rate, 120);
    }

    #[test]
    fn unknown_cost_name_is_a_validation_error() {
        let catalog = StubCatalog::with(vec![rate("drayage", 100)]);
        let mut sheet = CostSheet::new();
        let err = sheet
            .add_forwarding(
                Stage::Ocean,
                &catalog,
                WarehouseId::new(),
                "handling".to_string(),
                1,
                "USD".to_string(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn forwarding_is_stage_gated() {
        let catalog = StubCatalog::with(vec![rate("drayage", 100)]);
        let mut sheet = CostSheet::new();
        for stage in [Stage::Draft, Stage::Issued, Stage::Manufacturing, Stage::Shipped] {
            let err = sheet
                .add_forwarding(
                    stage,
                    &catalog,
                    WarehouseId::new(),
                    "drayage".to_string(),
                    1,
                    "USD".to_string(),
                    None,
                )
                .unwrap_err();
            assert!(matches!(err, DomainError::InvariantViolation(_)), "stage {stage}");
        }
    }
}
