use serde::{Deserialize, Serialize};

use portledge_core::{AggregateId, DomainError, DomainResult, LineId};
use portledge_orders::{
    carton_quantity, line_total_cost, OrderLine, PurchaseOrder, PurchaseOrderId, RetainedLine,
    SiblingSeed,
};

/// Requested ship-now carton count for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipNow {
    pub line_id: LineId,
    pub cartons: u32,
}

/// The caller's dispatch plan. Lines without an entry default to shipping
/// their full carton quantity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitPlan {
    pub entries: Vec<ShipNow>,
}

impl SplitPlan {
    /// Everything ships; no entry overrides.
    pub fn ship_all() -> Self {
        Self::default()
    }

    pub fn with(entries: Vec<ShipNow>) -> Self {
        Self { entries }
    }

    fn cartons_for(&self, line: &OrderLine) -> u32 {
        self.entries
            .iter()
            .find(|entry| entry.line_id == line.id)
            .map_or(line.quantity, |entry| entry.cartons)
    }
}

/// Allocation result: what the original keeps, and the sibling seed when any
/// line ships partially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub retained: Vec<RetainedLine>,
    pub sibling: Option<SiblingSeed>,
}

fn remainder_line(line: &OrderLine, shipped_cartons: u32) -> OrderLine {
    // shipped < quantity implies shipped*upc < units_ordered, so the
    // remainder is always positive.
    let remainder_units = line.units_ordered - shipped_cartons * line.units_per_carton;
    let mut remainder = line.clone();
    remainder.id = LineId::new();
    remainder.units_ordered = remainder_units;
    remainder.quantity = carton_quantity(remainder_units, line.units_per_carton);
    remainder.total_cost = line_total_cost(line.unit_cost, remainder_units);
    remainder
}

/// Check the plan contract without allocating: every entry references a live
/// line, 0 ≤ ship-now ≤ quantity per line, and at least one line ships.
pub fn validate_plan(order: &PurchaseOrder, plan: &SplitPlan) -> DomainResult<()> {
    for entry in &plan.entries {
        match order.line(entry.line_id) {
            None => return Err(DomainError::validation("plan references an unknown line")),
            Some(line) if line.is_cancelled() => {
                return Err(DomainError::validation(
                    "plan references a cancelled line",
                ));
            }
            Some(line) if entry.cartons > line.quantity => {
                return Err(DomainError::validation(format!(
                    "ship-now cartons ({}) exceed line quantity ({}) for {}",
                    entry.cartons, line.quantity, line.sku_code
                )));
            }
            Some(_) => {}
        }
    }

    let any_shipped = order
        .lines()
        .iter()
        .filter(|l| !l.is_cancelled())
        .any(|line| plan.cartons_for(line) > 0);
    if !any_shipped {
        return Err(DomainError::validation(
            "at least one line must ship cartons",
        ));
    }
    Ok(())
}

/// Partition the order's cartons according to the plan.
///
/// All-full plans advance the single order; any partial line spawns a sibling
/// holding the remainders, joined to the original through the split group
/// (group id = original order id on the first split).
pub fn allocate(
    order: &PurchaseOrder,
    plan: &SplitPlan,
    sibling_id: PurchaseOrderId,
    sibling_order_number: String,
) -> DomainResult<Allocation> {
    validate_plan(order, plan)?;

    let mut retained = Vec::new();
    let mut remainders = Vec::new();

    for line in order.lines().iter().filter(|l| !l.is_cancelled()) {
        let cartons = plan.cartons_for(line);
        if cartons < line.quantity {
            remainders.push(remainder_line(line, cartons));
        }
        retained.push(RetainedLine {
            line_id: line.id,
            cartons,
        });
    }

    let sibling = if remainders.is_empty() {
        None
    } else {
        let split_group_id = order
            .split_group_id()
            .unwrap_or_else(|| AggregateId::from_uuid(*order.id_typed().0.as_uuid()));
        Some(SiblingSeed {
            sibling_id,
            order_number: sibling_order_number,
            po_number: order.po_number().map(str::to_string),
            split_group_id,
            split_parent_id: order.id_typed(),
            lines: remainders,
        })
    };

    Ok(Allocation { retained, sibling })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use chrono::Utc;
    use portledge_core::{Aggregate, TenantId};
    use portledge_orders::{
        AddLine, CommercialTerms, CreateOrder, IssueOrder, ManufacturingData, NewLine, OrderType,
        PurchaseOrderCommand, StartManufacturing, SupplierSnapshot, DEFAULT_LOT,
    };
    use portledge_packaging::PackagingSnapshot;

    fn apply_all(order: &mut PurchaseOrder, events: &[portledge_orders::PurchaseOrderEvent]) {
        for event in events {
            order.apply(event);
        }
    }

    fn run(order: &mut PurchaseOrder, command: PurchaseOrderCommand) {
        let events = order.handle(&command).unwrap();
        apply_all(order, &events);
    }

    fn manufacturing_order(lines: &[(u32, u32)]) -> (TenantId, PurchaseOrder, Vec<LineId>) {
        let tenant_id = TenantId::new();
        let order_id = PurchaseOrderId::new(AggregateId::new());
        let mut order = PurchaseOrder::empty(order_id);
        run(
            &mut order,
            PurchaseOrderCommand::CreateOrder(CreateOrder {
                tenant_id,
                order_id,
                order_number: "ON-2001".to_string(),
                order_type: OrderType::Purchase,
                supplier: SupplierSnapshot::default(),
                terms: CommercialTerms::default(),
                notes: None,
                occurred_at: Utc::now(),
            }),
        );

        let mut line_ids = Vec::new();
        for (index, (units_ordered, units_per_carton)) in lines.iter().enumerate() {
            let line_id = LineId::new();
            line_ids.push(line_id);
            run(
                &mut order,
                PurchaseOrderCommand::AddLine(AddLine {
                    tenant_id,
                    order_id,
                    line: NewLine {
                        line_id,
                        sku_code: format!("SKU-{index}"),
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
                        units_ordered: *units_ordered,
                        units_per_carton: *units_per_carton,
                        unit_cost: Some(100),
                        currency: Some("USD".to_string()),
                    },
                    occurred_at: Utc::now(),
                }),
            );
        }

        run(
            &mut order,
            PurchaseOrderCommand::IssueOrder(IssueOrder {
                tenant_id,
                order_id,
                po_number: Some("PO-2001".to_string()),
                occurred_at: Utc::now(),
            }),
        );
        run(
            &mut order,
            PurchaseOrderCommand::StartManufacturing(StartManufacturing {
                tenant_id,
                order_id,
                data: ManufacturingData::default(),
                occurred_at: Utc::now(),
            }),
        );
        (tenant_id, order, line_ids)
    }

    #[test]
    fn partial_plan_splits_the_ceiling_line() {
        // 100/10 → 10 cartons, 55/10 → 6 cartons (ceiling).
        let (_, order, line_ids) = manufacturing_order(&[(100, 10), (55, 10)]);
        let plan = SplitPlan::with(vec![
            ShipNow { line_id: line_ids[0], cartons: 10 },
            ShipNow { line_id: line_ids[1], cartons: 3 },
        ]);

        let allocation = allocate(
            &order,
            &plan,
            PurchaseOrderId::new(AggregateId::new()),
            "ON-2001-2".to_string(),
        )
        .unwrap();

        assert_eq!(
            allocation.retained,
            vec![
                RetainedLine { line_id: line_ids[0], cartons: 10 },
                RetainedLine { line_id: line_ids[1], cartons: 3 },
            ]
        );
        let sibling = allocation.sibling.unwrap();
        assert_eq!(sibling.lines.len(), 1);
        assert_eq!(sibling.lines[0].quantity, 3);
        assert_eq!(sibling.lines[0].units_ordered, 25);
        assert_eq!(sibling.lines[0].total_cost, Some(2_500));
        assert_eq!(sibling.split_parent_id, order.id_typed());
        assert_eq!(sibling.po_number.as_deref(), Some("PO-2001"));
        assert_eq!(
            sibling.split_group_id,
            AggregateId::from_uuid(*order.id_typed().0.as_uuid())
        );
    }

    #[test]
    fn all_full_plan_spawns_no_sibling() {
        let (_, order, _) = manufacturing_order(&[(100, 10), (55, 10)]);
        let allocation = allocate(
            &order,
            &SplitPlan::ship_all(),
            PurchaseOrderId::new(AggregateId::new()),
            "ON-2001-2".to_string(),
        )
        .unwrap();
        assert!(allocation.sibling.is_none());
        assert_eq!(allocation.retained.len(), 2);
    }

    #[test]
    fn out_of_range_plan_is_rejected() {
        let (_, order, line_ids) = manufacturing_order(&[(55, 10)]);
        let err = allocate(
            &order,
            &SplitPlan::with(vec![ShipNow { line_id: line_ids[0], cartons: 7 }]),
            PurchaseOrderId::new(AggregateId::new()),
            "ON-2001-2".to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn shipping_nothing_is_rejected() {
        let (_, order, line_ids) = manufacturing_order(&[(100, 10), (55, 10)]);
        let err = allocate(
            &order,
            &SplitPlan::with(vec![
                ShipNow { line_id: line_ids[0], cartons: 0 },
                ShipNow { line_id: line_ids[1], cartons: 0 },
            ]),
            PurchaseOrderId::new(AggregateId::new()),
            "ON-2001-2".to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unknown_line_in_plan_is_rejected() {
        let (_, order, _) = manufacturing_order(&[(100, 10)]);
        let err = allocate(
            &order,
            &SplitPlan::with(vec![ShipNow { line_id: LineId::new(), cartons: 1 }]),
            PurchaseOrderId::new(AggregateId::new()),
            "ON-2001-2".to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        /// Property: cartons are conserved across the split group: the
        /// retained count plus the sibling's derived count equals the
        /// original line quantity, for every line.
        #[test]
        fn cartons_are_conserved(
            units in 1u32..10_000,
            per_carton in 1u32..500,
            ship_fraction in 0.0f64..=1.0,
        ) {
            let (_, order, line_ids) = manufacturing_order(&[(units, per_carton)]);
            let full = order.line(line_ids[0]).unwrap().quantity;
            let cartons = ((f64::from(full) * ship_fraction) as u32).min(full);

            let result = allocate(
                &order,
                &SplitPlan::with(vec![ShipNow { line_id: line_ids[0], cartons }]),
                PurchaseOrderId::new(AggregateId::new()),
                "ON-2001-2".to_string(),
            );

            if cartons == 0 {
                prop_assert!(result.is_err());
            } else {
                let allocation = result.unwrap();
                let sibling_cartons = allocation
                    .sibling
                    .as_ref()
                    .map_or(0, |seed| seed.lines[0].quantity);
                prop_assert_eq!(cartons + sibling_cartons, full);
                // Units are conserved exactly as well.
                let sibling_units = allocation
                    .sibling
                    .as_ref()
                    .map_or(0, |seed| seed.lines[0].units_ordered);
                if cartons < full {
                    prop_assert_eq!(cartons * per_carton + sibling_units, units);
                }
            }
        }
    }
}
