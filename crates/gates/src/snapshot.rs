//! The prefetched evaluation snapshot.
//!
//! Everything a gate may need is gathered before evaluation starts: the order
//! itself, the document index, forwarding cost rows, catalog packaging
//! defaults per line, and the transition payload under review. If any of
//! these cannot be fetched the transition fails upstream before the gate
//! runs; the gate never guesses a default for data it could not see.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use portledge_core::LineId;
use portledge_costing::ForwardingCost;
use portledge_dispatch::SplitPlan;
use portledge_orders::{OceanData, PurchaseOrder};
use portledge_packaging::PackagingSnapshot;

use crate::documents::DocumentIndex;

/// Catalog fallback dimensions for one line: the batch the line's lot maps to,
/// then the SKU master record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinePackagingDefaults {
    pub batch: Option<PackagingSnapshot>,
    pub sku: Option<PackagingSnapshot>,
}

/// Packaging defaults for every line on the order, keyed by line id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackagingDefaults {
    by_line: HashMap<LineId, LinePackagingDefaults>,
}

impl PackagingDefaults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(by_line: HashMap<LineId, LinePackagingDefaults>) -> Self {
        Self { by_line }
    }

    pub fn insert(&mut self, line_id: LineId, defaults: LinePackagingDefaults) {
        self.by_line.insert(line_id, defaults);
    }

    pub fn get(&self, line_id: LineId) -> Option<&LinePackagingDefaults> {
        self.by_line.get(&line_id)
    }
}

/// Borrowed view over everything one gate evaluation reads.
///
/// `split_plan` and `ocean_data` carry the payload of the transition under
/// review (dispatch only); `selected_warehouse` is the warehouse code the
/// arrival names, or the one already on the order.
#[derive(Debug, Clone, Copy)]
pub struct GateSnapshot<'a> {
    pub order: &'a PurchaseOrder,
    pub documents: &'a DocumentIndex,
    pub forwarding: &'a [ForwardingCost],
    pub packaging_defaults: &'a PackagingDefaults,
    pub split_plan: Option<&'a SplitPlan>,
    pub ocean_data: Option<&'a OceanData>,
    pub selected_warehouse: Option<&'a str>,
}

impl<'a> GateSnapshot<'a> {
    /// Snapshot with no auxiliary data, for gates that only read the order.
    pub fn bare(
        order: &'a PurchaseOrder,
        documents: &'a DocumentIndex,
        packaging_defaults: &'a PackagingDefaults,
    ) -> Self {
        Self {
            order,
            documents,
            forwarding: &[],
            packaging_defaults,
            split_plan: None,
            ocean_data: None,
            selected_warehouse: None,
        }
    }
}
