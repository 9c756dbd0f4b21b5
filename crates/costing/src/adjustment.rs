//! The single supplier adjustment (credit or debit) on an order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use portledge_core::{DomainError, DomainResult};

/// Adjustment direction. Encoded as the sign of the stored amount:
/// credit is negative, debit is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentCategory {
    Credit,
    Debit,
}

/// At most one per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierAdjustment {
    pub cost_name: String,
    /// Signed, smallest currency unit. Negative for credits.
    pub amount: i64,
    pub currency: String,
    pub effective_at: NaiveDate,
    pub notes: Option<String>,
}

impl SupplierAdjustment {
    /// Build an adjustment from a direction and a positive magnitude.
    pub fn new(
        category: AdjustmentCategory,
        cost_name: String,
        magnitude: i64,
        currency: String,
        effective_at: NaiveDate,
        notes: Option<String>,
    ) -> DomainResult<Self> {
        if magnitude <= 0 {
            return Err(DomainError::validation(
                "adjustment magnitude must be positive",
            ));
        }
        let amount = match category {
            AdjustmentCategory::Credit => -magnitude,
            AdjustmentCategory::Debit => magnitude,
        };
        Ok(Self {
            cost_name,
            amount,
            currency,
            effective_at,
            notes,
        })
    }

    pub fn category(&self) -> AdjustmentCategory {
        if self.amount < 0 {
            AdjustmentCategory::Credit
        } else {
            AdjustmentCategory::Debit
        }
    }
}
