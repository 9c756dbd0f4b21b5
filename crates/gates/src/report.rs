//! Structured gate issues and the report returned by a gate run.

use serde::{Deserialize, Serialize};

use portledge_core::LineId;

use crate::documents::DocumentType;

/// Top-level section of the order an issue points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueScope {
    Details,
    Cargo,
    Costs,
    Documents,
}

impl IssueScope {
    fn segment(self) -> &'static str {
        match self {
            IssueScope::Details => "details",
            IssueScope::Cargo => "cargo",
            IssueScope::Costs => "costs",
            IssueScope::Documents => "documents",
        }
    }
}

/// The specific field an issue points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueField {
    CounterpartyName,
    ExpectedDate,
    Incoterms,
    PaymentTerms,
    Lines,
    CartonDimensions,
    UnitsPerCarton,
    Split,
    VesselName,
    PortOfLoading,
    PortOfDischarge,
    Forwarding,
    WarehouseCode,
    ReceiveType,
    CustomsEntryNumber,
    CustomsClearedDate,
    ReceivedDate,
    DiscrepancyNotes,
    Document(DocumentType),
}

impl IssueField {
    fn segment(self) -> &'static str {
        match self {
            IssueField::CounterpartyName => "counterpartyName",
            IssueField::ExpectedDate => "expectedDate",
            IssueField::Incoterms => "incoterms",
            IssueField::PaymentTerms => "paymentTerms",
            IssueField::Lines => "lines",
            IssueField::CartonDimensions => "cartonDimensions",
            IssueField::UnitsPerCarton => "unitsPerCarton",
            IssueField::Split => "split",
            IssueField::VesselName => "vesselName",
            IssueField::PortOfLoading => "portOfLoading",
            IssueField::PortOfDischarge => "portOfDischarge",
            IssueField::Forwarding => "forwarding",
            IssueField::WarehouseCode => "warehouseCode",
            IssueField::ReceiveType => "receiveType",
            IssueField::CustomsEntryNumber => "customsEntryNumber",
            IssueField::CustomsClearedDate => "customsClearedDate",
            IssueField::ReceivedDate => "receivedDate",
            IssueField::DiscrepancyNotes => "discrepancyNotes",
            IssueField::Document(doc) => doc.segment(),
        }
    }
}

/// Where an issue lives: section, optional line, field.
///
/// The locator is the canonical identity of an issue; [`IssueLocator::key`]
/// renders it as the dotted path clients use to focus the offending input
/// (`details.incoterms`, `cargo.lines.<lineId>.cartonDimensions`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocator {
    pub scope: IssueScope,
    pub line_id: Option<LineId>,
    pub field: IssueField,
}

impl IssueLocator {
    pub fn order(scope: IssueScope, field: IssueField) -> Self {
        Self {
            scope,
            line_id: None,
            field,
        }
    }

    pub fn line(scope: IssueScope, line_id: LineId, field: IssueField) -> Self {
        Self {
            scope,
            line_id: Some(line_id),
            field,
        }
    }

    /// Dotted navigation key.
    pub fn key(&self) -> String {
        match self.line_id {
            Some(line_id) => format!(
                "{}.lines.{}.{}",
                self.scope.segment(),
                line_id,
                self.field.segment()
            ),
            None => format!("{}.{}", self.scope.segment(), self.field.segment()),
        }
    }
}

/// One blocking problem found by a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateIssue {
    pub locator: IssueLocator,
    pub message: String,
}

impl GateIssue {
    pub fn new(locator: IssueLocator, message: impl Into<String>) -> Self {
        Self {
            locator,
            message: message.into(),
        }
    }
}

/// The full outcome of one gate evaluation.
///
/// Issues keep the order the rule table emitted them in, which is fixed per
/// target stage, so reports are deterministic and comparable across runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GateReport {
    issues: Vec<GateIssue>,
}

impl GateReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, locator: IssueLocator, message: impl Into<String>) {
        self.issues.push(GateIssue::new(locator, message));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[GateIssue] {
        &self.issues
    }

    /// Keys in emission order.
    pub fn keys(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.locator.key()).collect()
    }

    /// Key of the first issue, for clients that focus one field at a time.
    pub fn first_key(&self) -> Option<String> {
        self.issues.first().map(|i| i.locator.key())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.issues.iter().any(|i| i.locator.key() == key)
    }
}
