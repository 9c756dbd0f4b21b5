//! Rule tables, one per target stage, plus the receiving gate.

use portledge_dispatch::{validate_plan, SplitPlan};
use portledge_orders::{PurchaseOrder, ReceiveOrder, Stage};
use portledge_packaging::resolve_chain;
use serde::{Deserialize, Serialize};

use crate::documents::DocumentType;
use crate::report::{GateReport, IssueField, IssueLocator, IssueScope};
use crate::snapshot::GateSnapshot;

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}

/// Evaluate the completeness gate for a transition into `target`.
///
/// Structural legality (stage adjacency, read-only orders) is the aggregate's
/// job; this gate only answers "is the order complete enough for the next
/// stage". Evaluation is pure over the snapshot, always runs every rule for
/// the target, and returns all failures at once.
pub fn validate_transition(snapshot: &GateSnapshot<'_>, target: Stage) -> GateReport {
    let mut report = GateReport::new();
    match target {
        Stage::Issued => issued_rules(snapshot, &mut report),
        Stage::Manufacturing => manufacturing_rules(snapshot, &mut report),
        Stage::Ocean => ocean_rules(snapshot, &mut report),
        Stage::Warehouse => warehouse_rules(snapshot, &mut report),
        Stage::Shipped => shipped_rules(snapshot, &mut report),
        // Cancellation, rejection and reopening have no completeness
        // requirements of their own.
        Stage::Draft | Stage::Rejected | Stage::Cancelled => {}
    }
    report
}

fn issued_rules(snapshot: &GateSnapshot<'_>, report: &mut GateReport) {
    let order = snapshot.order;
    if blank(order.supplier().name.as_deref()) {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::CounterpartyName),
            "counterparty is required before issuing",
        );
    }
    if order.terms().expected_date.is_none() {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::ExpectedDate),
            "expected date is required before issuing",
        );
    }
    if blank(order.terms().incoterms.as_deref()) {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::Incoterms),
            "incoterms are required before issuing",
        );
    }
    if blank(order.terms().payment_terms.as_deref()) {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::PaymentTerms),
            "payment terms are required before issuing",
        );
    }
    if !order.lines().iter().any(|line| !line.is_cancelled()) {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::Lines),
            "at least one line item is required before issuing",
        );
    }
}

fn manufacturing_rules(snapshot: &GateSnapshot<'_>, report: &mut GateReport) {
    let mut missing_pi: Vec<&str> = Vec::new();

    for line in snapshot.order.lines().iter().filter(|l| !l.is_cancelled()) {
        let defaults = snapshot.packaging_defaults.get(line.id);
        let dims = resolve_chain(
            &line.packaging,
            defaults.and_then(|d| d.batch.as_ref()),
            defaults.and_then(|d| d.sku.as_ref()),
        );
        let weight_fallback =
            line.carton_gross_weight_kg.is_some() && !blank(line.packaging_type.as_deref());
        if dims.is_none() && !weight_fallback {
            report.push(
                IssueLocator::line(IssueScope::Cargo, line.id, IssueField::CartonDimensions),
                format!(
                    "carton dimensions for {} are unresolved and no gross weight / packaging \
                     type fallback is set",
                    line.sku_code
                ),
            );
        }

        if let Some(pi) = line.pi_number.as_deref() {
            if !pi.trim().is_empty()
                && !snapshot
                    .documents
                    .has_reference(DocumentType::ProformaInvoice, pi)
                && !missing_pi.contains(&pi)
            {
                missing_pi.push(pi);
                report.push(
                    IssueLocator::line(
                        IssueScope::Documents,
                        line.id,
                        IssueField::Document(DocumentType::ProformaInvoice),
                    ),
                    format!("proforma invoice {pi} has not been uploaded"),
                );
            }
        }
    }
}

fn ocean_rules(snapshot: &GateSnapshot<'_>, report: &mut GateReport) {
    for doc_type in DocumentType::required_for_ocean() {
        if !snapshot.documents.has(*doc_type) {
            report.push(
                IssueLocator::order(IssueScope::Documents, IssueField::Document(*doc_type)),
                format!("{} must be uploaded before dispatch", doc_type.segment()),
            );
        }
    }

    let ship_all = SplitPlan::ship_all();
    let plan = snapshot.split_plan.unwrap_or(&ship_all);
    if let Err(err) = validate_plan(snapshot.order, plan) {
        report.push(
            IssueLocator::order(IssueScope::Cargo, IssueField::Split),
            err.to_string(),
        );
    }

    // Vessel and ports are optional at dispatch, but supplying any of them
    // requires all of them.
    if let Some(data) = snapshot.ocean_data {
        if !data.is_empty() {
            if blank(data.vessel_name.as_deref()) {
                report.push(
                    IssueLocator::order(IssueScope::Details, IssueField::VesselName),
                    "vessel name is required when ocean details are supplied",
                );
            }
            if blank(data.port_of_loading.as_deref()) {
                report.push(
                    IssueLocator::order(IssueScope::Details, IssueField::PortOfLoading),
                    "port of loading is required when ocean details are supplied",
                );
            }
            if blank(data.port_of_discharge.as_deref()) {
                report.push(
                    IssueLocator::order(IssueScope::Details, IssueField::PortOfDischarge),
                    "port of discharge is required when ocean details are supplied",
                );
            }
        }
    }
}

fn warehouse_rules(snapshot: &GateSnapshot<'_>, report: &mut GateReport) {
    for doc_type in DocumentType::required_for_warehouse() {
        if !snapshot.documents.has(*doc_type) {
            report.push(
                IssueLocator::order(IssueScope::Documents, IssueField::Document(*doc_type)),
                format!("{} must be uploaded before arrival", doc_type.segment()),
            );
        }
    }

    let selected = snapshot
        .selected_warehouse
        .or(snapshot.order.warehouse_code());
    if !blank(selected) && snapshot.forwarding.is_empty() {
        report.push(
            IssueLocator::order(IssueScope::Costs, IssueField::Forwarding),
            "a warehouse is selected but no forwarding cost has been recorded",
        );
    }
}

fn shipped_rules(snapshot: &GateSnapshot<'_>, report: &mut GateReport) {
    if snapshot.order.posted_at().is_none() {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::ReceivedDate),
            "the order must be received before it can be shipped",
        );
    }
}

/// Completeness gate for the receiving action itself (Warehouse stage,
/// posting the order). Discrepant quantities are accepted, but only with an
/// explanation on file.
pub fn validate_receiving(order: &PurchaseOrder, receipt: &ReceiveOrder) -> GateReport {
    let mut report = GateReport::new();

    if receipt.warehouse_code.trim().is_empty() {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::WarehouseCode),
            "a warehouse must be selected",
        );
    }
    if receipt.receive_type.trim().is_empty() {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::ReceiveType),
            "a receive type must be selected",
        );
    }
    if blank(receipt.data.customs_entry_number.as_deref()) {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::CustomsEntryNumber),
            "customs entry number is required",
        );
    }
    if receipt.data.customs_cleared_date.is_none() {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::CustomsClearedDate),
            "customs cleared date is required",
        );
    }
    if receipt.data.received_date.is_none() {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::ReceivedDate),
            "received date is required",
        );
    }

    let mut discrepant = false;
    for line in order.lines().iter().filter(|l| !l.is_cancelled()) {
        let received = receipt
            .received
            .iter()
            .find(|r| r.line_id == line.id)
            .map_or(0, |r| r.quantity_received);
        if received != line.quantity {
            discrepant = true;
        }
    }
    if discrepant && blank(receipt.data.discrepancy_notes.as_deref()) {
        report.push(
            IssueLocator::order(IssueScope::Details, IssueField::DiscrepancyNotes),
            "received quantities differ from ordered; discrepancy notes are required",
        );
    }

    report
}

/// Generated outputs and the gate each one reuses for its readiness signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputDocument {
    RequestForQuote,
    PurchaseOrder,
    ShippingMarks,
}

/// Whether an output document can be generated from the order as it stands.
/// Readiness reuses the stage rule tables rather than restating them.
pub fn ready_to_generate(snapshot: &GateSnapshot<'_>, output: OutputDocument) -> bool {
    match output {
        OutputDocument::RequestForQuote => validate_transition(snapshot, Stage::Issued).is_empty(),
        OutputDocument::PurchaseOrder => {
            snapshot.order.po_number().is_some()
                && validate_transition(snapshot, Stage::Issued).is_empty()
        }
        OutputDocument::ShippingMarks => {
            validate_transition(snapshot, Stage::Manufacturing).is_empty()
        }
    }
}
