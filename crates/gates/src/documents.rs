//! Document presence, as the gates see it.
//!
//! Gates never talk to storage. The engine prefetches the order's uploaded
//! documents into a [`DocumentIndex`] before evaluation, so rule tables stay
//! pure functions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document categories tracked against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentType {
    ProformaInvoice,
    PurchaseOrderPdf,
    PackingList,
    CommercialInvoice,
    BillOfLading,
    CustomsEntry,
}

impl DocumentType {
    pub(crate) fn segment(self) -> &'static str {
        match self {
            DocumentType::ProformaInvoice => "proformaInvoice",
            DocumentType::PurchaseOrderPdf => "purchaseOrderPdf",
            DocumentType::PackingList => "packingList",
            DocumentType::CommercialInvoice => "commercialInvoice",
            DocumentType::BillOfLading => "billOfLading",
            DocumentType::CustomsEntry => "customsEntry",
        }
    }

    /// Documents that must be on file before cargo leaves manufacturing.
    pub fn required_for_ocean() -> &'static [DocumentType] {
        &[DocumentType::PackingList, DocumentType::CommercialInvoice]
    }

    /// Documents that must be on file before the order lands in a warehouse.
    pub fn required_for_warehouse() -> &'static [DocumentType] {
        &[DocumentType::BillOfLading]
    }
}

/// One uploaded document. The reference carries the external identifier the
/// document was filed under (a proforma invoice number, a bill of lading
/// number), used when a gate must match a document to a specific line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_type: DocumentType,
    pub reference: Option<String>,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Immutable snapshot of every document uploaded against one order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentIndex {
    records: Vec<DocumentRecord>,
}

impl DocumentIndex {
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn has(&self, doc_type: DocumentType) -> bool {
        self.records.iter().any(|r| r.doc_type == doc_type)
    }

    /// Presence of a document of `doc_type` filed under `reference`.
    pub fn has_reference(&self, doc_type: DocumentType, reference: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.doc_type == doc_type && r.reference.as_deref() == Some(reference))
    }
}
