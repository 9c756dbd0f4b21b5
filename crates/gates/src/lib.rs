//! Stage gates: declarative completeness rules evaluated before a stage
//! transition commits.
//!
//! The validator is a pure function over an already-assembled snapshot (no
//! IO, no clock reads), so the same rule table can run client-side for UX
//! hints and server-side as the authority, and calling it twice on the same
//! snapshot yields the same report. An empty report authorizes the
//! transition; a non-empty one blocks it and is returned whole, so every
//! problem can be corrected in one pass.
//!
//! Issues are structured locators (scope + optional line + field tag), not ad
//! hoc strings; the dotted key (`cargo.lines.<id>.unitsPerCarton`) is a
//! rendering for UI navigation, which keeps the rule table exhaustively
//! matchable.

pub mod documents;
pub mod report;
pub mod rules;
pub mod snapshot;

pub use documents::{DocumentIndex, DocumentRecord, DocumentType};
pub use report::{GateIssue, GateReport, IssueField, IssueLocator, IssueScope};
pub use rules::{ready_to_generate, validate_receiving, validate_transition, OutputDocument};
pub use snapshot::{GateSnapshot, LinePackagingDefaults, PackagingDefaults};
