//! Payload codec
//!
//! - Normalization of engine values into transfer trees and back
//! - Transfer envelopes
//! - Export/import documents

mod document;
mod envelope;
mod normalize;

pub use document::{document_type, export_document, import_document};
pub use envelope::{build_transfer_envelope, PayloadKind, TransferEnvelope, TRANSFER_VERSION};
pub use normalize::{
    denormalize_for_engine, normalize_for_transfer, EngineValue, ExportStrategy, Exported,
    StructuredExportable, REQUIRED_EXPORT_FIELDS,
};
