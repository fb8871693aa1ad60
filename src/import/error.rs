use serde::Serialize;
use std::fmt;

/// Kind of failure attached to an [`ImportResult`](super::ImportResult)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImportErrorKind {
    /// Remote system unreachable or credentials rejected before any write
    ConnectionError,
    /// Record lacks a required field
    ValidationError,
    /// A field value could not be converted (record still attempted)
    ConversionError,
    /// A category the record depends on could not be created
    CategoryCreationError,
    /// Image call still failing transiently after its retries; batch
    /// writes escalate to `PermanentWriteError` instead
    TransientWriteError,
    /// Write rejected by the remote system
    PermanentWriteError,
    /// Run cancelled before the record was processed
    Cancelled,
}

impl fmt::Display for ImportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportErrorKind::ConnectionError => "ConnectionError",
            ImportErrorKind::ValidationError => "ValidationError",
            ImportErrorKind::ConversionError => "ConversionError",
            ImportErrorKind::CategoryCreationError => "CategoryCreationError",
            ImportErrorKind::TransientWriteError => "TransientWriteError",
            ImportErrorKind::PermanentWriteError => "PermanentWriteError",
            ImportErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}
