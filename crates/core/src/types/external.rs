//! Reconciliation keys for records that originate in external systems.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The `(source_id, object_id)` pair identifying an imported record.
///
/// When both halves are present the pair is unique across shops and is the
/// only key an import source uses to find a record it created earlier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalKey {
    /// Identifier of the importing system, e.g. `salamantex`.
    pub source_id: String,
    /// The record's identifier inside that system (a partner number).
    pub object_id: String,
}

impl ExternalKey {
    /// Build a key; both halves are trimmed.
    #[must_use]
    pub fn new(source_id: impl AsRef<str>, object_id: impl AsRef<str>) -> Self {
        Self {
            source_id: source_id.as_ref().trim().to_owned(),
            object_id: object_id.as_ref().trim().to_owned(),
        }
    }
}

impl fmt::Display for ExternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.object_id)
    }
}
