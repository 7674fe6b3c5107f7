use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The persisted value exists but does not parse as a record list.
    #[error("archive under '{key}' is corrupt: {reason}")]
    StoreCorrupt { key: String, reason: String },

    /// Reading or writing the backing store failed.
    #[error("archive store unavailable for '{key}': {source}")]
    StoreUnavailable {
        key: String,
        /// Where a corrupt previous value was copied before the write failed.
        quarantined: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("incident id {id} was already issued")]
    IdCollision { id: i64 },

    #[error("failed to serialize archive: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ArchiveError {
    pub(crate) fn unavailable(key: &str, err: anyhow::Error) -> Self {
        ArchiveError::StoreUnavailable {
            key: key.to_string(),
            quarantined: None,
            source: err.into(),
        }
    }

    pub fn quarantined(&self) -> Option<&str> {
        match self {
            ArchiveError::StoreUnavailable { quarantined, .. } => quarantined.as_deref(),
            _ => None,
        }
    }
}
