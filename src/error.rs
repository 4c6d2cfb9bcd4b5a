use thiserror::Error;

/// Why a cell-info scan produced no readings
#[derive(Error, Debug)]
pub enum ScanError {
    /// Location permission is gone; polling cannot continue
    #[error("{0}")]
    PermissionRevoked(String),

    /// Anything else; the next scheduled cycle tries again
    #[error("{0}")]
    Transient(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Entry {0} holds a different value type")]
    WrongType(String),
}
