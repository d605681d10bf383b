// SPDX-License-Identifier: MIT OR Apache-2.0
//! Store error type.

/// Errors raised by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database returned an error.
    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"mission"`.
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// A row's JSON column could not be decoded.
    #[error("store json decode error: {0}")]
    Json(#[from] serde_json::Error),
}
