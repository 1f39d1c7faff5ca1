//! Typed error hierarchy for the tracking backend.
//!
//! `TrackerError` is returned by the repository and service layers; the HTTP
//! layer maps each variant onto a status code in `tracking::api`.

use thiserror::Error;

/// Errors from the order, inspection and failure-catalog layers.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Production order {id} not found")]
    OrderNotFound { id: String },

    #[error("Production order {id} is already closed")]
    OrderAlreadyClosed { id: String },

    #[error("Database error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for failures of the store itself, as opposed to bad input or a
    /// lifecycle conflict.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
