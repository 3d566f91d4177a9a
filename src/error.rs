//! Error types for live sets.
//!
//! Most operations never fail: releasing an unknown connection,
//! retaining something that is not a subset, writing through a subset
//! without a collection and unresolved dependency names are all
//! silent no-ops. Only the calls below can report an error.

use crate::projection::subset::SubsetId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveSetError {
    #[error("Subset already configured: {0}")]
    AlreadyConfigured(SubsetId),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LiveSetError>;
