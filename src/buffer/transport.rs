use crate::{buffer::model::Record, error::Result};

/// Boundary to whatever persists a collection (HTTP endpoint, store, ...).
///
/// Calls are made synchronously from `Collection::create` and
/// `Collection::fetch`; their completion is announced to observers as
/// `CollectionDiff::Synced`.
pub trait Transport<R: Record>: Send + Sync {
    /// Persists a new record and returns the raw response.
    fn create(&self, record: &R) -> Result<serde_json::Value>;

    /// Loads the canonical record list.
    fn fetch(&self) -> Result<Vec<R>>;
}
