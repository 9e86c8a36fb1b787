//! Error types for the item store, the result cache and configuration.

use thiserror::Error;

use crate::model::ItemId;

/// Errors raised by the query collaborator or the item factory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The backend rejected or failed the query.
    #[error("backend query failed: {0}")]
    Backend(String),

    /// The first chunk of a result did not report a total and none could be
    /// inferred.
    #[error("backend did not report a total count for {query}")]
    MissingTotal { query: String },

    /// The item factory could not build items from a raw record.
    #[error("failed to build items: {0}")]
    Factory(String),
}

/// Errors raised by [`ItemStore`](crate::model::ItemStore) operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Insert position outside `0..=count`.
    #[error("invalid position {position} for parent with {count} children")]
    InvalidPosition { position: usize, count: usize },

    /// The index does not address an item of this store.
    #[error("index does not address an item of this store")]
    InvalidIndex,

    /// The destination parent is one of the moved items or below one.
    #[error("cannot move an item into itself or one of its descendants")]
    CircularMove,

    /// A fetch was requested but no data source is bound.
    #[error("no data source bound to the store")]
    NoDataSource,

    /// The data source failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] QueryError),

    /// A parent id could not be resolved in the current tree.
    #[error("parent {0} not found")]
    UnresolvedParent(ItemId),

    /// An item id could not be resolved in the current tree.
    #[error("item {0} not found")]
    UnknownItem(ItemId),

    /// A persisted edit was written against another set of data roles.
    #[error("edit record uses role set {found}, expected {expected}")]
    RoleSetMismatch { found: u32, expected: u32 },
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML source could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
