//! Hierarchical item model.
//!
//! This module provides the lazy-loading item store and its building blocks:
//!
//! - Items live in an arena ([`ItemTree`]) addressed by [`ItemKey`]; views
//!   address them by [`ModelIndex`]
//! - Each cell holds role-keyed [`ItemData`]
//! - [`ItemStore`] owns the tree, fetches children on demand from a
//!   [`DataSource`], sorts with a [`Comparator`] and tracks pending edits
//! - [`ResultCache`] sits in front of a backend [`QueryClient`], reusing
//!   fetched result sets across sort orders and pages
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  ItemStore  │────>│ DataSource  │────>│ ResultCache │──> QueryClient
//! │  (ItemTree) │     │(QuerySource)│     │             │──> ItemFactory
//! └─────────────┘     └─────────────┘     └─────────────┘
//!       │
//!       └──> StoreSignals ──> views
//! ```

mod cache;
mod comparator;
mod edit;
mod index;
mod item;
mod role;
mod signals;
mod source;
mod store;

pub use cache::{
    CacheEntry, CompleteSet, FilterSpec, PageSpec, PartialSet, QueryKey, RawResultChunk,
    ResultCache, ResultPage, SearchCriteria, SearchKey, SearchPredicate,
};
pub use comparator::{
    Comparator, MAX_SORT_COLUMNS, SortColumn, SortCriteria, SortDirection,
};
pub use edit::{ColumnData, DiffRecord, EditKind, EditKinds, EditState};
pub use index::ModelIndex;
pub use item::{Item, ItemFlags, ItemId, ItemKey, ItemTree, Subtree};
pub use role::{CheckState, ColumnType, ItemData, ItemRole, ROLE_SET_VERSION};
pub use signals::{ChangeEvent, ChangeKind, StoreSignals};
pub use source::{Batch, DataSource, FetchRequest, ItemFactory, QueryClient, QuerySource};
pub use store::{ColumnSpec, ItemStore, PersistentId};
