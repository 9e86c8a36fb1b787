//! Asset Lattice - a lazy-loading hierarchical item store.
//!
//! The store keeps a tree of display items that is populated on demand from
//! a backend, sorted on multiple columns, annotated with tri-state check
//! state and pending edits, and observed through change signals.
//!
//! # Example
//!
//! ```
//! use asset_lattice::model::{
//!     CheckState, ColumnSpec, ColumnType, Item, ItemFlags, ItemRole, ItemStore, ModelIndex,
//! };
//! use asset_lattice::StoreConfig;
//!
//! let mut store = ItemStore::new(
//!     vec![ColumnSpec::new("Name", ColumnType::Text)],
//!     StoreConfig::default(),
//! );
//! store.set_items(vec![
//!     Item::with_id("seq-010", "Sequence", 1)
//!         .with_data(0, ItemRole::Display, "seq-010")
//!         .with_flags(ItemFlags::checkable())
//!         .with_children(vec![
//!             Item::with_id("sh-0010", "Shot", 1).with_flags(ItemFlags::checkable()),
//!         ]),
//! ]);
//!
//! let sequence = store.index(0, 0, &ModelIndex::invalid());
//! store.set_check_state(&sequence, CheckState::Checked).unwrap();
//!
//! let shot = store.index(0, 0, &sequence);
//! assert_eq!(store.data(&shot, ItemRole::CheckState), CheckState::Checked.into());
//! ```

pub mod config;
pub mod error;
pub mod model;

pub use asset_lattice_core::{ConnectionId, PerfSpan, Signal};
pub use config::{CacheConfig, LatticeConfig, StoreConfig};
pub use error::{ConfigError, QueryError, StoreError, StoreResult};
