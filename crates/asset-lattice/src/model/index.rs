//! Model index for addressing cells in the item tree.
//!
//! A `ModelIndex` is a lightweight handle naming one cell: the row inside its
//! parent, the column, and the arena key of the item it points at. Indices are
//! snapshots; after a structural mutation use
//! [`ItemStore::index_from_item`](super::ItemStore::index_from_item) or a
//! persistent index to get a fresh one.

use std::fmt;

use super::item::ItemKey;

/// Identifies a cell in the item tree.
///
/// The invalid index denotes the (invisible) root: use it as the `parent`
/// argument to address top-level rows.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModelIndex {
    row: usize,
    column: usize,
    item: Option<ItemKey>,
}

impl ModelIndex {
    /// Creates an invalid index.
    #[inline]
    pub const fn invalid() -> Self {
        Self {
            row: 0,
            column: 0,
            item: None,
        }
    }

    /// Creates an index for `item`, located at `row` / `column`.
    #[inline]
    pub(crate) fn new(row: usize, column: usize, item: ItemKey) -> Self {
        Self {
            row,
            column,
            item: Some(item),
        }
    }

    /// Returns `true` if this index points at an item.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.item.is_some()
    }

    /// Row of the item inside its parent. `0` for invalid indices.
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// Column of the cell. `0` for invalid indices.
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Arena key of the addressed item, if valid.
    #[inline]
    pub fn item_key(&self) -> Option<ItemKey> {
        self.item
    }

    /// Returns the same item at a different column.
    ///
    /// Returns an invalid index if this index is invalid.
    #[inline]
    pub fn sibling_at_column(&self, column: usize) -> ModelIndex {
        match self.item {
            Some(item) => ModelIndex::new(self.row, column, item),
            None => ModelIndex::invalid(),
        }
    }
}

impl fmt::Debug for ModelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Some(item) => f
                .debug_struct("ModelIndex")
                .field("row", &self.row)
                .field("column", &self.column)
                .field("item", &item)
                .finish(),
            None => write!(f, "ModelIndex(invalid)"),
        }
    }
}
