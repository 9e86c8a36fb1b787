//! Change notifications emitted by the item store.
//!
//! Every structural or data mutation is announced once, after it has been
//! fully applied, as a single [`ChangeEvent`] describing one contiguous,
//! already-valid row range.

use asset_lattice_core::Signal;

use super::index::ModelIndex;

/// What happened to a row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Rows were inserted.
    Insert,
    /// Rows were removed.
    Remove,
    /// Rows were moved. `destination_row` is the row of the first moved
    /// item in the destination parent after the move.
    Move {
        destination_parent: ModelIndex,
        destination_row: usize,
    },
    /// Cell values changed in the given column range.
    DataChanged {
        first_column: usize,
        last_column: usize,
    },
}

/// A mutation of rows `first_row..=last_row` under `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Parent of the rows. For moves, the source parent.
    pub parent: ModelIndex,
    /// First affected row.
    pub first_row: usize,
    /// Last affected row (inclusive).
    pub last_row: usize,
}

impl ChangeEvent {
    /// Rows inserted.
    pub fn insert(parent: ModelIndex, first_row: usize, last_row: usize) -> Self {
        Self {
            kind: ChangeKind::Insert,
            parent,
            first_row,
            last_row,
        }
    }

    /// Rows removed.
    pub fn remove(parent: ModelIndex, first_row: usize, last_row: usize) -> Self {
        Self {
            kind: ChangeKind::Remove,
            parent,
            first_row,
            last_row,
        }
    }

    /// Cell values changed.
    pub fn data_changed(parent: ModelIndex, rows: (usize, usize), columns: (usize, usize)) -> Self {
        Self {
            kind: ChangeKind::DataChanged {
                first_column: columns.0,
                last_column: columns.1,
            },
            parent,
            first_row: rows.0,
            last_row: rows.1,
        }
    }

    /// Number of rows covered.
    pub fn row_count(&self) -> usize {
        self.last_row - self.first_row + 1
    }
}

/// Signals emitted by an [`ItemStore`](super::ItemStore).
#[derive(Debug, Default)]
pub struct StoreSignals {
    /// Row insertions, removals, moves and data changes.
    pub changed: Signal<ChangeEvent>,
    /// Columns inserted. Args: (first column, last column)
    pub columns_inserted: Signal<(usize, usize)>,
    /// Columns removed. Args: (first column, last column)
    pub columns_removed: Signal<(usize, usize)>,
    /// Header data changed. Args: (first section, last section)
    pub header_data_changed: Signal<(usize, usize)>,
    /// Rows were reordered by a sort. Args: (old index, new index) for
    /// every persistent index.
    pub layout_changed: Signal<Vec<(ModelIndex, ModelIndex)>>,
    /// All rows were replaced.
    pub model_reset: Signal<()>,
}

impl StoreSignals {
    /// Creates a new set of signals.
    pub fn new() -> Self {
        Self::default()
    }
}
