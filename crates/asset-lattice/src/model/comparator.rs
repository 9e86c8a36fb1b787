//! Multi-column item comparison.
//!
//! The [`Comparator`] orders items by an ordered list of `(column, direction)`
//! pairs. It is shared by the item store (in-memory resorts and fetched
//! batches) and the result cache (re-chunking a complete result set under a
//! new sort order).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::item::Item;
use super::role::{ColumnType, ItemData, ItemRole, NO_DATA};

/// Maximum number of columns a sort may use.
pub const MAX_SORT_COLUMNS: usize = 4;

/// Direction of a sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Applies the direction to an ascending ordering.
    #[inline]
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// One entry of a sort specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortColumn {
    /// Column index.
    pub column: usize,
    /// Sort direction for the column.
    pub direction: SortDirection,
}

impl SortColumn {
    /// Creates a sort column.
    pub fn new(column: usize, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}

/// Ordered list of sort columns.
///
/// Also serves as the normalized sort-criteria key of the result cache:
/// equality and hashing consider the columns and directions in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortCriteria {
    columns: Vec<SortColumn>,
}

impl SortCriteria {
    /// An empty sort (backend order).
    pub fn new() -> Self {
        Self::default()
    }

    /// A sort on a single column.
    pub fn by(column: usize, direction: SortDirection) -> Self {
        Self {
            columns: vec![SortColumn::new(column, direction)],
        }
    }

    /// The sort columns, primary first.
    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    /// Returns `true` if no column is sorted.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Adds `column`, or updates its direction and moves it to the end.
    ///
    /// When `capacity` columns are already present the oldest (front) entry
    /// is evicted.
    pub fn add(&mut self, column: usize, direction: SortDirection, capacity: usize) {
        self.columns.retain(|entry| entry.column != column);
        if capacity > 0 {
            while self.columns.len() >= capacity {
                self.columns.remove(0);
            }
        }
        self.columns.push(SortColumn::new(column, direction));
    }

    /// Removes `column` from the sort.
    pub fn remove(&mut self, column: usize) {
        self.columns.retain(|entry| entry.column != column);
    }

    /// Shifts column indices after `count` columns were inserted at `position`.
    pub(crate) fn columns_inserted(&mut self, position: usize, count: usize) {
        for entry in &mut self.columns {
            if entry.column >= position {
                entry.column += count;
            }
        }
    }

    /// Drops and shifts column indices after `count` columns were removed at
    /// `position`.
    pub(crate) fn columns_removed(&mut self, position: usize, count: usize) {
        self.columns
            .retain(|entry| entry.column < position || entry.column >= position + count);
        for entry in &mut self.columns {
            if entry.column >= position + count {
                entry.column -= count;
            }
        }
    }
}

impl FromIterator<SortColumn> for SortCriteria {
    fn from_iter<I: IntoIterator<Item = SortColumn>>(iter: I) -> Self {
        let mut criteria = SortCriteria::new();
        for entry in iter {
            criteria.add(entry.column, entry.direction, MAX_SORT_COLUMNS);
        }
        criteria
    }
}

/// Compares items column by column.
#[derive(Debug, Clone)]
pub struct Comparator {
    column_types: Vec<ColumnType>,
    sort: SortCriteria,
    max_columns: usize,
}

impl Comparator {
    /// Creates a comparator for columns of the given declared types.
    pub fn new(column_types: Vec<ColumnType>) -> Self {
        Self {
            column_types,
            sort: SortCriteria::new(),
            max_columns: MAX_SORT_COLUMNS,
        }
    }

    /// Creates a comparator with an initial sort.
    pub fn with_sort(column_types: Vec<ColumnType>, sort: SortCriteria) -> Self {
        Self {
            column_types,
            sort,
            max_columns: MAX_SORT_COLUMNS,
        }
    }

    /// Caps the number of sort columns, clamped to `1..=MAX_SORT_COLUMNS`.
    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = max_columns.clamp(1, MAX_SORT_COLUMNS);
        self
    }

    /// Current sort specification.
    pub fn sort(&self) -> &SortCriteria {
        &self.sort
    }

    /// Replaces the sort specification.
    pub fn set_sort(&mut self, sort: SortCriteria) {
        self.sort = sort;
    }

    /// Adds a sort column (see [`SortCriteria::add`]).
    pub fn add_sort_column(&mut self, column: usize, direction: SortDirection) {
        self.sort.add(column, direction, self.max_columns);
    }

    /// Adds a sort column in its type's default direction.
    pub fn add_default_sort_column(&mut self, column: usize) {
        let direction = self.default_sort_direction(column);
        self.add_sort_column(column, direction);
    }

    /// Declared type of `column`. Unknown columns are treated as text.
    pub fn column_type(&self, column: usize) -> ColumnType {
        self.column_types.get(column).copied().unwrap_or_default()
    }

    /// Default direction for `column`, from its declared type.
    pub fn default_sort_direction(&self, column: usize) -> SortDirection {
        self.column_type(column).default_sort_direction()
    }

    pub(crate) fn columns_inserted(&mut self, position: usize, types: &[ColumnType]) {
        let position = position.min(self.column_types.len());
        self.column_types
            .splice(position..position, types.iter().copied());
        self.sort.columns_inserted(position, types.len());
    }

    pub(crate) fn columns_removed(&mut self, position: usize, count: usize) {
        let end = (position + count).min(self.column_types.len());
        self.column_types.drain(position.min(end)..end);
        self.sort.columns_removed(position, count);
    }

    /// Compares two items under the current sort.
    ///
    /// Returns the first non-equal column result, reversed for descending
    /// columns. Items equal on every sort column compare equal.
    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        for entry in self.sort.columns() {
            let ordering = self.compare_column(a, b, entry.column);
            if ordering != Ordering::Equal {
                return entry.direction.apply(ordering);
            }
        }
        Ordering::Equal
    }

    /// Sorts `items` in place (stable).
    pub fn sort_items(&self, items: &mut [Item]) {
        if self.sort.is_empty() {
            return;
        }
        items.sort_by(|a, b| self.compare(a, b));
    }

    /// Ascending comparison of one column.
    fn compare_column(&self, a: &Item, b: &Item, column: usize) -> Ordering {
        let sort_a = a.try_data(column, ItemRole::SortValue).unwrap_or(&NO_DATA);
        let sort_b = b.try_data(column, ItemRole::SortValue).unwrap_or(&NO_DATA);
        if sort_a.is_some() || sort_b.is_some() {
            return compare_text_aware(sort_a, sort_b);
        }

        let display_a = a.try_data(column, ItemRole::Display).unwrap_or(&NO_DATA);
        let display_b = b.try_data(column, ItemRole::Display).unwrap_or(&NO_DATA);
        compare_typed(self.column_type(column), display_a, display_b)
    }
}

/// Case-insensitive when both sides are text, total order otherwise.
fn compare_text_aware(a: &ItemData, b: &ItemData) -> Ordering {
    match (a, b) {
        (ItemData::String(x), ItemData::String(y)) => compare_case_insensitive(x, y),
        _ => a.total_cmp(b),
    }
}

fn compare_case_insensitive(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Type-specific comparison of display values.
fn compare_typed(column_type: ColumnType, a: &ItemData, b: &ItemData) -> Ordering {
    if column_type.is_textual() {
        return compare_text_aware(a, b);
    }
    match column_type {
        ColumnType::Int
        | ColumnType::Float
        | ColumnType::FileSize
        | ColumnType::Duration => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.total_cmp(b),
        },
        ColumnType::Bool => match (a.as_bool(), b.as_bool()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.total_cmp(b),
        },
        ColumnType::Date | ColumnType::DateTime => match (a.as_date_time(), b.as_date_time()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.total_cmp(b),
        },
        ColumnType::Text | ColumnType::Path | ColumnType::Enum => compare_text_aware(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(values: Vec<ItemData>) -> Item {
        let mut item = Item::new("Asset", values.len());
        for (column, value) in values.into_iter().enumerate() {
            item.set_data(value, column, ItemRole::Display);
        }
        item
    }

    #[test]
    fn test_case_insensitive_text() {
        let comparator = Comparator::with_sort(
            vec![ColumnType::Text],
            SortCriteria::by(0, SortDirection::Ascending),
        );
        let banana = item(vec!["Banana".into()]);
        let apple = item(vec!["apple".into()]);

        assert_eq!(comparator.compare(&apple, &banana), Ordering::Less);
        assert_eq!(comparator.compare(&banana, &apple), Ordering::Greater);
    }

    #[test]
    fn test_descending_reverses() {
        let comparator = Comparator::with_sort(
            vec![ColumnType::Int],
            SortCriteria::by(0, SortDirection::Descending),
        );
        let small = item(vec![ItemData::Int(1)]);
        let large = item(vec![ItemData::Int(10)]);
        assert_eq!(comparator.compare(&large, &small), Ordering::Less);
    }

    #[test]
    fn test_tie_break_on_second_column() {
        let mut comparator = Comparator::new(vec![ColumnType::Enum, ColumnType::DateTime]);
        comparator.add_sort_column(0, SortDirection::Ascending);
        comparator.add_sort_column(1, SortDirection::Descending);

        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let a = item(vec!["ip".into(), older.into()]);
        let b = item(vec!["ip".into(), newer.into()]);
        let c = item(vec!["fin".into(), older.into()]);

        let mut items = vec![a.clone(), b.clone(), c.clone()];
        comparator.sort_items(&mut items);
        let order: Vec<_> = items
            .iter()
            .map(|i| i.data(1, ItemRole::Display).clone())
            .collect();
        assert_eq!(order, vec![older.into(), newer.into(), older.into()]);
        assert_eq!(items[0].data(0, ItemRole::Display), &ItemData::from("fin"));
    }

    #[test]
    fn test_sort_value_role_wins_over_display() {
        let comparator = Comparator::with_sort(
            vec![ColumnType::Text],
            SortCriteria::by(0, SortDirection::Ascending),
        );
        let mut a = item(vec!["zzz".into()]);
        let mut b = item(vec!["aaa".into()]);
        a.set_data(ItemData::Int(1), 0, ItemRole::SortValue);
        b.set_data(ItemData::Int(2), 0, ItemRole::SortValue);
        assert_eq!(comparator.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_all_equal_without_fallback() {
        let comparator = Comparator::with_sort(
            vec![ColumnType::Text, ColumnType::Int],
            SortCriteria::by(0, SortDirection::Ascending),
        );
        let a = item(vec!["same".into(), ItemData::Int(1)]);
        let b = item(vec!["SAME".into(), ItemData::Int(2)]);
        assert_eq!(comparator.compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_add_moves_existing_column_to_end() {
        let mut sort = SortCriteria::new();
        sort.add(0, SortDirection::Ascending, 4);
        sort.add(1, SortDirection::Ascending, 4);
        sort.add(0, SortDirection::Descending, 4);
        assert_eq!(
            sort.columns(),
            &[
                SortColumn::new(1, SortDirection::Ascending),
                SortColumn::new(0, SortDirection::Descending)
            ]
        );
    }

    #[test]
    fn test_add_evicts_oldest_at_capacity() {
        let mut sort = SortCriteria::new();
        for column in 0..3 {
            sort.add(column, SortDirection::Ascending, 2);
        }
        let columns: Vec<usize> = sort.columns().iter().map(|c| c.column).collect();
        assert_eq!(columns, vec![1, 2]);
    }

    #[test]
    fn test_default_direction_comes_from_column_type() {
        let mut comparator = Comparator::new(vec![ColumnType::Path, ColumnType::FileSize]);
        comparator.add_default_sort_column(1);
        comparator.add_default_sort_column(0);
        assert_eq!(
            comparator.sort().columns(),
            &[
                SortColumn::new(1, SortDirection::Descending),
                SortColumn::new(0, SortDirection::Ascending)
            ]
        );
    }

    #[test]
    fn test_column_shift_keeps_sort_aligned() {
        let mut comparator = Comparator::with_sort(
            vec![ColumnType::Text, ColumnType::Int],
            SortCriteria::by(1, SortDirection::Descending),
        );
        comparator.columns_inserted(0, &[ColumnType::Bool]);
        assert_eq!(comparator.sort().columns()[0].column, 2);
        assert_eq!(comparator.column_type(2), ColumnType::Int);

        comparator.columns_removed(2, 1);
        assert!(comparator.sort().is_empty());
    }

    #[test]
    fn test_missing_values_sort_first() {
        let comparator = Comparator::with_sort(
            vec![ColumnType::Int],
            SortCriteria::by(0, SortDirection::Ascending),
        );
        let empty = item(vec![ItemData::None]);
        let some = item(vec![ItemData::Int(-5)]);
        assert_eq!(comparator.compare(&empty, &some), Ordering::Less);
    }
}
