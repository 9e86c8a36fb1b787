//! Data roles, cell values and column types.
//!
//! Every cell of an [`Item`](super::Item) stores a sparse map of role to
//! value. Roles form a closed set fixed at build time; the set carries a
//! version number so persisted edit records can be checked against it.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::comparator::SortDirection;

/// Shared empty value returned for unset roles.
pub(crate) static NO_DATA: ItemData = ItemData::None;

/// Version of the [`ItemRole`] set. Bump whenever a role is added or removed.
pub const ROLE_SET_VERSION: u32 = 1;

/// Roles for accessing different aspects of a cell.
///
/// - **Display**: the primary value shown in the cell
/// - **Edit**: the value offered to an editor (may be richer than display)
/// - **SortValue**: a dedicated value used for ordering instead of display
/// - **ToolTip**: text shown on hover
/// - **Decoration**: icon name or thumbnail path
/// - **Status**: backend status code of the record (e.g. `"ip"`, `"fin"`)
/// - **Link**: backend entity reference carried by the cell
/// - **CheckState**: tri-state checkbox value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    /// Primary value to display.
    Display,
    /// Value for editing.
    Edit,
    /// Value used by the comparator in preference to the display value.
    SortValue,
    /// Tooltip text shown on hover.
    ToolTip,
    /// Icon or thumbnail reference.
    Decoration,
    /// Backend status code.
    Status,
    /// Backend entity reference.
    Link,
    /// Check state for checkable cells.
    CheckState,
}

impl ItemRole {
    /// Every role, in declaration order.
    pub const ALL: [ItemRole; 8] = [
        ItemRole::Display,
        ItemRole::Edit,
        ItemRole::SortValue,
        ItemRole::ToolTip,
        ItemRole::Decoration,
        ItemRole::Status,
        ItemRole::Link,
        ItemRole::CheckState,
    ];

    /// Returns `true` for roles whose changes count as an UPDATE edit.
    ///
    /// Check state is tracked separately and never participates in edits.
    pub fn is_editable_data(&self) -> bool {
        !matches!(self, ItemRole::CheckState)
    }
}

/// Check state for checkable items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// Item is unchecked.
    #[default]
    Unchecked,
    /// Some, but not all, checkable children are checked.
    PartiallySelected,
    /// Item is checked.
    Checked,
}

impl CheckState {
    /// Returns `true` if the item is fully checked.
    pub fn is_checked(&self) -> bool {
        matches!(self, CheckState::Checked)
    }

    /// Toggles between Unchecked and Checked.
    /// PartiallySelected becomes Checked.
    pub fn toggle(&self) -> CheckState {
        match self {
            CheckState::Unchecked | CheckState::PartiallySelected => CheckState::Checked,
            CheckState::Checked => CheckState::Unchecked,
        }
    }
}

/// Declared data type of a column.
///
/// The comparator picks its per-type comparison from this tag and uses it to
/// derive the default sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Free text, compared case-insensitively.
    #[default]
    Text,
    /// File system or pipeline path.
    Path,
    /// Boolean flag.
    Bool,
    /// One value out of a fixed list (status, step, type).
    Enum,
    /// Whole number.
    Int,
    /// Floating point number.
    Float,
    /// File size in bytes.
    FileSize,
    /// Calendar date.
    Date,
    /// Timestamp.
    DateTime,
    /// Duration in frames or seconds.
    Duration,
}

impl ColumnType {
    /// Default direction used when a column is first sorted.
    ///
    /// Numeric and date-like columns show the largest / most recent value
    /// first; text-like columns sort alphabetically.
    pub fn default_sort_direction(&self) -> SortDirection {
        match self {
            ColumnType::Int
            | ColumnType::Float
            | ColumnType::FileSize
            | ColumnType::Date
            | ColumnType::DateTime
            | ColumnType::Duration => SortDirection::Descending,
            ColumnType::Text | ColumnType::Path | ColumnType::Bool | ColumnType::Enum => {
                SortDirection::Ascending
            }
        }
    }

    /// Returns `true` for types compared as text.
    pub fn is_textual(&self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::Path | ColumnType::Enum)
    }
}

/// Value stored under a role in a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ItemData {
    /// No data.
    #[default]
    None,
    /// String data.
    String(String),
    /// Integer data.
    Int(i64),
    /// Floating point data.
    Float(f64),
    /// Boolean data.
    Bool(bool),
    /// Timestamp data.
    DateTime(DateTime<Utc>),
    /// Check state data.
    CheckState(CheckState),
}

impl ItemData {
    /// Returns `true` if this is `ItemData::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, ItemData::None)
    }

    /// Returns `true` if this contains some data.
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Attempts to get the data as a string slice.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ItemData::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to get the data as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ItemData::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to get the data as a float. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ItemData::Float(n) => Some(*n),
            ItemData::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Attempts to get the data as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ItemData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the data as a timestamp.
    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            ItemData::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Attempts to get the data as check state.
    pub fn as_check_state(&self) -> Option<CheckState> {
        match self {
            ItemData::CheckState(s) => Some(*s),
            _ => None,
        }
    }

    /// Rank of the variant, used to order values of unrelated kinds.
    fn variant_rank(&self) -> u8 {
        match self {
            ItemData::None => 0,
            ItemData::Bool(_) => 1,
            ItemData::Int(_) | ItemData::Float(_) => 2,
            ItemData::DateTime(_) => 3,
            ItemData::String(_) => 4,
            ItemData::CheckState(_) => 5,
        }
    }

    /// Total order over values regardless of column type.
    ///
    /// `None` sorts first, numbers compare numerically (NaN after every
    /// number), and values of unrelated kinds fall back to a fixed variant
    /// rank so the order stays antisymmetric.
    pub fn total_cmp(&self, other: &ItemData) -> Ordering {
        match (self, other) {
            (ItemData::String(a), ItemData::String(b)) => a.cmp(b),
            (ItemData::Bool(a), ItemData::Bool(b)) => a.cmp(b),
            (ItemData::Int(a), ItemData::Int(b)) => a.cmp(b),
            (ItemData::DateTime(a), ItemData::DateTime(b)) => a.cmp(b),
            (ItemData::CheckState(a), ItemData::CheckState(b)) => {
                check_rank(*a).cmp(&check_rank(*b))
            }
            (a, b) if a.variant_rank() == 2 && b.variant_rank() == 2 => {
                let (x, y) = (a.as_float().unwrap_or(0.0), b.as_float().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.variant_rank().cmp(&b.variant_rank()),
        }
    }
}

fn check_rank(state: CheckState) -> u8 {
    match state {
        CheckState::Unchecked => 0,
        CheckState::PartiallySelected => 1,
        CheckState::Checked => 2,
    }
}

impl fmt::Display for ItemData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemData::None => Ok(()),
            ItemData::String(s) => write!(f, "{s}"),
            ItemData::Int(n) => write!(f, "{n}"),
            ItemData::Float(n) => write!(f, "{n}"),
            ItemData::Bool(b) => write!(f, "{b}"),
            ItemData::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            ItemData::CheckState(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<String> for ItemData {
    fn from(s: String) -> Self {
        ItemData::String(s)
    }
}

impl From<&str> for ItemData {
    fn from(s: &str) -> Self {
        ItemData::String(s.to_string())
    }
}

impl From<i64> for ItemData {
    fn from(n: i64) -> Self {
        ItemData::Int(n)
    }
}

impl From<i32> for ItemData {
    fn from(n: i32) -> Self {
        ItemData::Int(n as i64)
    }
}

impl From<f64> for ItemData {
    fn from(n: f64) -> Self {
        ItemData::Float(n)
    }
}

impl From<bool> for ItemData {
    fn from(b: bool) -> Self {
        ItemData::Bool(b)
    }
}

impl From<DateTime<Utc>> for ItemData {
    fn from(dt: DateTime<Utc>) -> Self {
        ItemData::DateTime(dt)
    }
}

impl From<CheckState> for ItemData {
    fn from(s: CheckState) -> Self {
        ItemData::CheckState(s)
    }
}

impl From<Option<String>> for ItemData {
    fn from(opt: Option<String>) -> Self {
        match opt {
            Some(s) => ItemData::String(s),
            None => ItemData::None,
        }
    }
}

impl From<&serde_json::Value> for ItemData {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ItemData::None,
            serde_json::Value::Bool(b) => ItemData::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ItemData::Int(i),
                None => n.as_f64().map(ItemData::Float).unwrap_or_default(),
            },
            serde_json::Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => ItemData::DateTime(dt.with_timezone(&Utc)),
                Err(_) => ItemData::String(s.clone()),
            },
            other => ItemData::String(other.to_string()),
        }
    }
}
