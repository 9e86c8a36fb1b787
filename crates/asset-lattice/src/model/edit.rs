//! Pending-edit tracking.
//!
//! Each item carries an [`EditState`]: a bitmask of the edit kinds applied
//! since the last commit plus the baseline captured on the first UPDATE or
//! MOVE. The store turns edit states into [`DiffRecord`]s for persistence and
//! replays them onto a freshly loaded tree.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::ItemId;
use super::role::{ItemData, ItemRole, NO_DATA, ROLE_SET_VERSION};

/// Per-column, per-role cell values. Sparse on both levels.
pub type ColumnData = BTreeMap<usize, BTreeMap<ItemRole, ItemData>>;

/// A kind of pending edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Item was created locally and does not exist in the backend yet.
    Insert,
    /// Item is marked for deletion.
    Delete,
    /// A deleted item is brought back.
    Revive,
    /// Item is marked for archival.
    Archive,
    /// Item is enabled.
    Enable,
    /// Item is disabled.
    Disable,
    /// Cell values changed.
    Update,
    /// Item moved to another parent.
    Move,
}

impl EditKind {
    /// Every kind, in bit order.
    pub const ALL: [EditKind; 8] = [
        EditKind::Insert,
        EditKind::Delete,
        EditKind::Revive,
        EditKind::Archive,
        EditKind::Enable,
        EditKind::Disable,
        EditKind::Update,
        EditKind::Move,
    ];

    const fn bit(self) -> u8 {
        match self {
            EditKind::Insert => 1 << 0,
            EditKind::Delete => 1 << 1,
            EditKind::Revive => 1 << 2,
            EditKind::Archive => 1 << 3,
            EditKind::Enable => 1 << 4,
            EditKind::Disable => 1 << 5,
            EditKind::Update => 1 << 6,
            EditKind::Move => 1 << 7,
        }
    }

    /// Kinds that are cleared when `self` is added.
    fn exclusions(self) -> EditKinds {
        match self {
            EditKind::Delete => EditKinds::of(&[EditKind::Revive, EditKind::Enable]),
            EditKind::Revive => {
                EditKinds::of(&[EditKind::Delete, EditKind::Archive, EditKind::Disable])
            }
            EditKind::Enable => {
                EditKinds::of(&[EditKind::Delete, EditKind::Archive, EditKind::Disable])
            }
            EditKind::Archive => EditKinds::of(&[EditKind::Enable, EditKind::Revive]),
            EditKind::Disable => EditKinds::of(&[EditKind::Revive, EditKind::Enable]),
            EditKind::Insert | EditKind::Update | EditKind::Move => EditKinds::empty(),
        }
    }
}

/// Bitmask of [`EditKind`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EditKinds(u8);

impl EditKinds {
    /// No edits.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Mask containing every kind in `kinds`.
    pub fn of(kinds: &[EditKind]) -> Self {
        kinds.iter().fold(Self::empty(), |mask, kind| mask.with(*kind))
    }

    /// Returns `true` if no kind is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `kind` is set.
    pub fn contains(&self, kind: EditKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns a copy with `kind` set.
    pub fn with(self, kind: EditKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Returns a copy with every kind of `other` cleared.
    pub fn without(self, other: EditKinds) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterates the set kinds in bit order.
    pub fn iter(&self) -> impl Iterator<Item = EditKind> + '_ {
        EditKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl fmt::Debug for EditKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for EditKinds {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for EditKinds {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kinds = Vec::<EditKind>::deserialize(deserializer)?;
        Ok(EditKinds::of(&kinds))
    }
}

/// Pending edits of one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditState {
    kinds: EditKinds,
    original_cells: Option<Vec<BTreeMap<ItemRole, ItemData>>>,
    original_parent: Option<Option<ItemId>>,
}

impl EditState {
    /// Edit kinds currently set.
    pub fn kinds(&self) -> EditKinds {
        self.kinds
    }

    /// Returns `true` if any edit is pending.
    pub fn is_edited(&self) -> bool {
        !self.kinds.is_empty()
    }

    /// Adds `kind`, enforcing the exclusion rules.
    ///
    /// INSERT dominates: once set, other kinds are ignored. The first UPDATE
    /// snapshots `cells` and the first MOVE snapshots `parent_id`; later
    /// edits of the same kind keep the original baseline.
    pub fn add(
        &mut self,
        kind: EditKind,
        cells: &[BTreeMap<ItemRole, ItemData>],
        parent_id: Option<&ItemId>,
    ) {
        if self.kinds.contains(EditKind::Insert) {
            return;
        }
        if kind == EditKind::Insert {
            self.kinds = EditKinds::empty().with(EditKind::Insert);
            self.original_cells = None;
            self.original_parent = None;
            return;
        }

        match kind {
            EditKind::Update if self.original_cells.is_none() => {
                self.original_cells = Some(cells.to_vec());
            }
            EditKind::Move if self.original_parent.is_none() => {
                self.original_parent = Some(parent_id.cloned());
            }
            _ => {}
        }
        self.kinds = self.kinds.without(kind.exclusions()).with(kind);
    }

    /// Clears the bitmask and baseline.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Cell values captured on the first UPDATE.
    pub fn original_cells(&self) -> Option<&[BTreeMap<ItemRole, ItemData>]> {
        self.original_cells.as_deref()
    }

    /// Parent id captured on the first MOVE. `Some(None)` means the item
    /// started at the top level.
    pub fn original_parent(&self) -> Option<Option<&ItemId>> {
        self.original_parent.as_ref().map(Option::as_ref)
    }

    /// Builds the diff between the current state and the baseline.
    ///
    /// Returns `None` when no edit is pending.
    pub fn diff(
        &self,
        item_id: &ItemId,
        data_type: &str,
        cells: &[BTreeMap<ItemRole, ItemData>],
        parent_id: Option<&ItemId>,
    ) -> Option<DiffRecord> {
        if self.kinds.is_empty() {
            return None;
        }

        let mut record = DiffRecord {
            item_id: item_id.clone(),
            kinds: self.kinds,
            data_type: data_type.to_string(),
            parent_id: None,
            moved_to_root: false,
            column_data: None,
            role_set: ROLE_SET_VERSION,
        };

        if self.kinds.contains(EditKind::Insert) {
            record.parent_id = parent_id.cloned();
            let data = full_column_data(cells);
            record.column_data = (!data.is_empty()).then_some(data);
            return Some(record);
        }

        if self.kinds.contains(EditKind::Move) {
            let original = self.original_parent().flatten();
            if original != parent_id {
                record.parent_id = parent_id.cloned();
                record.moved_to_root = parent_id.is_none();
            }
        }

        if self.kinds.contains(EditKind::Update) {
            let baseline = self.original_cells.as_deref().unwrap_or(&[]);
            let data = changed_column_data(baseline, cells);
            record.column_data = (!data.is_empty()).then_some(data);
        }

        Some(record)
    }
}

fn full_column_data(cells: &[BTreeMap<ItemRole, ItemData>]) -> ColumnData {
    cells
        .iter()
        .enumerate()
        .filter_map(|(column, roles)| {
            let roles: BTreeMap<ItemRole, ItemData> = roles
                .iter()
                .filter(|(role, value)| role.is_editable_data() && value.is_some())
                .map(|(role, value)| (*role, value.clone()))
                .collect();
            (!roles.is_empty()).then_some((column, roles))
        })
        .collect()
}

fn changed_column_data(
    baseline: &[BTreeMap<ItemRole, ItemData>],
    cells: &[BTreeMap<ItemRole, ItemData>],
) -> ColumnData {
    let empty = BTreeMap::new();
    let mut diff = ColumnData::new();
    for (column, current) in cells.iter().enumerate() {
        let original = baseline.get(column).unwrap_or(&empty);
        let mut roles = BTreeMap::new();
        for role in ItemRole::ALL.iter().filter(|role| role.is_editable_data()) {
            let now = current.get(role).unwrap_or(&NO_DATA);
            let before = original.get(role).unwrap_or(&NO_DATA);
            if now != before {
                roles.insert(*role, now.clone());
            }
        }
        if !roles.is_empty() {
            diff.insert(column, roles);
        }
    }
    diff
}

/// Persistable description of one item's pending edits.
///
/// The shape is opaque to the persistence collaborator: it stores and hands
/// back a list of records without interpreting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord {
    /// Id of the edited item.
    pub item_id: ItemId,
    /// Edit kinds pending on the item.
    #[serde(rename = "type")]
    pub kinds: EditKinds,
    /// Data type tag of the item, needed to recreate inserted items.
    #[serde(default)]
    pub data_type: String,
    /// Parent for INSERT, new parent for MOVE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    /// The MOVE ended at the top level, which has no id to name.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub moved_to_root: bool,
    /// Full data for INSERT, changed values for UPDATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_data: Option<ColumnData>,
    /// [`ROLE_SET_VERSION`] the record was written with. Records without
    /// one predate versioning and are read as the current set.
    #[serde(default = "current_role_set")]
    pub role_set: u32,
}

fn current_role_set() -> u32 {
    ROLE_SET_VERSION
}
