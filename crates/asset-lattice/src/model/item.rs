//! Tree nodes and the arena that owns them.
//!
//! Every [`Item`] attached to a store lives in an [`ItemTree`], a slotmap
//! arena keyed by [`ItemKey`]. Parent links are plain keys, never owning
//! pointers, so a node cannot keep its ancestors alive and cycles are
//! rejected by walking ancestors before any re-parenting.
//!
//! Each node caches its own row inside its parent. The tree renumbers the
//! affected siblings after every structural change, keeping row lookups
//! O(1).

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use super::edit::{DiffRecord, EditKind, EditState};
use super::role::{CheckState, ItemData, ItemRole};

new_key_type! {
    /// Arena key of an item attached to an [`ItemTree`].
    pub struct ItemKey;
}

/// Globally unique backend identifier of an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Flags describing how a cell can be interacted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemFlags {
    /// Item can be selected.
    pub selectable: bool,
    /// Item can be edited.
    pub editable: bool,
    /// Item can be dragged.
    pub drag_enabled: bool,
    /// Item can receive drops.
    pub drop_enabled: bool,
    /// Item has a checkbox.
    pub checkable: bool,
    /// Item is enabled (can interact).
    pub enabled: bool,
    /// Item has a tri-state checkbox.
    pub tristate: bool,
}

impl ItemFlags {
    /// Creates flags with all defaults (selectable and enabled only).
    pub fn new() -> Self {
        Self {
            selectable: true,
            enabled: true,
            ..Default::default()
        }
    }

    /// Creates flags for an editable item.
    pub fn editable() -> Self {
        Self {
            editable: true,
            ..Self::new()
        }
    }

    /// Creates flags for a checkable item.
    pub fn checkable() -> Self {
        Self {
            checkable: true,
            ..Self::new()
        }
    }

    /// Sets the editable flag.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Sets the checkable flag.
    pub fn with_checkable(mut self, checkable: bool) -> Self {
        self.checkable = checkable;
        self
    }

    /// Sets the tri-state flag.
    pub fn with_tristate(mut self, tristate: bool) -> Self {
        self.tristate = tristate;
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the drag and drop flags.
    pub fn with_drag_drop(mut self, drag: bool, drop: bool) -> Self {
        self.drag_enabled = drag;
        self.drop_enabled = drop;
        self
    }
}

/// A tree node: one displayable record.
///
/// Cell data is sparse: each column maps roles to values and unset roles
/// read as [`ItemData::None`]. Accessing a column outside
/// `0..column_count()` is a programming error and panics.
///
/// A detached item (not yet inserted into a tree) may carry staged
/// children, letting a factory deliver a whole subtree at once.
#[derive(Debug, Clone)]
pub struct Item {
    id: Option<ItemId>,
    data_type: String,
    cells: Vec<BTreeMap<ItemRole, ItemData>>,
    flags: Vec<ItemFlags>,
    edit: EditState,
    total_child_count: Option<usize>,
    staged: Vec<Item>,
    parent: Option<ItemKey>,
    children: Vec<ItemKey>,
    row: Option<usize>,
}

impl Item {
    /// Creates an item without id (synthetic or header node).
    pub fn new(data_type: impl Into<String>, columns: usize) -> Self {
        Self {
            id: None,
            data_type: data_type.into(),
            cells: vec![BTreeMap::new(); columns],
            flags: vec![ItemFlags::new(); columns],
            edit: EditState::default(),
            total_child_count: None,
            staged: Vec::new(),
            parent: None,
            children: Vec::new(),
            row: None,
        }
    }

    /// Creates an item carrying a backend id.
    pub fn with_id(id: impl Into<ItemId>, data_type: impl Into<String>, columns: usize) -> Self {
        let mut item = Self::new(data_type, columns);
        item.id = Some(id.into());
        item
    }

    /// Builder: sets a cell value.
    pub fn with_data(mut self, column: usize, role: ItemRole, value: impl Into<ItemData>) -> Self {
        self.set_data(value.into(), column, role);
        self
    }

    /// Builder: applies `flags` to every column.
    pub fn with_flags(mut self, flags: ItemFlags) -> Self {
        self.flags.iter_mut().for_each(|f| *f = flags);
        self
    }

    /// Builder: stages children to be inserted together with this item.
    pub fn with_children(mut self, children: Vec<Item>) -> Self {
        self.staged.extend(children);
        self
    }

    /// Builder: marks the child count as known.
    pub fn with_total_child_count(mut self, total: usize) -> Self {
        self.total_child_count = Some(total);
        self
    }

    /// Backend id, absent for synthetic nodes.
    pub fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    /// Data type tag (e.g. `"Asset"`, `"Shot"`).
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.cells.len()
    }

    fn check_column(&self, column: usize) {
        assert!(
            column < self.cells.len(),
            "column {column} out of range for item with {} columns",
            self.cells.len()
        );
    }

    /// Value of `role` in `column`.
    ///
    /// # Panics
    ///
    /// Panics if `column` is out of range.
    pub fn data(&self, column: usize, role: ItemRole) -> &ItemData {
        self.check_column(column);
        self.cells[column]
            .get(&role)
            .unwrap_or(&super::role::NO_DATA)
    }

    /// Value of `role` in `column`, or `None` if the column does not exist.
    pub fn try_data(&self, column: usize, role: ItemRole) -> Option<&ItemData> {
        let cell = self.cells.get(column)?;
        Some(cell.get(&role).unwrap_or(&super::role::NO_DATA))
    }

    /// Sets `role` in `column`. Setting [`ItemData::None`] clears the role.
    ///
    /// Returns `true` if the stored value changed.
    ///
    /// # Panics
    ///
    /// Panics if `column` is out of range.
    pub fn set_data(&mut self, value: ItemData, column: usize, role: ItemRole) -> bool {
        self.check_column(column);
        let cell = &mut self.cells[column];
        if value.is_none() {
            cell.remove(&role).is_some()
        } else if cell.get(&role) == Some(&value) {
            false
        } else {
            cell.insert(role, value);
            true
        }
    }

    /// All cells, indexed by column.
    pub fn cells(&self) -> &[BTreeMap<ItemRole, ItemData>] {
        &self.cells
    }

    /// Replaces the cell of `column` wholesale.
    pub(crate) fn set_cell(&mut self, column: usize, cell: BTreeMap<ItemRole, ItemData>) {
        self.check_column(column);
        self.cells[column] = cell;
    }

    /// Flags of `column`.
    pub fn flags(&self, column: usize) -> ItemFlags {
        self.check_column(column);
        self.flags[column]
    }

    /// Sets the flags of `column`.
    pub fn set_flags(&mut self, column: usize, flags: ItemFlags) {
        self.check_column(column);
        self.flags[column] = flags;
    }

    /// Check state of `column`.
    pub fn check_state(&self, column: usize) -> CheckState {
        self.data(column, ItemRole::CheckState)
            .as_check_state()
            .unwrap_or_default()
    }

    /// Sets the check state of `column` on this item only.
    ///
    /// Returns `true` if the state changed. Use
    /// [`ItemStore::set_check_state`](super::ItemStore::set_check_state) to
    /// propagate through the tree.
    pub fn set_check_state(&mut self, column: usize, state: CheckState) -> bool {
        let changed = self.check_state(column) != state;
        if changed {
            self.cells[column].insert(ItemRole::CheckState, ItemData::CheckState(state));
        }
        changed
    }

    /// Known number of children. `None` means not yet populated.
    pub fn total_child_count(&self) -> Option<usize> {
        self.total_child_count
    }

    /// Sets the known number of children.
    ///
    /// # Panics
    ///
    /// Panics if a known total is smaller than the number of loaded children.
    pub fn set_total_child_count(&mut self, total: Option<usize>) {
        if let Some(total) = total {
            assert!(
                total >= self.children.len(),
                "total child count {total} below {} loaded children",
                self.children.len()
            );
        }
        self.total_child_count = total;
    }

    /// Number of attached children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Keys of the attached children, in row order.
    pub fn children(&self) -> &[ItemKey] {
        &self.children
    }

    /// Key of the child at `row`.
    pub fn child(&self, row: usize) -> Option<ItemKey> {
        self.children.get(row).copied()
    }

    /// Key of the parent, `None` for the root and detached items.
    pub fn parent(&self) -> Option<ItemKey> {
        self.parent
    }

    /// Row inside the parent, `None` for the root and detached items.
    pub fn row(&self) -> Option<usize> {
        self.row
    }

    /// Staged (not yet inserted) children of a detached item.
    pub fn staged_children(&self) -> &[Item] {
        &self.staged
    }

    /// Pending edit state.
    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    /// Adds an edit kind. `parent_id` is the id of the current parent, used
    /// as the MOVE baseline.
    pub fn add_edit(&mut self, kind: EditKind, parent_id: Option<&ItemId>) {
        self.edit.add(kind, &self.cells, parent_id);
    }

    /// Diff between the current state and the edit baseline.
    ///
    /// Returns `None` for unedited items and items without id.
    pub fn get_edit(&self, parent_id: Option<&ItemId>) -> Option<DiffRecord> {
        let id = self.id.as_ref()?;
        self.edit.diff(id, &self.data_type, &self.cells, parent_id)
    }

    /// Clears pending edits and the baseline.
    pub fn clear_edit(&mut self) {
        self.edit.clear();
    }

    fn insert_columns(&mut self, position: usize, count: usize) {
        let position = position.min(self.cells.len());
        self.cells
            .splice(position..position, std::iter::repeat_n(BTreeMap::new(), count));
        self.flags
            .splice(position..position, std::iter::repeat_n(ItemFlags::new(), count));
    }

    fn remove_columns(&mut self, position: usize, count: usize) {
        let end = (position + count).min(self.cells.len());
        let position = position.min(end);
        self.cells.drain(position..end);
        self.flags.drain(position..end);
    }
}

/// Arena owning every attached item.
///
/// The root is created with the tree and never removed.
#[derive(Debug)]
pub struct ItemTree {
    items: SlotMap<ItemKey, Item>,
    root: ItemKey,
}

impl ItemTree {
    /// Creates a tree around `root`.
    pub fn new(root: Item) -> Self {
        let mut items = SlotMap::with_key();
        let root = items.insert(Item {
            parent: None,
            row: None,
            children: Vec::new(),
            ..root
        });
        Self { items, root }
    }

    /// Key of the root.
    pub fn root(&self) -> ItemKey {
        self.root
    }

    /// Number of attached items, root included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if only the root is attached.
    pub fn is_empty(&self) -> bool {
        self.items.len() <= 1
    }

    /// Column count shared by every node.
    pub fn column_count(&self) -> usize {
        self.items[self.root].column_count()
    }

    /// Returns `true` if `key` is attached.
    pub fn contains(&self, key: ItemKey) -> bool {
        self.items.contains_key(key)
    }

    /// Item for `key`.
    pub fn get(&self, key: ItemKey) -> Option<&Item> {
        self.items.get(key)
    }

    /// Mutable item for `key`.
    pub fn get_mut(&mut self, key: ItemKey) -> Option<&mut Item> {
        self.items.get_mut(key)
    }

    /// Key of the child of `parent` at `row`.
    pub fn child_at(&self, parent: ItemKey, row: usize) -> Option<ItemKey> {
        self.items.get(parent)?.child(row)
    }

    /// Parent of `key`.
    pub fn parent_of(&self, key: ItemKey) -> Option<ItemKey> {
        self.items.get(key)?.parent
    }

    /// Id of the parent of `key`, `None` at the top level.
    pub fn parent_id_of(&self, key: ItemKey) -> Option<&ItemId> {
        let parent = self.parent_of(key)?;
        self.items.get(parent)?.id()
    }

    /// Returns `true` if `ancestor` is `key` or one of its ancestors.
    pub fn is_ancestor_of(&self, ancestor: ItemKey, key: ItemKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.parent_of(k);
        }
        false
    }

    /// Breadth-first traversal below `key`.
    ///
    /// The traversal is computed on each call, so it reflects the tree at
    /// the moment it was created and can be restarted freely.
    pub fn subtree(&self, key: ItemKey, include_self: bool) -> Subtree<'_> {
        let mut queue = VecDeque::new();
        if let Some(item) = self.items.get(key) {
            if include_self {
                queue.push_back(key);
            } else {
                queue.extend(item.children.iter().copied());
            }
        }
        Subtree { tree: self, queue }
    }

    /// Inserts `items` (and their staged children) under `parent` at
    /// `position`. Returns the keys of the top-level inserted items.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is unknown, `position` is out of range, an item
    /// has the wrong column count or is already attached somewhere.
    pub fn insert_children(
        &mut self,
        parent: ItemKey,
        position: usize,
        items: Vec<Item>,
    ) -> Vec<ItemKey> {
        let columns = self.column_count();
        let child_count = self.items[parent].children.len();
        assert!(
            position <= child_count,
            "insert position {position} beyond {child_count} children"
        );

        let mut keys = Vec::with_capacity(items.len());
        for mut item in items {
            assert!(
                item.row.is_none() && item.parent.is_none(),
                "item {:?} is already attached to a tree",
                item.id
            );
            assert_eq!(
                item.column_count(),
                columns,
                "item {:?} has {} columns, tree has {columns}",
                item.id,
                item.column_count()
            );
            let staged = std::mem::take(&mut item.staged);
            item.parent = Some(parent);
            let key = self.items.insert(item);
            if !staged.is_empty() {
                let count = staged.len();
                self.insert_children(key, 0, staged);
                let item = &mut self.items[key];
                if item.total_child_count.is_none() {
                    item.total_child_count = Some(count);
                }
            }
            keys.push(key);
        }

        self.items[parent]
            .children
            .splice(position..position, keys.iter().copied());
        self.renumber(parent, position);
        keys
    }

    /// Re-attaches previously detached keys under `parent` at `position`.
    pub(crate) fn attach_children(&mut self, parent: ItemKey, position: usize, keys: &[ItemKey]) {
        for key in keys {
            let item = &mut self.items[*key];
            assert!(item.parent.is_none(), "item is already attached");
            item.parent = Some(parent);
        }
        self.items[parent]
            .children
            .splice(position..position, keys.iter().copied());
        self.renumber(parent, position);
    }

    /// Detaches `count` children of `parent` starting at `position`,
    /// keeping them (and their subtrees) in the arena.
    pub(crate) fn take_children(
        &mut self,
        parent: ItemKey,
        position: usize,
        count: usize,
    ) -> Vec<ItemKey> {
        let taken: Vec<ItemKey> = self.items[parent]
            .children
            .drain(position..position + count)
            .collect();
        for key in &taken {
            let item = &mut self.items[*key];
            item.parent = None;
            item.row = None;
        }
        self.renumber(parent, position);
        taken
    }

    /// Removes `count` children of `parent` starting at `position`.
    ///
    /// The removed subtrees leave the arena and are returned as detached
    /// items whose descendants are restaged.
    pub fn remove_children(&mut self, parent: ItemKey, position: usize, count: usize) -> Vec<Item> {
        self.take_children(parent, position, count)
            .into_iter()
            .filter_map(|key| self.detach_subtree(key))
            .collect()
    }

    /// Removes every child of `parent`.
    pub fn remove_all_children(&mut self, parent: ItemKey) -> Vec<Item> {
        let count = self.items[parent].children.len();
        self.remove_children(parent, 0, count)
    }

    fn detach_subtree(&mut self, key: ItemKey) -> Option<Item> {
        let mut item = self.items.remove(key)?;
        let children = std::mem::take(&mut item.children);
        item.staged = children
            .into_iter()
            .filter_map(|child| self.detach_subtree(child))
            .collect();
        item.parent = None;
        item.row = None;
        Some(item)
    }

    /// Reorders the children of `parent` with `compare` (stable).
    pub(crate) fn sort_children<F>(&mut self, parent: ItemKey, mut compare: F)
    where
        F: FnMut(&Item, &Item) -> Ordering,
    {
        let mut children = std::mem::take(&mut self.items[parent].children);
        children.sort_by(|a, b| compare(&self.items[*a], &self.items[*b]));
        self.items[parent].children = children;
        self.renumber(parent, 0);
    }

    /// Inserts `count` empty columns at `position` in every node.
    pub fn insert_columns(&mut self, position: usize, count: usize) {
        for item in self.items.values_mut() {
            item.insert_columns(position, count);
        }
    }

    /// Removes `count` columns at `position` from every node.
    pub fn remove_columns(&mut self, position: usize, count: usize) {
        for item in self.items.values_mut() {
            item.remove_columns(position, count);
        }
    }

    fn renumber(&mut self, parent: ItemKey, from: usize) {
        let children = self.items[parent].children.clone();
        for (row, key) in children.iter().enumerate().skip(from) {
            self.items[*key].row = Some(row);
        }
    }
}

/// Breadth-first iterator over item keys, see [`ItemTree::subtree`].
pub struct Subtree<'a> {
    tree: &'a ItemTree,
    queue: VecDeque<ItemKey>,
}

impl Iterator for Subtree<'_> {
    type Item = ItemKey;

    fn next(&mut self) -> Option<ItemKey> {
        let key = self.queue.pop_front()?;
        if let Some(item) = self.tree.get(key) {
            self.queue.extend(item.children.iter().copied());
        }
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str) -> Item {
        Item::with_id(id, "Asset", 2).with_data(0, ItemRole::Display, id)
    }

    fn tree() -> ItemTree {
        ItemTree::new(Item::new("Root", 2))
    }

    fn ids(tree: &ItemTree, keys: impl IntoIterator<Item = ItemKey>) -> Vec<String> {
        keys.into_iter()
            .filter_map(|k| tree.get(k)?.id().map(|id| id.to_string()))
            .collect()
    }

    #[test]
    fn test_data_defaults_to_none() {
        let mut item = named("a");
        assert_eq!(item.data(1, ItemRole::Display), &ItemData::None);
        assert!(item.set_data("x".into(), 1, ItemRole::Display));
        assert!(!item.set_data("x".into(), 1, ItemRole::Display));
        assert!(item.set_data(ItemData::None, 1, ItemRole::Display));
        assert!(item.cells()[1].is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_data_out_of_range_panics() {
        let item = named("a");
        let _ = item.data(5, ItemRole::Display);
    }

    #[test]
    fn test_try_data_out_of_range() {
        assert!(named("a").try_data(9, ItemRole::Display).is_none());
    }

    #[test]
    fn test_insert_children_keeps_rows_in_sync() {
        let mut tree = tree();
        let root = tree.root();
        tree.insert_children(root, 0, vec![named("a"), named("c")]);
        tree.insert_children(root, 1, vec![named("b")]);

        let root_item = tree.get(root).unwrap();
        for (row, key) in root_item.children().iter().enumerate() {
            assert_eq!(tree.get(*key).unwrap().row(), Some(row));
            assert_eq!(tree.parent_of(*key), Some(root));
        }
        assert_eq!(ids(&tree, root_item.children().to_vec()), ["a", "b", "c"]);
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn test_double_insert_panics() {
        let mut tree = tree();
        let root = tree.root();
        let key = tree.insert_children(root, 0, vec![named("a")])[0];
        let attached = tree.get(key).unwrap().clone();
        tree.insert_children(root, 0, vec![attached]);
    }

    #[test]
    fn test_staged_children_are_inserted() {
        let mut tree = tree();
        let root = tree.root();
        let seq = named("seq").with_children(vec![
            named("sh010").with_children(vec![named("comp")]),
            named("sh020"),
        ]);
        let key = tree.insert_children(root, 0, vec![seq])[0];

        assert_eq!(tree.len(), 5);
        assert_eq!(
            ids(&tree, tree.subtree(key, true)),
            ["seq", "sh010", "sh020", "comp"]
        );
        assert_eq!(ids(&tree, tree.subtree(key, false)), ["sh010", "sh020", "comp"]);
        assert_eq!(tree.get(key).unwrap().total_child_count(), Some(2));
        let sh020 = tree.child_at(key, 1).unwrap();
        assert_eq!(tree.get(sh020).unwrap().total_child_count(), None);
    }

    #[test]
    fn test_remove_children_restages_subtree() {
        let mut tree = tree();
        let root = tree.root();
        tree.insert_children(
            root,
            0,
            vec![named("a").with_children(vec![named("a1")]), named("b")],
        );

        let removed = tree.remove_children(root, 0, 1);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].staged_children().len(), 1);
        assert_eq!(tree.len(), 2);

        let b = tree.child_at(root, 0).unwrap();
        assert_eq!(tree.get(b).unwrap().row(), Some(0));

        // A removed subtree can be inserted again.
        tree.insert_children(root, 1, removed);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_take_and_attach() {
        let mut tree = tree();
        let root = tree.root();
        let keys = tree.insert_children(root, 0, vec![named("a"), named("b"), named("c")]);
        let taken = tree.take_children(root, 0, 1);
        assert_eq!(taken, vec![keys[0]]);
        assert!(tree.get(keys[0]).unwrap().parent().is_none());

        tree.attach_children(keys[2], 0, &taken);
        assert_eq!(tree.parent_of(keys[0]), Some(keys[2]));
        assert!(tree.is_ancestor_of(keys[2], keys[0]));
        assert!(!tree.is_ancestor_of(keys[0], keys[2]));
    }

    #[test]
    fn test_insert_and_remove_columns_reach_every_node() {
        let mut tree = tree();
        let root = tree.root();
        let key = tree.insert_children(root, 0, vec![named("a").with_children(vec![named("b")])])[0];
        tree.insert_columns(0, 2);
        assert_eq!(tree.column_count(), 4);
        for k in tree.subtree(root, true) {
            assert_eq!(tree.get(k).unwrap().column_count(), 4);
        }
        assert_eq!(
            tree.get(key).unwrap().data(2, ItemRole::Display),
            &ItemData::from("a")
        );

        tree.remove_columns(1, 2);
        assert_eq!(tree.get(key).unwrap().column_count(), 2);
        assert_eq!(
            tree.get(key).unwrap().data(1, ItemRole::Display),
            &ItemData::None
        );
    }

    #[test]
    fn test_check_state_lives_in_cells() {
        let mut item = named("a");
        assert_eq!(item.check_state(0), CheckState::Unchecked);
        assert!(item.set_check_state(0, CheckState::Checked));
        assert!(!item.set_check_state(0, CheckState::Checked));
        assert_eq!(
            item.data(0, ItemRole::CheckState),
            &ItemData::CheckState(CheckState::Checked)
        );
    }

    #[test]
    #[should_panic(expected = "below")]
    fn test_total_child_count_cannot_undercut_loaded() {
        let mut tree = tree();
        let root = tree.root();
        tree.insert_children(root, 0, vec![named("a"), named("b")]);
        tree.get_mut(root).unwrap().set_total_child_count(Some(1));
    }

    #[test]
    fn test_get_edit_requires_id() {
        let mut item = Item::new("Header", 1);
        item.add_edit(EditKind::Delete, None);
        assert!(item.get_edit(None).is_none());

        let mut item = named("a");
        item.add_edit(EditKind::Delete, None);
        assert!(item.get_edit(None).is_some());
        item.clear_edit();
        assert!(item.get_edit(None).is_none());
    }
}
