//! The item store: owner of the item tree.
//!
//! `ItemStore` mediates every access to the tree. It addresses items by
//! [`ModelIndex`] or [`ItemKey`], keeps the id index in sync with structural
//! mutations, drives lazy fetching from a bound [`DataSource`], sorts,
//! propagates check state and captures, replays and reverts pending edits.
//!
//! Every mutation is announced on [`StoreSignals`] after it has been applied.
//!
//! # Example
//!
//! ```
//! use asset_lattice::model::{ColumnSpec, ColumnType, Item, ItemRole, ItemStore, ModelIndex};
//! use asset_lattice::StoreConfig;
//!
//! let mut store = ItemStore::new(
//!     vec![ColumnSpec::new("Name", ColumnType::Text)],
//!     StoreConfig::default(),
//! );
//! let keys = store
//!     .insert_items(
//!         0,
//!         vec![Item::with_id("a1", "Asset", 1).with_data(0, ItemRole::Display, "hero")],
//!         &ModelIndex::invalid(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(store.row_count(&ModelIndex::invalid()), 1);
//! assert_eq!(store.find_item(&"a1".into()), Some(keys[0]));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use asset_lattice_core::logging::span_names;
use asset_lattice_core::{PerfSpan, store_debug, store_trace, store_warn};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use super::comparator::{Comparator, SortCriteria, SortDirection};
use super::edit::{ColumnData, DiffRecord, EditKind};
use super::index::ModelIndex;
use super::item::{Item, ItemFlags, ItemId, ItemKey, ItemTree};
use super::role::{CheckState, ColumnType, ItemData, ItemRole, NO_DATA, ROLE_SET_VERSION};
use super::signals::{ChangeEvent, ChangeKind, StoreSignals};
use super::source::{DataSource, FetchRequest};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

new_key_type! {
    /// Handle of a persistent index, see [`ItemStore::persist`].
    pub struct PersistentId;
}

/// Declared title and type of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Header title.
    pub title: String,
    /// Data type, drives comparison and default sort direction.
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Creates a column spec.
    pub fn new(title: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            title: title.into(),
            column_type,
        }
    }
}

/// Siblings selected together, in row order.
struct Segment {
    parent: ItemKey,
    keys: Vec<ItemKey>,
}

/// Lazy-loading hierarchical item store.
pub struct ItemStore {
    tree: ItemTree,
    id_index: HashMap<ItemId, ItemKey>,
    column_types: Vec<ColumnType>,
    comparator: Comparator,
    config: StoreConfig,
    source: Option<Box<dyn DataSource + Send>>,
    persistent: SlotMap<PersistentId, (ItemKey, usize)>,
    /// Sort each partly fetched node's children were requested under.
    fetch_sorts: SecondaryMap<ItemKey, SortCriteria>,
    signals: StoreSignals,
    id_index_repairs: usize,
}

static_assertions::assert_impl_all!(ItemStore: Send);

impl std::fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStore")
            .field("items", &self.tree.len())
            .field("columns", &self.column_types)
            .field("sort", self.comparator.sort())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl ItemStore {
    /// Creates an empty store with the given columns.
    ///
    /// The synthesized root carries the column titles as header data.
    pub fn new(columns: Vec<ColumnSpec>, config: StoreConfig) -> Self {
        let mut root = Item::new("Root", columns.len());
        for (column, spec) in columns.iter().enumerate() {
            root.set_data(spec.title.as_str().into(), column, ItemRole::Display);
        }
        let column_types: Vec<ColumnType> = columns.iter().map(|c| c.column_type).collect();
        let comparator =
            Comparator::new(column_types.clone()).with_max_columns(config.max_sort_columns);

        Self {
            tree: ItemTree::new(root),
            id_index: HashMap::new(),
            column_types,
            comparator,
            config,
            source: None,
            persistent: SlotMap::with_key(),
            fetch_sorts: SecondaryMap::new(),
            signals: StoreSignals::new(),
            id_index_repairs: 0,
        }
    }

    /// Builder: binds a data source.
    pub fn with_source(mut self, source: impl DataSource + Send + 'static) -> Self {
        self.set_source(source);
        self
    }

    /// Binds a data source, replacing any previous one.
    pub fn set_source(&mut self, source: impl DataSource + Send + 'static) {
        self.source = Some(Box::new(source));
    }

    /// Store settings.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Change notifications.
    pub fn signals(&self) -> &StoreSignals {
        &self.signals
    }

    /// The underlying tree.
    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    /// The comparator used for sorting.
    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Declared column types.
    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    // -------------------------------------------------------------------------
    // Addressing
    // -------------------------------------------------------------------------

    /// Resolves an index to an arena key. The invalid index is the root.
    pub fn key_for(&self, index: &ModelIndex) -> Option<ItemKey> {
        match index.item_key() {
            None => Some(self.tree.root()),
            Some(key) if self.tree.contains(key) => Some(key),
            Some(_) => None,
        }
    }

    /// Index of `key` at `column`. The root maps to the invalid index.
    pub fn index_from_key(&self, key: ItemKey, column: usize) -> ModelIndex {
        if key == self.tree.root() {
            return ModelIndex::invalid();
        }
        match self.tree.get(key).and_then(Item::row) {
            Some(row) => ModelIndex::new(row, column, key),
            None => ModelIndex::invalid(),
        }
    }

    /// Index of the item with `id`.
    pub fn index_from_item(&mut self, id: &ItemId, column: usize) -> ModelIndex {
        match self.find_item(id) {
            Some(key) => self.index_from_key(key, column),
            None => ModelIndex::invalid(),
        }
    }

    /// Item addressed by `index`. The invalid index yields the root.
    pub fn item_from_index(&self, index: &ModelIndex) -> Option<&Item> {
        self.tree.get(self.key_for(index)?)
    }

    /// Item for `key`.
    pub fn item(&self, key: ItemKey) -> Option<&Item> {
        self.tree.get(key)
    }

    /// Index of the child at `row` / `column` under `parent`.
    pub fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        if column >= self.column_count() {
            return ModelIndex::invalid();
        }
        self.key_for(parent)
            .and_then(|parent| self.tree.child_at(parent, row))
            .map_or(ModelIndex::invalid(), |key| ModelIndex::new(row, column, key))
    }

    /// Parent of `index`. Top-level items have the invalid index as parent.
    pub fn parent(&self, index: &ModelIndex) -> ModelIndex {
        index
            .item_key()
            .and_then(|key| self.tree.parent_of(key))
            .map_or(ModelIndex::invalid(), |parent| self.index_from_key(parent, 0))
    }

    /// Number of loaded children of `parent`.
    pub fn row_count(&self, parent: &ModelIndex) -> usize {
        self.item_from_index(parent).map_or(0, Item::child_count)
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.tree.column_count()
    }

    /// Returns `true` if `parent` has loaded children or may have more.
    pub fn has_children(&self, parent: &ModelIndex) -> bool {
        self.row_count(parent) > 0 || self.can_fetch_more(parent)
    }

    /// Value of `role` at `index`.
    pub fn data(&self, index: &ModelIndex, role: ItemRole) -> ItemData {
        if !index.is_valid() {
            return ItemData::None;
        }
        self.item_from_index(index)
            .and_then(|item| item.try_data(index.column(), role))
            .cloned()
            .unwrap_or_default()
    }

    /// Flags at `index`.
    pub fn flags(&self, index: &ModelIndex) -> ItemFlags {
        if !index.is_valid() {
            return ItemFlags::default();
        }
        self.item_from_index(index)
            .filter(|item| index.column() < item.column_count())
            .map_or(ItemFlags::default(), |item| item.flags(index.column()))
    }

    /// Sets the flags at `index`.
    pub fn set_flags(&mut self, index: &ModelIndex, flags: ItemFlags) -> StoreResult<()> {
        let key = self.valid_key(index)?;
        if let Some(item) = self.tree.get_mut(key) {
            item.set_flags(index.column(), flags);
        }
        Ok(())
    }

    /// Header value of `section`.
    pub fn header_data(&self, section: usize, role: ItemRole) -> &ItemData {
        self.tree
            .get(self.tree.root())
            .and_then(|root| root.try_data(section, role))
            .unwrap_or(&NO_DATA)
    }

    /// Sets a header value. Returns `true` if it changed.
    pub fn set_header_data(&mut self, section: usize, value: ItemData, role: ItemRole) -> bool {
        if section >= self.column_count() {
            return false;
        }
        let root = self.tree.root();
        let changed = self
            .tree
            .get_mut(root)
            .is_some_and(|item| item.set_data(value, section, role));
        if changed {
            self.signals.header_data_changed.emit((section, section));
        }
        changed
    }

    /// Looks up an item by id.
    ///
    /// The id index is the fast path. On a stale or missing entry the whole
    /// tree is scanned (O(n)) and the entry repaired; every such scan is
    /// counted by [`id_index_repairs`](Self::id_index_repairs).
    pub fn find_item(&mut self, id: &ItemId) -> Option<ItemKey> {
        if let Some(&key) = self.id_index.get(id)
            && self.tree.get(key).and_then(Item::id) == Some(id)
        {
            return Some(key);
        }

        self.id_index_repairs += 1;
        let root = self.tree.root();
        let found = self
            .tree
            .subtree(root, false)
            .find(|&key| self.tree.get(key).and_then(Item::id) == Some(id));
        match found {
            Some(key) => {
                store_debug!(%id, "repaired id index entry");
                self.id_index.insert(id.clone(), key);
            }
            None => {
                self.id_index.remove(id);
            }
        }
        found
    }

    /// Number of O(n) fallback scans performed by [`find_item`](Self::find_item).
    pub fn id_index_repairs(&self) -> usize {
        self.id_index_repairs
    }

    /// Number of ids in the id index.
    pub fn indexed_id_count(&self) -> usize {
        self.id_index.len()
    }

    fn valid_key(&self, index: &ModelIndex) -> StoreResult<ItemKey> {
        let key = index.item_key().ok_or(StoreError::InvalidIndex)?;
        if !self.tree.contains(key) || index.column() >= self.column_count() {
            return Err(StoreError::InvalidIndex);
        }
        Ok(key)
    }

    fn child_count_of(&self, key: ItemKey) -> usize {
        self.tree.get(key).map_or(0, Item::child_count)
    }

    fn emit(&self, event: ChangeEvent) {
        store_trace!(kind = ?event.kind, first = event.first_row, last = event.last_row, "change");
        self.signals.changed.emit(event);
    }

    // -------------------------------------------------------------------------
    // Id index bookkeeping
    // -------------------------------------------------------------------------

    fn register_subtree(&mut self, key: ItemKey) {
        let entries: Vec<(ItemId, ItemKey)> = self
            .tree
            .subtree(key, true)
            .filter_map(|k| Some((self.tree.get(k)?.id()?.clone(), k)))
            .collect();
        for (id, k) in entries {
            if let Some(&existing) = self.id_index.get(&id) {
                assert!(
                    existing == k || !self.tree.contains(existing),
                    "duplicate item id {id}"
                );
            }
            self.id_index.insert(id, k);
        }
    }

    fn unregister_subtree(&mut self, key: ItemKey) {
        let entries: Vec<(ItemId, ItemKey)> = self
            .tree
            .subtree(key, true)
            .filter_map(|k| Some((self.tree.get(k)?.id()?.clone(), k)))
            .collect();
        for (id, k) in entries {
            if self.id_index.get(&id) == Some(&k) {
                self.id_index.remove(&id);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Reset
    // -------------------------------------------------------------------------

    /// Replaces all top-level items and rebuilds the id index.
    ///
    /// The root's child count becomes known. Listeners receive a single
    /// `model_reset`.
    pub fn set_items(&mut self, items: Vec<Item>) {
        let root = self.tree.root();
        self.tree.remove_all_children(root);
        self.id_index.clear();
        self.persistent.clear();
        self.fetch_sorts.clear();

        let count = items.len();
        let keys = self.tree.insert_children(root, 0, items);
        for key in keys {
            self.register_subtree(key);
        }
        if let Some(root_item) = self.tree.get_mut(root) {
            root_item.set_total_child_count(Some(count));
        }
        store_debug!(count, "items replaced");
        self.signals.model_reset.emit(());
    }

    /// Drops every item and marks the root unpopulated, so the next
    /// [`fetch_more`](Self::fetch_more) queries again.
    pub fn reset(&mut self) {
        let root = self.tree.root();
        self.tree.remove_all_children(root);
        self.id_index.clear();
        self.persistent.clear();
        self.fetch_sorts.clear();
        if let Some(root_item) = self.tree.get_mut(root) {
            root_item.set_total_child_count(None);
        }
        store_debug!("store reset");
        self.signals.model_reset.emit(());
    }

    // -------------------------------------------------------------------------
    // Insert / remove
    // -------------------------------------------------------------------------

    /// Inserts `items` under `parent` at `position`.
    ///
    /// Ids of the items and all their staged descendants are registered. A
    /// known child total of `parent` grows by the number of items.
    ///
    /// # Panics
    ///
    /// Panics if an id is already present in the store.
    pub fn insert_items(
        &mut self,
        position: usize,
        items: Vec<Item>,
        parent: &ModelIndex,
    ) -> StoreResult<Vec<ItemKey>> {
        let parent_key = self.key_for(parent).ok_or(StoreError::InvalidIndex)?;
        let count = self.child_count_of(parent_key);
        if position > count {
            return Err(StoreError::InvalidPosition { position, count });
        }
        let added = items.len();
        let keys = self.insert_children(parent_key, position, items);
        if let Some(item) = self.tree.get_mut(parent_key)
            && let Some(total) = item.total_child_count()
        {
            item.set_total_child_count(Some(total + added));
        }
        Ok(keys)
    }

    fn insert_children(&mut self, parent: ItemKey, position: usize, items: Vec<Item>) -> Vec<ItemKey> {
        if items.is_empty() {
            return Vec::new();
        }
        let keys = self.tree.insert_children(parent, position, items);
        for key in &keys {
            self.register_subtree(*key);
        }
        let parent_index = self.index_from_key(parent, 0);
        self.emit(ChangeEvent::insert(parent_index, position, position + keys.len() - 1));
        keys
    }

    /// Removes an arbitrary set of items.
    ///
    /// Items below another selected item go with their ancestor. The rest
    /// is split into runs of consecutive siblings, removed in reverse row
    /// order so every announced range is valid when emitted. Returns the
    /// removed items, detached, with their descendants restaged.
    ///
    /// # Panics
    ///
    /// Panics if a key is the root or not owned by this store.
    pub fn remove_items(&mut self, keys: &[ItemKey]) -> Vec<Item> {
        let mut removed = Vec::new();
        for segment in self.segments(keys).into_iter().rev() {
            for (first, count) in self.runs(&segment).into_iter().rev() {
                removed.extend(self.remove_rows(segment.parent, first, count));
            }
        }
        self.persistent.retain(|_, (key, _)| self.tree.contains(*key));
        removed
    }

    /// Removes `count` rows of `parent` starting at `first_row`.
    pub fn remove_rows_at(
        &mut self,
        first_row: usize,
        count: usize,
        parent: &ModelIndex,
    ) -> StoreResult<Vec<Item>> {
        let parent_key = self.key_for(parent).ok_or(StoreError::InvalidIndex)?;
        let children = self.child_count_of(parent_key);
        if first_row + count > children {
            return Err(StoreError::InvalidPosition {
                position: first_row + count,
                count: children,
            });
        }
        let removed = self.remove_rows(parent_key, first_row, count);
        self.persistent.retain(|_, (key, _)| self.tree.contains(*key));
        Ok(removed)
    }

    fn remove_rows(&mut self, parent: ItemKey, first: usize, count: usize) -> Vec<Item> {
        if count == 0 {
            return Vec::new();
        }
        let keys: Vec<ItemKey> = self
            .tree
            .get(parent)
            .map(|item| item.children()[first..first + count].to_vec())
            .unwrap_or_default();
        for key in keys {
            self.unregister_subtree(key);
        }
        let removed = self.tree.remove_children(parent, first, count);
        if let Some(item) = self.tree.get_mut(parent)
            && let Some(total) = item.total_child_count()
        {
            item.set_total_child_count(Some(total.saturating_sub(count)));
        }
        let parent_index = self.index_from_key(parent, 0);
        self.emit(ChangeEvent::remove(parent_index, first, first + count - 1));
        removed
    }

    /// Groups `keys` by parent into runs of consecutive rows.
    ///
    /// Segments come out grouped by parent (in order of first appearance)
    /// and sorted by row within a parent.
    fn segments(&self, keys: &[ItemKey]) -> Vec<Segment> {
        let root = self.tree.root();
        let selected: HashSet<ItemKey> = keys.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut groups: Vec<(ItemKey, Vec<(usize, ItemKey)>)> = Vec::new();

        for &key in keys {
            assert!(
                key != root && self.tree.contains(key),
                "item {key:?} is not owned by this store"
            );
            if !seen.insert(key) {
                continue;
            }
            let mut ancestor = self.tree.parent_of(key);
            let mut covered = false;
            while let Some(a) = ancestor {
                if selected.contains(&a) {
                    covered = true;
                    break;
                }
                ancestor = self.tree.parent_of(a);
            }
            if covered {
                continue;
            }

            let (Some(parent), Some(row)) = (
                self.tree.parent_of(key),
                self.tree.get(key).and_then(Item::row),
            ) else {
                continue;
            };
            match groups.iter_mut().find(|(p, _)| *p == parent) {
                Some((_, rows)) => rows.push((row, key)),
                None => groups.push((parent, vec![(row, key)])),
            }
        }

        let mut segments = Vec::new();
        for (parent, mut rows) in groups {
            rows.sort_by_key(|(row, _)| *row);
            let mut current: Vec<ItemKey> = Vec::new();
            let mut previous: Option<usize> = None;
            for (row, key) in rows {
                if previous.is_some_and(|p| p + 1 != row) && !current.is_empty() {
                    segments.push(Segment {
                        parent,
                        keys: std::mem::take(&mut current),
                    });
                }
                current.push(key);
                previous = Some(row);
            }
            if !current.is_empty() {
                segments.push(Segment {
                    parent,
                    keys: current,
                });
            }
        }
        segments
    }

    /// Current `(first_row, count)` runs of a segment's keys.
    ///
    /// A segment can be split by earlier moves landing inside it.
    fn runs(&self, segment: &Segment) -> Vec<(usize, usize)> {
        let mut rows: Vec<usize> = segment
            .keys
            .iter()
            .filter(|key| self.tree.parent_of(**key) == Some(segment.parent))
            .filter_map(|key| self.tree.get(*key).and_then(Item::row))
            .collect();
        rows.sort_unstable();

        let mut runs: Vec<(usize, usize)> = Vec::new();
        for row in rows {
            match runs.last_mut() {
                Some((first, count)) if *first + *count == row => *count += 1,
                _ => runs.push((row, 1)),
            }
        }
        runs
    }

    // -------------------------------------------------------------------------
    // Move
    // -------------------------------------------------------------------------

    /// Moves an arbitrary set of items under `to_parent`, dropped onto
    /// `to_position`.
    ///
    /// The moved items end up contiguous and in their original order. Fails
    /// without mutating anything if `to_parent` is one of the moved items or
    /// below one of them.
    pub fn move_items(
        &mut self,
        keys: &[ItemKey],
        to_position: usize,
        to_parent: &ModelIndex,
    ) -> StoreResult<()> {
        let dest = self.key_for(to_parent).ok_or(StoreError::InvalidIndex)?;
        if keys.iter().any(|key| self.tree.is_ancestor_of(*key, dest)) {
            return Err(StoreError::CircularMove);
        }
        let count = self.child_count_of(dest);
        if to_position > count {
            return Err(StoreError::InvalidPosition {
                position: to_position,
                count,
            });
        }
        let record_edits = self.config.track_edits;
        self.move_segments(keys, to_position, dest, record_edits);
        Ok(())
    }

    fn move_segments(&mut self, keys: &[ItemKey], to_position: usize, dest: ItemKey, record_edits: bool) {
        let mut anchor: Option<ItemKey> = None;
        for segment in self.segments(keys).into_iter().rev() {
            for (first, count) in self.runs(&segment).into_iter().rev() {
                let Some(first_key) = self.tree.child_at(segment.parent, first) else {
                    continue;
                };
                let before = match anchor.and_then(|a| self.tree.get(a)).and_then(Item::row) {
                    Some(row) => row,
                    None => self.drop_target(segment.parent, first, count, to_position, dest),
                };
                self.relocate(segment.parent, first, count, dest, before, record_edits);
                anchor = Some(first_key);
            }
        }
    }

    /// Converts a drop position into an insert-before row.
    ///
    /// Dropping forward past the source rows of the same parent lands after
    /// the target row.
    fn drop_target(&self, from: ItemKey, first: usize, count: usize, to_position: usize, to: ItemKey) -> usize {
        let children = self.child_count_of(to);
        if from == to && to_position >= first + count {
            (to_position + 1).min(children)
        } else {
            to_position.min(children)
        }
    }

    /// Moves `count` rows of `from_parent` starting at `first_row` so they
    /// are dropped onto `to_position` of `to_parent`.
    ///
    /// Returns `Ok(false)` for a no-op (source and destination overlap).
    pub fn move_rows(
        &mut self,
        first_row: usize,
        count: usize,
        to_position: usize,
        from_parent: &ModelIndex,
        to_parent: &ModelIndex,
    ) -> StoreResult<bool> {
        let from = self.key_for(from_parent).ok_or(StoreError::InvalidIndex)?;
        let to = self.key_for(to_parent).ok_or(StoreError::InvalidIndex)?;
        let children = self.child_count_of(from);
        if count == 0 || first_row + count > children {
            return Err(StoreError::InvalidPosition {
                position: first_row + count,
                count: children,
            });
        }
        let dest_children = self.child_count_of(to);
        if to_position > dest_children {
            return Err(StoreError::InvalidPosition {
                position: to_position,
                count: dest_children,
            });
        }
        let moving = self
            .tree
            .get(from)
            .map(|item| item.children()[first_row..first_row + count].to_vec())
            .unwrap_or_default();
        if moving.iter().any(|key| self.tree.is_ancestor_of(*key, to)) {
            return Err(StoreError::CircularMove);
        }

        let before = self.drop_target(from, first_row, count, to_position, to);
        let record_edits = self.config.track_edits;
        Ok(self.relocate(from, first_row, count, to, before, record_edits))
    }

    /// Moves rows so they are inserted before row `before` of `to` (counted
    /// before the move).
    fn relocate(
        &mut self,
        from: ItemKey,
        first: usize,
        count: usize,
        to: ItemKey,
        before: usize,
        record_edits: bool,
    ) -> bool {
        if from == to && first <= before && before <= first + count {
            return false;
        }

        let taken = self.tree.take_children(from, first, count);
        if record_edits && from != to {
            let parent_id = self.tree.get(from).and_then(Item::id).cloned();
            for key in &taken {
                if let Some(item) = self.tree.get_mut(*key) {
                    item.add_edit(EditKind::Move, parent_id.as_ref());
                }
            }
        }

        let insert_at = if from == to && before > first {
            before - count
        } else {
            before
        };
        self.tree.attach_children(to, insert_at, &taken);

        if from != to {
            if let Some(item) = self.tree.get_mut(from)
                && let Some(total) = item.total_child_count()
            {
                item.set_total_child_count(Some(total.saturating_sub(count)));
            }
            if let Some(item) = self.tree.get_mut(to)
                && let Some(total) = item.total_child_count()
            {
                item.set_total_child_count(Some(total + count));
            }
        }

        let event = ChangeEvent {
            kind: ChangeKind::Move {
                destination_parent: self.index_from_key(to, 0),
                destination_row: insert_at,
            },
            parent: self.index_from_key(from, 0),
            first_row: first,
            last_row: first + count - 1,
        };
        self.emit(event);
        true
    }

    // -------------------------------------------------------------------------
    // Data and check state
    // -------------------------------------------------------------------------

    /// Sets a cell value.
    ///
    /// With edit tracking enabled an UPDATE edit is recorded before the
    /// value changes. Setting [`ItemRole::CheckState`] propagates through
    /// the tree like [`set_check_state`](Self::set_check_state).
    pub fn set_data(&mut self, index: &ModelIndex, value: ItemData, role: ItemRole) -> StoreResult<bool> {
        let key = self.valid_key(index)?;
        let column = index.column();

        if role == ItemRole::CheckState {
            let state = value.as_check_state().unwrap_or_default();
            let before = self.tree.get(key).map(|item| item.check_state(column));
            self.set_check_state(index, state)?;
            return Ok(before != Some(state));
        }

        let unchanged = self
            .tree
            .get(key)
            .is_some_and(|item| item.data(column, role) == &value);
        if unchanged {
            return Ok(false);
        }
        if self.config.track_edits && role.is_editable_data() {
            self.add_edit(key, EditKind::Update);
        }
        if let Some(item) = self.tree.get_mut(key) {
            item.set_data(value, column, role);
        }
        let parent = self.parent(index);
        self.emit(ChangeEvent::data_changed(
            parent,
            (index.row(), index.row()),
            (column, column),
        ));
        Ok(true)
    }

    /// Sets the check state at `index` and propagates it.
    ///
    /// Downward, every checkable descendant in the same column takes the
    /// new state. Upward, each ancestor becomes `Checked` if all its
    /// checkable children are checked, `Unchecked` if none are and
    /// `PartiallySelected` otherwise; the walk stops at the first ancestor
    /// whose state does not change.
    pub fn set_check_state(&mut self, index: &ModelIndex, state: CheckState) -> StoreResult<()> {
        let key = self.valid_key(index)?;
        let column = index.column();

        let mut changed: Vec<ItemKey> = Vec::new();
        if self
            .tree
            .get_mut(key)
            .is_some_and(|item| item.set_check_state(column, state))
        {
            changed.push(key);
        }

        let descendants: Vec<ItemKey> = self.tree.subtree(key, false).collect();
        for child in descendants {
            if let Some(item) = self.tree.get_mut(child)
                && item.flags(column).checkable
                && item.set_check_state(column, state)
            {
                changed.push(child);
            }
        }
        self.emit_data_ranges(&changed, column);

        let root = self.tree.root();
        let mut current = self.tree.parent_of(key);
        while let Some(ancestor) = current {
            if ancestor == root {
                break;
            }
            let Some(computed) = self.aggregate_check_state(ancestor, column) else {
                break;
            };
            let updated = self
                .tree
                .get_mut(ancestor)
                .is_some_and(|item| item.set_check_state(column, computed));
            if !updated {
                break;
            }
            self.emit_data_ranges(&[ancestor], column);
            current = self.tree.parent_of(ancestor);
        }
        Ok(())
    }

    /// Check state of `parent` derived from its checkable children.
    fn aggregate_check_state(&self, parent: ItemKey, column: usize) -> Option<CheckState> {
        let item = self.tree.get(parent)?;
        let mut checked = 0;
        let mut unchecked = 0;
        for child in item.children() {
            let Some(child) = self.tree.get(*child) else {
                continue;
            };
            if !child.flags(column).checkable {
                continue;
            }
            match child.check_state(column) {
                CheckState::Checked => checked += 1,
                CheckState::Unchecked => unchecked += 1,
                CheckState::PartiallySelected => return Some(CheckState::PartiallySelected),
            }
        }
        match (checked, unchecked) {
            (0, 0) => None,
            (_, 0) => Some(CheckState::Checked),
            (0, _) => Some(CheckState::Unchecked),
            _ => Some(CheckState::PartiallySelected),
        }
    }

    /// Emits one `DataChanged` per contiguous row range of `keys`.
    fn emit_data_ranges(&self, keys: &[ItemKey], column: usize) {
        let mut by_parent: BTreeMap<ItemKey, Vec<usize>> = BTreeMap::new();
        for key in keys {
            if let (Some(parent), Some(row)) =
                (self.tree.parent_of(*key), self.tree.get(*key).and_then(Item::row))
            {
                by_parent.entry(parent).or_default().push(row);
            }
        }
        for (parent, mut rows) in by_parent {
            rows.sort_unstable();
            let parent_index = self.index_from_key(parent, 0);
            let mut start = rows[0];
            let mut end = rows[0];
            for &row in &rows[1..] {
                if row == end + 1 {
                    end = row;
                } else {
                    self.emit(ChangeEvent::data_changed(parent_index, (start, end), (column, column)));
                    start = row;
                    end = row;
                }
            }
            self.emit(ChangeEvent::data_changed(parent_index, (start, end), (column, column)));
        }
    }

    // -------------------------------------------------------------------------
    // Edit state
    // -------------------------------------------------------------------------

    /// Records an edit on `key`, with the current parent as MOVE baseline.
    pub fn add_edit(&mut self, key: ItemKey, kind: EditKind) {
        let parent_id = self.tree.parent_id_of(key).cloned();
        if let Some(item) = self.tree.get_mut(key) {
            item.add_edit(kind, parent_id.as_ref());
        }
    }

    /// Pending edit of `key`.
    pub fn get_edit(&self, key: ItemKey) -> Option<DiffRecord> {
        self.tree.get(key)?.get_edit(self.tree.parent_id_of(key))
    }

    /// Collects the pending edits of every item, parents before children.
    pub fn get_edit_state(&self) -> Vec<DiffRecord> {
        let root = self.tree.root();
        self.tree
            .subtree(root, false)
            .filter_map(|key| self.get_edit(key))
            .collect()
    }

    /// Pending edits as a JSON array.
    pub fn edit_state_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.get_edit_state())
    }

    /// Clears every pending edit.
    pub fn clear_edits(&mut self) {
        let root = self.tree.root();
        let keys: Vec<ItemKey> = self.tree.subtree(root, false).collect();
        for key in keys {
            if let Some(item) = self.tree.get_mut(key) {
                item.clear_edit();
            }
        }
    }

    /// Re-applies persisted edits onto the current tree.
    ///
    /// Records whose item or parent cannot be resolved are logged and
    /// skipped. Returns the number of records applied.
    pub fn apply_edit_state(&mut self, records: &[DiffRecord]) -> usize {
        let mut applied = 0;
        for record in records {
            match self.apply_record(record) {
                Ok(()) => applied += 1,
                Err(err) => {
                    store_warn!(item = %record.item_id, error = %err, "skipping edit record");
                }
            }
        }
        applied
    }

    /// Parses and re-applies persisted edits.
    ///
    /// The document must be a JSON array. Malformed entries are logged and
    /// skipped.
    pub fn apply_edit_state_json(&mut self, json: &str) -> serde_json::Result<usize> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let records: Vec<DiffRecord> = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    store_warn!(error = %err, "skipping malformed edit record");
                    None
                }
            })
            .collect();
        Ok(self.apply_edit_state(&records))
    }

    fn apply_record(&mut self, record: &DiffRecord) -> StoreResult<()> {
        if record.role_set != ROLE_SET_VERSION {
            return Err(StoreError::RoleSetMismatch {
                found: record.role_set,
                expected: ROLE_SET_VERSION,
            });
        }
        if record.kinds.contains(EditKind::Insert) {
            return self.replay_insert(record);
        }

        let key = self
            .find_item(&record.item_id)
            .ok_or_else(|| StoreError::UnknownItem(record.item_id.clone()))?;

        if record.kinds.contains(EditKind::Move)
            && let Some(dest) = self.move_destination(record)?
        {
            if self.tree.is_ancestor_of(key, dest) {
                return Err(StoreError::CircularMove);
            }
            if self.tree.parent_of(key) != Some(dest) {
                self.add_edit(key, EditKind::Move);
                let position = self.child_count_of(dest);
                self.move_segments(&[key], position, dest, false);
            }
        }

        if record.kinds.contains(EditKind::Update) {
            self.add_edit(key, EditKind::Update);
            if let Some(data) = &record.column_data {
                self.apply_column_data(key, data);
            }
        }

        for kind in record.kinds.iter() {
            if !matches!(kind, EditKind::Update | EditKind::Move | EditKind::Insert) {
                self.add_edit(key, kind);
            }
        }
        Ok(())
    }

    /// New parent named by a MOVE record, `None` when it names none.
    fn move_destination(&mut self, record: &DiffRecord) -> StoreResult<Option<ItemKey>> {
        match &record.parent_id {
            Some(parent_id) => self
                .find_item(parent_id)
                .map(Some)
                .ok_or_else(|| StoreError::UnresolvedParent(parent_id.clone())),
            None if record.moved_to_root => Ok(Some(self.tree.root())),
            None => Ok(None),
        }
    }

    fn replay_insert(&mut self, record: &DiffRecord) -> StoreResult<()> {
        if self.find_item(&record.item_id).is_some() {
            store_debug!(item = %record.item_id, "inserted item already present");
            return Ok(());
        }
        let parent = match &record.parent_id {
            Some(parent_id) => self
                .find_item(parent_id)
                .ok_or_else(|| StoreError::UnresolvedParent(parent_id.clone()))?,
            None => self.tree.root(),
        };

        let mut item = Item::with_id(
            record.item_id.clone(),
            record.data_type.clone(),
            self.column_count(),
        );
        if let Some(data) = &record.column_data {
            for (column, roles) in data {
                if *column >= item.column_count() {
                    store_warn!(item = %record.item_id, column, "dropping out-of-range column");
                    continue;
                }
                for (role, value) in roles {
                    item.set_data(value.clone(), *column, *role);
                }
            }
        }
        item.add_edit(EditKind::Insert, None);

        let position = self.child_count_of(parent);
        let parent_index = self.index_from_key(parent, 0);
        self.insert_items(position, vec![item], &parent_index)?;
        Ok(())
    }

    fn apply_column_data(&mut self, key: ItemKey, data: &ColumnData) {
        let columns = self.column_count();
        let mut touched: Option<(usize, usize)> = None;
        if let Some(item) = self.tree.get_mut(key) {
            for (column, roles) in data {
                if *column >= columns {
                    store_warn!(column, "dropping out-of-range column");
                    continue;
                }
                for (role, value) in roles {
                    item.set_data(value.clone(), *column, *role);
                }
                touched = Some(match touched {
                    Some((first, last)) => (first.min(*column), last.max(*column)),
                    None => (*column, *column),
                });
            }
        }
        if let Some(columns) = touched {
            let index = self.index_from_key(key, 0);
            let parent = self.parent(&index);
            self.emit(ChangeEvent::data_changed(parent, (index.row(), index.row()), columns));
        }
    }

    /// Undoes the pending edits of `key`.
    ///
    /// An inserted item is removed. Updated cells get their baseline values
    /// back (check state is kept). A moved item returns to its original
    /// parent. Status edits are simply cleared.
    pub fn revert_edit(&mut self, key: ItemKey) -> StoreResult<()> {
        let item = self.tree.get(key).ok_or(StoreError::InvalidIndex)?;
        let state = item.edit_state().clone();
        let kinds = state.kinds();

        if kinds.contains(EditKind::Insert) {
            self.remove_items(&[key]);
            return Ok(());
        }

        if kinds.contains(EditKind::Move)
            && let Some(original) = state.original_parent()
        {
            let dest = match original {
                Some(parent_id) => {
                    let parent_id = parent_id.clone();
                    self.find_item(&parent_id)
                        .ok_or(StoreError::UnresolvedParent(parent_id))?
                }
                None => self.tree.root(),
            };
            if self.tree.parent_of(key) != Some(dest) {
                let position = self.child_count_of(dest);
                self.move_segments(&[key], position, dest, false);
            }
        }

        if kinds.contains(EditKind::Update)
            && let Some(original) = state.original_cells()
        {
            if let Some(item) = self.tree.get_mut(key) {
                for (column, cell) in original.iter().enumerate().take(item.column_count()) {
                    let mut cell = cell.clone();
                    match item.data(column, ItemRole::CheckState) {
                        ItemData::None => cell.remove(&ItemRole::CheckState),
                        check => cell.insert(ItemRole::CheckState, check.clone()),
                    };
                    item.set_cell(column, cell);
                }
            }
            let index = self.index_from_key(key, 0);
            let parent = self.parent(&index);
            let last_column = self.column_count().saturating_sub(1);
            self.emit(ChangeEvent::data_changed(
                parent,
                (index.row(), index.row()),
                (0, last_column),
            ));
        }

        if let Some(item) = self.tree.get_mut(key) {
            item.clear_edit();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lazy fetch
    // -------------------------------------------------------------------------

    /// Returns `true` if `parent` was never populated, or if incremental
    /// loading is on and fewer children are loaded than the known total.
    pub fn can_fetch_more(&self, parent: &ModelIndex) -> bool {
        let Some(item) = self.item_from_index(parent) else {
            return false;
        };
        match item.total_child_count() {
            None => true,
            Some(total) => self.config.incremental_loading && item.child_count() < total,
        }
    }

    /// Fetches one batch of children for `parent` from the data source.
    ///
    /// The batch is sorted with the current comparator and appended. The
    /// first fetch records the child total. Batches after the first are
    /// requested under the sort the first one used, so an in-memory re-sort
    /// in between never makes the source hand out rows twice. Returns the number of rows
    /// added. On failure nothing changes and the error is returned.
    #[tracing::instrument(skip(self), target = "asset_lattice::store", level = "debug")]
    pub fn fetch_more(&mut self, parent: &ModelIndex) -> StoreResult<usize> {
        let _perf = PerfSpan::new(span_names::FETCH);
        let parent_key = self.key_for(parent).ok_or(StoreError::InvalidIndex)?;
        if !self.can_fetch_more(parent) {
            return Ok(0);
        }

        let Some(item) = self.tree.get(parent_key) else {
            return Err(StoreError::InvalidIndex);
        };
        let limit = self.config.incremental_loading.then_some(self.config.batch_size);
        let offset = item.child_count();
        // Later batches continue the order the first batch was requested in.
        let sort = match self.fetch_sorts.get(parent_key) {
            Some(sort) if offset > 0 => sort.clone(),
            _ => self.comparator.sort().clone(),
        };
        let request = FetchRequest {
            parent: item.id().cloned(),
            offset,
            limit,
            sort,
            force_reload: false,
        };
        let was_populated = item.total_child_count().is_some();

        let source = self.source.as_mut().ok_or(StoreError::NoDataSource)?;
        let batch = source.fetch(&request).inspect_err(|err| {
            store_warn!(error = %err, "fetch failed");
        })?;

        let mut items = batch.items;
        self.comparator.sort_items(&mut items);
        let added = items.len();
        let position = request.offset;
        self.insert_children(parent_key, position, items);

        let loaded = position + added;
        let exhausted = limit.is_none_or(|limit| added < limit);
        if let Some(item) = self.tree.get_mut(parent_key) {
            let reported = if was_populated {
                item.total_child_count()
            } else {
                batch.total_count
            };
            let total = if exhausted {
                Some(loaded)
            } else {
                reported.map(|total| total.max(loaded))
            };
            item.set_total_child_count(total);
        }
        if exhausted {
            self.fetch_sorts.remove(parent_key);
        } else {
            self.fetch_sorts.insert(parent_key, request.sort);
        }
        store_debug!(added, loaded, "fetched batch");
        Ok(added)
    }

    // -------------------------------------------------------------------------
    // Sorting
    // -------------------------------------------------------------------------

    /// Current sort criteria.
    pub fn sort_criteria(&self) -> &SortCriteria {
        self.comparator.sort()
    }

    /// Adds `column` to the sort and re-sorts.
    pub fn sort(&mut self, column: usize, direction: SortDirection) -> StoreResult<()> {
        self.comparator.add_sort_column(column, direction);
        self.do_sort()
    }

    /// Replaces the sort criteria and re-sorts.
    pub fn set_sort_criteria(&mut self, sort: SortCriteria) -> StoreResult<()> {
        self.comparator.set_sort(sort);
        self.do_sort()
    }

    /// Applies the current sort.
    ///
    /// A data source that can deliver pre-sorted rows is asked to re-query
    /// (the tree is reset and the root refetched). Otherwise the whole tree
    /// is re-sorted in memory, persistent indexes are remapped and
    /// `layout_changed` carries the old and new positions.
    #[tracing::instrument(skip(self), target = "asset_lattice::store", level = "debug")]
    pub fn do_sort(&mut self) -> StoreResult<()> {
        let requery = self.config.requery_on_sort
            && self
                .source
                .as_ref()
                .is_some_and(|source| source.supports_sorted_requery());
        if requery {
            store_debug!("delegating sort to data source");
            self.reset();
            self.fetch_more(&ModelIndex::invalid())?;
            return Ok(());
        }

        let _perf = PerfSpan::new(span_names::SORT);
        let before: Vec<(PersistentId, ModelIndex)> = self
            .persistent
            .iter()
            .map(|(id, (key, column))| (id, self.index_from_key(*key, *column)))
            .collect();

        let root = self.tree.root();
        let parents: Vec<ItemKey> = self
            .tree
            .subtree(root, true)
            .filter(|key| self.tree.get(*key).is_some_and(|item| item.child_count() > 1))
            .collect();
        for parent in parents {
            self.tree
                .sort_children(parent, |a, b| self.comparator.compare(a, b));
        }

        let changes: Vec<(ModelIndex, ModelIndex)> = before
            .into_iter()
            .map(|(id, old)| (old, self.persistent_index(id)))
            .collect();
        store_debug!(persistent = changes.len(), "tree sorted");
        self.signals.layout_changed.emit(changes);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Persistent indexes
    // -------------------------------------------------------------------------

    /// Creates an index that follows its item through moves and sorts.
    pub fn persist(&mut self, index: &ModelIndex) -> Option<PersistentId> {
        let key = index.item_key().filter(|key| self.tree.contains(*key))?;
        Some(self.persistent.insert((key, index.column())))
    }

    /// Current index of a persistent handle. Invalid once the item is gone.
    pub fn persistent_index(&self, id: PersistentId) -> ModelIndex {
        match self.persistent.get(id) {
            Some((key, column)) if self.tree.contains(*key) => self.index_from_key(*key, *column),
            _ => ModelIndex::invalid(),
        }
    }

    /// Releases a persistent handle.
    pub fn release(&mut self, id: PersistentId) -> bool {
        self.persistent.remove(id).is_some()
    }

    // -------------------------------------------------------------------------
    // Columns
    // -------------------------------------------------------------------------

    /// Inserts columns at `position` into every item.
    pub fn insert_columns(&mut self, position: usize, columns: Vec<ColumnSpec>) -> StoreResult<()> {
        let count = self.column_count();
        if position > count {
            return Err(StoreError::InvalidPosition { position, count });
        }
        if columns.is_empty() {
            return Ok(());
        }
        let added = columns.len();
        self.tree.insert_columns(position, added);

        let root = self.tree.root();
        if let Some(root_item) = self.tree.get_mut(root) {
            for (offset, spec) in columns.iter().enumerate() {
                root_item.set_data(spec.title.as_str().into(), position + offset, ItemRole::Display);
            }
        }
        let types: Vec<ColumnType> = columns.iter().map(|c| c.column_type).collect();
        for (offset, column_type) in types.iter().enumerate() {
            self.column_types.insert(position + offset, *column_type);
        }
        self.comparator.columns_inserted(position, &types);
        for (_, column) in self.persistent.values_mut() {
            if *column >= position {
                *column += added;
            }
        }
        self.signals
            .columns_inserted
            .emit((position, position + added - 1));
        Ok(())
    }

    /// Removes `count` columns at `position` from every item.
    pub fn remove_columns(&mut self, position: usize, count: usize) -> StoreResult<()> {
        let columns = self.column_count();
        if position + count > columns {
            return Err(StoreError::InvalidPosition {
                position: position + count,
                count: columns,
            });
        }
        if count == 0 {
            return Ok(());
        }
        self.tree.remove_columns(position, count);
        self.column_types.drain(position..position + count);
        self.comparator.columns_removed(position, count);
        self.persistent
            .retain(|_, (_, column)| *column < position || *column >= position + count);
        for (_, column) in self.persistent.values_mut() {
            if *column >= position + count {
                *column -= count;
            }
        }
        self.signals
            .columns_removed
            .emit((position, position + count - 1));
        Ok(())
    }
}
