//! Query result cache.
//!
//! Results are stored per query ([`QueryKey`]) and, below that, per
//! normalized search criteria ([`SearchKey`]). Pagination and sort order are
//! deliberately not part of the search key: one [`CacheEntry`] holds every
//! page and every sort order fetched for the same predicates.
//!
//! An entry starts out *partial*: one [`PartialSet`] of offset-addressed
//! chunks per sort order. Once the rows loaded for a sort order cover the
//! backend total, that set is promoted to the entry's *complete* set and the
//! other partial sets are dropped. A complete set answers every later page
//! request, under any sort order, without a backend call.

use std::collections::{BTreeMap, HashMap};

use asset_lattice_core::logging::span_names;
use asset_lattice_core::{PerfSpan, cache_debug};
use serde::{Deserialize, Serialize};

use super::comparator::{Comparator, SortCriteria};
use super::item::{Item, ItemId};
use super::role::ColumnType;
use super::source::{ItemFactory, QueryClient};
use crate::config::CacheConfig;
use crate::error::QueryError;

/// Identifies one backend query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Backend interface the query runs against.
    pub interface_name: String,
    /// Query path inside the interface.
    pub query_path: String,
    /// Parent record the query is scoped to, if any.
    pub parent_context: Option<ItemId>,
}

impl QueryKey {
    /// Creates a top-level query key.
    pub fn new(interface_name: impl Into<String>, query_path: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            query_path: query_path.into(),
            parent_context: None,
        }
    }

    /// Scopes the query to a parent record.
    pub fn with_parent(mut self, parent: impl Into<ItemId>) -> Self {
        self.parent_context = Some(parent.into());
        self
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.interface_name, self.query_path)?;
        if let Some(parent) = &self.parent_context {
            write!(f, "[{parent}]")?;
        }
        Ok(())
    }
}

/// A single filter predicate, e.g. `status == "ip"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SearchPredicate {
    /// Field name.
    pub field: String,
    /// Comparison operator, as understood by the backend.
    pub operator: String,
    /// Operand, as understood by the backend.
    pub value: String,
}

impl SearchPredicate {
    /// Creates a predicate.
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Search criteria of a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchCriteria {
    /// Filter predicates, in any order.
    pub predicates: Vec<SearchPredicate>,
    /// Exclude deleted records.
    pub omit_deleted: bool,
    /// Exclude archived records.
    pub omit_archived: bool,
}

impl SearchCriteria {
    /// Criteria with the omit flags taken from `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            predicates: Vec::new(),
            omit_deleted: config.omit_deleted,
            omit_archived: config.omit_archived,
        }
    }

    /// Adds a predicate.
    pub fn with_predicate(mut self, predicate: SearchPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Normalized cache key: predicates sorted and deduplicated.
    pub fn key(&self) -> SearchKey {
        let mut predicates = self.predicates.clone();
        predicates.sort();
        predicates.dedup();
        SearchKey {
            predicates,
            omit_deleted: self.omit_deleted,
            omit_archived: self.omit_archived,
        }
    }
}

/// Normalized search criteria, see [`SearchCriteria::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    predicates: Vec<SearchPredicate>,
    omit_deleted: bool,
    omit_archived: bool,
}

impl SearchKey {
    /// Normalized predicates.
    pub fn predicates(&self) -> &[SearchPredicate] {
        &self.predicates
    }
}

/// Which page of a result, in which order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSpec {
    /// Requested sort order.
    pub sort: SortCriteria,
    /// Offset of the first row.
    pub offset: usize,
    /// Maximum number of rows. `None` requests everything from `offset`.
    pub limit: Option<usize>,
    /// Purge the cache and query the backend.
    pub force_reload: bool,
}

impl PageSpec {
    /// A page of `limit` rows at `offset`.
    pub fn new(offset: usize, limit: Option<usize>) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    /// Sets the sort order.
    pub fn with_sort(mut self, sort: SortCriteria) -> Self {
        self.sort = sort;
        self
    }

    /// Requests a forced reload.
    pub fn with_force_reload(mut self, force_reload: bool) -> Self {
        self.force_reload = force_reload;
        self
    }
}

/// Complete request handed to the [`QueryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Normalized predicates.
    pub search: Vec<SearchPredicate>,
    /// Requested sort order.
    pub sort: SortCriteria,
    /// Exclude deleted records.
    pub omit_deleted: bool,
    /// Exclude archived records.
    pub omit_archived: bool,
    /// Offset of the first row.
    pub offset: usize,
    /// Maximum number of rows, `None` for all.
    pub limit: Option<usize>,
    /// Ask the backend to report the total size of the result.
    pub find_total: bool,
    /// Bypass any backend-side cache.
    pub force_reload: bool,
}

/// One page of raw backend records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResultChunk {
    /// Backend records, one JSON object each.
    pub records: Vec<serde_json::Value>,
    /// Total size of the result, when requested and known.
    pub total_found: Option<usize>,
}

impl RawResultChunk {
    /// Creates a chunk.
    pub fn new(records: Vec<serde_json::Value>, total_found: Option<usize>) -> Self {
        Self {
            records,
            total_found,
        }
    }

    /// Number of records in the chunk.
    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Total size of the result, if the backend reported one.
    pub fn total_found(&self) -> Option<usize> {
        self.total_found
    }
}

/// Rows served for one request.
#[derive(Debug, Clone, Default)]
pub struct ResultPage {
    /// Detached copies of the cached items.
    pub items: Vec<Item>,
    /// Total size of the result, if known.
    pub total_count: Option<usize>,
}

/// Rows fetched so far for one sort order.
#[derive(Debug, Clone, Default)]
pub struct PartialSet {
    loaded_count: usize,
    item_chunks: BTreeMap<usize, Vec<Item>>,
    raw_chunks: BTreeMap<usize, RawResultChunk>,
}

impl PartialSet {
    /// Number of records loaded.
    pub fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    /// Raw backend chunks, keyed by offset.
    pub fn raw_chunks(&self) -> &BTreeMap<usize, RawResultChunk> {
        &self.raw_chunks
    }

    fn append(&mut self, offset: usize, raw: RawResultChunk, items: Vec<Item>) {
        assert!(
            !self.item_chunks.contains_key(&offset),
            "duplicate result chunk at offset {offset}"
        );
        self.loaded_count += raw.size();
        self.item_chunks.insert(offset, items);
        self.raw_chunks.insert(offset, raw);
    }
}

/// The full result, chunked for one sort order.
#[derive(Debug, Clone)]
pub struct CompleteSet {
    sort: SortCriteria,
    chunks: BTreeMap<usize, Vec<Item>>,
}

impl CompleteSet {
    fn items(&self) -> impl Iterator<Item = &Item> {
        self.chunks.values().flatten()
    }

    fn page(&self, offset: usize, limit: Option<usize>) -> Vec<Item> {
        let rows = self.items().skip(offset);
        match limit {
            Some(limit) => rows.take(limit).cloned().collect(),
            None => rows.cloned().collect(),
        }
    }

    fn resort(&mut self, comparator: &Comparator, batch_size: usize) {
        let _perf = PerfSpan::new(span_names::CACHE_RESORT);
        let mut merged: Vec<Item> = std::mem::take(&mut self.chunks)
            .into_values()
            .flatten()
            .collect();
        comparator.sort_items(&mut merged);

        let mut offset = 0;
        let mut rest = merged.into_iter().peekable();
        while rest.peek().is_some() {
            let chunk: Vec<Item> = rest.by_ref().take(batch_size).collect();
            let len = chunk.len();
            self.chunks.insert(offset, chunk);
            offset += len;
        }
        self.sort = comparator.sort().clone();
    }
}

#[derive(Debug, Clone)]
enum EntryState {
    Partial(HashMap<SortCriteria, PartialSet>),
    Complete(CompleteSet),
}

/// Cached knowledge about one search.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    batch_size: usize,
    total_count: Option<usize>,
    state: EntryState,
}

impl CacheEntry {
    fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            total_count: None,
            state: EntryState::Partial(HashMap::new()),
        }
    }

    /// Returns `true` once the full result is held.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, EntryState::Complete(_))
    }

    /// Total size of the result, if known.
    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    /// Chunk size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sort order of the complete set.
    pub fn sort_criteria(&self) -> Option<&SortCriteria> {
        match &self.state {
            EntryState::Complete(set) => Some(&set.sort),
            EntryState::Partial(_) => None,
        }
    }

    /// Partial set for `sort`, if any.
    pub fn partial_set(&self, sort: &SortCriteria) -> Option<&PartialSet> {
        match &self.state {
            EntryState::Partial(sets) => sets.get(sort),
            EntryState::Complete(_) => None,
        }
    }

    /// Number of partial sets (one per sort order fetched).
    pub fn partial_set_count(&self) -> usize {
        match &self.state {
            EntryState::Partial(sets) => sets.len(),
            EntryState::Complete(_) => 0,
        }
    }

    /// Records loaded for `sort` (the full total once complete).
    pub fn loaded_count(&self, sort: &SortCriteria) -> usize {
        match &self.state {
            EntryState::Complete(set) => set.items().count(),
            EntryState::Partial(sets) => sets.get(sort).map_or(0, PartialSet::loaded_count),
        }
    }

    /// Number of chunks held for `sort`.
    pub fn chunk_count(&self, sort: &SortCriteria) -> usize {
        match &self.state {
            EntryState::Complete(set) => set.chunks.len(),
            EntryState::Partial(sets) => sets.get(sort).map_or(0, |set| set.item_chunks.len()),
        }
    }

    /// Every cached item of the complete set, in its current order.
    pub fn complete_items(&self) -> Vec<&Item> {
        match &self.state {
            EntryState::Complete(set) => set.items().collect(),
            EntryState::Partial(_) => Vec::new(),
        }
    }

    /// Looks up a page without touching the backend.
    fn lookup(&mut self, page: &PageSpec, comparator: &Comparator) -> Option<Vec<Item>> {
        let batch_size = self.batch_size;
        match &mut self.state {
            EntryState::Complete(set) => {
                if set.sort != page.sort {
                    cache_debug!(
                        chunks = set.chunks.len(),
                        "resorting complete set in memory"
                    );
                    let mut comparator = comparator.clone();
                    comparator.set_sort(page.sort.clone());
                    set.resort(&comparator, batch_size);
                }
                Some(set.page(page.offset, page.limit))
            }
            EntryState::Partial(sets) => {
                let chunk = sets.get(&page.sort)?.item_chunks.get(&page.offset)?;
                Some(match page.limit {
                    Some(limit) => chunk.iter().take(limit).cloned().collect(),
                    None => chunk.clone(),
                })
            }
        }
    }

    /// Records a fetched chunk and promotes the set when it is complete.
    fn record(&mut self, page: &PageSpec, raw: RawResultChunk, items: Vec<Item>) {
        let EntryState::Partial(sets) = &mut self.state else {
            return;
        };
        let set = sets.entry(page.sort.clone()).or_default();
        set.append(page.offset, raw, items);
        let loaded = set.loaded_count;

        let Some(total) = self.total_count else {
            return;
        };
        if loaded < total {
            return;
        }

        let mut sets = std::mem::take(sets);
        let Some(set) = sets.remove(&page.sort) else {
            return;
        };
        cache_debug!(
            loaded,
            total,
            discarded = sets.len(),
            "promoting partial set to complete"
        );
        self.state = EntryState::Complete(CompleteSet {
            sort: page.sort.clone(),
            chunks: set.item_chunks,
        });
    }
}

/// Cache of query results.
///
/// # Example
///
/// ```ignore
/// let mut cache = ResultCache::new(CacheConfig::default(), column_types);
/// let page = cache.get_items(&mut client, &factory, &query, &criteria, &PageSpec::new(0, Some(50)))?;
/// ```
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    comparator: Comparator,
    entries: HashMap<QueryKey, HashMap<SearchKey, CacheEntry>>,
    backend_calls: usize,
}

static_assertions::assert_impl_all!(ResultCache: Send, Sync);

impl ResultCache {
    /// Creates an empty cache for results with the given column types.
    ///
    /// Panics if `config.batch_size` is zero.
    pub fn new(config: CacheConfig, column_types: Vec<ColumnType>) -> Self {
        assert!(config.batch_size > 0, "cache batch size must be positive");
        Self {
            config,
            comparator: Comparator::new(column_types),
            entries: HashMap::new(),
            backend_calls: 0,
        }
    }

    /// Cache settings.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of requests sent to the backend so far.
    pub fn backend_calls(&self) -> usize {
        self.backend_calls
    }

    /// Entry for a query and search, if any rows were cached.
    pub fn entry(&self, query: &QueryKey, criteria: &SearchCriteria) -> Option<&CacheEntry> {
        self.entries.get(query)?.get(&criteria.key())
    }

    /// Drops every cached result.
    pub fn purge(&mut self) {
        self.entries.clear();
    }

    /// Drops the cached results of one query.
    pub fn purge_query(&mut self, query: &QueryKey) {
        self.entries.remove(query);
    }

    /// Returns the rows for `page`, from the cache when possible.
    ///
    /// A forced reload purges the whole cache first. A complete set serves
    /// any page under any sort order; a partial set only serves chunks it
    /// fetched under the requested sort order. Everything else is fetched
    /// from `client` and recorded.
    pub fn get_items<C, F>(
        &mut self,
        client: &mut C,
        factory: &F,
        query: &QueryKey,
        criteria: &SearchCriteria,
        page: &PageSpec,
    ) -> Result<ResultPage, QueryError>
    where
        C: QueryClient + ?Sized,
        F: ItemFactory + ?Sized,
    {
        let search_key = criteria.key();

        if page.force_reload {
            cache_debug!(%query, "forced reload, purging cache");
            self.purge();
        } else if let Some(entry) = self
            .entries
            .get_mut(query)
            .and_then(|entries| entries.get_mut(&search_key))
            && let Some(items) = entry.lookup(page, &self.comparator)
        {
            cache_debug!(%query, offset = page.offset, rows = items.len(), "cache hit");
            return Ok(ResultPage {
                items,
                total_count: entry.total_count,
            });
        }

        cache_debug!(%query, offset = page.offset, "cache miss");
        let known_total = self
            .entries
            .get(query)
            .and_then(|entries| entries.get(&search_key))
            .and_then(|entry| entry.total_count);

        let filter = FilterSpec {
            search: search_key.predicates.clone(),
            sort: page.sort.clone(),
            omit_deleted: criteria.omit_deleted,
            omit_archived: criteria.omit_archived,
            offset: page.offset,
            limit: page.limit,
            find_total: known_total.is_none(),
            force_reload: page.force_reload,
        };

        self.backend_calls += 1;
        let raw = client.fetch(query, &filter)?;
        let items = factory.make_items(&raw)?;

        let total_count = match known_total {
            Some(total) => total,
            None => {
                let short = page.limit.is_none_or(|limit| raw.size() < limit);
                match raw.total_found() {
                    Some(total) => total,
                    None if short => page.offset + raw.size(),
                    None => {
                        return Err(QueryError::MissingTotal {
                            query: query.to_string(),
                        });
                    }
                }
            }
        };

        // Only successful fetches leave an entry behind.
        let batch_size = self.config.batch_size;
        let entry = self
            .entries
            .entry(query.clone())
            .or_default()
            .entry(search_key)
            .or_insert_with(|| CacheEntry::new(batch_size));
        entry.total_count = Some(total_count);
        entry.record(page, raw, items.clone());
        Ok(ResultPage {
            items,
            total_count: entry.total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::comparator::SortDirection;
    use crate::model::role::ItemRole;
    use serde_json::json;

    /// Serves `total` records named `r000`, `r001`, ... in backend order.
    struct FakeClient {
        total: usize,
        report_total: bool,
    }

    impl QueryClient for FakeClient {
        fn fetch(
            &mut self,
            _query: &QueryKey,
            filter: &FilterSpec,
        ) -> Result<RawResultChunk, QueryError> {
            let end = filter
                .limit
                .map_or(self.total, |limit| (filter.offset + limit).min(self.total));
            let records = (filter.offset..end)
                .map(|i| json!({ "id": format!("r{i:03}"), "rank": (i * 7) % 13 }))
                .collect();
            let total = (filter.find_total && self.report_total).then_some(self.total);
            Ok(RawResultChunk::new(records, total))
        }
    }

    struct Factory;

    impl ItemFactory for Factory {
        fn make_items(&self, chunk: &RawResultChunk) -> Result<Vec<Item>, QueryError> {
            chunk
                .records
                .iter()
                .map(|record| {
                    let id = record["id"]
                        .as_str()
                        .ok_or_else(|| QueryError::Factory("missing id".into()))?;
                    Ok(Item::with_id(id, "Asset", 2)
                        .with_data(0, ItemRole::Display, id)
                        .with_data(1, ItemRole::Display, &record["rank"]))
                })
                .collect()
        }
    }

    fn cache() -> ResultCache {
        ResultCache::new(
            CacheConfig::default().with_batch_size(50),
            vec![ColumnType::Text, ColumnType::Int],
        )
    }

    fn query() -> QueryKey {
        QueryKey::new("assets", "all")
    }

    #[test]
    fn test_search_key_ignores_predicate_order() {
        let a = SearchCriteria::default()
            .with_predicate(SearchPredicate::new("status", "==", "ip"))
            .with_predicate(SearchPredicate::new("type", "==", "prop"));
        let b = SearchCriteria::default()
            .with_predicate(SearchPredicate::new("type", "==", "prop"))
            .with_predicate(SearchPredicate::new("status", "==", "ip"))
            .with_predicate(SearchPredicate::new("type", "==", "prop"));
        assert_eq!(a.key(), b.key());

        let c = SearchCriteria {
            omit_archived: true,
            ..a.clone()
        };
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_partial_hit_and_promotion() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 120,
            report_total: true,
        };
        let criteria = SearchCriteria::default();

        for (offset, expected) in [(0, 50), (50, 50), (100, 20)] {
            let page = cache
                .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(offset, Some(50)))
                .unwrap();
            assert_eq!(page.items.len(), expected);
            assert_eq!(page.total_count, Some(120));
        }
        assert_eq!(cache.backend_calls(), 3);

        let entry = cache.entry(&query(), &criteria).unwrap();
        assert!(entry.is_complete());
        assert_eq!(entry.loaded_count(&SortCriteria::new()), 120);

        // Served from the complete set.
        let page = cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(50, Some(50)))
            .unwrap();
        assert_eq!(page.items[0].id(), Some(&ItemId::from("r050")));
        assert_eq!(cache.backend_calls(), 3);
    }

    #[test]
    fn test_sort_miss_on_partial_set_fetches() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 120,
            report_total: true,
        };
        let criteria = SearchCriteria::default();
        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, Some(50)))
            .unwrap();

        let sorted = PageSpec::new(0, Some(50)).with_sort(SortCriteria::by(1, SortDirection::Ascending));
        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &sorted)
            .unwrap();
        assert_eq!(cache.backend_calls(), 2);
        assert_eq!(cache.entry(&query(), &criteria).unwrap().partial_set_count(), 2);

        // Same page, same sort: hit.
        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &sorted)
            .unwrap();
        assert_eq!(cache.backend_calls(), 2);
    }

    #[test]
    fn test_promotion_discards_other_partial_sets() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 30,
            report_total: true,
        };
        let criteria = SearchCriteria::default();
        let by_rank = SortCriteria::by(1, SortDirection::Descending);

        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, Some(10)).with_sort(by_rank.clone()))
            .unwrap();
        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, Some(50)))
            .unwrap();

        let entry = cache.entry(&query(), &criteria).unwrap();
        assert!(entry.is_complete());
        assert_eq!(entry.partial_set_count(), 0);
        assert!(entry.partial_set(&by_rank).is_none());
    }

    #[test]
    fn test_complete_set_resorts_without_backend() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 120,
            report_total: true,
        };
        let criteria = SearchCriteria::default();
        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, None))
            .unwrap();
        assert!(cache.entry(&query(), &criteria).unwrap().is_complete());

        let by_rank = SortCriteria::by(1, SortDirection::Ascending);
        let page = cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, Some(50)).with_sort(by_rank.clone()))
            .unwrap();
        assert_eq!(cache.backend_calls(), 1);
        assert_eq!(page.items.len(), 50);
        assert_eq!(page.items[0].data(1, ItemRole::Display), &crate::model::ItemData::Int(0));

        let entry = cache.entry(&query(), &criteria).unwrap();
        assert_eq!(entry.sort_criteria(), Some(&by_rank));
        assert_eq!(entry.chunk_count(&by_rank), 3);
    }

    #[test]
    fn test_force_reload_purges_everything() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 10,
            report_total: true,
        };
        let criteria = SearchCriteria::default();
        let other = QueryKey::new("shots", "all");
        cache
            .get_items(&mut client, &Factory, &other, &criteria, &PageSpec::new(0, None))
            .unwrap();
        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, None))
            .unwrap();

        cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, None).with_force_reload(true))
            .unwrap();
        assert_eq!(cache.backend_calls(), 3);
        assert!(cache.entry(&other, &criteria).is_none());
        assert!(cache.entry(&query(), &criteria).unwrap().is_complete());
    }

    #[test]
    fn test_total_inferred_from_short_chunk() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 7,
            report_total: false,
        };
        let criteria = SearchCriteria::default();
        let page = cache
            .get_items(&mut client, &Factory, &query(), &criteria, &PageSpec::new(0, Some(50)))
            .unwrap();
        assert_eq!(page.total_count, Some(7));
        assert!(cache.entry(&query(), &criteria).unwrap().is_complete());
    }

    #[test]
    fn test_missing_total_on_full_chunk() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 100,
            report_total: false,
        };
        let err = cache
            .get_items(&mut client, &Factory, &query(), &SearchCriteria::default(), &PageSpec::new(0, Some(50)))
            .unwrap_err();
        assert!(matches!(err, QueryError::MissingTotal { .. }));
        assert!(cache.entry(&query(), &SearchCriteria::default()).is_none());
    }

    #[test]
    fn test_failed_fetch_leaves_no_entry() {
        struct Offline;

        impl QueryClient for Offline {
            fn fetch(
                &mut self,
                _query: &QueryKey,
                _filter: &FilterSpec,
            ) -> Result<RawResultChunk, QueryError> {
                Err(QueryError::Backend("offline".into()))
            }
        }

        let mut cache = cache();
        let criteria = SearchCriteria::default();
        let err = cache
            .get_items(&mut Offline, &Factory, &query(), &criteria, &PageSpec::new(0, Some(50)))
            .unwrap_err();
        assert_eq!(err, QueryError::Backend("offline".into()));
        assert!(cache.entry(&query(), &criteria).is_none());
        assert_eq!(cache.backend_calls(), 1);
    }

    #[test]
    #[should_panic(expected = "cache batch size must be positive")]
    fn test_zero_batch_size_is_rejected() {
        ResultCache::new(CacheConfig::default().with_batch_size(0), vec![ColumnType::Text]);
    }

    #[test]
    #[should_panic(expected = "duplicate result chunk")]
    fn test_duplicate_chunk_is_fatal() {
        let mut set = PartialSet::default();
        set.append(0, RawResultChunk::default(), Vec::new());
        set.append(0, RawResultChunk::default(), Vec::new());
    }

    #[test]
    fn test_parent_context_separates_queries() {
        let mut cache = cache();
        let mut client = FakeClient {
            total: 5,
            report_total: true,
        };
        let criteria = SearchCriteria::default();
        let scoped = query().with_parent("seq-a");
        cache
            .get_items(&mut client, &Factory, &scoped, &criteria, &PageSpec::new(0, None))
            .unwrap();
        assert!(cache.entry(&query(), &criteria).is_none());
        assert!(cache.entry(&scoped, &criteria).is_some());

        cache.purge_query(&scoped);
        assert!(cache.entry(&scoped, &criteria).is_none());
    }
}
