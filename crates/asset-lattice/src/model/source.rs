//! Data sources and backend collaborators.
//!
//! An [`ItemStore`](super::ItemStore) pulls rows from a [`DataSource`]. The
//! standard source, [`QuerySource`], answers through a [`ResultCache`] in
//! front of a [`QueryClient`] (the backend) and an [`ItemFactory`] (raw
//! record to [`Item`] conversion).
//!
//! Backend calls are synchronous from the store's point of view: they
//! return a batch or an error before the store continues.

use asset_lattice_core::logging::targets;

use super::cache::{FilterSpec, PageSpec, QueryKey, RawResultChunk, ResultCache, SearchCriteria};
use super::comparator::SortCriteria;
use super::item::{Item, ItemId};
use crate::error::QueryError;

/// Backend query collaborator.
pub trait QueryClient {
    /// Runs one paginated query.
    ///
    /// When `filter.find_total` is set the returned chunk must report the
    /// total size of the result.
    fn fetch(&mut self, query: &QueryKey, filter: &FilterSpec) -> Result<RawResultChunk, QueryError>;
}

/// Builds items from raw backend records.
pub trait ItemFactory {
    /// Creates one item per record, with the record's id as the item id.
    fn make_items(&self, chunk: &RawResultChunk) -> Result<Vec<Item>, QueryError>;
}

impl<F> ItemFactory for F
where
    F: Fn(&RawResultChunk) -> Result<Vec<Item>, QueryError>,
{
    fn make_items(&self, chunk: &RawResultChunk) -> Result<Vec<Item>, QueryError> {
        self(chunk)
    }
}

/// One batch request from the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchRequest {
    /// Id of the node being populated, `None` for the root.
    pub parent: Option<ItemId>,
    /// Number of children already loaded.
    pub offset: usize,
    /// Batch size, `None` to load everything.
    pub limit: Option<usize>,
    /// Current sort order of the store.
    pub sort: SortCriteria,
    /// Bypass every cache.
    pub force_reload: bool,
}

/// Rows returned for a [`FetchRequest`].
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Detached items, ready to insert.
    pub items: Vec<Item>,
    /// Total number of children of the node, if known.
    pub total_count: Option<usize>,
}

impl Batch {
    /// Creates a batch.
    pub fn new(items: Vec<Item>, total_count: Option<usize>) -> Self {
        Self { items, total_count }
    }
}

/// Where an item store gets its rows from.
pub trait DataSource {
    /// Fetches one batch of children.
    fn fetch(&mut self, request: &FetchRequest) -> Result<Batch, QueryError>;

    /// Returns `true` if the source can return rows already sorted by the
    /// requested criteria, letting the store re-query instead of sorting
    /// the tree in memory.
    fn supports_sorted_requery(&self) -> bool {
        false
    }
}

/// Cache-backed data source.
#[derive(Debug)]
pub struct QuerySource<C, F> {
    client: C,
    factory: F,
    cache: ResultCache,
    query: QueryKey,
    criteria: SearchCriteria,
    sorted_requery: bool,
}

impl<C: QueryClient, F: ItemFactory> QuerySource<C, F> {
    /// Creates a source running `query` through `cache`.
    pub fn new(client: C, factory: F, cache: ResultCache, query: QueryKey) -> Self {
        let criteria = SearchCriteria::from_config(cache.config());
        Self {
            client,
            factory,
            cache,
            query,
            criteria,
            sorted_requery: false,
        }
    }

    /// Declares that the backend can sort server-side.
    pub fn with_sorted_requery(mut self, enabled: bool) -> Self {
        self.sorted_requery = enabled;
        self
    }

    /// Replaces the search criteria.
    pub fn with_criteria(mut self, criteria: SearchCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Current search criteria.
    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    /// Replaces the search criteria. Cached results stay valid for later
    /// reuse.
    pub fn set_criteria(&mut self, criteria: SearchCriteria) {
        self.criteria = criteria;
    }

    /// The result cache.
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// The result cache, mutably.
    pub fn cache_mut(&mut self) -> &mut ResultCache {
        &mut self.cache
    }

    /// The backend client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Query key for children of `parent`.
    fn query_for(&self, parent: Option<&ItemId>) -> QueryKey {
        QueryKey {
            parent_context: parent.cloned(),
            ..self.query.clone()
        }
    }
}

impl<C: QueryClient, F: ItemFactory> DataSource for QuerySource<C, F> {
    fn fetch(&mut self, request: &FetchRequest) -> Result<Batch, QueryError> {
        let query = self.query_for(request.parent.as_ref());
        let page = PageSpec {
            sort: request.sort.clone(),
            offset: request.offset,
            limit: request.limit,
            force_reload: request.force_reload,
        };
        tracing::debug!(
            target: targets::SOURCE,
            %query,
            offset = page.offset,
            limit = ?page.limit,
            "fetching batch"
        );

        let result = self
            .cache
            .get_items(&mut self.client, &self.factory, &query, &self.criteria, &page);
        match result {
            Ok(page) => Ok(Batch::new(page.items, page.total_count)),
            Err(err) => {
                tracing::warn!(target: targets::SOURCE, %query, error = %err, "backend fetch failed");
                Err(err)
            }
        }
    }

    fn supports_sorted_requery(&self) -> bool {
        self.sorted_requery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::model::role::{ColumnType, ItemRole};
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        queries: Vec<QueryKey>,
    }

    impl QueryClient for Recorder {
        fn fetch(&mut self, query: &QueryKey, _filter: &FilterSpec) -> Result<RawResultChunk, QueryError> {
            self.queries.push(query.clone());
            Ok(RawResultChunk::new(vec![json!({"id": "a"}), json!({"id": "b"})], Some(2)))
        }
    }

    fn factory(chunk: &RawResultChunk) -> Result<Vec<Item>, QueryError> {
        Ok(chunk
            .records
            .iter()
            .filter_map(|r| r["id"].as_str())
            .map(|id| Item::with_id(id, "Asset", 1).with_data(0, ItemRole::Display, id))
            .collect())
    }

    fn source() -> QuerySource<Recorder, fn(&RawResultChunk) -> Result<Vec<Item>, QueryError>> {
        let cache = ResultCache::new(CacheConfig::default(), vec![ColumnType::Text]);
        QuerySource::new(
            Recorder::default(),
            factory as fn(&RawResultChunk) -> Result<Vec<Item>, QueryError>,
            cache,
            QueryKey::new("assets", "by_parent"),
        )
    }

    #[test]
    fn test_parent_becomes_query_context() {
        let mut source = source();
        let request = FetchRequest {
            parent: Some(ItemId::from("seq-a")),
            limit: Some(50),
            ..Default::default()
        };
        let batch = source.fetch(&request).unwrap();
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.total_count, Some(2));
        assert_eq!(
            source.client().queries[0].parent_context,
            Some(ItemId::from("seq-a"))
        );
    }

    #[test]
    fn test_repeat_fetch_served_by_cache() {
        let mut source = source();
        let request = FetchRequest {
            limit: Some(50),
            ..Default::default()
        };
        source.fetch(&request).unwrap();
        source.fetch(&request).unwrap();
        assert_eq!(source.cache().backend_calls(), 1);
        assert!(!source.supports_sorted_requery());
        assert!(source.with_sorted_requery(true).supports_sorted_requery());
    }

    #[test]
    fn test_criteria_default_from_cache_config() {
        let source = source();
        assert!(source.criteria().omit_deleted);
        assert!(!source.criteria().omit_archived);
    }
}
