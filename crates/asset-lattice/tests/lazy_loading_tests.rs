//! Tests for lazy fetching through the result cache.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use asset_lattice::model::{
    ColumnSpec, ColumnType, FilterSpec, Item, ItemFactory, ItemFlags, ItemRole, ItemStore,
    ModelIndex, QueryClient, QueryKey, QuerySource, RawResultChunk, ResultCache, SortDirection,
};
use asset_lattice::{CacheConfig, QueryError, StoreConfig, StoreError};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// 120 sequences at the top level, three shots under each sequence, sorted
/// server-side by the requested columns. The sequence `seq-broken` fails
/// every query.
struct Backend {
    calls: Arc<AtomicUsize>,
}

impl QueryClient for Backend {
    fn fetch(&mut self, query: &QueryKey, filter: &FilterSpec) -> Result<RawResultChunk, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (prefix, total) = match &query.parent_context {
            None => ("seq".to_string(), 120),
            Some(parent) if parent.as_str() == "seq-broken" => {
                return Err(QueryError::Backend("connection reset".into()));
            }
            Some(parent) => (format!("{parent}/sh"), 3),
        };
        let mut records: Vec<serde_json::Value> = (0..total)
            .map(|i| json!({ "id": format!("{prefix}-{i:03}"), "frames": (i * 37) % 101 }))
            .collect();
        for sort in filter.sort.columns().iter().rev() {
            records.sort_by(|a, b| {
                let ordering = match sort.column {
                    0 => a["id"].as_str().cmp(&b["id"].as_str()),
                    _ => a["frames"].as_i64().cmp(&b["frames"].as_i64()),
                };
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        let records = records
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(total))
            .collect();
        Ok(RawResultChunk::new(records, filter.find_total.then_some(total)))
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
                    .ok_or_else(|| QueryError::Factory("record without id".into()))?;
                Ok(Item::with_id(id, "Sequence", 2)
                    .with_data(0, ItemRole::Display, id)
                    .with_data(1, ItemRole::Display, &record["frames"])
                    .with_flags(ItemFlags::checkable()))
            })
            .collect()
    }
}

fn columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("Name", ColumnType::Text),
        ColumnSpec::new("Frames", ColumnType::Int),
    ]
}

fn store_with(config: StoreConfig) -> (ItemStore, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ResultCache::new(
        CacheConfig::default().with_batch_size(50),
        vec![ColumnType::Text, ColumnType::Int],
    );
    let source = QuerySource::new(
        Backend {
            calls: calls.clone(),
        },
        Factory,
        cache,
        QueryKey::new("assets", "by_parent"),
    )
    .with_sorted_requery(true);
    (ItemStore::new(columns(), config).with_source(source), calls)
}

fn root() -> ModelIndex {
    ModelIndex::invalid()
}

fn ids(store: &ItemStore, parent: &ModelIndex) -> Vec<String> {
    (0..store.row_count(parent))
        .map(|row| store.data(&store.index(row, 0, parent), ItemRole::Display).to_string())
        .collect()
}

#[test]
fn test_incremental_batches_until_total() {
    let (mut store, calls) = store_with(StoreConfig::default());

    assert!(store.has_children(&root()));
    for (expected_added, expected_rows) in [(50, 50), (50, 100), (20, 120)] {
        assert!(store.can_fetch_more(&root()));
        assert_eq!(store.fetch_more(&root()).unwrap(), expected_added);
        assert_eq!(store.row_count(&root()), expected_rows);
    }

    assert!(!store.can_fetch_more(&root()));
    assert_eq!(store.fetch_more(&root()).unwrap(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.indexed_id_count(), 120);
}

#[test]
fn test_resort_of_complete_set_needs_no_backend() {
    let (mut store, calls) = store_with(StoreConfig::default());
    while store.can_fetch_more(&root()) {
        store.fetch_more(&root()).unwrap();
    }
    let before: BTreeSet<String> = ids(&store, &root()).into_iter().collect();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // The source sorts server-side, so the store resets and refetches.
    store.sort(1, SortDirection::Descending).unwrap();
    while store.can_fetch_more(&root()) {
        store.fetch_more(&root()).unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.row_count(&root()), 120);
    let after: BTreeSet<String> = ids(&store, &root()).into_iter().collect();
    assert_eq!(before, after);

    let frames: Vec<i64> = (0..120)
        .map(|row| {
            store
                .data(&store.index(row, 1, &root()), ItemRole::Display)
                .as_int()
                .unwrap()
        })
        .collect();
    assert!(frames.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn test_in_memory_sort_without_requery() {
    let (mut store, calls) = store_with(StoreConfig::default().with_requery_on_sort(false));
    store.fetch_more(&root()).unwrap();

    store.sort(1, SortDirection::Ascending).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.row_count(&root()), 50);
    let first = store.data(&store.index(0, 1, &root()), ItemRole::Display);
    let last = store.data(&store.index(49, 1, &root()), ItemRole::Display);
    assert!(first.as_int().unwrap() <= last.as_int().unwrap());
}

#[test]
fn test_loading_continues_after_in_memory_sort() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("asset_lattice=debug"))
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let (mut store, calls) = store_with(StoreConfig::default().with_requery_on_sort(false));
        store.fetch_more(&root()).unwrap();
        let first_batch: BTreeSet<String> = ids(&store, &root()).into_iter().collect();

        store.sort(1, SortDirection::Ascending).unwrap();
        assert_eq!(store.fetch_more(&root()).unwrap(), 50);
        let second_batch: BTreeSet<String> = ids(&store, &root())[50..].iter().cloned().collect();
        assert!(first_batch.is_disjoint(&second_batch));

        while store.can_fetch_more(&root()) {
            store.fetch_more(&root()).unwrap();
        }
        assert_eq!(store.row_count(&root()), 120);
        assert_eq!(store.indexed_id_count(), 120);
        let all: BTreeSet<String> = ids(&store, &root()).into_iter().collect();
        assert_eq!(all.len(), 120);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // A full reload starts over under the current sort.
        store.reset();
        store.fetch_more(&root()).unwrap();
        let frames: Vec<i64> = (0..50)
            .map(|row| {
                store
                    .data(&store.index(row, 1, &root()), ItemRole::Display)
                    .as_int()
                    .unwrap()
            })
            .collect();
        assert!(frames.windows(2).all(|pair| pair[0] <= pair[1]));
    });
}

#[test]
fn test_non_incremental_loads_everything_at_once() {
    let (mut store, calls) = store_with(StoreConfig::default().with_incremental_loading(false));

    assert_eq!(store.fetch_more(&root()).unwrap(), 120);
    assert!(!store.can_fetch_more(&root()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_children_are_fetched_per_parent() {
    let (mut store, calls) = store_with(StoreConfig::default());
    store.fetch_more(&root()).unwrap();

    let sequence = store.index(3, 0, &root());
    assert!(store.has_children(&sequence));
    assert_eq!(store.fetch_more(&sequence).unwrap(), 3);
    assert_eq!(ids(&store, &sequence), ["seq-003/sh-000", "seq-003/sh-001", "seq-003/sh-002"]);
    assert!(!store.can_fetch_more(&sequence));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let shot = store.index(0, 0, &sequence);
    assert_eq!(store.parent(&shot), sequence);
}

#[test]
fn test_fetch_failure_is_reported_and_retryable() {
    let (mut store, _calls) = store_with(StoreConfig::default());
    store.set_items(vec![Item::with_id("seq-broken", "Sequence", 2)]);
    let broken = store.index(0, 0, &root());

    let err = store.fetch_more(&broken).unwrap_err();
    assert_eq!(
        err,
        StoreError::Fetch(QueryError::Backend("connection reset".into()))
    );
    assert_eq!(store.row_count(&broken), 0);
    assert!(store.can_fetch_more(&broken));
}
