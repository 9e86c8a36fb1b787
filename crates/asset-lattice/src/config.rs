//! Store and cache configuration.
//!
//! Every field has a default, so a configuration file only needs to name
//! the values it changes:
//!
//! ```
//! use asset_lattice::LatticeConfig;
//!
//! let config = LatticeConfig::from_toml_str(
//!     r#"
//!     [store]
//!     batch_size = 100
//!
//!     [cache]
//!     omit_archived = true
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.store.batch_size, 100);
//! assert!(config.store.incremental_loading);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::MAX_SORT_COLUMNS;

/// Default number of rows fetched per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Item store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Rows requested per `fetch_more` call.
    pub batch_size: usize,
    /// Fetch children in batches. When disabled a node is populated by a
    /// single unbounded request.
    pub incremental_loading: bool,
    /// Maximum number of sort columns.
    pub max_sort_columns: usize,
    /// Record an UPDATE edit on every `set_data`.
    pub track_edits: bool,
    /// Let a data source that can return pre-sorted rows re-query instead of
    /// sorting in memory.
    pub requery_on_sort: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            incremental_loading: true,
            max_sort_columns: MAX_SORT_COLUMNS,
            track_edits: true,
            requery_on_sort: true,
        }
    }
}

impl StoreConfig {
    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enables or disables incremental loading.
    pub fn with_incremental_loading(mut self, enabled: bool) -> Self {
        self.incremental_loading = enabled;
        self
    }

    /// Sets the maximum number of sort columns.
    pub fn with_max_sort_columns(mut self, max: usize) -> Self {
        self.max_sort_columns = max;
        self
    }

    /// Enables or disables edit tracking on `set_data`.
    pub fn with_track_edits(mut self, enabled: bool) -> Self {
        self.track_edits = enabled;
        self
    }

    /// Enables or disables sorted re-queries.
    pub fn with_requery_on_sort(mut self, enabled: bool) -> Self {
        self.requery_on_sort = enabled;
        self
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Chunk size of cached result sets.
    pub batch_size: usize,
    /// Exclude deleted records from queries.
    pub omit_deleted: bool,
    /// Exclude archived records from queries.
    pub omit_archived: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            omit_deleted: true,
            omit_archived: false,
        }
    }
}

impl CacheConfig {
    /// Sets the chunk size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets whether deleted records are excluded.
    pub fn with_omit_deleted(mut self, omit: bool) -> Self {
        self.omit_deleted = omit;
        self
    }

    /// Sets whether archived records are excluded.
    pub fn with_omit_archived(mut self, omit: bool) -> Self {
        self.omit_archived = omit;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Item store settings.
    pub store: StoreConfig,
    /// Result cache settings.
    pub cache: CacheConfig,
}

impl LatticeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LatticeConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.batch_size == 0 {
            return Err(ConfigError::Invalid("store.batch_size must be positive".into()));
        }
        if self.cache.batch_size == 0 {
            return Err(ConfigError::Invalid("cache.batch_size must be positive".into()));
        }
        if !(1..=MAX_SORT_COLUMNS).contains(&self.store.max_sort_columns) {
            return Err(ConfigError::Invalid(format!(
                "store.max_sort_columns must be between 1 and {MAX_SORT_COLUMNS}"
            )));
        }
        Ok(())
    }
}
