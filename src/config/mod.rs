//! Router configuration — data source lists and pool tuning.
//!
//! A [`Config`] can be built in code or deserialized from any serde format.
//! Durations use humantime notation:
//!
//! ```
//! use std::time::Duration;
//! use splitdb::config::Config;
//!
//! let config: Config = serde_json::from_str(r#"{
//!     "data_sources": "postgres://primary;postgres://replica",
//!     "pool": { "max_open_conns": 20, "conn_max_lifetime": "30m" }
//! }"#).unwrap();
//!
//! assert_eq!(config.targets(), vec!["postgres://primary", "postgres://replica"]);
//! assert_eq!(config.pool.conn_max_lifetime, Some(Duration::from_secs(30 * 60)));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::database::Connection;
use crate::router::DB;

/// Separator between data source names. The first entry is the primary.
pub const DATA_SOURCE_SEPARATOR: char = ';';

/// Splits a `;`-separated data source list into its entries.
///
/// No other parsing takes place: entries are not trimmed and empty entries
/// are kept.
pub fn split_data_sources(data_source_names: &str) -> Vec<&str> {
    data_source_names.split(DATA_SOURCE_SEPARATOR).collect()
}

/// Everything needed to open a [`DB`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `;`-separated DSNs, primary first.
    pub data_sources: String,

    /// Pool tuning applied to every physical database after opening.
    #[serde(default)]
    pub pool: PoolOptions,
}

impl Config {
    pub fn new(data_sources: impl Into<String>) -> Self {
        Self {
            data_sources: data_sources.into(),
            pool: PoolOptions::default(),
        }
    }

    pub fn with_pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }

    /// The data source list split into primary and replicas.
    pub fn targets(&self) -> Vec<&str> {
        split_data_sources(&self.data_sources)
    }
}

/// Pool settings. A `None` field leaves the driver's default untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolOptions {
    pub max_idle_conns: Option<usize>,
    pub max_open_conns: Option<usize>,
    #[serde(with = "humantime_serde")]
    pub conn_max_lifetime: Option<Duration>,
}

impl PoolOptions {
    /// Applies every configured setting to every physical database of `db`.
    ///
    /// The open-connection limit is set before the idle limit, since drivers
    /// commonly clamp idle connections to the open limit.
    pub fn apply<C: Connection>(&self, db: &DB<C>) {
        if let Some(n) = self.max_open_conns {
            db.set_max_open_conns(n);
        }
        if let Some(n) = self.max_idle_conns {
            db.set_max_idle_conns(n);
        }
        if let Some(lifetime) = self.conn_max_lifetime {
            db.set_conn_max_lifetime(Some(lifetime));
        }
    }
}
