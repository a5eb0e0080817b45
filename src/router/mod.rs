//! Read/write routing — one logical database over a primary and its replicas.
//!
//! [`DB`] owns an ordered list of physical databases. Position `0` is the
//! primary; every other position is an interchangeable replica.
//!
//! | Operation                                   | Target                        |
//! |---------------------------------------------|-------------------------------|
//! | `exec`, `begin`, `prepare`, `driver`        | primary                       |
//! | `select`, `query`, `prepare_replica`        | one replica, round-robin      |
//! | `open`, `close`, `ping`                     | every physical db, concurrently |
//! | `set_max_idle_conns`, `set_max_open_conns`, `set_conn_max_lifetime` | every physical db |
//!
//! Each read picks its replica independently; nothing pins a caller to one
//! replica. Callers that need several statements on the same physical
//! database take it directly with [`DB::primary`] or [`DB::replica`].
//!
//! With a single data source the primary also serves reads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, split_data_sources};
use crate::database::{Connection, Connector, ConnectorError, FromRow};
use crate::scatter::{scatter, scatter_all};

/// Errors produced by the router's lifecycle operations.
///
/// Statement-level failures (`exec`, `select`, …) are not wrapped: they are
/// returned exactly as the driver reported them.
#[derive(Debug, Error)]
pub enum RouterError<E> {
    #[error("no data source names given; at least a primary is required")]
    NoDataSources,

    #[error("failed to open physical database {index}: {source}")]
    Open {
        index: usize,
        #[source]
        source: E,
    },

    #[error("failed to close physical database {index}: {source}")]
    Close {
        index: usize,
        #[source]
        source: E,
    },

    #[error("ping failed on physical database {index}: {source}")]
    Ping {
        index: usize,
        #[source]
        source: E,
    },
}

impl<E> RouterError<E> {
    /// Position of the physical database that failed, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::NoDataSources => None,
            Self::Open { index, .. } | Self::Close { index, .. } | Self::Ping { index, .. } => {
                Some(*index)
            }
        }
    }

    /// Consumes the error, returning the driver error it wraps.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::NoDataSources => None,
            Self::Open { source, .. } | Self::Close { source, .. } | Self::Ping { source, .. } => {
                Some(source)
            }
        }
    }
}

/// A logical database with one primary and any number of replicas.
///
/// Reads and writes are directed to the correct physical database
/// automatically. `DB` is `Send + Sync`; share it between tasks behind an
/// [`Arc`](std::sync::Arc).
///
/// # Examples
///
/// ```rust,ignore
/// let db = DB::open(&PgConnector, "postgres://primary;postgres://replica1;postgres://replica2").await?;
///
/// db.exec("INSERT INTO users (name) VALUES ($1)", &["ada".into()]).await?; // primary
/// let users: Vec<User> = db.select("SELECT * FROM users", &[]).await?;     // a replica
///
/// db.close().await?;
/// ```
#[derive(Debug)]
pub struct DB<C: Connection> {
    // Index 0 is the primary; the length never changes after construction.
    conns: Vec<C>,
    // Advanced once per replica selection. Wraps on overflow.
    count: AtomicU64,
}

impl<C: Connection> DB<C> {
    /// Opens every physical database named in `data_source_names` concurrently.
    ///
    /// `data_source_names` is a `;`-separated list of DSNs: the first one is
    /// the primary and the rest are replicas.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Open`] for the lowest-positioned DSN that failed
    /// to open. Physical databases that did open are closed before returning.
    pub async fn open<K>(
        connector: &K,
        data_source_names: &str,
    ) -> Result<Self, RouterError<ConnectorError<K>>>
    where
        K: Connector<Connection = C>,
    {
        let targets = split_data_sources(data_source_names);
        Self::open_all(connector, targets.as_slice()).await
    }

    /// Opens `config.data_sources` and applies `config.pool` to every
    /// physical database.
    ///
    /// # Errors
    ///
    /// Same as [`DB::open`].
    pub async fn open_with_config<K>(
        connector: &K,
        config: &Config,
    ) -> Result<Self, RouterError<ConnectorError<K>>>
    where
        K: Connector<Connection = C>,
    {
        let db = Self::open(connector, &config.data_sources).await?;
        config.pool.apply(&db);
        Ok(db)
    }

    /// Opens one physical database per target concurrently. `targets[0]` is
    /// the primary.
    ///
    /// # Errors
    ///
    /// - [`RouterError::NoDataSources`] if `targets` is empty.
    /// - [`RouterError::Open`] for the lowest-positioned target that failed.
    ///   Every target that opened successfully is closed again; close
    ///   failures during that cleanup are logged and dropped.
    pub async fn open_all<K, S>(
        connector: &K,
        targets: &[S],
    ) -> Result<Self, RouterError<ConnectorError<K>>>
    where
        K: Connector<Connection = C>,
        S: AsRef<str> + Sync,
    {
        if targets.is_empty() {
            return Err(RouterError::NoDataSources);
        }

        info!(
            driver = connector.name(),
            connections = targets.len(),
            "opening physical databases"
        );

        let results = scatter_all(targets.len(), |index| {
            let target = targets[index].as_ref();
            async move {
                connector
                    .connect(target)
                    .await
                    .map_err(|source| RouterError::Open { index, source })
            }
        })
        .await;

        let mut opened = Vec::with_capacity(targets.len());
        let mut failure = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(conn) => opened.push((index, conn)),
                Err(e) => {
                    warn!(index, error = %e, "physical database failed to open");
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        match failure {
            None => Ok(Self::new(opened.into_iter().map(|(_, conn)| conn).collect())),
            Some(e) => {
                close_abandoned(&opened).await;
                Err(e)
            }
        }
    }

    /// Wraps physical databases that are already open. `conns[0]` is the
    /// primary.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NoDataSources`] if `conns` is empty.
    pub fn from_connections(conns: Vec<C>) -> Result<Self, RouterError<C::Error>> {
        if conns.is_empty() {
            return Err(RouterError::NoDataSources);
        }
        Ok(Self::new(conns))
    }

    fn new(conns: Vec<C>) -> Self {
        Self {
            conns,
            count: AtomicU64::new(0),
        }
    }

    /// Closes every physical database concurrently, consuming the router.
    ///
    /// Every close is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Close`] for the lowest-positioned physical
    /// database that failed to close.
    pub async fn close(self) -> Result<(), RouterError<C::Error>> {
        debug!(connections = self.conns.len(), "closing physical databases");
        scatter(self.conns.len(), |index| {
            let conn = &self.conns[index];
            async move {
                conn.close()
                    .await
                    .map_err(|source| RouterError::Close { index, source })
            }
        })
        .await
        .inspect_err(|e| warn!(error = %e, "close failed"))?;
        Ok(())
    }

    /// Verifies every physical database is alive, connecting if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Ping`] for the lowest-positioned physical
    /// database that failed.
    pub async fn ping(&self) -> Result<(), RouterError<C::Error>> {
        scatter(self.conns.len(), |index| {
            let conn = &self.conns[index];
            async move {
                conn.ping()
                    .await
                    .map_err(|source| RouterError::Ping { index, source })
            }
        })
        .await
        .inspect_err(|e| warn!(error = %e, "ping failed"))?;
        Ok(())
    }

    /// Returns the primary physical database.
    pub fn primary(&self) -> &C {
        &self.conns[0]
    }

    /// Returns a replica chosen round-robin, or the primary when no replicas
    /// are configured.
    ///
    /// Every call advances the rotation, so two calls may return different
    /// physical databases. Hold on to the returned reference to run several
    /// statements against the same replica.
    pub fn replica(&self) -> &C {
        let index = self.replica_index();
        trace!(index, "routing read");
        &self.conns[index]
    }

    /// Picks the position of the next replica in the rotation.
    ///
    /// Always `0` with a single physical database. Otherwise cycles through
    /// `1..len`, starting at `1 + 1 % (len - 1)`.
    pub fn replica_index(&self) -> usize {
        select_replica(&self.count, self.conns.len())
    }

    /// Number of physical databases, primary included.
    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Number of replicas.
    pub fn replica_count(&self) -> usize {
        self.conns.len() - 1
    }

    /// All physical databases in order, primary first.
    pub fn connections(&self) -> &[C] {
        &self.conns
    }

    /// Returns the primary's underlying driver.
    pub fn driver(&self) -> &C::Driver {
        self.primary().driver()
    }

    /// Starts a transaction on the primary.
    pub async fn begin(&self) -> Result<C::Transaction, C::Error> {
        trace!(index = 0, "begin");
        self.primary().begin().await
    }

    /// Executes a statement on the primary without returning rows.
    pub async fn exec(&self, query: &str, args: &[C::Value]) -> Result<C::QueryResult, C::Error> {
        trace!(index = 0, "exec");
        self.primary().exec(query, args).await
    }

    /// Prepares a statement on the primary.
    pub async fn prepare(&self, query: &str) -> Result<C::Statement, C::Error> {
        trace!(index = 0, "prepare");
        self.primary().prepare(query).await
    }

    /// Prepares a statement on one of the replicas.
    pub async fn prepare_replica(&self, query: &str) -> Result<C::Statement, C::Error> {
        self.replica().prepare(query).await
    }

    /// Runs a query on one of the replicas and decodes every row into `T`.
    pub async fn select<T>(&self, query: &str, args: &[C::Value]) -> Result<Vec<T>, C::Error>
    where
        T: FromRow<C> + Send,
    {
        self.replica().select(query, args).await
    }

    /// Runs a query on one of the replicas and returns its row cursor.
    pub async fn query(&self, query: &str, args: &[C::Value]) -> Result<C::Rows, C::Error> {
        self.replica().query(query, args).await
    }

    /// Sets the maximum number of idle connections on every physical database.
    pub fn set_max_idle_conns(&self, n: usize) {
        for conn in &self.conns {
            conn.set_max_idle_conns(n);
        }
    }

    /// Sets the maximum number of open connections on every physical database.
    /// `0` means unlimited.
    pub fn set_max_open_conns(&self, n: usize) {
        for conn in &self.conns {
            conn.set_max_open_conns(n);
        }
    }

    /// Sets the maximum connection lifetime on every physical database.
    /// `None` reuses connections forever.
    pub fn set_conn_max_lifetime(&self, lifetime: Option<Duration>) {
        for conn in &self.conns {
            conn.set_conn_max_lifetime(lifetime);
        }
    }
}

// Closes connections left over from a failed `open_all`.
async fn close_abandoned<C: Connection>(opened: &[(usize, C)]) {
    let results = scatter_all(opened.len(), |i| opened[i].1.close()).await;
    for (&(index, _), result) in opened.iter().zip(results) {
        if let Err(e) = result {
            warn!(index, error = %e, "failed to close physical database after aborted open");
        }
    }
}

fn select_replica(count: &AtomicU64, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let ticket = count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    1 + (ticket % (n as u64 - 1)) as usize
}
