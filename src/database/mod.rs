//! Database layer — the capability surface of one physical database.
//!
//! `splitdb` does not talk to any database itself. A driver plugs in by
//! implementing two traits:
//!
//! - [`Connector`] — names the driver and opens a physical database from a
//!   data source name (DSN).
//! - [`Connection`] — an opened physical database, usually a pool of
//!   driver-level connections to one address. It executes statements, hands
//!   out transactions and prepared statements, and accepts pool tuning.
//!
//! [`FromRow`] is the destination shape for [`Connection::select`]: it turns
//! one driver row into a caller type.
//!
//! Every method that may block on I/O returns a `Send` future so routed calls
//! can be awaited from any Tokio task.

use std::future::Future;
use std::time::Duration;

#[cfg(test)]
pub(crate) mod mock;

/// Shorthand for the error type of a [`Connector`]'s connections.
pub type ConnectorError<K> = <<K as Connector>::Connection as Connection>::Error;

/// An opened physical database.
///
/// Implementations are expected to be internally synchronized, like a
/// connection pool: every method takes `&self` and may be called from many
/// tasks at once.
pub trait Connection: Send + Sync + Sized + 'static {
    /// Error returned by every fallible operation.
    type Error: std::error::Error + Send + Sync + 'static;
    /// A bound placeholder argument.
    type Value: Send + Sync;
    /// One decoded row, as handed to [`FromRow`].
    type Row: Send;
    /// A row cursor returned by [`query`](Self::query).
    type Rows: Send;
    /// Outcome of [`exec`](Self::exec), e.g. rows affected.
    type QueryResult: Send;
    /// A transaction started by [`begin`](Self::begin).
    type Transaction: Send;
    /// A statement prepared by [`prepare`](Self::prepare).
    type Statement: Send;
    /// Handle to the underlying driver.
    type Driver;

    /// Closes the physical database, releasing any open resources.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Verifies the physical database is reachable, connecting if necessary.
    fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Executes a statement without returning rows.
    fn exec(
        &self,
        query: &str,
        args: &[Self::Value],
    ) -> impl Future<Output = Result<Self::QueryResult, Self::Error>> + Send;

    /// Executes a query and decodes every row into `T`.
    fn select<T>(
        &self,
        query: &str,
        args: &[Self::Value],
    ) -> impl Future<Output = Result<Vec<T>, Self::Error>> + Send
    where
        T: FromRow<Self> + Send;

    /// Executes a query and returns a cursor over its rows.
    fn query(
        &self,
        query: &str,
        args: &[Self::Value],
    ) -> impl Future<Output = Result<Self::Rows, Self::Error>> + Send;

    /// Starts a transaction. The isolation level is up to the driver.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, Self::Error>> + Send;

    /// Prepares a statement bound to this physical database.
    fn prepare(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Self::Statement, Self::Error>> + Send;

    /// Returns the underlying driver.
    fn driver(&self) -> &Self::Driver;

    /// Sets the maximum number of idle connections retained by the pool.
    fn set_max_idle_conns(&self, n: usize);

    /// Sets the maximum number of open connections. `0` means unlimited.
    fn set_max_open_conns(&self, n: usize);

    /// Sets how long a connection may be reused. `None` reuses forever.
    fn set_conn_max_lifetime(&self, lifetime: Option<Duration>);
}

/// Opens physical databases for one driver.
pub trait Connector: Send + Sync {
    /// The physical database type this driver produces.
    type Connection: Connection;

    /// Driver name, used in log output.
    fn name(&self) -> &str;

    /// Opens one physical database from a data source name.
    fn connect(
        &self,
        data_source_name: &str,
    ) -> impl Future<Output = Result<Self::Connection, <Self::Connection as Connection>::Error>> + Send;
}

/// Decodes one row of `C` into `Self`.
///
/// # Examples
///
/// ```rust,ignore
/// struct User { id: i64, name: String }
///
/// impl FromRow<PgConnection> for User {
///     fn from_row(row: &PgRow) -> Result<Self, PgError> {
///         Ok(User { id: row.get("id")?, name: row.get("name")? })
///     }
/// }
/// ```
pub trait FromRow<C: Connection>: Sized {
    /// Decodes `row`, failing with the driver's own error type.
    fn from_row(row: &C::Row) -> Result<Self, C::Error>;
}
