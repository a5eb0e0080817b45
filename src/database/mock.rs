//! In-memory driver for unit tests.
//!
//! Every call is appended to a shared [`Journal`] tagged with the DSN of the
//! connection that received it, so tests can assert where a call was routed.
//! Failures are injected through the DSN: a target containing `!open`,
//! `!close` or `!ping` fails that operation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use super::{Connection, Connector, FromRow};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub(crate) struct MockError(pub(crate) String);

/// One recorded call: which DSN received which operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub(crate) target: String,
    pub(crate) op: &'static str,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    calls: Mutex<Vec<Call>>,
}

impl Journal {
    fn record(&self, target: &str, op: &'static str) {
        self.calls.lock().unwrap().push(Call {
            target: target.to_owned(),
            op,
        });
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Targets that received `op`, in call order.
    pub(crate) fn targets_of(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.target)
            .collect()
    }
}

#[derive(Debug)]
pub(crate) struct MockConnection {
    dsn: String,
    journal: Arc<Journal>,
    driver: String,
    pub(crate) max_idle: AtomicUsize,
    pub(crate) max_open: AtomicUsize,
    pub(crate) lifetime: Mutex<Option<Duration>>,
}

impl MockConnection {
    pub(crate) fn new(dsn: &str, journal: Arc<Journal>) -> Self {
        Self {
            dsn: dsn.to_owned(),
            journal,
            driver: "mock".to_owned(),
            max_idle: AtomicUsize::new(2),
            max_open: AtomicUsize::new(0),
            lifetime: Mutex::new(None),
        }
    }

    pub(crate) fn dsn(&self) -> &str {
        &self.dsn
    }

    fn fail_on(&self, op: &'static str) -> Result<(), MockError> {
        self.journal.record(&self.dsn, op);
        if self.dsn.contains(&format!("!{op}")) {
            Err(MockError(format!("{op} failed on {}", self.dsn)))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub(crate) struct MockTransaction {
    pub(crate) target: String,
}

#[derive(Debug)]
pub(crate) struct MockStatement {
    pub(crate) target: String,
    pub(crate) query: String,
}

/// Row decoded by `select` in tests.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Id(pub(crate) i64);

impl FromRow<MockConnection> for Id {
    fn from_row(row: &i64) -> Result<Self, MockError> {
        if *row < 0 {
            return Err(MockError(format!("negative id {row}")));
        }
        Ok(Id(*row))
    }
}

impl Connection for MockConnection {
    type Error = MockError;
    type Value = i64;
    type Row = i64;
    type Rows = Vec<i64>;
    type QueryResult = u64;
    type Transaction = MockTransaction;
    type Statement = MockStatement;
    type Driver = String;

    async fn close(&self) -> Result<(), MockError> {
        self.fail_on("close")
    }

    async fn ping(&self) -> Result<(), MockError> {
        self.fail_on("ping")
    }

    async fn exec(&self, _query: &str, args: &[i64]) -> Result<u64, MockError> {
        self.journal.record(&self.dsn, "exec");
        Ok(args.len() as u64)
    }

    async fn select<T>(&self, _query: &str, args: &[i64]) -> Result<Vec<T>, MockError>
    where
        T: FromRow<Self> + Send,
    {
        self.journal.record(&self.dsn, "select");
        args.iter().map(T::from_row).collect()
    }

    async fn query(&self, _query: &str, args: &[i64]) -> Result<Vec<i64>, MockError> {
        self.journal.record(&self.dsn, "query");
        Ok(args.to_vec())
    }

    async fn begin(&self) -> Result<MockTransaction, MockError> {
        self.journal.record(&self.dsn, "begin");
        Ok(MockTransaction {
            target: self.dsn.clone(),
        })
    }

    async fn prepare(&self, query: &str) -> Result<MockStatement, MockError> {
        self.journal.record(&self.dsn, "prepare");
        Ok(MockStatement {
            target: self.dsn.clone(),
            query: query.to_owned(),
        })
    }

    fn driver(&self) -> &String {
        &self.driver
    }

    fn set_max_idle_conns(&self, n: usize) {
        self.max_idle.store(n, Ordering::SeqCst);
    }

    fn set_max_open_conns(&self, n: usize) {
        self.max_open.store(n, Ordering::SeqCst);
    }

    fn set_conn_max_lifetime(&self, lifetime: Option<Duration>) {
        *self.lifetime.lock().unwrap() = lifetime;
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockConnector {
    pub(crate) journal: Arc<Journal>,
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self, data_source_name: &str) -> Result<MockConnection, MockError> {
        self.journal.record(data_source_name, "open");
        if data_source_name.contains("!open") {
            return Err(MockError(format!("open failed on {data_source_name}")));
        }
        Ok(MockConnection::new(data_source_name, Arc::clone(&self.journal)))
    }
}
