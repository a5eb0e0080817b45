//! # splitdb
//!
//! One logical database handle over a primary and any number of replicas.
//!
//! Writes and transactions go to the primary; reads are spread over the
//! replicas round-robin. Opening, closing and pinging fan out to every
//! physical database concurrently.
//!
//! `splitdb` is driver-agnostic: plug a driver in by implementing
//! [`database::Connector`] and [`database::Connection`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use splitdb::DB;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = DB::open(&MyDriver, "db://primary;db://replica1;db://replica2").await?;
//!     db.ping().await?;
//!
//!     db.exec("UPDATE accounts SET active = true", &[]).await?; // primary
//!     let rows = db.query("SELECT * FROM accounts", &[]).await?; // replica
//!
//!     db.close().await?;
//!     Ok(())
//! }
//! ```

// ── Routing core ──────────────────────────────────────────────────────────────
pub mod router;
pub mod scatter;

// ── Driver seam and configuration ─────────────────────────────────────────────
pub mod config;
pub mod database;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{Config, PoolOptions};
pub use database::{Connection, Connector, FromRow};
pub use router::{DB, RouterError};
