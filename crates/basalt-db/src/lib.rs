//! Embedded analytical database client layer.
//!
//! `basalt-db` wraps a `DataFusion` session in the handle model an embedded
//! SQL engine exposes to host programs: a [`Database`](api::Database) opened
//! from a path and a [`Config`], [`Connection`](api::Connection)s that run
//! SQL, fully materialized [`QueryResult`](api::QueryResult)s read cell by
//! cell with type conversion, [`PreparedStatement`](api::PreparedStatement)s
//! with positional parameters, an [`Appender`](api::Appender) for bulk
//! loading, and [`ArrowResult`](api::ArrowResult) for chunked export over
//! the Arrow C Data Interface.
//!
//! Everything is available twice: as the safe Rust API in [`api`], and as a
//! C ABI in [`ffi`] built into the `cdylib`/`staticlib` artifacts.
//!
//! # Example
//!
//! ```rust,ignore
//! use basalt_db::api::Database;
//!
//! let db = Database::open_in_memory()?;
//! let conn = db.connect()?;
//! conn.query("CREATE TABLE integers (i INTEGER, j INTEGER)")?;
//! conn.query("INSERT INTO integers VALUES (3, 4), (5, 6), (7, NULL)")?;
//!
//! let result = conn.query("SELECT * FROM integers")?;
//! assert_eq!(result.row_count(), 3);
//! assert!(result.is_null(1, 2));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod arena;
pub mod codec;
mod config;
mod engine;
mod error;
pub mod ffi;
mod sql_utils;
mod storage;
pub mod types;

pub use config::{config_count, config_flag, AccessMode, Config, ConfigOption};
pub use error::DbError;
pub use types::{Date, HugeInt, Interval, ScalarType, Time, Timestamp, Value, ValueRef};
