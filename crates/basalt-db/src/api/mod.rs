//! Safe Rust API: the layer the C ABI in [`ffi`](crate::ffi) wraps.
//!
//! - **Numeric error codes** on every [`ApiError`], shared with the C ABI
//! - **Explicit lifecycles**: `close()` methods return `Result`, `Drop`
//!   does the same work and logs failures
//! - **Arena-backed strings**: text and blob reads copy into an [`Arena`](crate::arena::Arena)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use basalt_db::api::Database;
//!
//! let db = Database::open_in_memory()?;
//! let conn = db.connect()?;
//!
//! conn.query("CREATE TABLE t (i INTEGER, s VARCHAR)")?;
//!
//! let mut stmt = conn.prepare("INSERT INTO t VALUES (?, ?)")?;
//! stmt.bind_int32(0, 1)?;
//! stmt.bind_varchar(1, "one")?;
//! stmt.execute()?;
//!
//! let result = conn.query("SELECT i, s FROM t")?;
//! assert_eq!(result.value_int32(0, 0), 1);
//! ```
//!
//! # Thread Safety
//!
//! [`Database`] may be shared across threads. Each thread should open its
//! own [`Connection`]; results, statements and appenders belong to the
//! thread that uses them.

mod appender;
mod arrow_result;
mod connection;
mod database;
mod error;
mod result;
mod statement;

pub use appender::Appender;
pub use arrow_result::ArrowResult;
pub use connection::Connection;
pub use database::Database;
pub use error::{codes, ApiError};
pub use result::{Column, ColumnData, QueryResult};
pub use statement::PreparedStatement;
