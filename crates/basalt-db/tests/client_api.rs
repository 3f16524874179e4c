//! End-to-end tests of the Rust client API.
//!
//! Covers the query, prepared statement, appender and Arrow paths against
//! one database, plus a close → reopen cycle for path-backed storage.

use arrow::array::{Array, AsArray, StructArray};
use arrow::datatypes::Int32Type;
use arrow::ffi::{from_ffi, FFI_ArrowArray};
use basalt_db::api::{codes, Connection, Database};
use basalt_db::{Config, Date, ScalarType};

fn open_with(options: &[(&str, &str)]) -> (Database, Connection) {
    let mut config = Config::default();
    for (name, value) in options {
        config.set(name, value).unwrap();
    }
    let db = Database::open_ext(None, config).unwrap();
    let conn = db.connect().unwrap();
    (db, conn)
}

/// Route library events to the test output; `RUST_LOG=basalt_db=debug`
/// shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query(&format!("SELECT COUNT(*) FROM {table}"))
        .unwrap()
        .value_int64(0, 0)
}

// ── Scenario A: SELECT 1 ──

#[test]
fn test_select_one() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connect().unwrap();

    let result = conn.query("SELECT 1").unwrap();
    assert_eq!(result.column_count(), 1);
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.value_int32(0, 0), 1);
    assert!(!result.is_null(0, 0));
}

#[test]
fn test_null_and_zero_are_distinct() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE integers (i INTEGER, j INTEGER)").unwrap();
    conn.query("INSERT INTO integers VALUES (3, 4), (5, 6), (7, NULL), (0, 0)")
        .unwrap();

    let result = conn.query("SELECT i, j FROM integers ORDER BY i").unwrap();
    assert_eq!(result.row_count(), 4);
    assert_eq!(result.column_type(1), ScalarType::Integer);

    // (0, 0) sorts first, (7, NULL) last.
    assert_eq!(result.value_int32(1, 0), 0);
    assert!(!result.is_null(1, 0));
    assert_eq!(result.value_int32(1, 3), 0);
    assert!(result.is_null(1, 3));
    assert!(result.value_varchar(1, 3).is_none());
    assert_eq!(result.value_varchar(0, 3).unwrap().as_str(), "7");
}

// ── Scenario B: prepared INSERT ──

#[test]
fn test_prepared_insert() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE t (i INTEGER)").unwrap();

    let mut stmt = conn.prepare("INSERT INTO t VALUES (?)").unwrap();
    assert_eq!(stmt.nparams(), 1);
    stmt.bind_int32(0, 42).unwrap();
    let result = stmt.execute().unwrap();
    assert_eq!(result.rows_changed(), 1);

    // Bindings persist across executions.
    stmt.execute().unwrap();
    let rows = conn.query("SELECT i FROM t").unwrap();
    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.value_int32(0, 1), 42);
}

#[test]
fn test_out_of_range_bind_leaves_other_bindings() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE pairs (a INTEGER, b VARCHAR)").unwrap();

    let mut stmt = conn.prepare("INSERT INTO pairs VALUES (?, ?)").unwrap();
    stmt.bind_int32(0, 7).unwrap();
    stmt.bind_varchar(1, "seven").unwrap();

    let err = stmt.bind_int32(5, 1).unwrap_err();
    assert_eq!(err.code(), codes::PARAMETER_OUT_OF_RANGE);

    assert_eq!(stmt.execute().unwrap().rows_changed(), 1);
    let rows = conn.query("SELECT a, b FROM pairs").unwrap();
    assert_eq!(rows.value_int32(0, 0), 7);
    assert_eq!(rows.value_varchar(1, 0).unwrap().as_str(), "seven");
}

#[test]
fn test_unbound_parameter_fails() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE t (i INTEGER, j INTEGER)").unwrap();

    let mut stmt = conn.prepare("INSERT INTO t VALUES (?, ?)").unwrap();
    stmt.bind_int32(0, 1).unwrap();
    let err = stmt.execute().unwrap_err();
    assert_eq!(err.code(), codes::PARAMETER_UNBOUND);
    assert_eq!(count(&conn, "t"), 0);

    stmt.bind_null(1).unwrap();
    stmt.execute().unwrap();
    assert!(conn.query("SELECT j FROM t").unwrap().is_null(0, 0));
}

#[test]
fn test_prepared_select_with_date() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE events (id INTEGER, day DATE)").unwrap();
    conn.query("INSERT INTO events VALUES (1, DATE '2024-01-01'), (2, DATE '2024-03-01')")
        .unwrap();

    let mut stmt = conn.prepare("SELECT id FROM events WHERE day > ?").unwrap();
    stmt.bind_date(0, Date::new(2024, 2, 1)).unwrap();
    let result = stmt.execute().unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.value_int32(0, 0), 2);
}

// ── Scenario C: appender ──

#[test]
fn test_appender_round_trip() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE t (i INTEGER, s VARCHAR)").unwrap();

    let mut appender = conn.appender(None, "t").unwrap();
    appender.begin_row().unwrap();
    appender.append_int32(1).unwrap();
    appender.append_varchar("x").unwrap();
    appender.end_row().unwrap();
    appender.close().unwrap();

    let result = conn.query("SELECT i, s FROM t").unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.value_int32(0, 0), 1);
    assert_eq!(result.value_varchar(1, 0).unwrap().as_str(), "x");
}

#[test]
fn test_short_row_is_never_visible() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE t (i INTEGER, s VARCHAR)").unwrap();

    let mut appender = conn.appender(None, "t").unwrap();
    appender.begin_row().unwrap();
    appender.append_int32(1).unwrap();
    let err = appender.end_row().unwrap_err();
    assert_eq!(err.code(), codes::COLUMN_COUNT_MISMATCH);

    appender.flush().unwrap();
    assert_eq!(count(&conn, "t"), 0);

    // The appender stays usable for well-formed rows.
    appender.begin_row().unwrap();
    appender.append_int32(2).unwrap();
    appender.append_null().unwrap();
    appender.end_row().unwrap();
    appender.close().unwrap();
    assert_eq!(count(&conn, "t"), 1);
}

#[test]
fn test_appender_rows_hidden_until_flush() {
    let (_db, conn) = open_with(&[("appender_flush_rows", "1000")]);
    conn.query("CREATE TABLE t (i BIGINT)").unwrap();

    let mut appender = conn.appender(None, "t").unwrap();
    for i in 0..10_i64 {
        appender.begin_row().unwrap();
        appender.append_int64(i).unwrap();
        appender.end_row().unwrap();
    }
    assert_eq!(appender.buffered_rows(), 10);
    assert_eq!(count(&conn, "t"), 0);

    appender.flush().unwrap();
    assert_eq!(appender.buffered_rows(), 0);
    assert_eq!(count(&conn, "t"), 10);
}

#[test]
fn test_appender_missing_table() {
    let (_db, conn) = open_with(&[]);
    let err = conn.appender(None, "nope").unwrap_err();
    assert_eq!(err.code(), codes::TABLE_NOT_FOUND);
}

// ── Arrow chunks ──

#[test]
fn test_arrow_chunks_cover_all_rows() {
    let (_db, conn) = open_with(&[("chunk_size", "3")]);
    conn.query("CREATE TABLE t (i INTEGER)").unwrap();
    conn.query("INSERT INTO t VALUES (1), (2), (3), (4), (5), (6), (7)").unwrap();

    let mut result = conn.query_arrow("SELECT i FROM t ORDER BY i").unwrap();
    assert_eq!(result.row_count(), 7);
    assert_eq!(result.column_count(), 1);

    let mut values = Vec::new();
    let mut sizes = Vec::new();
    while let Some(array) = result.next_array().unwrap() {
        let owned = std::mem::replace(array, FFI_ArrowArray::empty());
        // SAFETY: the array and schema come from the same export.
        let data = unsafe { from_ffi(owned, result.arrow_schema()) }.unwrap();
        let chunk = StructArray::from(data);
        sizes.push(chunk.len());
        values.extend(chunk.column(0).as_primitive::<Int32Type>().values().iter().copied());
    }
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(values, (1..=7).collect::<Vec<_>>());
}

#[test]
fn test_moved_chunk_survives_next_call() {
    let (_db, conn) = open_with(&[("chunk_size", "1")]);
    let mut result = conn
        .query_arrow("SELECT * FROM (VALUES (10), (20)) AS v(n)")
        .unwrap();

    let first = std::mem::replace(result.next_array().unwrap().unwrap(), FFI_ArrowArray::empty());
    let second = result.next_array().unwrap().unwrap();
    assert_eq!(second.len(), 1);
    assert!(result.next_array().unwrap().is_none());

    // SAFETY: `first` was moved out before the result released its slot.
    let data = unsafe { from_ffi(first, result.arrow_schema()) }.unwrap();
    assert_eq!(StructArray::from(data).len(), 1);
}

#[test]
fn test_arrow_reports_rows_changed() {
    let (_db, conn) = open_with(&[]);
    conn.query("CREATE TABLE t (i INTEGER)").unwrap();
    let mut result = conn.query_arrow("INSERT INTO t VALUES (1), (2)").unwrap();
    assert_eq!(result.rows_changed(), 2);
    while result.next_array().unwrap().is_some() {}
}

// ── Persistence ──

#[test]
fn test_tables_survive_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let db = Database::open(Some(&path)).unwrap();
        let conn = db.connect().unwrap();
        conn.query("CREATE TABLE kv (k VARCHAR, v BIGINT)").unwrap();
        let mut appender = conn.appender(None, "kv").unwrap();
        for (k, v) in [("a", 1_i64), ("b", 2), ("c", 3)] {
            appender.begin_row().unwrap();
            appender.append_varchar(k).unwrap();
            appender.append_int64(v).unwrap();
            appender.end_row().unwrap();
        }
        appender.close().unwrap();
        drop(conn);
        db.close().unwrap();
    }

    let db = Database::open(Some(&path)).unwrap();
    let conn = db.connect().unwrap();
    let result = conn.query("SELECT SUM(v) FROM kv").unwrap();
    assert_eq!(result.value_int64(0, 0), 6);
}

#[test]
fn test_read_only_database_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");
    {
        let db = Database::open(Some(&path)).unwrap();
        db.connect().unwrap().query("CREATE TABLE t (i INTEGER)").unwrap();
        db.close().unwrap();
    }

    let mut config = Config::default();
    config.set("access_mode", "read_only").unwrap();
    let db = Database::open_ext(Some(&path), config).unwrap();
    let conn = db.connect().unwrap();
    assert_eq!(count(&conn, "t"), 0);
    let err = conn.query("INSERT INTO t VALUES (1)").unwrap_err();
    assert_eq!(err.code(), codes::READ_ONLY);
}

#[test]
fn test_connection_fails_after_database_close() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connect().unwrap();
    db.close().unwrap();
    let err = conn.query("SELECT 1").unwrap_err();
    assert_eq!(err.code(), codes::SHUTDOWN);
}
