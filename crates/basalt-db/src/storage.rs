//! Directory-backed table snapshots.
//!
//! ## Disk Layout
//!
//! ```text
//! {path}/
//!   orders.arrow      # Arrow IPC file, one per table
//!   customers.arrow
//!   my%2Dtable.arrow  # "my-table"
//! ```
//!
//! Table names keep `[A-Za-z0-9_]` as-is and store every other byte as
//! `%XX`, so no name can leave the directory or collide with the
//! extension.
//!
//! Files are written to `<name>.arrow.tmp`, fsynced, then renamed into
//! place so a crash mid-save leaves the previous snapshot readable.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;

use tracing::warn;

use crate::error::DbError;

const EXTENSION: &str = "arrow";

/// A table read from or written to disk.
#[derive(Debug)]
pub(crate) struct TableSnapshot {
    pub name: String,
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

/// Snapshot store rooted at a database directory.
#[derive(Debug)]
pub(crate) struct SnapshotStore {
    dir: PathBuf,
}

/// File stem for a table name.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Inverse of [`encode_name`]; `None` for stems it could not have produced.
fn decode_name(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        if first == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(first);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

fn sync_dir(path: &Path) -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        File::open(path)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

impl SnapshotStore {
    /// Open (creating if needed) the directory at `path`.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let invalid = |reason: String| DbError::InvalidPath {
            path: path.display().to_string(),
            reason,
        };
        if path.exists() && !path.is_dir() {
            return Err(invalid("exists and is not a directory".into()));
        }
        std::fs::create_dir_all(path).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            dir: path.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", encode_name(name)))
    }

    fn stored_names(&self) -> Result<Vec<String>, DbError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_name(stem) {
                Some(name) => names.push(name),
                None => warn!(file = %path.display(), "Skipping snapshot with undecodable name"),
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read every stored table.
    pub fn load(&self) -> Result<Vec<TableSnapshot>, DbError> {
        let mut tables = Vec::new();
        for name in self.stored_names()? {
            let reader = FileReader::try_new(File::open(self.table_path(&name))?, None)?;
            let schema = reader.schema();
            let batches = reader.collect::<Result<Vec<_>, _>>()?;
            tables.push(TableSnapshot {
                name,
                schema,
                batches,
            });
        }
        Ok(tables)
    }

    fn write_table(&self, table: &TableSnapshot) -> Result<(), DbError> {
        let path = self.table_path(&table.name);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        {
            let mut writer = FileWriter::try_new(BufWriter::new(File::create(&tmp)?), &table.schema)?;
            for batch in &table.batches {
                writer.write(batch)?;
            }
            writer.finish()?;
            let file = writer.into_inner()?.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Write `tables` and remove files of tables no longer present.
    ///
    /// Every table is attempted even when an earlier one fails; the first
    /// failure is returned after the rest are written. Files named in
    /// `keep` are left in place even though `tables` lacks them.
    pub fn save(&self, tables: &[TableSnapshot], keep: &[&str]) -> Result<(), DbError> {
        let mut first_error = None;
        for table in tables {
            if let Err(e) = self.write_table(table) {
                warn!(table = %table.name, error = %e, "Failed to write table snapshot");
                first_error.get_or_insert(e);
            }
        }

        for stale in self.stored_names()? {
            if !tables.iter().any(|t| t.name == stale) && !keep.contains(&stale.as_str()) {
                std::fs::remove_file(self.table_path(&stale))?;
            }
        }
        sync_dir(&self.dir)?;
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;

    fn snapshot(name: &str, values: &[i32]) -> TableSnapshot {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("label", DataType::Utf8, true),
        ]));
        let labels: Vec<String> = values.iter().map(|v| format!("row{v}")).collect();
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int32Array::from(values.to_vec())),
                Arc::new(StringArray::from(labels)),
            ],
        )
        .unwrap();
        TableSnapshot {
            name: name.into(),
            schema,
            batches: vec![batch],
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        store.save(&[snapshot("a", &[1, 2, 3]), snapshot("b", &[])], &[]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "a");
        let rows: usize = loaded[0].batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 3);
        assert_eq!(loaded[1].schema.fields().len(), 2);
    }

    #[test]
    fn test_save_removes_dropped_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        store.save(&[snapshot("a", &[1]), snapshot("b", &[2])], &[]).unwrap();
        store.save(&[snapshot("b", &[2])], &[]).unwrap();

        let names: Vec<_> = store.load().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b".to_string()]);
        assert!(!dir.path().join("a.arrow").exists());
    }

    #[test]
    fn test_open_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        let err = SnapshotStore::open(&file).unwrap_err();
        assert!(matches!(err, DbError::InvalidPath { .. }));
    }

    #[test]
    fn test_keep_preserves_unsaved_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        store.save(&[snapshot("a", &[1]), snapshot("b", &[2])], &[]).unwrap();
        store.save(&[snapshot("b", &[3])], &["a"]).unwrap();

        let names: Vec<_> = store.load().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_parent_dir_name_stays_inside() {
        let root = tempfile::tempdir().unwrap();
        let db_dir = root.path().join("db");
        let store = SnapshotStore::open(&db_dir).unwrap();
        store.save(&[snapshot("../escaped", &[1, 2])], &[]).unwrap();

        assert!(!root.path().join("escaped.arrow").exists());
        assert_eq!(std::fs::read_dir(&db_dir).unwrap().count(), 1);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "../escaped");
        assert_eq!(loaded[0].batches[0].num_rows(), 2);
    }

    #[test]
    fn test_slash_name_does_not_lose_other_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        store.save(&[snapshot("a", &[1]), snapshot("z/x", &[5, 6])], &[]).unwrap();

        let loaded = store.load().unwrap();
        let names: Vec<_> = loaded.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "z/x"]);
        assert_eq!(loaded[1].batches[0].num_rows(), 2);
    }

    #[test]
    fn test_name_encoding() {
        assert_eq!(encode_name("orders_2024"), "orders_2024");
        assert_eq!(encode_name("my-table"), "my%2Dtable");
        assert_eq!(encode_name("a.b"), "a%2Eb");
        assert_eq!(decode_name("my%2Dtable").as_deref(), Some("my-table"));
        assert_eq!(decode_name("caf%C3%A9").as_deref(), Some("café"));
        assert_eq!(decode_name("bad%2"), None);
        assert_eq!(decode_name("bad%ZZ"), None);
    }

    #[test]
    fn test_failed_table_does_not_stop_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        // A directory where the temp file should go makes that one write fail.
        std::fs::create_dir(dir.path().join("b.arrow.tmp")).unwrap();
        let err = store
            .save(&[snapshot("a", &[1]), snapshot("b", &[2]), snapshot("c", &[3])], &[])
            .unwrap_err();
        assert!(matches!(err, DbError::Io(_)));

        let names: Vec<_> = store.load().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
    }
}
