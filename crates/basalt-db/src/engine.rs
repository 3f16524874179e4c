//! The engine behind every handle: a `DataFusion` session, the runtime
//! that drives it, and the optional on-disk snapshot store.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arrow::array::{AsArray, RecordBatch};
use arrow::datatypes::{SchemaRef, UInt64Type};
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::catalog::SchemaProvider;
use datafusion::datasource::MemTable;
use datafusion::execution::context::SQLOptions;
use datafusion::logical_expr::{LogicalPlan, TableType};
use datafusion::prelude::SessionContext;
use datafusion_common::{DataFusionError, TableReference};
use futures::TryStreamExt;
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DbError;
use crate::sql_utils::split_statements;
use crate::storage::{SnapshotStore, TableSnapshot};

/// Output of one executed statement.
#[derive(Debug)]
pub(crate) struct Executed {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
    pub rows_changed: u64,
}

pub(crate) struct Engine {
    ctx: SessionContext,
    runtime: Option<Runtime>,
    store: Option<SnapshotStore>,
    config: Config,
    closed: AtomicBool,
    next_connection: AtomicU64,
    /// Serializes appends against the snapshot taken at close.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn open(path: Option<&Path>, config: Config) -> Result<Self, DbError> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let ctx = SessionContext::new_with_config_rt(config.session_config(), config.runtime_env()?);
        let store = path.map(SnapshotStore::open).transpose()?;

        let mut tables = 0;
        if let Some(store) = &store {
            for table in store.load()? {
                let provider = MemTable::try_new(table.schema, vec![table.batches])?;
                ctx.register_table(TableReference::bare(table.name), Arc::new(provider))?;
                tables += 1;
            }
        }

        info!(
            path = ?path,
            tables,
            access_mode = ?config.access_mode,
            "Database opened"
        );
        Ok(Self {
            ctx,
            runtime: Some(runtime),
            store,
            config,
            closed: AtomicBool::new(false),
            next_connection: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.store.as_ref().map(SnapshotStore::dir)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn check_open(&self) -> Result<(), DbError> {
        if self.is_closed() {
            Err(DbError::Shutdown)
        } else {
            Ok(())
        }
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Drive `fut` to completion on the engine's runtime.
    ///
    /// When the caller is itself inside a tokio runtime the future runs on
    /// a scoped thread, since blocking inside a runtime is not allowed.
    pub fn block_on<F>(&self, fut: F) -> Result<F::Output, DbError>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let rt = self.runtime.as_ref().ok_or(DbError::Shutdown)?;
        if tokio::runtime::Handle::try_current().is_ok() {
            Ok(std::thread::scope(|s| {
                match s.spawn(|| rt.block_on(fut)).join() {
                    Ok(out) => out,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }))
        } else {
            Ok(rt.block_on(fut))
        }
    }

    /// Plan a single statement, enforcing the access mode.
    pub fn plan(&self, sql: &str) -> Result<LogicalPlan, DbError> {
        self.check_open()?;
        let state = self.ctx.state();
        let plan = self.block_on(state.create_logical_plan(sql))??;
        if self.config.access_mode.is_read_only() {
            SQLOptions::new()
                .with_allow_ddl(false)
                .with_allow_dml(false)
                .verify_plan(&plan)
                .map_err(|_| DbError::ReadOnly(statement_keyword(sql)))?;
        }
        Ok(plan)
    }

    /// Execute a planned statement and collect its output.
    pub fn execute_plan(&self, plan: LogicalPlan) -> Result<Executed, DbError> {
        self.check_open()?;
        let is_dml = matches!(plan, LogicalPlan::Dml(_));
        let (schema, batches) = self.block_on(async {
            let df = self.ctx.execute_logical_plan(plan).await?;
            let stream = df.execute_stream().await?;
            let schema = stream.schema();
            let batches: Vec<RecordBatch> = stream.try_collect().await?;
            Ok::<_, DataFusionError>((schema, batches))
        })??;

        let rows_changed = if is_dml { affected_rows(&batches) } else { 0 };
        Ok(Executed {
            schema,
            batches,
            rows_changed,
        })
    }

    /// Execute every `;`-separated statement in order; returns the last.
    pub fn execute_sql(&self, sql: &str) -> Result<Executed, DbError> {
        let mut last = None;
        for statement in split_statements(sql) {
            let plan = self.plan(statement)?;
            last = Some(self.execute_plan(plan)?);
        }
        last.ok_or(DbError::EmptyStatement)
    }

    /// Schema of an existing table.
    pub fn table_schema(&self, table: &TableReference) -> Result<SchemaRef, DbError> {
        self.check_open()?;
        let provider = self
            .block_on(self.ctx.table_provider(table.clone()))?
            .map_err(|_| DbError::TableNotFound(table.to_string()))?;
        Ok(provider.schema())
    }

    /// Insert a batch whose schema matches the table's.
    pub fn append_batch(&self, table: &TableReference, batch: RecordBatch) -> Result<u64, DbError> {
        self.check_open()?;
        if self.config.access_mode.is_read_only() {
            return Err(DbError::ReadOnly("APPEND".into()));
        }
        let _guard = self.write_lock.lock();
        let name = table.to_quoted_string();
        let written = self.block_on(async {
            let df = self.ctx.read_batch(batch)?;
            df.write_table(&name, DataFrameWriteOptions::new()).await
        })??;
        Ok(affected_rows(&written))
    }

    fn read_base_table(
        &self,
        schema: &dyn SchemaProvider,
        name: &str,
    ) -> Result<Option<TableSnapshot>, DbError> {
        let Some(provider) = self.block_on(schema.table(name))?? else {
            return Ok(None);
        };
        if provider.table_type() != TableType::Base {
            return Ok(None);
        }
        let table_schema = provider.schema();
        let batches = self.block_on(async { self.ctx.read_table(provider)?.collect().await })??;
        Ok(Some(TableSnapshot {
            name: name.to_string(),
            schema: table_schema,
            batches,
        }))
    }

    /// Collect every base table; tables that fail to read are returned
    /// separately with their error.
    fn snapshot_tables(&self) -> (Vec<TableSnapshot>, Vec<(String, DbError)>) {
        let options = self.ctx.copied_config();
        let defaults = &options.options().catalog;
        let Some(schema) = self
            .ctx
            .catalog(&defaults.default_catalog)
            .and_then(|c| c.schema(&defaults.default_schema))
        else {
            return (Vec::new(), Vec::new());
        };

        let mut tables = Vec::new();
        let mut failed = Vec::new();
        for name in schema.table_names() {
            match self.read_base_table(schema.as_ref(), &name) {
                Ok(Some(table)) => tables.push(table),
                Ok(None) => {}
                Err(e) => {
                    warn!(table = %name, error = %e, "Failed to read table for snapshot");
                    failed.push((name, e));
                }
            }
        }
        (tables, failed)
    }

    /// Persist (if path-backed and writable) and mark closed. Idempotent.
    ///
    /// A table that cannot be read or written does not stop the others
    /// from being saved; its previous file is kept and the first such
    /// error is returned.
    pub fn close(&self) -> Result<(), DbError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        if let Some(store) = &self.store {
            if self.config.access_mode.is_read_only() {
                debug!(path = %store.dir().display(), "Read-only database, skipping snapshot");
            } else {
                let (tables, failed) = self.snapshot_tables();
                let keep: Vec<&str> = failed.iter().map(|(name, _)| name.as_str()).collect();
                let saved = store.save(&tables, &keep);
                info!(
                    path = %store.dir().display(),
                    tables = tables.len(),
                    failed = failed.len(),
                    "Database snapshot written"
                );
                saved?;
                if let Some((_, e)) = failed.into_iter().next() {
                    return Err(e);
                }
            }
        }
        info!("Database closed");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.take() {
            rt.shutdown_background();
        }
    }
}

/// Sum of the `count` column DML plans produce.
fn affected_rows(batches: &[RecordBatch]) -> u64 {
    batches
        .iter()
        .filter(|b| b.num_columns() > 0)
        .filter_map(|b| b.column(0).as_primitive_opt::<UInt64Type>())
        .flat_map(|a| a.iter().flatten())
        .sum()
}

fn statement_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}
