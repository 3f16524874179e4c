//! Query output as a sequence of Arrow C Data Interface chunks.

use std::collections::VecDeque;

use arrow::array::{Array, RecordBatch, StructArray};
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::ffi::{to_ffi, FFI_ArrowArray, FFI_ArrowSchema};
use tracing::debug;

use super::error::ApiError;
use crate::engine::Executed;

/// A result exposed chunk by chunk over the Arrow C Data Interface.
///
/// The schema is exported once and stays valid for the life of the result.
/// Each call to [`next_array`](Self::next_array) releases the previous chunk
/// (unless the consumer already moved it out) and exports the next one.
/// Every chunk holds at most `chunk_size` rows and is a struct array whose
/// children are the result columns.
pub struct ArrowResult {
    schema: SchemaRef,
    ffi_schema: FFI_ArrowSchema,
    pending: VecDeque<RecordBatch>,
    current: Option<FFI_ArrowArray>,
    row_count: usize,
    rows_changed: u64,
}

impl std::fmt::Debug for ArrowResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrowResult")
            .field("schema", &self.schema)
            .field("pending_chunks", &self.pending.len())
            .field("row_count", &self.row_count)
            .field("rows_changed", &self.rows_changed)
            .finish_non_exhaustive()
    }
}

impl ArrowResult {
    pub(crate) fn new(executed: Executed, chunk_size: usize) -> Result<Self, ApiError> {
        let Executed {
            schema,
            batches,
            rows_changed,
        } = executed;
        let ffi_schema = FFI_ArrowSchema::try_from(schema.as_ref())
            .map_err(|e| ApiError::internal(format!("Arrow FFI schema export failed: {e}")))?;

        let row_count = batches.iter().map(RecordBatch::num_rows).sum();
        let pending = rechunk(&schema, &batches, chunk_size.max(1))
            .map_err(|e| ApiError::internal(format!("Failed to chunk result: {e}")))?;
        debug!(row_count, chunks = pending.len(), "Arrow result ready");

        Ok(Self {
            schema,
            ffi_schema,
            pending,
            current: None,
            row_count,
            rows_changed,
        })
    }

    /// Arrow schema of the result.
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Schema exported over the C Data Interface.
    #[must_use]
    pub fn arrow_schema(&self) -> &FFI_ArrowSchema {
        &self.ffi_schema
    }

    /// Export the next chunk, releasing the previous one.
    ///
    /// Returns `Ok(None)` once the result is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the chunk cannot be exported.
    pub fn next_array(&mut self) -> Result<Option<&mut FFI_ArrowArray>, ApiError> {
        self.current = None;
        let Some(batch) = self.pending.pop_front() else {
            return Ok(None);
        };
        let data = StructArray::from(batch).into_data();
        let (array, _schema) = to_ffi(&data)
            .map_err(|e| ApiError::internal(format!("Arrow FFI export failed: {e}")))?;
        Ok(Some(self.current.insert(array)))
    }

    /// Number of chunks not yet exported.
    #[must_use]
    pub fn remaining_chunks(&self) -> usize {
        self.pending.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.schema.fields().len()
    }

    /// Total rows across all chunks.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Rows affected by an `INSERT`/`UPDATE`/`DELETE`; 0 for reads.
    #[must_use]
    pub fn rows_changed(&self) -> u64 {
        self.rows_changed
    }
}

/// Re-slice `batches` into chunks of exactly `chunk_size` rows (the last
/// may be shorter). Slices share buffers with the input.
fn rechunk(
    schema: &SchemaRef,
    batches: &[RecordBatch],
    chunk_size: usize,
) -> Result<VecDeque<RecordBatch>, arrow::error::ArrowError> {
    let all = match batches {
        [] => return Ok(VecDeque::new()),
        [one] => one.clone(),
        _ => concat_batches(schema, batches)?,
    };
    let mut chunks = VecDeque::with_capacity(all.num_rows().div_ceil(chunk_size));
    let mut offset = 0;
    while offset < all.num_rows() {
        let len = chunk_size.min(all.num_rows() - offset);
        chunks.push_back(all.slice(offset, len));
        offset += len;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int32Array, StringArray};
    use arrow::ffi::from_ffi;

    use super::*;

    fn executed(batches: Vec<RecordBatch>) -> Executed {
        Executed {
            schema: batches[0].schema(),
            batches,
            rows_changed: 0,
        }
    }

    fn ints(values: Vec<i32>) -> RecordBatch {
        RecordBatch::try_from_iter([("n", Arc::new(Int32Array::from(values)) as ArrayRef)]).unwrap()
    }

    #[test]
    fn test_rechunks_to_chunk_size() {
        let mut result =
            ArrowResult::new(executed(vec![ints(vec![1, 2, 3]), ints(vec![4, 5])]), 2).unwrap();
        assert_eq!(result.row_count(), 5);
        assert_eq!(result.column_count(), 1);
        assert_eq!(result.remaining_chunks(), 3);

        let mut sizes = Vec::new();
        while let Some(array) = result.next_array().unwrap() {
            sizes.push(array.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(result.next_array().unwrap().is_none());
    }

    #[test]
    fn test_chunk_imports_back() {
        let batch = RecordBatch::try_from_iter([
            ("n", Arc::new(Int32Array::from(vec![7, 8])) as ArrayRef),
            ("s", Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef),
        ])
        .unwrap();
        let mut result = ArrowResult::new(executed(vec![batch]), 1024).unwrap();

        let array = std::mem::replace(result.next_array().unwrap().unwrap(), FFI_ArrowArray::empty());
        let schema = FFI_ArrowSchema::try_from(arrow::datatypes::DataType::Struct(
            result.schema().fields().clone(),
        ))
        .unwrap();
        // SAFETY: both structs were produced by arrow's exporter above.
        let data = unsafe { from_ffi(array, &schema) }.unwrap();
        let imported = StructArray::from(data);
        assert_eq!(imported.len(), 2);
        assert_eq!(imported.num_columns(), 2);
    }

    #[test]
    fn test_empty_result_has_schema_and_no_chunks() {
        let schema = ints(vec![]).schema();
        let mut result = ArrowResult::new(
            Executed {
                schema,
                batches: vec![],
                rows_changed: 4,
            },
            16,
        )
        .unwrap();
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.rows_changed(), 4);
        assert_eq!(result.column_count(), 1);
        assert!(result.next_array().unwrap().is_none());
    }
}
