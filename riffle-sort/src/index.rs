// Index construction sinks table chunks through the sort and emits the
// key columns plus a row-id column in key order, ready for a bulk index
// build. Every key orders ascending with nulls first.

use crate::key::SortSpec;
use crate::scan::SortScan;
use crate::sort::{GlobalSort, LocalSort, SortConfig};
use riffle_base::{err_input, err_internal, BufferPool, CancelToken, Result};
use riffle_vec::{Chunk, Column, DataTy, Sink, SinkResult, Source};
use std::sync::Arc;

pub struct IndexSortSink {
    key_cols: Vec<usize>,
    global: GlobalSort,
    local: Option<LocalSort>,
    scan: Option<SortScan>,
    next_row_id: i64,
}

impl std::fmt::Debug for IndexSortSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSortSink").finish_non_exhaustive()
    }
}

impl IndexSortSink {
    pub fn new(
        input_types: &[DataTy],
        key_cols: &[usize],
        pool: Arc<dyn BufferPool>,
        cfg: SortConfig,
        cancel: CancelToken,
    ) -> Result<IndexSortSink> {
        if key_cols.is_empty() {
            return Err(err_input("index build needs at least one key column"));
        }
        let mut key_types = Vec::with_capacity(key_cols.len());
        for &col in key_cols {
            let ty = input_types
                .get(col)
                .ok_or_else(|| err_input("index key column out of range"))?;
            key_types.push(ty.clone());
        }
        let specs = vec![SortSpec::default(); key_cols.len()];
        // Payload carries the keys themselves plus the row id.
        let mut payload_types = key_types.clone();
        payload_types.push(DataTy::Int);
        let global = GlobalSort::new(&key_types, &specs, &payload_types, pool, cfg, cancel)?;
        let local = global.local();
        Ok(IndexSortSink {
            key_cols: key_cols.to_vec(),
            global,
            local: Some(local),
            scan: None,
            next_row_id: 0,
        })
    }

    /// Shape of the emitted chunks: key columns then the row id.
    pub fn output_chunk(&self) -> Result<Chunk> {
        match &self.scan {
            Some(scan) => Ok(scan.output_chunk()),
            None => Err(err_internal("index sink not finalized")),
        }
    }

    fn project(&self, input: &Chunk) -> Result<(Chunk, Chunk)> {
        let rows = input.rows();
        let mut keys = Vec::with_capacity(self.key_cols.len());
        for &col in &self.key_cols {
            keys.push(input.col(col).clone());
        }
        let mut payload = keys.clone();
        payload.push(Column::Seq {
            start: self.next_row_id,
            step: 1,
        });
        Ok((
            Chunk::from_columns(keys, rows)?,
            Chunk::from_columns(payload, rows)?,
        ))
    }
}

impl Sink for IndexSortSink {
    fn chunk_consume(&mut self, chunk: &Chunk) -> Result<SinkResult> {
        let (keys, payload) = self.project(chunk)?;
        let local = self
            .local
            .as_mut()
            .ok_or_else(|| err_internal("index sink consumed after finalize"))?;
        local.sink(&keys, &payload)?;
        self.next_row_id += chunk.rows() as i64;
        Ok(SinkResult::NeedMore)
    }

    fn finalize(&mut self) -> Result<()> {
        let local = self
            .local
            .take()
            .ok_or_else(|| err_internal("index sink finalized twice"))?;
        self.global.add_local(local)?;
        self.global.sort_all()?;
        self.scan = Some(self.global.scan()?);
        Ok(())
    }
}

impl Source for IndexSortSink {
    fn chunk_produce(&mut self, out: &mut Chunk) -> Result<bool> {
        match &mut self.scan {
            Some(scan) => scan.scan(out),
            None => Err(err_internal("index sink produced before finalize")),
        }
    }
}
