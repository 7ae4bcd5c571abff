use crate::block::Block;
use crate::key::SortSpec;
use crate::merge::merge_runs;
use crate::rowfmt::RowLayout;
use crate::scan::SortScan;
use riffle_base::{err_internal, BufferPool, CancelToken, PageId, Result};
use riffle_vec::{Chunk, DataTy};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortConfig {
    /// Radix prefix bytes serialized for each variable-length key column.
    pub prefix_bytes: usize,
    /// Rows per build block once the external threshold is crossed.
    pub block_rows: usize,
    /// Row count at or under which a local sort keeps one resident run
    /// and the merge phase is skipped entirely.
    pub external_threshold_rows: usize,
    /// Runs consumed per merge pass.
    pub merge_fan_in: usize,
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig {
            prefix_bytes: 12,
            block_rows: 2048,
            external_threshold_rows: usize::MAX,
            merge_fan_in: 8,
        }
    }
}

/// A contiguous sequence of sorted rows held as pool pages.
#[derive(Default)]
pub(crate) struct Run {
    pub pages: Vec<(PageId, usize)>,
    pub rows: usize,
}

pub(crate) fn release_run(pool: &Arc<dyn BufferPool>, run: &Run) {
    for (page, _) in &run.pages {
        pool.destroy_page(*page);
    }
}

/// Per-thread build state: scatter rows into blocks, sort each filled
/// block in place, seal it as a single-block run.
pub struct LocalSort {
    layout: Arc<RowLayout>,
    cfg: SortConfig,
    pool: Arc<dyn BufferPool>,
    cancel: CancelToken,
    current: Block,
    runs: Vec<Run>,
    rows: usize,
}

impl LocalSort {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn sink(&mut self, keys: &Chunk, payload: &Chunk) -> Result<()> {
        self.cancel.check()?;
        let n = keys.rows();
        // Past the threshold, rows scatter into fixed-size blocks; under
        // it everything accumulates into one resident run.
        let external = self.rows + n > self.cfg.external_threshold_rows;
        let mut at = 0;
        while at < n {
            if external && self.current.n >= self.cfg.block_rows {
                self.seal_current()?;
            }
            let take = if external {
                (self.cfg.block_rows - self.current.n).min(n - at)
            } else {
                n - at
            };
            self.layout.encode_rows(
                keys,
                payload,
                at,
                at + take,
                &mut self.current.rows,
                &mut self.current.heap,
            )?;
            self.current.n += take;
            self.rows += take;
            at += take;
        }
        if external && self.current.n >= self.cfg.block_rows {
            self.seal_current()?;
        }
        Ok(())
    }

    fn seal_current(&mut self) -> Result<()> {
        if self.current.n == 0 {
            return Ok(());
        }
        self.cancel.check()?;
        self.current.sort(&self.layout);
        let n = self.current.n;
        let page = self.pool.allocate_page(self.current.encode_page())?;
        self.runs.push(Run {
            pages: vec![(page, n)],
            rows: n,
        });
        self.current.clear();
        Ok(())
    }
}

#[derive(Default)]
struct GlobalRuns {
    runs: Vec<Run>,
    rows: usize,
}

/// Shared sort state. `add_local` and `prepare_merge` serialize behind a
/// mutex; merge rounds run on one coordinator; the scan has a single
/// consumer.
pub struct GlobalSort {
    layout: Arc<RowLayout>,
    cfg: SortConfig,
    pool: Arc<dyn BufferPool>,
    cancel: CancelToken,
    inner: Mutex<GlobalRuns>,
}

impl GlobalSort {
    pub fn new(
        key_types: &[DataTy],
        specs: &[SortSpec],
        payload_types: &[DataTy],
        pool: Arc<dyn BufferPool>,
        cfg: SortConfig,
        cancel: CancelToken,
    ) -> Result<GlobalSort> {
        let layout = Arc::new(RowLayout::new(
            key_types,
            specs,
            payload_types,
            cfg.prefix_bytes,
        )?);
        Ok(GlobalSort {
            layout,
            cfg,
            pool,
            cancel,
            inner: Mutex::new(GlobalRuns::default()),
        })
    }

    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    pub fn local(&self) -> LocalSort {
        LocalSort {
            layout: self.layout.clone(),
            cfg: self.cfg.clone(),
            pool: self.pool.clone(),
            cancel: self.cancel.clone(),
            current: Block::default(),
            runs: Vec::new(),
            rows: 0,
        }
    }

    pub fn add_local(&self, mut local: LocalSort) -> Result<()> {
        local.seal_current()?;
        let mut inner = self.inner.lock().expect("sort mutex poisoned");
        inner.rows += local.rows;
        inner.runs.append(&mut local.runs);
        Ok(())
    }

    pub fn prepare_merge(&self) -> Result<()> {
        self.cancel.check()?;
        let inner = self.inner.lock().expect("sort mutex poisoned");
        debug!(
            target: "riffle",
            "sort prepared: {} runs, {} rows",
            inner.runs.len(),
            inner.rows
        );
        Ok(())
    }

    pub fn run_count(&self) -> usize {
        self.inner.lock().expect("sort mutex poisoned").runs.len()
    }

    pub fn total_rows(&self) -> usize {
        self.inner.lock().expect("sort mutex poisoned").rows
    }

    /// One k-way merge pass; true while more passes are needed. A
    /// cancelled merge releases every run before returning.
    pub fn merge_round(&self) -> Result<bool> {
        let mut inner = self.inner.lock().expect("sort mutex poisoned");
        if let Err(e) = self.cancel.check() {
            for run in inner.runs.drain(..) {
                release_run(&self.pool, &run);
            }
            return Err(e);
        }
        if inner.runs.len() <= 1 {
            return Ok(false);
        }
        let fan_in = self.cfg.merge_fan_in.max(2);
        let input: Vec<Run> = inner.runs.drain(..).collect();
        debug!(target: "riffle", "merge round over {} runs", input.len());
        let mut pending = input.into_iter().peekable();
        while pending.peek().is_some() {
            let group: Vec<Run> = pending.by_ref().take(fan_in).collect();
            if group.len() == 1 {
                inner.runs.extend(group);
                continue;
            }
            match merge_runs(
                &self.layout,
                &self.pool,
                &self.cancel,
                group,
                self.cfg.block_rows,
            ) {
                Ok(run) => inner.runs.push(run),
                Err(e) => {
                    for run in inner.runs.drain(..).chain(pending) {
                        release_run(&self.pool, &run);
                    }
                    return Err(e);
                }
            }
        }
        Ok(inner.runs.len() > 1)
    }

    /// Merge to completion: the in-memory single-run path skips this loop
    /// in one iteration.
    pub fn sort_all(&self) -> Result<()> {
        self.prepare_merge()?;
        while self.merge_round()? {}
        Ok(())
    }

    /// Hand the final run to the single consumer.
    pub fn scan(&self) -> Result<SortScan> {
        let mut inner = self.inner.lock().expect("sort mutex poisoned");
        if inner.runs.len() > 1 {
            return Err(err_internal("scan requires a fully merged sort"));
        }
        let run = inner.runs.pop().unwrap_or_default();
        inner.rows = 0;
        Ok(SortScan::new(
            self.layout.clone(),
            self.pool.clone(),
            self.cancel.clone(),
            run,
        ))
    }
}

impl Drop for GlobalSort {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().expect("sort mutex poisoned");
        for run in inner.runs.drain(..) {
            release_run(&self.pool, &run);
        }
    }
}
