use crate::block::Block;
use crate::rowfmt::RowLayout;
use crate::sort::{release_run, Run};
use riffle_base::{err_internal, BufferPool, CancelToken, Result};
use std::cmp::Ordering;
use std::sync::Arc;

/// Cursor over one run's pages. Pages are destroyed as they are consumed,
/// so a merge pass never holds more than its fan-in of blocks resident.
struct RunCursor {
    pages: Vec<(riffle_base::PageId, usize)>,
    page_i: usize,
    row_i: usize,
    cur: Option<Block>,
}

impl RunCursor {
    fn new(run: Run) -> RunCursor {
        RunCursor {
            pages: run.pages,
            page_i: 0,
            row_i: 0,
            cur: None,
        }
    }

    fn ensure_loaded(
        &mut self,
        pool: &Arc<dyn BufferPool>,
        layout: &RowLayout,
        cancel: &CancelToken,
    ) -> Result<()> {
        while self.cur.is_none() {
            if self.page_i >= self.pages.len() {
                return Ok(());
            }
            cancel.check()?;
            let (page, _) = self.pages[self.page_i];
            let bytes = pool.pin(page)?;
            let block = Block::decode_page(&bytes, layout.row_width());
            pool.unpin(page);
            pool.destroy_page(page);
            let block = block?;
            self.page_i += 1;
            self.row_i = 0;
            if block.n > 0 {
                self.cur = Some(block);
            }
        }
        Ok(())
    }

    fn row<'a>(&'a self, layout: &RowLayout) -> Option<(&'a [u8], &'a [u8])> {
        self.cur
            .as_ref()
            .map(|b| (b.row(layout, self.row_i), &b.heap[..]))
    }

    fn advance(
        &mut self,
        pool: &Arc<dyn BufferPool>,
        layout: &RowLayout,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.row_i += 1;
        if let Some(block) = &self.cur {
            if self.row_i >= block.n {
                self.cur = None;
            }
        }
        self.ensure_loaded(pool, layout, cancel)
    }

    fn release_remaining(&self, pool: &Arc<dyn BufferPool>) {
        for (page, _) in &self.pages[self.page_i..] {
            pool.destroy_page(*page);
        }
    }
}

/// Merge `inputs` into one sorted run, page by page.
pub(crate) fn merge_runs(
    layout: &RowLayout,
    pool: &Arc<dyn BufferPool>,
    cancel: &CancelToken,
    inputs: Vec<Run>,
    block_rows: usize,
) -> Result<Run> {
    let mut cursors: Vec<RunCursor> = inputs.into_iter().map(RunCursor::new).collect();
    let mut out_run = Run::default();
    match merge_inner(layout, pool, cancel, &mut cursors, block_rows, &mut out_run) {
        Ok(()) => Ok(out_run),
        Err(e) => {
            for cursor in &cursors {
                cursor.release_remaining(pool);
            }
            release_run(pool, &out_run);
            Err(e)
        }
    }
}

fn merge_inner(
    layout: &RowLayout,
    pool: &Arc<dyn BufferPool>,
    cancel: &CancelToken,
    cursors: &mut [RunCursor],
    block_rows: usize,
    out_run: &mut Run,
) -> Result<()> {
    for cursor in cursors.iter_mut() {
        cursor.ensure_loaded(pool, layout, cancel)?;
    }
    let mut out = Block::default();
    loop {
        let mut best: Option<usize> = None;
        for (i, cursor) in cursors.iter().enumerate() {
            let Some((row, heap)) = cursor.row(layout) else {
                continue;
            };
            best = match best {
                None => Some(i),
                Some(j) => {
                    let (brow, bheap) = cursors[j]
                        .row(layout)
                        .unwrap_or((row, heap));
                    if layout.compare_rows(row, heap, brow, bheap) == Ordering::Less {
                        Some(i)
                    } else {
                        Some(j)
                    }
                }
            };
        }
        let Some(winner) = best else {
            break;
        };
        {
            let (row, heap) = cursors[winner]
                .row(layout)
                .ok_or_else(|| err_internal("merge winner lost its row"))?;
            layout.copy_row(row, heap, &mut out.rows, &mut out.heap)?;
            out.n += 1;
        }
        cursors[winner].advance(pool, layout, cancel)?;
        if out.n >= block_rows {
            seal(pool, cancel, &mut out, out_run)?;
        }
    }
    if out.n > 0 {
        seal(pool, cancel, &mut out, out_run)?;
    }
    Ok(())
}

fn seal(
    pool: &Arc<dyn BufferPool>,
    cancel: &CancelToken,
    out: &mut Block,
    out_run: &mut Run,
) -> Result<()> {
    cancel.check()?;
    let page = pool.allocate_page(out.encode_page())?;
    out_run.pages.push((page, out.n));
    out_run.rows += out.n;
    out.clear();
    Ok(())
}
