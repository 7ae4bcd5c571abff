use crate::block::Block;
use crate::rowfmt::RowLayout;
use crate::sort::Run;
use riffle_base::{BufferPool, CancelToken, PageId, Result};
use riffle_vec::{Chunk, VECTOR_SIZE};
use std::sync::Arc;

/// Single-consumer scan over the final sorted run. Pages are destroyed as
/// they are drained; dropping the scan releases whatever is left.
pub struct SortScan {
    layout: Arc<RowLayout>,
    pool: Arc<dyn BufferPool>,
    cancel: CancelToken,
    pages: Vec<(PageId, usize)>,
    page_i: usize,
    row_i: usize,
    cur: Option<Block>,
    remaining: usize,
}

impl SortScan {
    pub(crate) fn new(
        layout: Arc<RowLayout>,
        pool: Arc<dyn BufferPool>,
        cancel: CancelToken,
        run: Run,
    ) -> SortScan {
        SortScan {
            layout,
            pool,
            cancel,
            remaining: run.rows,
            pages: run.pages,
            page_i: 0,
            row_i: 0,
            cur: None,
        }
    }

    /// Rows not yet handed to the consumer.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// An empty chunk of the payload shape this scan produces.
    pub fn output_chunk(&self) -> Chunk {
        Chunk::new(self.layout.payload_types())
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        while self.cur.is_none() {
            if self.page_i >= self.pages.len() {
                return Ok(());
            }
            self.cancel.check()?;
            let (page, _) = self.pages[self.page_i];
            let bytes = self.pool.pin(page)?;
            let block = Block::decode_page(&bytes, self.layout.row_width());
            self.pool.unpin(page);
            self.pool.destroy_page(page);
            let block = block?;
            self.page_i += 1;
            self.row_i = 0;
            if block.n > 0 {
                self.cur = Some(block);
            }
        }
        Ok(())
    }

    /// Fill `out` with up to one chunk of sorted payload rows; false at
    /// end of stream.
    pub fn scan(&mut self, out: &mut Chunk) -> Result<bool> {
        self.cancel.check()?;
        out.clear();
        let mut produced = 0;
        while produced < VECTOR_SIZE {
            self.ensure_loaded()?;
            let Some(block) = self.cur.take() else {
                break;
            };
            let take = (block.n - self.row_i).min(VECTOR_SIZE - produced);
            for i in 0..take {
                let row = block.row(&self.layout, self.row_i + i);
                self.layout.decode_payload(row, &block.heap, out)?;
            }
            self.row_i += take;
            produced += take;
            if self.row_i < block.n {
                self.cur = Some(block);
            }
        }
        self.remaining = self.remaining.saturating_sub(produced);
        out.set_rows(produced);
        Ok(produced > 0)
    }
}

impl Drop for SortScan {
    fn drop(&mut self) {
        for (page, _) in &self.pages[self.page_i..] {
            self.pool.destroy_page(*page);
        }
    }
}
