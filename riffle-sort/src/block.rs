use crate::rowfmt::RowLayout;
use riffle_base::{err_internal, Result};
use std::cmp::Ordering;

/// One fixed-size slab of sort rows plus the heap its variable-length
/// bytes live in. Blocks are immutable once sealed into the pool.
#[derive(Default)]
pub(crate) struct Block {
    pub n: usize,
    pub rows: Vec<u8>,
    pub heap: Vec<u8>,
}

impl Block {
    pub fn row<'a>(&'a self, layout: &RowLayout, i: usize) -> &'a [u8] {
        let w = layout.row_width();
        &self.rows[i * w..(i + 1) * w]
    }

    pub fn clear(&mut self) {
        self.n = 0;
        self.rows.clear();
        self.heap.clear();
    }

    /// Sort in place: a counting pass on the leading key byte fans rows
    /// into buckets, a comparison sort finishes each bucket, then the rows
    /// are permuted into a fresh slab. Heap offsets survive the permute.
    pub fn sort(&mut self, layout: &RowLayout) {
        if self.n <= 1 {
            return;
        }
        let w = layout.row_width();
        let mut buckets: Vec<Vec<u32>> = (0..256).map(|_| Vec::new()).collect();
        for i in 0..self.n {
            let lead = self.rows[i * w] as usize;
            buckets[lead].push(i as u32);
        }
        let mut sorted = Vec::with_capacity(self.rows.len());
        for bucket in &mut buckets {
            bucket.sort_by(|&a, &b| {
                let a_row = &self.rows[a as usize * w..(a as usize + 1) * w];
                let b_row = &self.rows[b as usize * w..(b as usize + 1) * w];
                let cmp = layout.compare_rows(a_row, &self.heap, b_row, &self.heap);
                if cmp == Ordering::Equal {
                    // Ties stay in arrival order.
                    a.cmp(&b)
                } else {
                    cmp
                }
            });
            for &i in bucket.iter() {
                let i = i as usize;
                sorted.extend_from_slice(&self.rows[i * w..(i + 1) * w]);
            }
        }
        self.rows = sorted;
    }

    pub fn encode_page(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.rows.len() + self.heap.len());
        out.extend_from_slice(&(self.n as u32).to_le_bytes());
        out.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.rows);
        out.extend_from_slice(&(self.heap.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.heap);
        out
    }

    /// Corrupted block metadata is fatal, never a recovery path.
    pub fn decode_page(bytes: &[u8], row_width: usize) -> Result<Block> {
        let take_u32 = |at: usize| -> Result<u32> {
            bytes
                .get(at..at + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| err_internal("sort page truncated"))
        };
        let n = take_u32(0)? as usize;
        let rows_len = take_u32(4)? as usize;
        if rows_len != n * row_width {
            return Err(err_internal("sort page row area disagrees with row count"));
        }
        let rows = bytes
            .get(8..8 + rows_len)
            .ok_or_else(|| err_internal("sort page truncated"))?
            .to_vec();
        let heap_len = take_u32(8 + rows_len)? as usize;
        let heap_at = 12 + rows_len;
        let heap = bytes
            .get(heap_at..heap_at + heap_len)
            .ok_or_else(|| err_internal("sort page truncated"))?
            .to_vec();
        Ok(Block { n, rows, heap })
    }
}
