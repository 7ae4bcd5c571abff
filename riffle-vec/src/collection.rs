// Append-only chunk storage backed by the buffer pool. Full chunks are
// encoded into immutable pages; a partially filled tail chunk stays
// resident until the next flush. Scans replay pages then the tail, in
// append order.

use crate::buffer::{DataTy, Ty, ValueBuffer};
use crate::chunk::Chunk;
use crate::column::Column;
use crate::VECTOR_SIZE;
use riffle_base::{err_internal, BufferPool, PageId, Result, ValidityMask};
use std::sync::Arc;

pub struct ChunkCollection {
    types: Vec<DataTy>,
    pool: Arc<dyn BufferPool>,
    pages: Vec<(PageId, usize)>,
    tail: Chunk,
    rows: usize,
}

impl ChunkCollection {
    pub fn new(pool: Arc<dyn BufferPool>, types: Vec<DataTy>) -> Self {
        let tail = Chunk::new(&types);
        ChunkCollection {
            types,
            pool,
            pages: Vec::new(),
            tail,
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn types(&self) -> &[DataTy] {
        &self.types
    }

    pub fn append_chunk(&mut self, src: &Chunk) -> Result<()> {
        let sel: Vec<u32> = (0..src.rows() as u32).collect();
        self.append_sel(src, &sel)
    }

    pub fn append_sel(&mut self, src: &Chunk, sel: &[u32]) -> Result<()> {
        let mut at = 0;
        while at < sel.len() {
            let room = VECTOR_SIZE - self.tail.rows();
            let take = room.min(sel.len() - at);
            self.tail.append_sel(src, &sel[at..at + take])?;
            at += take;
            if self.tail.rows() == VECTOR_SIZE {
                self.flush_tail()?;
            }
        }
        self.rows += sel.len();
        Ok(())
    }

    fn flush_tail(&mut self) -> Result<()> {
        if self.tail.rows() == 0 {
            return Ok(());
        }
        let bytes = encode_chunk(&self.tail)?;
        let page = self.pool.allocate_page(bytes)?;
        self.pages.push((page, self.tail.rows()));
        self.tail.clear();
        Ok(())
    }

    /// Absorb another collection's rows after this one's. Both must share
    /// a pool; the source is consumed.
    pub fn combine(&mut self, mut other: ChunkCollection) -> Result<()> {
        if !Arc::ptr_eq(&self.pool, &other.pool) {
            return Err(err_internal("combining collections across pools"));
        }
        self.flush_tail()?;
        other.flush_tail()?;
        self.pages.append(&mut other.pages);
        self.rows += other.rows;
        other.rows = 0;
        Ok(())
    }

    pub fn scan(&self) -> CollScan<'_> {
        CollScan {
            coll: self,
            next_page: 0,
            tail_done: false,
        }
    }
}

impl Drop for ChunkCollection {
    fn drop(&mut self) {
        for (page, _) in &self.pages {
            self.pool.destroy_page(*page);
        }
    }
}

pub struct CollScan<'a> {
    coll: &'a ChunkCollection,
    next_page: usize,
    tail_done: bool,
}

impl<'a> CollScan<'a> {
    /// Fill `out` with the next stored chunk; false at end of stream.
    pub fn next(&mut self, out: &mut Chunk) -> Result<bool> {
        if self.next_page < self.coll.pages.len() {
            let (page, rows) = self.coll.pages[self.next_page];
            self.next_page += 1;
            let bytes = self.coll.pool.pin(page)?;
            let decoded = decode_chunk(&bytes, rows);
            self.coll.pool.unpin(page);
            *out = decoded?;
            return Ok(true);
        }
        if !self.tail_done && self.coll.tail.rows() > 0 {
            self.tail_done = true;
            out.clear();
            out.append_chunk(&self.coll.tail)?;
            return Ok(true);
        }
        Ok(false)
    }
}

// Page codec. Length-prefixed sections, explicit bounds errors; a page
// that fails to parse is an internal error, never a recovery path.

fn encode_chunk(chunk: &Chunk) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&(chunk.rows() as u32).to_le_bytes());
    out.extend_from_slice(&(chunk.width() as u32).to_le_bytes());
    for i in 0..chunk.width() {
        encode_buffer(chunk.flat(i)?, &mut out);
    }
    Ok(out)
}

fn encode_buffer(buf: &ValueBuffer, out: &mut Vec<u8>) {
    let tag: u8 = match buf.ty() {
        Ty::Int => 0,
        Ty::Flo => 1,
        Ty::Str => 2,
        Ty::List => 3,
    };
    out.push(tag);
    out.extend_from_slice(&(buf.len() as u32).to_le_bytes());
    let mut bits = vec![0u8; (buf.len() + 7) / 8];
    for i in 0..buf.len() {
        if buf.is_valid(i) {
            bits[i / 8] |= 1 << (i % 8);
        }
    }
    out.extend_from_slice(&bits);
    out.extend_from_slice(&(buf.raw_cells().len() as u32).to_le_bytes());
    out.extend_from_slice(buf.raw_cells());
    out.extend_from_slice(&(buf.raw_heap().len() as u32).to_le_bytes());
    out.extend_from_slice(buf.raw_heap());
    match buf.child() {
        Some(child) => {
            out.push(1);
            encode_buffer(child, out);
        }
        None => out.push(0),
    }
}

struct PageReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PageReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(err_internal("page truncated"));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn decode_chunk(bytes: &[u8], expect_rows: usize) -> Result<Chunk> {
    let mut rd = PageReader { bytes, pos: 0 };
    let rows = rd.u32()? as usize;
    if rows != expect_rows {
        return Err(err_internal("page row count disagrees with directory"));
    }
    let ncols = rd.u32()? as usize;
    let mut cols = Vec::with_capacity(ncols);
    for _ in 0..ncols {
        cols.push(Column::Flat(decode_buffer(&mut rd)?));
    }
    Chunk::from_columns(cols, rows)
}

fn decode_buffer(rd: &mut PageReader<'_>) -> Result<ValueBuffer> {
    let ty = match rd.u8()? {
        0 => Ty::Int,
        1 => Ty::Flo,
        2 => Ty::Str,
        3 => Ty::List,
        _ => return Err(err_internal("unknown cell tag in page")),
    };
    let len = rd.u32()? as usize;
    let bits = rd.take((len + 7) / 8)?;
    let mut validity = ValidityMask::new();
    for i in 0..len {
        validity.push(bits[i / 8] & (1 << (i % 8)) != 0);
    }
    let cells_len = rd.u32()? as usize;
    let cells = rd.take(cells_len)?.to_vec();
    let heap_len = rd.u32()? as usize;
    let heap = rd.take(heap_len)?.to_vec();
    let child = if rd.u8()? == 1 {
        Some(decode_buffer(rd)?)
    } else {
        None
    };
    ValueBuffer::from_raw_parts(ty, cells, validity, heap, child, len)
}
