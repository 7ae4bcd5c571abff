// Fixed-width sort rows: [radix key][var-key slots][payload cells].
//
// A var-key slot is (len: u32, off: u32) into the owning block's heap and
// carries the full bytes of a variable-length key column for tie-breaking
// past the radix prefix. A payload cell is one validity byte followed by
// either the 8-byte value or a (len, off) heap reference for strings.

use crate::key::{encode_key_row, SortLayout, SortSpec};
use riffle_base::{err_internal, err_unimpl, Result};
use riffle_vec::{Chunk, DataTy, Ty, ValueBuffer};
use std::cmp::Ordering;

const VAR_SLOT: usize = 8;
const PAYLOAD_CELL: usize = 9;

#[derive(Clone, Debug)]
pub struct RowLayout {
    pub key: SortLayout,
    var_key_cols: Vec<usize>,
    payload_types: Vec<DataTy>,
    varkey_off: usize,
    payload_off: usize,
    row_width: usize,
}

fn put_u32(out: &mut [u8], v: u32) {
    out.copy_from_slice(&v.to_le_bytes());
}

fn get_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

impl RowLayout {
    pub fn new(
        key_types: &[DataTy],
        specs: &[SortSpec],
        payload_types: &[DataTy],
        prefix_bytes: usize,
    ) -> Result<RowLayout> {
        let key = SortLayout::new(key_types, specs, prefix_bytes)?;
        let var_key_cols: Vec<usize> = key_types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.ty() == Ty::Str)
            .map(|(i, _)| i)
            .collect();
        for ty in payload_types {
            if ty.ty() == Ty::List {
                return Err(err_unimpl("list-typed sort payloads are not implemented"));
            }
        }
        let varkey_off = key.key_width;
        let payload_off = varkey_off + var_key_cols.len() * VAR_SLOT;
        let row_width = payload_off + payload_types.len() * PAYLOAD_CELL;
        Ok(RowLayout {
            key,
            var_key_cols,
            payload_types: payload_types.to_vec(),
            varkey_off,
            payload_off,
            row_width,
        })
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn payload_types(&self) -> &[DataTy] {
        &self.payload_types
    }

    /// Append rows `from..to` of `(keys, payload)` to a block's row and
    /// heap areas.
    pub fn encode_rows(
        &self,
        keys: &Chunk,
        payload: &Chunk,
        from: usize,
        to: usize,
        rows_out: &mut Vec<u8>,
        heap_out: &mut Vec<u8>,
    ) -> Result<()> {
        let n = keys.rows();
        if payload.rows() != n || to > n || from > to {
            return Err(err_internal("key and payload chunks disagree on rows"));
        }
        let mut key_scratch: Vec<ValueBuffer> = (0..keys.width())
            .map(|_| ValueBuffer::new(Ty::Int))
            .collect();
        let key_views = keys
            .cols()
            .iter()
            .zip(key_scratch.iter_mut())
            .map(|(c, s)| c.unified(n, s))
            .collect::<Result<Vec<_>>>()?;
        let mut pay_scratch: Vec<ValueBuffer> = (0..payload.width())
            .map(|_| ValueBuffer::new(Ty::Int))
            .collect();
        let pay_views = payload
            .cols()
            .iter()
            .zip(pay_scratch.iter_mut())
            .map(|(c, s)| c.unified(n, s))
            .collect::<Result<Vec<_>>>()?;

        let mut key = Vec::with_capacity(self.key.key_width);
        for row in from..to {
            key.clear();
            encode_key_row(&self.key, &key_views, row, &mut key)?;
            rows_out.extend_from_slice(&key);

            for &col in &self.var_key_cols {
                let view = &key_views[col];
                let mut slot = [0u8; VAR_SLOT];
                if view.is_valid(row) {
                    let bytes = view.bin(row);
                    put_u32(&mut slot[0..4], bytes.len() as u32);
                    put_u32(&mut slot[4..8], heap_out.len() as u32);
                    heap_out.extend_from_slice(bytes);
                }
                rows_out.extend_from_slice(&slot);
            }

            for (col, view) in pay_views.iter().enumerate() {
                let mut cell = [0u8; PAYLOAD_CELL];
                if view.is_valid(row) {
                    cell[0] = 1;
                    match self.payload_types[col].ty() {
                        Ty::Int => cell[1..9].copy_from_slice(&view.int(row).to_le_bytes()),
                        Ty::Flo => cell[1..9].copy_from_slice(&view.flo(row).to_le_bytes()),
                        Ty::Str => {
                            let bytes = view.bin(row);
                            put_u32(&mut cell[1..5], bytes.len() as u32);
                            put_u32(&mut cell[5..9], heap_out.len() as u32);
                            heap_out.extend_from_slice(bytes);
                        }
                        Ty::List => {
                            return Err(err_unimpl(
                                "list-typed sort payloads are not implemented",
                            ))
                        }
                    }
                }
                rows_out.extend_from_slice(&cell);
            }
        }
        Ok(())
    }

    /// Append one row's payload to the flat columns of `out`.
    pub fn decode_payload(&self, row: &[u8], heap: &[u8], out: &mut Chunk) -> Result<()> {
        if row.len() != self.row_width {
            return Err(err_internal("sort row width disagrees with layout"));
        }
        for col in 0..self.payload_types.len() {
            let at = self.payload_off + col * PAYLOAD_CELL;
            let cell = &row[at..at + PAYLOAD_CELL];
            let dst = out.flat_mut(col)?;
            if cell[0] == 0 {
                dst.push_null();
                continue;
            }
            match self.payload_types[col].ty() {
                Ty::Int => dst.push_int(i64::from_le_bytes([
                    cell[1], cell[2], cell[3], cell[4], cell[5], cell[6], cell[7], cell[8],
                ])),
                Ty::Flo => dst.push_flo(f64::from_le_bytes([
                    cell[1], cell[2], cell[3], cell[4], cell[5], cell[6], cell[7], cell[8],
                ])),
                Ty::Str => {
                    let len = get_u32(&cell[1..5]) as usize;
                    let off = get_u32(&cell[5..9]) as usize;
                    let bytes = heap
                        .get(off..off + len)
                        .ok_or_else(|| err_internal("sort row references bytes past the heap"))?;
                    dst.push_bin(bytes);
                }
                Ty::List => {
                    return Err(err_unimpl("list-typed sort payloads are not implemented"))
                }
            }
        }
        Ok(())
    }

    /// Copy one row between blocks, re-homing its heap references.
    pub fn copy_row(
        &self,
        row: &[u8],
        src_heap: &[u8],
        rows_out: &mut Vec<u8>,
        heap_out: &mut Vec<u8>,
    ) -> Result<()> {
        let start = rows_out.len();
        rows_out.extend_from_slice(row);
        let out_row = &mut rows_out[start..];

        for (i, _) in self.var_key_cols.iter().enumerate() {
            let at = self.varkey_off + i * VAR_SLOT;
            let len = get_u32(&out_row[at..at + 4]) as usize;
            if len == 0 {
                continue;
            }
            let off = get_u32(&out_row[at + 4..at + 8]) as usize;
            let bytes = src_heap
                .get(off..off + len)
                .ok_or_else(|| err_internal("sort row references bytes past the heap"))?;
            put_u32(&mut out_row[at + 4..at + 8], heap_out.len() as u32);
            heap_out.extend_from_slice(bytes);
        }
        for (col, ty) in self.payload_types.iter().enumerate() {
            if ty.ty() != Ty::Str {
                continue;
            }
            let at = self.payload_off + col * PAYLOAD_CELL;
            if out_row[at] == 0 {
                continue;
            }
            let len = get_u32(&out_row[at + 1..at + 5]) as usize;
            let off = get_u32(&out_row[at + 5..at + 9]) as usize;
            let bytes = src_heap
                .get(off..off + len)
                .ok_or_else(|| err_internal("sort row references bytes past the heap"))?;
            put_u32(&mut out_row[at + 5..at + 9], heap_out.len() as u32);
            heap_out.extend_from_slice(bytes);
        }
        Ok(())
    }

    /// Full ordering: the radix prefix, then out-of-line bytes on prefix
    /// ties.
    pub fn compare_rows(
        &self,
        a_row: &[u8],
        a_heap: &[u8],
        b_row: &[u8],
        b_heap: &[u8],
    ) -> Ordering {
        let kw = self.key.key_width;
        match a_row[..kw].cmp(&b_row[..kw]) {
            Ordering::Equal => {}
            other => return other,
        }
        if self.key.all_fixed {
            return Ordering::Equal;
        }
        for (i, &col) in self.var_key_cols.iter().enumerate() {
            let at = self.varkey_off + i * VAR_SLOT;
            let a_len = get_u32(&a_row[at..at + 4]) as usize;
            let a_off = get_u32(&a_row[at + 4..at + 8]) as usize;
            let b_len = get_u32(&b_row[at..at + 4]) as usize;
            let b_off = get_u32(&b_row[at + 4..at + 8]) as usize;
            let a_bytes = &a_heap[a_off..a_off + a_len];
            let b_bytes = &b_heap[b_off..b_off + b_len];
            let cmp = if self.key.specs[col].desc {
                b_bytes.cmp(a_bytes)
            } else {
                a_bytes.cmp(b_bytes)
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }
}
