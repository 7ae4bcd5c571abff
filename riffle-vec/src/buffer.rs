use crate::heap::StrHeap;
use crate::value::Val;
use ordered_float::OrderedFloat;
use riffle_base::{err_conv, err_internal, err_range, Result, ValidityMask};
use std::sync::Arc;

/// Physical cell tag. All integer widths surface as i64; floats as f64.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Ty {
    Int,
    Flo,
    Str,
    List,
}

impl Ty {
    pub fn cell_bytes(&self) -> usize {
        match self {
            Ty::Int | Ty::Flo => 8,
            Ty::Str | Ty::List => 16,
        }
    }
}

/// Full column type; lists carry their element type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataTy {
    Int,
    Flo,
    Str,
    List(Box<DataTy>),
}

impl DataTy {
    pub fn ty(&self) -> Ty {
        match self {
            DataTy::Int => Ty::Int,
            DataTy::Flo => Ty::Flo,
            DataTy::Str => Ty::Str,
            DataTy::List(_) => Ty::List,
        }
    }

    pub fn new_buffer(&self) -> ValueBuffer {
        match self {
            DataTy::Int => ValueBuffer::new(Ty::Int),
            DataTy::Flo => ValueBuffer::new(Ty::Flo),
            DataTy::Str => ValueBuffer::new(Ty::Str),
            DataTy::List(elem) => ValueBuffer::new_list(elem.new_buffer()),
        }
    }

    pub fn list_of(elem: DataTy) -> DataTy {
        DataTy::List(Box::new(elem))
    }
}

/// One list cell: a window into the child buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub offset: u64,
    pub length: u64,
}

/// Strings up to this many bytes are stored inline in the cell.
pub(crate) const STR_INLINE: usize = 12;

fn arr8(b: &[u8]) -> [u8; 8] {
    let mut a = [0u8; 8];
    a.copy_from_slice(&b[..8]);
    a
}

fn arr4(b: &[u8]) -> [u8; 4] {
    let mut a = [0u8; 4];
    a.copy_from_slice(&b[..4]);
    a
}

/// Fixed-width column storage: one cell per row, a validity mask, a heap
/// for long string payloads, and a shared child buffer for list elements.
#[derive(Clone, Debug)]
pub struct ValueBuffer {
    ty: Ty,
    cells: Vec<u8>,
    validity: ValidityMask,
    heap: StrHeap,
    child: Option<Arc<ValueBuffer>>,
    len: usize,
}

impl ValueBuffer {
    pub fn new(ty: Ty) -> Self {
        ValueBuffer {
            ty,
            cells: Vec::new(),
            validity: ValidityMask::new(),
            heap: StrHeap::default(),
            child: None,
            len: 0,
        }
    }

    pub fn new_list(child: ValueBuffer) -> Self {
        ValueBuffer::new_list_shared(Arc::new(child))
    }

    /// A list buffer over an existing element buffer; slices use this to
    /// share the input's child without copying.
    pub fn new_list_shared(child: Arc<ValueBuffer>) -> Self {
        let mut buf = ValueBuffer::new(Ty::List);
        buf.child = Some(child);
        buf
    }

    pub fn ty(&self) -> Ty {
        self.ty
    }

    pub fn data_ty(&self) -> DataTy {
        match self.ty() {
            Ty::Int => DataTy::Int,
            Ty::Flo => DataTy::Flo,
            Ty::Str => DataTy::Str,
            Ty::List => {
                let elem = self
                    .child
                    .as_ref()
                    .map(|c| c.data_ty())
                    .unwrap_or(DataTy::Int);
                DataTy::List(Box::new(elem))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn validity(&self) -> &ValidityMask {
        &self.validity
    }

    pub fn is_valid(&self, row: usize) -> bool {
        self.validity.get(row)
    }

    pub fn child(&self) -> Option<&ValueBuffer> {
        self.child.as_deref()
    }

    pub fn child_arc(&self) -> Option<Arc<ValueBuffer>> {
        self.child.clone()
    }

    pub fn child_mut(&mut self) -> Result<&mut ValueBuffer> {
        match self.child.as_mut() {
            Some(arc) => Ok(Arc::make_mut(arc)),
            None => Err(err_internal("list buffer has no child")),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.validity.clear();
        self.heap.clear();
        self.len = 0;
        if let Some(arc) = self.child.as_mut() {
            Arc::make_mut(arc).clear();
        }
    }

    /// Clear and retype; drops any child.
    pub fn reset(&mut self, ty: Ty) {
        self.clear();
        self.ty = ty;
        self.child = None;
    }

    fn cell(&self, row: usize) -> &[u8] {
        let w = self.ty().cell_bytes();
        &self.cells[row * w..(row + 1) * w]
    }

    pub fn push_null(&mut self) {
        let w = self.ty().cell_bytes();
        self.cells.resize(self.cells.len() + w, 0);
        self.validity.push(false);
        self.len += 1;
    }

    pub fn push_int(&mut self, v: i64) {
        debug_assert_eq!(self.ty(), Ty::Int);
        self.cells.extend_from_slice(&v.to_le_bytes());
        self.validity.push(true);
        self.len += 1;
    }

    pub fn push_flo(&mut self, v: f64) {
        debug_assert_eq!(self.ty(), Ty::Flo);
        self.cells.extend_from_slice(&v.to_le_bytes());
        self.validity.push(true);
        self.len += 1;
    }

    pub fn push_bin(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.ty(), Ty::Str);
        let len = bytes.len() as u32;
        self.cells.extend_from_slice(&len.to_le_bytes());
        if bytes.len() <= STR_INLINE {
            let mut inline = [0u8; STR_INLINE];
            inline[..bytes.len()].copy_from_slice(bytes);
            self.cells.extend_from_slice(&inline);
        } else {
            let mut prefix = [0u8; 4];
            prefix.copy_from_slice(&bytes[..4]);
            let off = self.heap.add(bytes) as u64;
            self.cells.extend_from_slice(&prefix);
            self.cells.extend_from_slice(&off.to_le_bytes());
        }
        self.validity.push(true);
        self.len += 1;
    }

    pub fn push_str(&mut self, s: &str) {
        self.push_bin(s.as_bytes());
    }

    pub fn push_list_entry(&mut self, entry: ListEntry) {
        debug_assert_eq!(self.ty(), Ty::List);
        self.cells.extend_from_slice(&entry.offset.to_le_bytes());
        self.cells.extend_from_slice(&entry.length.to_le_bytes());
        self.validity.push(true);
        self.len += 1;
    }

    /// Append one list row by writing its elements into the child.
    pub fn push_list_with(
        &mut self,
        f: impl FnOnce(&mut ValueBuffer) -> Result<()>,
    ) -> Result<()> {
        let child = self.child_mut()?;
        let start = child.len() as u64;
        f(child)?;
        let end = child.len() as u64;
        self.push_list_entry(ListEntry {
            offset: start,
            length: end - start,
        });
        Ok(())
    }

    pub fn get_int(&self, row: usize) -> i64 {
        debug_assert_eq!(self.ty(), Ty::Int);
        i64::from_le_bytes(arr8(self.cell(row)))
    }

    pub fn get_flo(&self, row: usize) -> f64 {
        debug_assert_eq!(self.ty(), Ty::Flo);
        f64::from_le_bytes(arr8(self.cell(row)))
    }

    pub fn get_bin(&self, row: usize) -> &[u8] {
        debug_assert_eq!(self.ty(), Ty::Str);
        let cell = self.cell(row);
        let len = u32::from_le_bytes(arr4(&cell[0..4])) as usize;
        if len <= STR_INLINE {
            &cell[4..4 + len]
        } else {
            let off = u64::from_le_bytes(arr8(&cell[8..16])) as usize;
            self.heap.get(off, len)
        }
    }

    pub fn get_str(&self, row: usize) -> Result<&str> {
        std::str::from_utf8(self.get_bin(row)).map_err(|_| err_conv("string cell is not UTF-8"))
    }

    pub fn get_list(&self, row: usize) -> ListEntry {
        debug_assert_eq!(self.ty(), Ty::List);
        let cell = self.cell(row);
        ListEntry {
            offset: u64::from_le_bytes(arr8(&cell[0..8])),
            length: u64::from_le_bytes(arr8(&cell[8..16])),
        }
    }

    /// Copy one row (heap payload included) from another buffer of the
    /// same type.
    pub fn append_row_from(&mut self, src: &ValueBuffer, row: usize) -> Result<()> {
        if !src.is_valid(row) {
            self.push_null();
            return Ok(());
        }
        match self.ty() {
            Ty::Int => self.push_int(src.get_int(row)),
            Ty::Flo => self.push_flo(src.get_flo(row)),
            Ty::Str => self.push_bin(src.get_bin(row)),
            Ty::List => {
                let entry = src.get_list(row);
                let src_child = src
                    .child()
                    .ok_or_else(|| err_internal("list buffer has no child"))?;
                self.push_list_with(|child| {
                    for i in entry.offset..entry.offset + entry.length {
                        child.append_row_from(src_child, i as usize)?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    pub fn push_value(&mut self, v: &Val) -> Result<()> {
        match (self.ty(), v) {
            (_, Val::Null) => {
                self.push_null();
                Ok(())
            }
            (Ty::Int, Val::Int(i)) => {
                self.push_int(*i);
                Ok(())
            }
            (Ty::Flo, Val::Flo(f)) => {
                self.push_flo(f.0);
                Ok(())
            }
            (Ty::Str, Val::Str(s)) => {
                self.push_str(s);
                Ok(())
            }
            (Ty::List, Val::List(items)) => self.push_list_with(|child| {
                for item in items {
                    child.push_value(item)?;
                }
                Ok(())
            }),
            _ => Err(err_conv("value does not match buffer type")),
        }
    }

    pub fn get_value(&self, row: usize) -> Result<Val> {
        if !self.is_valid(row) {
            return Ok(Val::Null);
        }
        Ok(match self.ty() {
            Ty::Int => Val::Int(self.get_int(row)),
            Ty::Flo => Val::Flo(OrderedFloat(self.get_flo(row))),
            Ty::Str => Val::Str(self.get_str(row)?.to_owned()),
            Ty::List => {
                let entry = self.get_list(row);
                let child = self
                    .child()
                    .ok_or_else(|| err_internal("list buffer has no child"))?;
                let mut items = Vec::with_capacity(entry.length as usize);
                for i in entry.offset..entry.offset + entry.length {
                    items.push(child.get_value(i as usize)?);
                }
                Val::List(items)
            }
        })
    }

    /// Sum of direct and child cell bytes; used for tier sizing.
    pub fn byte_size(&self) -> usize {
        let own = self.cells.len() + self.heap.len();
        own + self.child.as_ref().map(|c| c.byte_size()).unwrap_or(0)
    }

    pub(crate) fn raw_cells(&self) -> &[u8] {
        &self.cells
    }

    pub(crate) fn raw_heap(&self) -> &[u8] {
        self.heap.bytes()
    }

    pub(crate) fn from_raw_parts(
        ty: Ty,
        cells: Vec<u8>,
        validity: ValidityMask,
        heap: Vec<u8>,
        child: Option<ValueBuffer>,
        len: usize,
    ) -> Result<Self> {
        if cells.len() != len * ty.cell_bytes() || validity.len() != len {
            return Err(err_internal("raw buffer parts disagree on length"));
        }
        Ok(ValueBuffer {
            ty,
            cells,
            validity,
            heap: StrHeap::from_bytes(heap),
            child: child.map(Arc::new),
            len,
        })
    }

    /// Bounds checks for list rows; `Internal` on violation.
    pub fn check_list_bounds(&self) -> Result<()> {
        if self.ty() != Ty::List {
            return Ok(());
        }
        let child_len = self.child().map(|c| c.len() as u64).unwrap_or(0);
        for row in 0..self.len {
            if !self.is_valid(row) {
                continue;
            }
            let entry = self.get_list(row);
            let end = entry
                .offset
                .checked_add(entry.length)
                .ok_or_else(|| err_range("list entry overflows"))?;
            if end > child_len {
                return Err(err_internal("list entry exceeds child length"));
            }
        }
        Ok(())
    }
}
