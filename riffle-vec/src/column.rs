use crate::buffer::{DataTy, ListEntry, Ty, ValueBuffer};
use crate::sel::SelIndex;
use crate::value::Val;
use riffle_base::{err_conv, err_internal, err_range, Result};
use std::sync::Arc;

/// One column of a chunk, in exactly one of the four physical layouts.
#[derive(Clone, Debug)]
pub enum Column {
    Flat(ValueBuffer),
    /// Length-1 buffer, logically repeated to the chunk length.
    Const(ValueBuffer),
    /// Selection into a backing buffer owned upstream.
    Dict {
        sel: SelIndex,
        base: Arc<ValueBuffer>,
    },
    /// start, start+step, ... materialized on access.
    Seq {
        start: i64,
        step: i64,
    },
}

/// Selection half of a unified view.
#[derive(Clone, Copy, Debug)]
pub enum Sel<'a> {
    Identity,
    Zero,
    Slice(&'a [u32]),
}

/// Layout-agnostic read access: `(base buffer, selection)` where the
/// selection maps logical row to physical row.
#[derive(Clone, Copy)]
pub struct UnifiedView<'a> {
    pub data: &'a ValueBuffer,
    sel: Sel<'a>,
}

impl<'a> UnifiedView<'a> {
    pub fn phys(&self, i: usize) -> usize {
        match self.sel {
            Sel::Identity => i,
            Sel::Zero => 0,
            Sel::Slice(s) => s[i] as usize,
        }
    }

    pub fn is_valid(&self, i: usize) -> bool {
        self.data.is_valid(self.phys(i))
    }

    pub fn int(&self, i: usize) -> i64 {
        self.data.get_int(self.phys(i))
    }

    pub fn flo(&self, i: usize) -> f64 {
        self.data.get_flo(self.phys(i))
    }

    pub fn bin(&self, i: usize) -> &'a [u8] {
        self.data.get_bin(self.phys(i))
    }

    pub fn str_(&self, i: usize) -> Result<&'a str> {
        self.data.get_str(self.phys(i))
    }

    pub fn list(&self, i: usize) -> ListEntry {
        self.data.get_list(self.phys(i))
    }
}

fn seq_value(start: i64, step: i64, row: usize) -> Result<i64> {
    step.checked_mul(row as i64)
        .and_then(|d| start.checked_add(d))
        .ok_or_else(|| err_range("sequence value overflows i64"))
}

impl Column {
    pub fn flat(buf: ValueBuffer) -> Column {
        Column::Flat(buf)
    }

    pub fn constant(buf: ValueBuffer) -> Result<Column> {
        if buf.len() != 1 {
            return Err(err_internal("constant column needs exactly one row"));
        }
        Ok(Column::Const(buf))
    }

    pub fn constant_int(v: i64) -> Column {
        let mut buf = ValueBuffer::new(Ty::Int);
        buf.push_int(v);
        Column::Const(buf)
    }

    pub fn constant_null(ty: &DataTy) -> Column {
        let mut buf = ty.new_buffer();
        buf.push_null();
        Column::Const(buf)
    }

    pub fn dict(sel: SelIndex, base: Arc<ValueBuffer>) -> Column {
        Column::Dict { sel, base }
    }

    pub fn ty(&self) -> Ty {
        match self {
            Column::Flat(buf) | Column::Const(buf) => buf.ty(),
            Column::Dict { base, .. } => base.ty(),
            Column::Seq { .. } => Ty::Int,
        }
    }

    pub fn data_ty(&self) -> DataTy {
        match self {
            Column::Flat(buf) | Column::Const(buf) => buf.data_ty(),
            Column::Dict { base, .. } => base.data_ty(),
            Column::Seq { .. } => DataTy::Int,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Column::Const(_))
    }

    /// Project the unified view for `n` logical rows. `scratch` backs the
    /// materialization of sequence columns and must outlive the view.
    pub fn unified<'a>(&'a self, n: usize, scratch: &'a mut ValueBuffer) -> Result<UnifiedView<'a>> {
        match self {
            Column::Flat(buf) => {
                if buf.len() != n {
                    return Err(err_internal("flat column length disagrees with chunk"));
                }
                Ok(UnifiedView {
                    data: buf,
                    sel: Sel::Identity,
                })
            }
            Column::Const(buf) => {
                if buf.len() != 1 {
                    return Err(err_internal("constant column must hold one row"));
                }
                Ok(UnifiedView {
                    data: buf,
                    sel: Sel::Zero,
                })
            }
            Column::Dict { sel, base } => {
                if sel.len() != n {
                    return Err(err_internal("dictionary selection length disagrees with chunk"));
                }
                Ok(UnifiedView {
                    data: base,
                    sel: Sel::Slice(sel.as_slice()),
                })
            }
            Column::Seq { start, step } => {
                scratch.reset(Ty::Int);
                for row in 0..n {
                    scratch.push_int(seq_value(*start, *step, row)?);
                }
                Ok(UnifiedView {
                    data: &*scratch,
                    sel: Sel::Identity,
                })
            }
        }
    }

    /// Force the Flat form: gather every logical row into an owned buffer.
    /// The only layout conversion operators may request.
    pub fn flatten(&self, n: usize) -> Result<ValueBuffer> {
        match self {
            Column::Flat(buf) => {
                if buf.len() != n {
                    return Err(err_conv("flat column length disagrees with chunk"));
                }
                Ok(buf.clone())
            }
            Column::Const(buf) => {
                let mut out = buf.data_ty().new_buffer();
                for _ in 0..n {
                    out.append_row_from(buf, 0)?;
                }
                Ok(out)
            }
            Column::Dict { sel, base } => {
                if sel.len() != n {
                    return Err(err_conv("dictionary selection length disagrees with chunk"));
                }
                let mut out = base.data_ty().new_buffer();
                for i in 0..n {
                    out.append_row_from(base, sel.get(i))?;
                }
                Ok(out)
            }
            Column::Seq { start, step } => {
                let mut out = ValueBuffer::new(Ty::Int);
                for row in 0..n {
                    out.push_int(seq_value(*start, *step, row)?);
                }
                Ok(out)
            }
        }
    }

    /// Value of one logical row without materializing.
    pub fn logical_value(&self, row: usize) -> Result<Val> {
        match self {
            Column::Flat(buf) => buf.get_value(row),
            Column::Const(buf) => buf.get_value(0),
            Column::Dict { sel, base } => base.get_value(sel.get(row)),
            Column::Seq { start, step } => Ok(Val::Int(seq_value(*start, *step, row)?)),
        }
    }

    /// Append one logical row to a flat destination buffer.
    pub fn append_row_to(&self, row: usize, dst: &mut ValueBuffer) -> Result<()> {
        match self {
            Column::Flat(buf) => dst.append_row_from(buf, row),
            Column::Const(buf) => dst.append_row_from(buf, 0),
            Column::Dict { sel, base } => dst.append_row_from(base, sel.get(row)),
            Column::Seq { start, step } => {
                dst.push_int(seq_value(*start, *step, row)?);
                Ok(())
            }
        }
    }

    /// Structural invariants for a column claiming `n` rows.
    pub fn verify(&self, n: usize) -> Result<()> {
        match self {
            Column::Flat(buf) => {
                if buf.len() != n || buf.validity().len() != n {
                    return Err(err_internal("flat column length disagrees with chunk"));
                }
                buf.check_list_bounds()
            }
            Column::Const(buf) => {
                if buf.len() != 1 {
                    return Err(err_internal("constant column must hold one row"));
                }
                buf.check_list_bounds()
            }
            Column::Dict { sel, base } => {
                if sel.len() != n {
                    return Err(err_internal("dictionary selection length disagrees with chunk"));
                }
                for i in 0..n {
                    if sel.get(i) >= base.len() {
                        return Err(err_internal("dictionary selection exceeds backing length"));
                    }
                }
                Ok(())
            }
            Column::Seq { start, step } => {
                if n > 0 {
                    seq_value(*start, *step, n - 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Row equality across columns of the same type.
pub fn rows_equal(a: &Column, arow: usize, b: &Column, brow: usize) -> Result<bool> {
    Ok(a.logical_value(arow)? == b.logical_value(brow)?)
}
