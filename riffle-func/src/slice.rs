// List and string slicing. Indices are 1-based when positive and count
// from the end when negative; index 0 decodes the same as 1. i64::MAX in
// begin means "from the start", in end "to the end". After decoding,
// indices clamp unconditionally to [-len, len]; a row whose index falls
// below -len is null, as is any row with a null input or a negative step.
// end is raised to begin after clamping so slices are never inverted.

use crate::ScalarFn;
use riffle_base::{err_input, err_internal, err_range, err_unimpl, Result};
use riffle_vec::{Chunk, Column, ListEntry, SelIndex, Ty, UnifiedView, ValueBuffer};
use std::sync::Arc;

const STRING_STEP_UNIMPLEMENTED: &str =
    "Slice with steps has not been implemented for string types, you can consider rewriting your \
     query as follows:\n SELECT array_to_string((str_split(string, '')[begin:end:step], '');";

pub struct SliceFn;

impl ScalarFn for SliceFn {
    fn name(&self) -> &'static str {
        "array_slice"
    }

    fn execute(&self, args: &Chunk) -> Result<Column> {
        if args.width() != 3 && args.width() != 4 {
            return Err(err_input("array_slice takes 3 or 4 arguments"));
        }
        match args.col(0).ty() {
            Ty::List => slice_list(args),
            Ty::Str => slice_str(args),
            _ => Err(err_input("array_slice can only operate on lists and strings")),
        }
    }
}

fn clamp_index(index: &mut i64, len: i64) -> bool {
    if *index < 0 {
        match index.checked_neg() {
            Some(neg) if neg <= len => *index += len,
            _ => return false,
        }
    } else if *index > len {
        *index = len;
    }
    true
}

fn clamp_slice(len: i64, begin: &mut i64, end: &mut i64) -> bool {
    *begin = if *begin > 0 { *begin - 1 } else { *begin };
    if !clamp_index(begin, len) || !clamp_index(end, len) {
        return false;
    }
    *end = (*end).max(*begin);
    true
}

/// Resolve one row's indices, or None when the row is null.
fn decode_row(len: i64, mut begin: i64, mut end: i64, step: Option<i64>) -> Result<Option<(i64, i64, i64)>> {
    if begin == i64::MAX {
        begin = 0;
    }
    if end == i64::MAX {
        end = len;
    }
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(err_range("Slice step cannot be zero"));
    }
    if step < 0 {
        return Ok(None);
    }
    if !clamp_slice(len, &mut begin, &mut end) {
        return Ok(None);
    }
    Ok(Some((begin, end, step)))
}

struct SliceArgs<'a> {
    value: UnifiedView<'a>,
    begin: UnifiedView<'a>,
    end: UnifiedView<'a>,
    step: Option<UnifiedView<'a>>,
}

impl<'a> SliceArgs<'a> {
    fn row_inputs(&self, i: usize) -> Option<(i64, i64, Option<i64>)> {
        if !self.value.is_valid(i) || !self.begin.is_valid(i) || !self.end.is_valid(i) {
            return None;
        }
        let step = match &self.step {
            Some(view) => {
                if !view.is_valid(i) {
                    return None;
                }
                Some(view.int(i))
            }
            None => None,
        };
        Some((self.begin.int(i), self.end.int(i), step))
    }
}

fn slice_list(args: &Chunk) -> Result<Column> {
    let n = args.rows();
    let all_const = args.cols().iter().all(Column::is_const);
    let rows = if all_const { 1 } else { n };

    let mut sc0 = ValueBuffer::new(Ty::Int);
    let mut sc1 = ValueBuffer::new(Ty::Int);
    let mut sc2 = ValueBuffer::new(Ty::Int);
    let mut sc3 = ValueBuffer::new(Ty::Int);
    let views = SliceArgs {
        value: args.col(0).unified(n, &mut sc0)?,
        begin: args.col(1).unified(n, &mut sc1)?,
        end: args.col(2).unified(n, &mut sc2)?,
        step: match args.cols().get(3) {
            Some(col) => Some(col.unified(n, &mut sc3)?),
            None => None,
        },
    };
    let child = views
        .value
        .data
        .child_arc()
        .ok_or_else(|| err_internal("list column has no child"))?;

    let out = if views.step.is_none() {
        // Share the input's child and rewrite the entries.
        let mut out = ValueBuffer::new_list_shared(child);
        for i in 0..rows {
            let Some((begin, end, step)) = views.row_inputs(i) else {
                out.push_null();
                continue;
            };
            let entry = views.value.list(i);
            match decode_row(entry.length as i64, begin, end, step)? {
                None => out.push_null(),
                Some((begin, end, _)) => out.push_list_entry(ListEntry {
                    offset: entry.offset + begin as u64,
                    length: (end - begin) as u64,
                }),
            }
        }
        out
    } else {
        // Stepped form: build a selection over the child, then gather it
        // into the result's own element buffer.
        let mut sel = SelIndex::new();
        let mut entries: Vec<Option<ListEntry>> = Vec::with_capacity(rows);
        for i in 0..rows {
            let Some((begin, end, step)) = views.row_inputs(i) else {
                entries.push(None);
                continue;
            };
            let entry = views.value.list(i);
            match decode_row(entry.length as i64, begin, end, step)? {
                None => entries.push(None),
                Some((begin, end, step)) => {
                    let count = (end - begin + step - 1) / step;
                    let start = sel.len() as u64;
                    let mut child_idx = entry.offset + begin as u64;
                    for _ in 0..count {
                        sel.push(child_idx as u32);
                        child_idx += step as u64;
                    }
                    entries.push(Some(ListEntry {
                        offset: start,
                        length: count as u64,
                    }));
                }
            }
        }
        let mut gathered = child.data_ty().new_buffer();
        for &ci in sel.as_slice() {
            gathered.append_row_from(&child, ci as usize)?;
        }
        let mut out = ValueBuffer::new_list_shared(Arc::new(gathered));
        for entry in entries {
            match entry {
                None => out.push_null(),
                Some(e) => out.push_list_entry(e),
            }
        }
        out
    };

    if all_const {
        Column::constant(out)
    } else {
        Ok(Column::Flat(out))
    }
}

fn slice_str(args: &Chunk) -> Result<Column> {
    if args.width() == 4 {
        return Err(err_unimpl(STRING_STEP_UNIMPLEMENTED));
    }
    let n = args.rows();
    let all_const = args.cols().iter().all(Column::is_const);
    let rows = if all_const { 1 } else { n };

    let mut sc0 = ValueBuffer::new(Ty::Int);
    let mut sc1 = ValueBuffer::new(Ty::Int);
    let mut sc2 = ValueBuffer::new(Ty::Int);
    let views = SliceArgs {
        value: args.col(0).unified(n, &mut sc0)?,
        begin: args.col(1).unified(n, &mut sc1)?,
        end: args.col(2).unified(n, &mut sc2)?,
        step: None,
    };

    let mut out = ValueBuffer::new(Ty::Str);
    for i in 0..rows {
        let Some((begin, end, step)) = views.row_inputs(i) else {
            out.push_null();
            continue;
        };
        let s = views.value.str_(i)?;
        // Code points, not bytes.
        let len = s.chars().count() as i64;
        match decode_row(len, begin, end, step)? {
            None => out.push_null(),
            Some((begin, end, _)) => {
                let sliced: String = s
                    .chars()
                    .skip(begin as usize)
                    .take((end - begin) as usize)
                    .collect();
                out.push_str(&sliced);
            }
        }
    }

    if all_const {
        Column::constant(out)
    } else {
        Ok(Column::Flat(out))
    }
}
