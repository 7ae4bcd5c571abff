use riffle_base::{err_internal, err_unimpl, Result};
use riffle_vec::{Chunk, DataTy, Ty, UnifiedView, ValueBuffer};

/// Ordering of one sort key column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub desc: bool,
    pub nulls_first: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            desc: false,
            nulls_first: true,
        }
    }
}

impl SortSpec {
    pub fn invert(&self) -> SortSpec {
        SortSpec {
            desc: !self.desc,
            nulls_first: !self.nulls_first,
        }
    }
}

/// Key columns plus their serialized widths. The radix prefix of a row is
/// the concatenation of the per-column encodings in declaration order.
#[derive(Clone, Debug)]
pub struct SortLayout {
    pub specs: Vec<SortSpec>,
    pub types: Vec<DataTy>,
    pub prefix_bytes: usize,
    pub key_width: usize,
    /// True when no key column needs out-of-line tie-breaking.
    pub all_fixed: bool,
}

impl SortLayout {
    pub fn new(types: &[DataTy], specs: &[SortSpec], prefix_bytes: usize) -> Result<SortLayout> {
        if types.len() != specs.len() {
            return Err(err_internal("sort key arity mismatch"));
        }
        let mut key_width = 0;
        let mut all_fixed = true;
        for ty in types {
            key_width += 1; // null byte
            match ty.ty() {
                Ty::Int | Ty::Flo => key_width += 8,
                Ty::Str => {
                    key_width += prefix_bytes;
                    all_fixed = false;
                }
                Ty::List => return Err(err_unimpl("list-typed sort keys are not implemented")),
            }
        }
        Ok(SortLayout {
            specs: specs.to_vec(),
            types: types.to_vec(),
            prefix_bytes,
            key_width,
            all_fixed,
        })
    }

    pub fn col_width(&self, col: usize) -> usize {
        1 + match self.types[col].ty() {
            Ty::Int | Ty::Flo => 8,
            Ty::Str => self.prefix_bytes,
            Ty::List => 0,
        }
    }
}

fn encode_int(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1 << 63)).to_be_bytes()
}

/// IEEE-754 total-order transform: negatives invert entirely, positives
/// flip the sign bit; the resulting unsigned compare matches float order.
fn encode_flo(f: f64) -> [u8; 8] {
    let bits = f.to_bits();
    let key = if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits ^ (1 << 63)
    };
    key.to_be_bytes()
}

/// Append one row's radix key to `out`.
pub(crate) fn encode_key_row(
    layout: &SortLayout,
    views: &[UnifiedView<'_>],
    row: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    for (col, view) in views.iter().enumerate() {
        let spec = layout.specs[col];
        let valid = view.is_valid(row);
        let null_byte = if valid == spec.nulls_first { 1 } else { 0 };
        out.push(null_byte);
        let val_at = out.len();
        match layout.types[col].ty() {
            Ty::Int | Ty::Flo => {
                if valid {
                    let bytes = match layout.types[col].ty() {
                        Ty::Int => encode_int(view.int(row)),
                        _ => encode_flo(view.flo(row)),
                    };
                    out.extend_from_slice(&bytes);
                } else {
                    out.extend_from_slice(&[0u8; 8]);
                }
            }
            Ty::Str => {
                let mut prefix = vec![0u8; layout.prefix_bytes];
                if valid {
                    let bytes = view.bin(row);
                    let n = bytes.len().min(layout.prefix_bytes);
                    prefix[..n].copy_from_slice(&bytes[..n]);
                }
                out.extend_from_slice(&prefix);
            }
            Ty::List => return Err(err_unimpl("list-typed sort keys are not implemented")),
        }
        if spec.desc {
            for b in &mut out[val_at..] {
                *b = !*b;
            }
        }
    }
    Ok(())
}

/// Serialize every row of `keys` into its radix key, one binary cell per
/// row. This is the comparison fast path's candidate key.
pub fn radix_keys(keys: &Chunk, layout: &SortLayout) -> Result<ValueBuffer> {
    let n = keys.rows();
    if keys.width() != layout.types.len() {
        return Err(err_internal("key chunk arity disagrees with layout"));
    }
    let mut scratches: Vec<ValueBuffer> = (0..keys.width())
        .map(|_| ValueBuffer::new(Ty::Int))
        .collect();
    let views = keys
        .cols()
        .iter()
        .zip(scratches.iter_mut())
        .map(|(c, s)| c.unified(n, s))
        .collect::<Result<Vec<_>>>()?;

    let mut out = ValueBuffer::new(Ty::Str);
    let mut key = Vec::with_capacity(layout.key_width);
    for row in 0..n {
        key.clear();
        encode_key_row(layout, &views, row, &mut key)?;
        out.push_bin(&key);
    }
    Ok(out)
}
