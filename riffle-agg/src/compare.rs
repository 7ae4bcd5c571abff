use riffle_base::{err_internal, Result};
use riffle_func::{Aggregate, AggregateState};
use riffle_sort::{radix_keys, SortLayout};
use riffle_vec::{Chunk, DataTy, ValueBuffer};
use std::sync::Arc;

/// Key-comparison fast path for aggregates whose result is one row chosen
/// by sort order. Requires an all-fixed-width key layout; binding falls
/// back to the ordered path otherwise.
pub struct CompareSpec {
    /// Value holder fed only on strict key improvement.
    pub inner: Arc<dyn Aggregate>,
    pub arg_types: Vec<DataTy>,
    pub key_layout: SortLayout,
    /// Candidates with a null argument are ignored.
    pub skip_nulls: bool,
}

impl CompareSpec {
    pub fn result_ty(&self) -> Result<DataTy> {
        self.inner.result_ty(&self.arg_types)
    }
}

/// Per-group state: the inner aggregate plus the smallest radix key seen.
pub struct CompareBuf {
    state: Option<Box<dyn AggregateState>>,
    key: Vec<u8>,
}

impl CompareBuf {
    pub fn new() -> CompareBuf {
        CompareBuf {
            state: None,
            key: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    /// Consider every row of the chunk; rows whose key improves on the
    /// current one update the key and feed the inner aggregate.
    pub fn update(&mut self, spec: &CompareSpec, args: &Chunk, keys: &Chunk) -> Result<()> {
        if args.rows() != keys.rows() {
            return Err(err_internal("argument and key chunks disagree on rows"));
        }
        let blob = radix_keys(keys, &spec.key_layout)?;
        for row in 0..args.rows() {
            if spec.skip_nulls && args.col(0).logical_value(row)?.is_null() {
                continue;
            }
            let candidate = blob.get_bin(row);
            let better = match &self.state {
                None => true,
                Some(_) => candidate < self.key.as_slice(),
            };
            if !better {
                continue;
            }
            if self.state.is_none() {
                self.state = Some(spec.inner.new_state());
            }
            self.key.clear();
            self.key.extend_from_slice(candidate);
            let state = self
                .state
                .as_mut()
                .ok_or_else(|| err_internal("compare state vanished"))?;
            spec.inner.update(state.as_mut(), args, &[row as u32])?;
        }
        Ok(())
    }

    /// Keep whichever side holds the smaller key.
    pub fn combine(&mut self, other: &mut CompareBuf) {
        match (&self.state, &other.state) {
            (_, None) => {}
            (None, Some(_)) => std::mem::swap(self, other),
            (Some(_), Some(_)) => {
                if other.key < self.key {
                    std::mem::swap(self, other);
                }
            }
        }
    }

    pub fn finalize(&mut self, spec: &CompareSpec, out: &mut ValueBuffer) -> Result<()> {
        let mut state = match self.state.take() {
            Some(state) => state,
            None => spec.inner.new_state(),
        };
        spec.inner.finalize(state.as_mut(), out)
    }
}

impl Default for CompareBuf {
    fn default() -> Self {
        CompareBuf::new()
    }
}
