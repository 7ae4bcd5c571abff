// Function machinery over chunks. A scalar function maps an argument chunk
// to one output column per call; an aggregate function carries opaque
// per-group state through update/combine and writes one value per group at
// finalize. Both surfaces are trait objects so the registry can hold them
// uniformly and order-dependent wrappers can nest any inner aggregate.

use riffle_base::Result;
use riffle_vec::{Chunk, Column, DataTy, ValueBuffer};
use std::any::Any;

mod aggregates;
mod registry;
mod slice;

#[cfg(test)]
mod test;

pub use aggregates::{CountAgg, FirstAgg, LastAgg, ListAgg, SumAgg};
pub use registry::Registry;
pub use slice::SliceFn;

/// A per-chunk scalar function: `(input chunk) -> output column` of the
/// same cardinality. Layout of the output is the function's choice; when
/// every input is constant the output must be constant.
pub trait ScalarFn: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(&self, args: &Chunk) -> Result<Column>;
}

/// Opaque aggregate state. Boxing replaces the C contract's
/// state_size/initialize; Drop replaces destroy.
pub trait AggregateState: Send {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send> AggregateState for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An aggregate function. `update` consumes the selected rows of an
/// argument chunk in order; `simple_update` is the whole-chunk fast path;
/// `combine` folds `src` into `dst`; `finalize` appends exactly one value
/// to `out`.
pub trait Aggregate: Send + Sync {
    fn name(&self) -> &'static str;
    fn result_ty(&self, arg_types: &[DataTy]) -> Result<DataTy>;
    fn new_state(&self) -> Box<dyn AggregateState>;
    fn update(&self, state: &mut dyn AggregateState, args: &Chunk, sel: &[u32]) -> Result<()>;
    fn simple_update(&self, state: &mut dyn AggregateState, args: &Chunk) -> Result<()> {
        let sel: Vec<u32> = (0..args.rows() as u32).collect();
        self.update(state, args, &sel)
    }
    fn combine(&self, src: &mut dyn AggregateState, dst: &mut dyn AggregateState) -> Result<()>;
    fn finalize(&self, state: &mut dyn AggregateState, out: &mut ValueBuffer) -> Result<()>;
}

impl std::fmt::Debug for dyn Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate").field("name", &self.name()).finish()
    }
}
