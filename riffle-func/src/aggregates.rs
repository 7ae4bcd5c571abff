// Distributive builtins. These are the inner aggregates the ordered and
// compare wrappers drive; `list` doubles as the ordering oracle in tests
// since its result is exactly its input sequence.

use crate::{Aggregate, AggregateState};
use riffle_base::{err_input, err_internal, err_range, Result};
use riffle_vec::{Chunk, DataTy, Val, ValueBuffer};

fn state_of<'a, T: 'static>(state: &'a mut dyn AggregateState) -> Result<&'a mut T> {
    state
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| err_internal("aggregate state type mismatch"))
}

fn single_arg(arg_types: &[DataTy]) -> Result<&DataTy> {
    arg_types
        .first()
        .ok_or_else(|| err_input("aggregate needs one argument"))
}

// count

struct CountState(i64);

pub struct CountAgg;

impl Aggregate for CountAgg {
    fn name(&self) -> &'static str {
        "count"
    }

    fn result_ty(&self, _arg_types: &[DataTy]) -> Result<DataTy> {
        Ok(DataTy::Int)
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(CountState(0))
    }

    fn update(&self, state: &mut dyn AggregateState, args: &Chunk, sel: &[u32]) -> Result<()> {
        let state = state_of::<CountState>(state)?;
        for &row in sel {
            if !args.col(0).logical_value(row as usize)?.is_null() {
                state.0 += 1;
            }
        }
        Ok(())
    }

    fn combine(&self, src: &mut dyn AggregateState, dst: &mut dyn AggregateState) -> Result<()> {
        let add = state_of::<CountState>(src)?.0;
        state_of::<CountState>(dst)?.0 += add;
        Ok(())
    }

    fn finalize(&self, state: &mut dyn AggregateState, out: &mut ValueBuffer) -> Result<()> {
        out.push_int(state_of::<CountState>(state)?.0);
        Ok(())
    }
}

// sum

struct SumState(Option<i64>);

pub struct SumAgg;

impl Aggregate for SumAgg {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn result_ty(&self, arg_types: &[DataTy]) -> Result<DataTy> {
        match single_arg(arg_types)? {
            DataTy::Int => Ok(DataTy::Int),
            _ => Err(err_input("sum takes an integer argument")),
        }
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(SumState(None))
    }

    fn update(&self, state: &mut dyn AggregateState, args: &Chunk, sel: &[u32]) -> Result<()> {
        let state = state_of::<SumState>(state)?;
        for &row in sel {
            match args.col(0).logical_value(row as usize)? {
                Val::Null => {}
                Val::Int(v) => {
                    let acc = state.0.unwrap_or(0);
                    state.0 = Some(
                        acc.checked_add(v)
                            .ok_or_else(|| err_range("sum overflows bigint"))?,
                    );
                }
                _ => return Err(err_input("sum takes an integer argument")),
            }
        }
        Ok(())
    }

    fn combine(&self, src: &mut dyn AggregateState, dst: &mut dyn AggregateState) -> Result<()> {
        let src = state_of::<SumState>(src)?.0;
        let dst = state_of::<SumState>(dst)?;
        match (src, dst.0) {
            (None, _) => {}
            (Some(s), None) => dst.0 = Some(s),
            (Some(s), Some(d)) => {
                dst.0 = Some(
                    d.checked_add(s)
                        .ok_or_else(|| err_range("sum overflows bigint"))?,
                )
            }
        }
        Ok(())
    }

    fn finalize(&self, state: &mut dyn AggregateState, out: &mut ValueBuffer) -> Result<()> {
        match state_of::<SumState>(state)?.0 {
            Some(v) => out.push_int(v),
            None => out.push_null(),
        }
        Ok(())
    }
}

// first / any_value

struct FirstState(Option<Val>);

pub struct FirstAgg {
    skip_nulls: bool,
}

impl FirstAgg {
    pub fn new() -> Self {
        FirstAgg { skip_nulls: false }
    }

    pub fn any_value() -> Self {
        FirstAgg { skip_nulls: true }
    }
}

impl Aggregate for FirstAgg {
    fn name(&self) -> &'static str {
        if self.skip_nulls {
            "any_value"
        } else {
            "first"
        }
    }

    fn result_ty(&self, arg_types: &[DataTy]) -> Result<DataTy> {
        Ok(single_arg(arg_types)?.clone())
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(FirstState(None))
    }

    fn update(&self, state: &mut dyn AggregateState, args: &Chunk, sel: &[u32]) -> Result<()> {
        let state = state_of::<FirstState>(state)?;
        for &row in sel {
            if state.0.is_some() {
                break;
            }
            let val = args.col(0).logical_value(row as usize)?;
            if self.skip_nulls && val.is_null() {
                continue;
            }
            state.0 = Some(val);
        }
        Ok(())
    }

    fn combine(&self, src: &mut dyn AggregateState, dst: &mut dyn AggregateState) -> Result<()> {
        let src = state_of::<FirstState>(src)?.0.take();
        let dst = state_of::<FirstState>(dst)?;
        if dst.0.is_none() {
            dst.0 = src;
        }
        Ok(())
    }

    fn finalize(&self, state: &mut dyn AggregateState, out: &mut ValueBuffer) -> Result<()> {
        let val = state_of::<FirstState>(state)?.0.take().unwrap_or(Val::Null);
        out.push_value(&val)
    }
}

// last

struct LastState(Option<Val>);

pub struct LastAgg;

impl Aggregate for LastAgg {
    fn name(&self) -> &'static str {
        "last"
    }

    fn result_ty(&self, arg_types: &[DataTy]) -> Result<DataTy> {
        Ok(single_arg(arg_types)?.clone())
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(LastState(None))
    }

    fn update(&self, state: &mut dyn AggregateState, args: &Chunk, sel: &[u32]) -> Result<()> {
        let state = state_of::<LastState>(state)?;
        for &row in sel {
            state.0 = Some(args.col(0).logical_value(row as usize)?);
        }
        Ok(())
    }

    fn combine(&self, src: &mut dyn AggregateState, dst: &mut dyn AggregateState) -> Result<()> {
        let src = state_of::<LastState>(src)?.0.take();
        let dst = state_of::<LastState>(dst)?;
        if src.is_some() {
            dst.0 = src;
        }
        Ok(())
    }

    fn finalize(&self, state: &mut dyn AggregateState, out: &mut ValueBuffer) -> Result<()> {
        let val = state_of::<LastState>(state)?.0.take().unwrap_or(Val::Null);
        out.push_value(&val)
    }
}

// list

struct ListState(Vec<Val>);

pub struct ListAgg;

impl Aggregate for ListAgg {
    fn name(&self) -> &'static str {
        "list"
    }

    fn result_ty(&self, arg_types: &[DataTy]) -> Result<DataTy> {
        Ok(DataTy::list_of(single_arg(arg_types)?.clone()))
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(ListState(Vec::new()))
    }

    fn update(&self, state: &mut dyn AggregateState, args: &Chunk, sel: &[u32]) -> Result<()> {
        let state = state_of::<ListState>(state)?;
        for &row in sel {
            state.0.push(args.col(0).logical_value(row as usize)?);
        }
        Ok(())
    }

    fn combine(&self, src: &mut dyn AggregateState, dst: &mut dyn AggregateState) -> Result<()> {
        let mut src = std::mem::take(&mut state_of::<ListState>(src)?.0);
        state_of::<ListState>(dst)?.0.append(&mut src);
        Ok(())
    }

    fn finalize(&self, state: &mut dyn AggregateState, out: &mut ValueBuffer) -> Result<()> {
        let items = std::mem::take(&mut state_of::<ListState>(state)?.0);
        if items.is_empty() {
            out.push_null();
            return Ok(());
        }
        out.push_value(&Val::List(items))
    }
}
