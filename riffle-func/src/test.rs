use crate::{Aggregate, CountAgg, FirstAgg, LastAgg, ListAgg, Registry, SumAgg};
use riffle_base::ErrorKind;
use riffle_vec::{Chunk, Column, DataTy, Val};
use test_log::test;


fn int_chunk(vals: &[Option<i64>]) -> Chunk {
    let mut chunk = Chunk::new(&[DataTy::Int]);
    for v in vals {
        match v {
            Some(v) => chunk.flat_mut(0).unwrap().push_int(*v),
            None => chunk.flat_mut(0).unwrap().push_null(),
        }
    }
    chunk.set_rows(vals.len());
    chunk
}

fn run_simple(agg: &dyn Aggregate, chunk: &Chunk) -> Val {
    let mut state = agg.new_state();
    agg.simple_update(state.as_mut(), chunk).unwrap();
    let mut out = agg.result_ty(chunk.types()).unwrap().new_buffer();
    agg.finalize(state.as_mut(), &mut out).unwrap();
    out.get_value(0).unwrap()
}

#[test]
fn test_count_skips_nulls() {
    let chunk = int_chunk(&[Some(1), None, Some(3), None]);
    assert_eq!(run_simple(&CountAgg, &chunk), Val::Int(2));
}

#[test]
fn test_count_empty_is_zero() {
    let chunk = int_chunk(&[]);
    assert_eq!(run_simple(&CountAgg, &chunk), Val::Int(0));
}

#[test]
fn test_sum_and_overflow() {
    let chunk = int_chunk(&[Some(5), Some(7), None]);
    assert_eq!(run_simple(&SumAgg, &chunk), Val::Int(12));

    let chunk = int_chunk(&[Some(i64::MAX), Some(1)]);
    let mut state = SumAgg.new_state();
    let err = SumAgg.simple_update(state.as_mut(), &chunk).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn test_first_last_list() {
    let chunk = int_chunk(&[None, Some(2), Some(3)]);
    assert_eq!(run_simple(&FirstAgg::new(), &chunk), Val::Null);
    assert_eq!(run_simple(&FirstAgg::any_value(), &chunk), Val::Int(2));
    assert_eq!(run_simple(&LastAgg, &chunk), Val::Int(3));
    assert_eq!(
        run_simple(&ListAgg, &chunk),
        Val::List(vec![Val::Null, Val::Int(2), Val::Int(3)])
    );
}

#[test]
fn test_update_respects_selection_order() {
    let chunk = int_chunk(&[Some(10), Some(20), Some(30)]);
    let mut state = LastAgg.new_state();
    LastAgg.update(state.as_mut(), &chunk, &[2, 0]).unwrap();
    let mut out = DataTy::Int.new_buffer();
    LastAgg.finalize(state.as_mut(), &mut out).unwrap();
    assert_eq!(out.get_value(0).unwrap(), Val::Int(10));
}

#[test]
fn test_combine() {
    let a = int_chunk(&[Some(1), Some(2)]);
    let b = int_chunk(&[Some(3)]);
    let mut sa = SumAgg.new_state();
    let mut sb = SumAgg.new_state();
    SumAgg.simple_update(sa.as_mut(), &a).unwrap();
    SumAgg.simple_update(sb.as_mut(), &b).unwrap();
    SumAgg.combine(sa.as_mut(), sb.as_mut()).unwrap();
    let mut out = DataTy::Int.new_buffer();
    SumAgg.finalize(sb.as_mut(), &mut out).unwrap();
    assert_eq!(out.get_value(0).unwrap(), Val::Int(6));
}

#[test]
fn test_registry_lookup() {
    let reg = Registry::with_builtins();
    assert_eq!(reg.aggregate("arbitrary").unwrap().name(), "any_value");
    assert!(reg.scalar("array_slice").is_ok());
    let err = reg.aggregate("no_such_aggregate").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_scalar_rejects_bad_arity() {
    let reg = Registry::with_builtins();
    let slice = reg.scalar("array_slice").unwrap();
    let chunk = Chunk::from_columns(vec![Column::constant_int(1)], 1).unwrap();
    assert_eq!(
        slice.execute(&chunk).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}
