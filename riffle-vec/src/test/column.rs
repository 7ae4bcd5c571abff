use crate::{Column, SelIndex, Ty, Val, ValueBuffer};
use std::sync::Arc;
use test_log::test;

fn int_buffer(vals: &[Option<i64>]) -> ValueBuffer {
    let mut buf = ValueBuffer::new(Ty::Int);
    for v in vals {
        match v {
            Some(v) => buf.push_int(*v),
            None => buf.push_null(),
        }
    }
    buf
}

#[test]
fn test_unified_over_all_layouts() {
    let n = 4;
    let base = Arc::new(int_buffer(&[Some(5), None, Some(7)]));
    let layouts = [
        Column::Flat(int_buffer(&[Some(5), None, Some(7), Some(5)])),
        Column::constant_int(9),
        Column::dict(SelIndex::from_vec(vec![0, 1, 2, 0]), base),
        Column::Seq { start: 3, step: 2 },
    ];
    for col in &layouts {
        col.verify(n).unwrap();
        let mut scratch = ValueBuffer::new(Ty::Int);
        let view = col.unified(n, &mut scratch).unwrap();
        for i in 0..n {
            let via_view = if view.is_valid(i) {
                Val::Int(view.int(i))
            } else {
                Val::Null
            };
            assert_eq!(via_view, col.logical_value(i).unwrap());
        }
    }
}

#[test]
fn test_flatten_unified_identity() {
    // Flatten and the unified view agree on logical values for every layout.
    let base = Arc::new(int_buffer(&[Some(1), Some(2), None]));
    let layouts = [
        Column::dict(SelIndex::from_vec(vec![2, 0, 1, 1]), base),
        Column::constant_int(42),
        Column::Seq { start: -2, step: 5 },
    ];
    for col in &layouts {
        let flat = Column::Flat(col.flatten(4).unwrap());
        for i in 0..4 {
            assert_eq!(
                flat.logical_value(i).unwrap(),
                col.logical_value(i).unwrap()
            );
        }
    }
}

#[test]
fn test_dict_selection_bounds() {
    let base = Arc::new(int_buffer(&[Some(1)]));
    let col = Column::dict(SelIndex::from_vec(vec![0, 1]), base);
    assert!(col.verify(2).is_err());
}

#[test]
fn test_seq_overflow_is_out_of_range() {
    let col = Column::Seq {
        start: i64::MAX - 1,
        step: 1,
    };
    let err = col.flatten(4).unwrap_err();
    assert_eq!(err.kind(), riffle_base::ErrorKind::OutOfRange);
}

#[test]
fn test_constant_null() {
    let col = Column::constant_null(&crate::DataTy::Str);
    col.verify(10).unwrap();
    assert_eq!(col.logical_value(3).unwrap(), Val::Null);
}
