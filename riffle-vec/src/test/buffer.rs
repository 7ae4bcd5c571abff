use crate::{DataTy, ListEntry, Ty, Val, ValueBuffer};
use test_log::test;

#[test]
fn test_string_inline_and_heap() {
    let mut buf = ValueBuffer::new(Ty::Str);
    buf.push_str("short");
    buf.push_str("a considerably longer string that cannot be inlined");
    buf.push_null();
    buf.push_str("");
    assert_eq!(buf.len(), 4);
    assert_eq!(buf.get_str(0).unwrap(), "short");
    assert_eq!(
        buf.get_str(1).unwrap(),
        "a considerably longer string that cannot be inlined"
    );
    assert!(!buf.is_valid(2));
    assert_eq!(buf.get_str(3).unwrap(), "");
    // Size is tracked exactly, not via terminators.
    assert_eq!(buf.get_bin(3).len(), 0);
}

#[test]
fn test_heap_dedup() {
    let long = "x".repeat(40);
    let mut buf = ValueBuffer::new(Ty::Str);
    buf.push_str(&long);
    let once = buf.byte_size();
    buf.push_str(&long);
    // Second copy shares heap bytes; only the 16-byte cell is added.
    assert_eq!(buf.byte_size(), once + 16);
}

#[test]
fn test_validity_popcount_identity() {
    let mut buf = ValueBuffer::new(Ty::Int);
    for i in 0..100 {
        if i % 7 == 0 {
            buf.push_null();
        } else {
            buf.push_int(i);
        }
    }
    let mask = buf.validity();
    assert_eq!(mask.count_valid() + mask.count_null(), buf.len());
}

#[test]
fn test_list_round_trip() {
    let mut buf = ValueBuffer::new_list(ValueBuffer::new(Ty::Int));
    buf.push_list_with(|child| {
        child.push_int(10);
        child.push_int(20);
        Ok(())
    })
    .unwrap();
    buf.push_null();
    buf.push_list_with(|child| {
        child.push_int(30);
        Ok(())
    })
    .unwrap();

    assert_eq!(buf.get_list(0), ListEntry { offset: 0, length: 2 });
    assert_eq!(buf.get_list(2), ListEntry { offset: 2, length: 1 });
    assert_eq!(buf.get_value(0).unwrap(), Val::list_of_ints(&[10, 20]));
    assert_eq!(buf.get_value(1).unwrap(), Val::Null);
    buf.check_list_bounds().unwrap();
}

#[test]
fn test_list_bounds_violation() {
    let mut buf = ValueBuffer::new_list(ValueBuffer::new(Ty::Int));
    buf.push_list_entry(ListEntry { offset: 0, length: 5 });
    assert!(buf.check_list_bounds().is_err());
}

#[test]
fn test_append_row_from_copies_heap() {
    let long = "a long string that lives in the source arena!!".to_owned();
    let mut src = ValueBuffer::new(Ty::Str);
    src.push_str(&long);
    let mut dst = ValueBuffer::new(Ty::Str);
    dst.append_row_from(&src, 0).unwrap();
    drop(src);
    assert_eq!(dst.get_str(0).unwrap(), long);
}

#[test]
fn test_data_ty_round_trip() {
    let ty = DataTy::list_of(DataTy::list_of(DataTy::Str));
    let buf = ty.new_buffer();
    assert_eq!(buf.data_ty(), ty);
}
