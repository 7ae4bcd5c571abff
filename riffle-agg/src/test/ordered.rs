use crate::test::{int_col, one_col_chunk, oracle_sorted_vals, ordered_spec, str_col};
use crate::{finalize_batch, scatter_update, GroupBuf};
use riffle_func::Registry;
use riffle_sort::{SortConfig, SortSpec};
use riffle_vec::{DataTy, Val, VECTOR_SIZE};
use test_log::test;

fn lcg(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state >> 16
}

#[test]
fn test_ordered_list_matches_oracle() {
    let reg = Registry::with_builtins();
    let spec = ordered_spec(
        &reg,
        "list",
        &[DataTy::Str],
        &[DataTy::Int],
        &[SortSpec::default()],
        usize::MAX,
    );

    let mut state = 11u64;
    let mut rows: Vec<(Option<i64>, Val)> = Vec::new();
    for i in 0..500 {
        let key = if i % 17 == 0 {
            None
        } else {
            Some((lcg(&mut state) % 100) as i64)
        };
        rows.push((key, Val::Str(format!("value-{i}"))));
    }

    let mut group = GroupBuf::new();
    for batch in rows.chunks(97) {
        let keys: Vec<Option<i64>> = batch.iter().map(|(k, _)| *k).collect();
        let vals: Vec<Option<&str>> = batch
            .iter()
            .map(|(_, v)| match v {
                Val::Str(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        let sort_in = one_col_chunk(int_col(&keys), batch.len());
        let arg_in = one_col_chunk(str_col(&vals), batch.len());
        group.update(&spec, &sort_in, &arg_in).unwrap();
    }
    assert_eq!(group.count(), rows.len());

    let mut out = spec.result_ty().unwrap().new_buffer();
    finalize_batch(&spec, std::slice::from_mut(&mut group), &mut out).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(
        out.get_value(0).unwrap(),
        Val::List(oracle_sorted_vals(&rows, SortSpec::default()))
    );
}

#[test]
fn test_ordered_first_descending_matches_oracle() {
    let reg = Registry::with_builtins();
    let spec_sort = SortSpec {
        desc: true,
        nulls_first: false,
    };
    let spec = ordered_spec(
        &reg,
        "first",
        &[DataTy::Str],
        &[DataTy::Int],
        &[spec_sort],
        usize::MAX,
    );

    let rows: Vec<(Option<i64>, Val)> = vec![
        (Some(3), Val::str_("a")),
        (Some(9), Val::str_("b")),
        (None, Val::str_("c")),
        (Some(7), Val::str_("d")),
    ];
    let keys: Vec<Option<i64>> = rows.iter().map(|(k, _)| *k).collect();
    let vals: Vec<Option<&str>> = rows
        .iter()
        .map(|(_, v)| match v {
            Val::Str(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();

    let mut group = GroupBuf::new();
    group
        .update(
            &spec,
            &one_col_chunk(int_col(&keys), rows.len()),
            &one_col_chunk(str_col(&vals), rows.len()),
        )
        .unwrap();
    let mut out = spec.result_ty().unwrap().new_buffer();
    finalize_batch(&spec, std::slice::from_mut(&mut group), &mut out).unwrap();
    // Descending with nulls last puts 9 first.
    assert_eq!(out.get_value(0).unwrap(), Val::str_("b"));
    assert_eq!(
        oracle_sorted_vals(&rows, spec_sort)[0],
        Val::str_("b")
    );
}

#[test]
fn test_scatter_update_and_multiple_groups() {
    let reg = Registry::with_builtins();
    let spec = ordered_spec(
        &reg,
        "list",
        &[DataTy::Int],
        &[DataTy::Int],
        &[SortSpec::default()],
        usize::MAX,
    );

    // Rows alternate over three groups; group 1 gets nothing.
    let keys = [Some(5i64), Some(1), Some(4), Some(2), Some(3), Some(0)];
    let vals = [Some(50i64), Some(10), Some(40), Some(20), Some(30), Some(0)];
    let groups = [0u32, 2, 0, 2, 0, 2];
    let sort_in = one_col_chunk(int_col(&keys), keys.len());
    let arg_in = one_col_chunk(int_col(&vals), vals.len());

    let mut states: Vec<GroupBuf> = (0..3).map(|_| GroupBuf::new()).collect();
    scatter_update(&spec, &sort_in, &arg_in, &groups, &mut states).unwrap();
    assert_eq!(states[0].count(), 3);
    assert_eq!(states[1].count(), 0);
    assert_eq!(states[2].count(), 3);

    let mut out = spec.result_ty().unwrap().new_buffer();
    finalize_batch(&spec, &mut states, &mut out).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(
        out.get_value(0).unwrap(),
        Val::list_of_ints(&[30, 40, 50])
    );
    // A group with no input still finalizes; list yields null.
    assert_eq!(out.get_value(1).unwrap(), Val::Null);
    assert_eq!(out.get_value(2).unwrap(), Val::list_of_ints(&[0, 10, 20]));
}

#[test]
fn test_zero_input_group_count_is_zero() {
    let reg = Registry::with_builtins();
    let spec = ordered_spec(
        &reg,
        "count",
        &[DataTy::Int],
        &[DataTy::Int],
        &[SortSpec::default()],
        usize::MAX,
    );
    let mut states = vec![GroupBuf::new()];
    let mut out = spec.result_ty().unwrap().new_buffer();
    finalize_batch(&spec, &mut states, &mut out).unwrap();
    assert_eq!(out.get_value(0).unwrap(), Val::Int(0));
}

#[test]
fn test_tier_promotion_through_collection() {
    let reg = Registry::with_builtins();
    let spec = ordered_spec(
        &reg,
        "sum",
        &[DataTy::Int],
        &[DataTy::Int],
        &[SortSpec::default()],
        usize::MAX,
    );
    let total_rows = VECTOR_SIZE + 600;
    let mut group = GroupBuf::new();
    let mut want = 0i64;
    let mut fed = 0usize;
    let mut state = 3u64;
    while fed < total_rows {
        let rows = 150.min(total_rows - fed);
        let keys: Vec<Option<i64>> = (0..rows).map(|i| Some((fed + i) as i64)).collect();
        let vals: Vec<Option<i64>> = (0..rows)
            .map(|_| {
                let v = (lcg(&mut state) % 1000) as i64;
                want += v;
                Some(v)
            })
            .collect();
        group
            .update(
                &spec,
                &one_col_chunk(int_col(&keys), rows),
                &one_col_chunk(int_col(&vals), rows),
            )
            .unwrap();
        fed += rows;
    }
    assert_eq!(group.count(), total_rows);
    let mut out = spec.result_ty().unwrap().new_buffer();
    finalize_batch(&spec, std::slice::from_mut(&mut group), &mut out).unwrap();
    assert_eq!(out.get_value(0).unwrap(), Val::Int(want));
}

#[test]
fn test_absorb_across_tiers() {
    let reg = Registry::with_builtins();
    let spec = ordered_spec(
        &reg,
        "list",
        &[DataTy::Int],
        &[DataTy::Int],
        &[SortSpec::default()],
        usize::MAX,
    );

    // Linked-tier source absorbed into a chunk-tier target.
    let mut big = GroupBuf::new();
    let keys: Vec<Option<i64>> = (0..40).map(|i| Some(40 - i)).collect();
    let vals: Vec<Option<i64>> = (0..40).map(|i| Some(100 + i)).collect();
    big.update(
        &spec,
        &one_col_chunk(int_col(&keys), 40),
        &one_col_chunk(int_col(&vals), 40),
    )
    .unwrap();

    let mut small = GroupBuf::new();
    small
        .update(
            &spec,
            &one_col_chunk(int_col(&[Some(0)]), 1),
            &one_col_chunk(int_col(&[Some(999)]), 1),
        )
        .unwrap();

    big.absorb(&spec, &mut small).unwrap();
    assert_eq!(big.count(), 41);
    assert_eq!(small.count(), 0);

    let mut out = spec.result_ty().unwrap().new_buffer();
    finalize_batch(&spec, std::slice::from_mut(&mut big), &mut out).unwrap();
    let Val::List(items) = out.get_value(0).unwrap() else {
        panic!("expected a list result");
    };
    assert_eq!(items.len(), 41);
    // Key 0 sorts first; its value came from the absorbed group.
    assert_eq!(items[0], Val::Int(999));
    assert_eq!(items[40], Val::Int(100));
}

#[test]
fn test_absorb_into_empty_swaps() {
    let reg = Registry::with_builtins();
    let spec = ordered_spec(
        &reg,
        "count",
        &[DataTy::Int],
        &[DataTy::Int],
        &[SortSpec::default()],
        usize::MAX,
    );
    let mut empty = GroupBuf::new();
    let mut full = GroupBuf::new();
    full.update(
        &spec,
        &one_col_chunk(int_col(&[Some(1), Some(2)]), 2),
        &one_col_chunk(int_col(&[Some(1), Some(2)]), 2),
    )
    .unwrap();
    empty.absorb(&spec, &mut full).unwrap();
    assert_eq!(empty.count(), 2);
    assert_eq!(full.count(), 0);
}

#[test]
fn test_finalize_threshold_batches_agree() {
    let reg = Registry::with_builtins();
    let mut outs = Vec::new();
    for threshold in [1usize, 4, usize::MAX] {
        let spec = crate::OrderedSpec {
            sort_cfg: SortConfig {
                external_threshold_rows: 1,
                block_rows: 8,
                ..SortConfig::default()
            },
            ..ordered_spec(
                &reg,
                "list",
                &[DataTy::Int],
                &[DataTy::Int],
                &[SortSpec::default()],
                threshold,
            )
        };
        let mut states: Vec<GroupBuf> = (0..5).map(|_| GroupBuf::new()).collect();
        let keys = [Some(9i64), Some(2), Some(7), Some(1), Some(8), Some(3)];
        let vals = [Some(90i64), Some(20), Some(70), Some(10), Some(80), Some(30)];
        let groups = [4u32, 0, 4, 0, 2, 2];
        scatter_update(
            &spec,
            &one_col_chunk(int_col(&keys), 6),
            &one_col_chunk(int_col(&vals), 6),
            &groups,
            &mut states,
        )
        .unwrap();
        let mut out = spec.result_ty().unwrap().new_buffer();
        finalize_batch(&spec, &mut states, &mut out).unwrap();
        let vals: Vec<Val> = (0..5).map(|i| out.get_value(i).unwrap()).collect();
        outs.push(vals);
    }
    assert_eq!(outs[0], outs[1]);
    assert_eq!(outs[1], outs[2]);
    assert_eq!(outs[0][0], Val::list_of_ints(&[10, 20]));
    assert_eq!(outs[0][2], Val::list_of_ints(&[30, 80]));
    assert_eq!(outs[0][4], Val::list_of_ints(&[70, 90]));
}
