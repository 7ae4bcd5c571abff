use crate::test::lcg_step;
use crate::{GlobalSort, SortConfig, SortSpec};
use riffle_base::{CancelToken, ErrorKind, MemPool};
use riffle_vec::{Chunk, Column, DataTy, Ty, Val, ValueBuffer, VECTOR_SIZE};
use std::sync::Arc;
use test_log::test;

fn sort_ints(vals: &[Option<i64>], spec: SortSpec, cfg: SortConfig) -> Vec<Val> {
    let pool: Arc<dyn riffle_base::BufferPool> = Arc::new(MemPool::in_memory());
    let global = GlobalSort::new(
        &[DataTy::Int],
        &[spec],
        &[DataTy::Int],
        pool,
        cfg,
        CancelToken::new(),
    )
    .unwrap();
    let mut local = global.local();
    for batch in vals.chunks(VECTOR_SIZE) {
        let mut buf = ValueBuffer::new(Ty::Int);
        for v in batch {
            match v {
                Some(v) => buf.push_int(*v),
                None => buf.push_null(),
            }
        }
        let chunk = Chunk::from_columns(vec![Column::Flat(buf)], batch.len()).unwrap();
        local.sink(&chunk, &chunk).unwrap();
    }
    global.add_local(local).unwrap();
    global.sort_all().unwrap();
    let mut scan = global.scan().unwrap();
    let mut out = scan.output_chunk();
    let mut got = Vec::new();
    while scan.scan(&mut out).unwrap() {
        for i in 0..out.rows() {
            got.push(out.col(0).logical_value(i).unwrap());
        }
    }
    got
}

#[test]
fn test_sort_ascending_permutation() {
    let mut state = 42u64;
    let vals: Vec<Option<i64>> = (0..5000)
        .map(|_| Some(lcg_step(&mut state) as i64))
        .collect();
    let got = sort_ints(&vals, SortSpec::default(), SortConfig::default());
    assert_eq!(got.len(), vals.len());
    // Output is the input multiset.
    let mut want: Vec<i64> = vals.iter().map(|v| v.unwrap()).collect();
    want.sort();
    let got_ints: Vec<i64> = got
        .iter()
        .map(|v| match v {
            Val::Int(i) => *i,
            other => panic!("unexpected value {other:?}"),
        })
        .collect();
    assert_eq!(got_ints, want);
}

#[test]
fn test_sort_nulls_first_and_descending() {
    let vals = [Some(5), None, Some(-3), Some(9), None];
    let got = sort_ints(&vals, SortSpec::default(), SortConfig::default());
    assert_eq!(
        got,
        vec![Val::Null, Val::Null, Val::Int(-3), Val::Int(5), Val::Int(9)]
    );

    let got = sort_ints(
        &vals,
        SortSpec {
            desc: true,
            nulls_first: false,
        },
        SortConfig::default(),
    );
    assert_eq!(
        got,
        vec![Val::Int(9), Val::Int(5), Val::Int(-3), Val::Null, Val::Null]
    );
}

#[test]
fn test_sort_results_do_not_depend_on_threshold() {
    let mut state = 7u64;
    let vals: Vec<Option<i64>> = (0..3000)
        .map(|_| {
            if state % 13 == 0 {
                lcg_step(&mut state);
                None
            } else {
                Some((lcg_step(&mut state) % 50) as i64)
            }
        })
        .collect();
    let in_memory = sort_ints(&vals, SortSpec::default(), SortConfig::default());
    let external = sort_ints(
        &vals,
        SortSpec::default(),
        SortConfig {
            external_threshold_rows: 1,
            block_rows: 128,
            merge_fan_in: 3,
            ..SortConfig::default()
        },
    );
    assert_eq!(in_memory, external);
}

#[test]
fn test_sort_string_keys_tiebreak_past_prefix() {
    // Shared 14-byte prefix defeats the 12-byte radix prefix; full bytes
    // must decide.
    let pool: Arc<dyn riffle_base::BufferPool> = Arc::new(MemPool::in_memory());
    let global = GlobalSort::new(
        &[DataTy::Str],
        &[SortSpec::default()],
        &[DataTy::Str],
        pool,
        SortConfig {
            external_threshold_rows: 1,
            block_rows: 2,
            ..SortConfig::default()
        },
        CancelToken::new(),
    )
    .unwrap();
    let words = [
        "shared-prefix--zeta",
        "shared-prefix--alpha",
        "shared-prefix--mu",
        "shared-prefix--beta",
        "tiny",
    ];
    let mut local = global.local();
    // One row per sink so the merge path sees several string runs.
    for w in words {
        let mut buf = ValueBuffer::new(Ty::Str);
        buf.push_str(w);
        let chunk = Chunk::from_columns(vec![Column::Flat(buf)], 1).unwrap();
        local.sink(&chunk, &chunk).unwrap();
    }
    global.add_local(local).unwrap();
    global.sort_all().unwrap();
    let mut scan = global.scan().unwrap();
    let mut out = scan.output_chunk();
    let mut got = Vec::new();
    while scan.scan(&mut out).unwrap() {
        for i in 0..out.rows() {
            got.push(out.flat(0).unwrap().get_str(i).unwrap().to_owned());
        }
    }
    assert_eq!(
        got,
        vec![
            "shared-prefix--alpha",
            "shared-prefix--beta",
            "shared-prefix--mu",
            "shared-prefix--zeta",
            "tiny"
        ]
    );
}

#[test]
fn test_sort_empty_input() {
    let got = sort_ints(&[], SortSpec::default(), SortConfig::default());
    assert!(got.is_empty());
}

#[test]
fn test_parallel_build_single_scan() {
    // Two build threads, each with a local state, registered through the
    // mutexed add_local; one consumer drains the merged result.
    let pool: Arc<dyn riffle_base::BufferPool> = Arc::new(MemPool::in_memory());
    let global = Arc::new(
        GlobalSort::new(
            &[DataTy::Int],
            &[SortSpec::default()],
            &[DataTy::Int],
            pool,
            SortConfig {
                external_threshold_rows: 1,
                block_rows: 64,
                ..SortConfig::default()
            },
            CancelToken::new(),
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for t in 0..2i64 {
        let global = global.clone();
        handles.push(std::thread::spawn(move || {
            let mut local = global.local();
            let mut state = (t as u64 + 1) * 7919;
            for _ in 0..4 {
                let mut buf = ValueBuffer::new(Ty::Int);
                for _ in 0..500 {
                    buf.push_int((lcg_step(&mut state) % 100_000) as i64);
                }
                let chunk = Chunk::from_columns(vec![Column::Flat(buf)], 500).unwrap();
                local.sink(&chunk, &chunk).unwrap();
            }
            global.add_local(local).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    global.sort_all().unwrap();
    assert_eq!(global.total_rows(), 4000);
    let mut scan = global.scan().unwrap();
    let mut out = scan.output_chunk();
    let mut prev = i64::MIN;
    let mut seen = 0;
    while scan.scan(&mut out).unwrap() {
        for i in 0..out.rows() {
            let v = out.flat(0).unwrap().get_int(i);
            assert!(v >= prev);
            prev = v;
            seen += 1;
        }
    }
    assert_eq!(seen, 4000);
}

#[test]
fn test_cancelled_sort_releases_pages() {
    let pool = Arc::new(MemPool::in_memory());
    let dyn_pool: Arc<dyn riffle_base::BufferPool> = pool.clone();
    let cancel = CancelToken::new();
    let global = GlobalSort::new(
        &[DataTy::Int],
        &[SortSpec::default()],
        &[DataTy::Int],
        dyn_pool,
        SortConfig {
            external_threshold_rows: 1,
            block_rows: 16,
            ..SortConfig::default()
        },
        cancel.clone(),
    )
    .unwrap();
    let mut local = global.local();
    let mut buf = ValueBuffer::new(Ty::Int);
    for i in 0..256 {
        buf.push_int(i);
    }
    let chunk = Chunk::from_columns(vec![Column::Flat(buf)], 256).unwrap();
    local.sink(&chunk, &chunk).unwrap();
    global.add_local(local).unwrap();
    global.prepare_merge().unwrap();
    cancel.cancel();
    let err = global.merge_round().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(pool.stats().pages_live, 0);
}
