use crate::test::lcg_step;
use crate::{IndexSortSink, SortConfig};
use riffle_base::{CancelToken, MemPool};
use riffle_vec::{Chunk, Column, DataTy, Sink, SinkResult, Source, Ty, ValueBuffer};
use std::sync::Arc;
use test_log::test;

#[test]
fn test_index_sink_emits_sorted_keys_with_row_ids() {
    let pool: Arc<dyn riffle_base::BufferPool> = Arc::new(MemPool::in_memory());
    let input_types = [DataTy::Int, DataTy::Str];
    let mut sink = IndexSortSink::new(
        &input_types,
        &[0],
        pool,
        SortConfig {
            external_threshold_rows: 1,
            block_rows: 64,
            ..SortConfig::default()
        },
        CancelToken::new(),
    )
    .unwrap();

    let mut state = 5u64;
    let mut originals: Vec<i64> = Vec::new();
    for _ in 0..4 {
        let mut keys = ValueBuffer::new(Ty::Int);
        let mut names = ValueBuffer::new(Ty::Str);
        for _ in 0..200 {
            let v = (lcg_step(&mut state) % 10_000) as i64;
            originals.push(v);
            keys.push_int(v);
            names.push_str("unused by the index");
        }
        let chunk =
            Chunk::from_columns(vec![Column::Flat(keys), Column::Flat(names)], 200).unwrap();
        assert_eq!(sink.chunk_consume(&chunk).unwrap(), SinkResult::NeedMore);
    }
    sink.finalize().unwrap();

    let mut out = sink.output_chunk().unwrap();
    let mut prev = i64::MIN;
    let mut seen_rows = vec![false; originals.len()];
    let mut count = 0;
    while sink.chunk_produce(&mut out).unwrap() {
        for i in 0..out.rows() {
            let key = out.flat(0).unwrap().get_int(i);
            let row_id = out.flat(1).unwrap().get_int(i) as usize;
            assert!(key >= prev);
            prev = key;
            // Each row id appears once and maps back to its key.
            assert!(!seen_rows[row_id]);
            seen_rows[row_id] = true;
            assert_eq!(originals[row_id], key);
            count += 1;
        }
    }
    assert_eq!(count, originals.len());
}

#[test]
fn test_index_sink_rejects_missing_key_column() {
    let pool: Arc<dyn riffle_base::BufferPool> = Arc::new(MemPool::in_memory());
    let err = IndexSortSink::new(
        &[DataTy::Int],
        &[3],
        pool,
        SortConfig::default(),
        CancelToken::new(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), riffle_base::ErrorKind::InvalidInput);
}
