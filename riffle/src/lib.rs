// The riffle core is a library, not a binary. A host hands it bound
// expressions, chunks of rows, and schema metadata; it owns the hard
// middle: the columnar batch format, the scalar and aggregate function
// machinery over it, and the external-memory sort that ordered aggregates
// and index builds share.
//
// Construct the process-wide services once at startup (a `Registry` of
// functions and a `MemPool` behind `Arc<dyn BufferPool>`), pass them by
// reference into operators, and drive pipelines chunk by chunk through
// the `Source`/`Sink` contracts.

pub use riffle_base::{
    err, err_cancelled, err_conv, err_input, err_internal, err_range, err_resource, err_unimpl,
    BufferPool, CancelToken, Error, ErrorKind, MemPool, PageId, PoolConfig, PoolStats, Result,
    ValidityMask,
};
pub use riffle_vec::{
    rows_equal, Chunk, ChunkCollection, CollScan, Column, DataTy, ListEntry, Sel, SelIndex, Sink,
    SinkResult, Source, Ty, UnifiedView, Val, ValueBuffer, VECTOR_SIZE,
};
pub use riffle_func::{
    Aggregate, AggregateState, CountAgg, FirstAgg, LastAgg, ListAgg, Registry, ScalarFn, SliceFn,
    SumAgg,
};
pub use riffle_sort::{
    radix_keys, GlobalSort, IndexSortSink, LocalSort, RowLayout, SortConfig, SortLayout, SortScan,
    SortSpec,
};
pub use riffle_agg::{
    bind_ordered, finalize_batch, scatter_update, CompareBuf, CompareSpec, GroupBuf, OrderedBind,
    OrderedPlan, OrderedSpec,
};

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use test_log::test;

    // End to end: a filter's selection feeds a slice, the sliced column
    // feeds an ordered aggregate, the aggregate sorts through the pool.
    #[test]
    fn test_embedding_surface() {
        let registry = Registry::with_builtins();
        let pool: Arc<dyn BufferPool> = Arc::new(MemPool::in_memory());

        let mut lists = ValueBuffer::new_list(ValueBuffer::new(Ty::Int));
        for base in [30i64, 10, 20] {
            lists
                .push_list_with(|child| {
                    child.push_int(base);
                    child.push_int(base + 1);
                    child.push_int(base + 2);
                    Ok(())
                })
                .unwrap();
        }
        let args = Chunk::from_columns(
            vec![
                Column::Flat(lists),
                Column::constant_int(2),
                Column::constant_int(i64::MAX),
            ],
            3,
        )
        .unwrap();
        let sliced = registry
            .scalar("array_slice")
            .unwrap()
            .execute(&args)
            .unwrap();
        assert_eq!(
            sliced.logical_value(1).unwrap(),
            Val::list_of_ints(&[11, 12])
        );

        let plan = bind_ordered(
            &registry,
            OrderedBind {
                aggregate: "first".to_owned(),
                arg_types: vec![DataTy::Str],
                order_types: vec![DataTy::Int],
                orders: vec![SortSpec::default()],
                order_in_groups: vec![false],
                sorted_on_args: false,
            },
            pool,
            SortConfig::default(),
            1024,
            CancelToken::new(),
        )
        .unwrap();
        assert!(matches!(plan, OrderedPlan::Compare(_)));
    }
}
