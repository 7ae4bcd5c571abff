// Bind-time rewriting for `agg(x ORDER BY y, ...)`. Order keys that the
// grouping already fixes are pruned; if nothing survives the aggregate
// runs unwrapped. Otherwise the comparison fast path handles first/last/
// any_value over fixed-width keys, with `last` expressed by inverting the
// declared order so both paths retain the minimal key. Everything else
// buffers and sorts.

use crate::compare::CompareSpec;
use crate::ordered::OrderedSpec;
use riffle_base::{err_input, BufferPool, CancelToken, Result};
use riffle_func::Registry;
use riffle_sort::{SortConfig, SortLayout, SortSpec};
use riffle_vec::{DataTy, Ty};
use std::sync::Arc;

pub struct OrderedBind {
    pub aggregate: String,
    pub arg_types: Vec<DataTy>,
    pub order_types: Vec<DataTy>,
    pub orders: Vec<SortSpec>,
    /// Marks order keys that also appear in the grouping; ordering by a
    /// group key has no effect inside that group.
    pub order_in_groups: Vec<bool>,
    /// The order expressions equal the argument expressions.
    pub sorted_on_args: bool,
}

pub enum OrderedPlan {
    /// No effective ordering; run the aggregate as-is.
    Plain(Arc<dyn riffle_func::Aggregate>),
    Compare(CompareSpec),
    Ordered(OrderedSpec),
}

pub fn bind_ordered(
    reg: &Registry,
    bind: OrderedBind,
    pool: Arc<dyn BufferPool>,
    sort_cfg: SortConfig,
    threshold: usize,
    cancel: CancelToken,
) -> Result<OrderedPlan> {
    if bind.order_types.len() != bind.orders.len() {
        return Err(err_input("order key arity mismatch"));
    }

    let mut order_types = Vec::new();
    let mut orders = Vec::new();
    let mut pruned = false;
    for (i, (ty, spec)) in bind.order_types.iter().zip(bind.orders.iter()).enumerate() {
        if bind.order_in_groups.get(i).copied().unwrap_or(false) {
            pruned = true;
            continue;
        }
        order_types.push(ty.clone());
        orders.push(*spec);
    }
    if orders.is_empty() {
        return Ok(OrderedPlan::Plain(reg.aggregate(&bind.aggregate)?));
    }
    let sorted_on_args = bind.sorted_on_args && !pruned;

    let all_fixed = order_types
        .iter()
        .all(|t| matches!(t.ty(), Ty::Int | Ty::Flo));
    let name = bind.aggregate.as_str();
    let compare_eligible = matches!(name, "first" | "last" | "any_value" | "arbitrary");
    if compare_eligible && all_fixed {
        let specs: Vec<SortSpec> = if name == "last" {
            orders.iter().map(SortSpec::invert).collect()
        } else {
            orders
        };
        let key_layout = SortLayout::new(&order_types, &specs, sort_cfg.prefix_bytes)?;
        return Ok(OrderedPlan::Compare(CompareSpec {
            inner: reg.aggregate("last")?,
            arg_types: bind.arg_types,
            key_layout,
            skip_nulls: matches!(name, "any_value" | "arbitrary"),
        }));
    }

    Ok(OrderedPlan::Ordered(OrderedSpec {
        inner: reg.aggregate(&bind.aggregate)?,
        arg_types: bind.arg_types,
        sort_types: order_types,
        specs: orders,
        sorted_on_args,
        threshold,
        sort_cfg,
        pool,
        cancel,
    }))
}
