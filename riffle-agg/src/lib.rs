// Order-dependent aggregation: `agg(x ORDER BY y, ...)`.
//
// The general path buffers every group's rows through three tiers (linked
// segments, then a chunk pair, then pool-backed collections), and at
// finalize sorts the buffered tuples behind a group-index prefix so the
// sorted stream comes out one contiguous group at a time; the inner
// aggregate then sees its rows in key order. The fast path for first/
// last/any_value keeps only the best radix key per group and feeds the
// inner aggregate on strict improvement. Binding prunes redundant order
// keys, picks between the two paths, and rewrites `last` by inverting the
// declared order so both paths retain the minimal key.

mod bind;
mod compare;
mod ordered;
mod segment;


pub use bind::{bind_ordered, OrderedBind, OrderedPlan};
pub use compare::{CompareBuf, CompareSpec};
pub use ordered::{finalize_batch, scatter_update, GroupBuf, OrderedSpec};
