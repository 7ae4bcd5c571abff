// Columnar values move through the core in chunks of at most VECTOR_SIZE
// rows. A chunk is a set of columns sharing one cardinality; each column is
// in exactly one of four physical layouts:
//
// - Flat: N contiguous fixed-width cells plus an N-bit validity mask.
// - Const: a single cell and validity bit, logically repeated N times.
// - Dict: a shared backing flat buffer plus a selection index of length N
//   mapping row -> backing row. The backing buffer is owned upstream and
//   outlives the referencing chunk.
// - Seq: start + step, materialized on access.
//
// Cells are 8 bytes for ints and floats (all int widths are surfaced as
// i64), 16 bytes for strings and lists. A string cell is a length-prefixed
// handle: up to 12 bytes inline, longer payloads live in a per-buffer heap
// and the cell keeps a 4-byte prefix plus the heap offset. A list cell is
// an (offset, length) pair into a single child buffer holding the
// concatenated elements; offset+length always lies inside the child.
//
// Operators never dispatch per row on the layout. They either take the
// unified view (base buffer + selection) or force the Flat form with
// `flatten`, which is the only layout conversion they may request.
//
// Heap bytes outlive the owning buffer only when a row is explicitly
// copied into a downstream buffer, which re-adds the payload to the
// destination heap.

mod buffer;
mod chunk;
mod collection;
mod column;
mod heap;
mod pipe;
mod sel;
mod value;


pub use buffer::{DataTy, ListEntry, Ty, ValueBuffer};
pub use chunk::Chunk;
pub use collection::{ChunkCollection, CollScan};
pub use column::{rows_equal, Column, Sel, UnifiedView};
pub use pipe::{Sink, SinkResult, Source};
pub use sel::SelIndex;
pub use value::Val;

/// Rows per chunk at full capacity.
pub const VECTOR_SIZE: usize = 2048;
