// External-memory merge sort over radix-comparable rows. Both ordered
// aggregation and index builds run through this path.
//
// Sort keys serialize into a fixed-width byte prefix whose lexicographic
// order equals the declared order: per key column a null byte, then the
// encoded value (sign-flipped big-endian ints, totally-ordered floats, a
// zero-padded prefix for strings), bit-inverted for descending. Rows carry
// the full bytes of variable-length keys out of line for tie-breaking, and
// a payload that round-trips exactly.
//
// BUILD scatters rows into fixed-size blocks, sorts each block in place
// with a radix-prefixed hybrid, and seals it into the buffer pool as a
// sorted run. MERGE runs k-way passes until one run remains, reading and
// writing page by page. SCAN decodes the payload back into chunks for a
// single consumer. The buffer pool owns the memory budget; pages past it
// spill to disk and reload on pin.

mod block;
mod index;
mod key;
mod merge;
mod rowfmt;
mod scan;
mod sort;

#[cfg(test)]
mod test;

pub use index::IndexSortSink;
pub use key::{radix_keys, SortLayout, SortSpec};
pub use rowfmt::RowLayout;
pub use scan::SortScan;
pub use sort::{GlobalSort, LocalSort, SortConfig};
