use crate::chunk::Chunk;
use riffle_base::Result;

/// Verdict a sink hands back per consumed chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkResult {
    NeedMore,
    Done,
}

/// Chunk producer. Operators are explicit state machines; `chunk_produce`
/// either fills `out` and returns true or reports end-of-stream.
pub trait Source {
    fn chunk_produce(&mut self, out: &mut Chunk) -> Result<bool>;
}

/// Chunk consumer. `finalize` runs once after the last `chunk_consume`;
/// sinks that emit terminal chunks expose them through a `Source`
/// implementation after finalize.
pub trait Sink {
    fn chunk_consume(&mut self, chunk: &Chunk) -> Result<SinkResult>;
    fn finalize(&mut self) -> Result<()>;
}
