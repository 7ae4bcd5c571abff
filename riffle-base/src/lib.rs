mod cancel;
mod error;
mod pool;
mod validity;

#[cfg(test)]
mod test;

pub use cancel::CancelToken;
pub use error::{
    err, err_cancelled, err_conv, err_input, err_internal, err_range, err_resource, err_unimpl,
    Error, ErrorKind, Result,
};
pub use pool::{BufferPool, MemPool, PageId, PoolConfig, PoolStats};
pub use validity::ValidityMask;
