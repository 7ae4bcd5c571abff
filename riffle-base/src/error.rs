// Error plumbing has three jobs:
// 1. Capture a backtrace the moment an error is created.
// 2. Give one choke point where a breakpoint traps every error in the
//    system, including those propagated up from libraries we use.
// 3. Emit the error into the tracing/logging system at that same point.
//
// Each error also carries a kind so the pipeline boundary can apply
// policy without string matching. Only `Resource` is ever caught inside
// an operator (spill promotion); the rest propagate and abort the query.

use backtrace_error::DynBacktraceError;
use std::borrow::Cow;
use tracing::error;

#[cfg(test)]
use test_log::test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-supplied values violate a documented contract.
    InvalidInput,
    /// A value fell outside the representable range of its declared type.
    OutOfRange,
    /// A layout conversion that should have succeeded on a valid column.
    Conversion,
    /// Allocation or page-pin failure not recoverable by spilling.
    Resource,
    /// A documented gap.
    NotImplemented,
    /// Cooperative cancellation observed at a poll point.
    Cancelled,
    /// Invariant violation; always a bug.
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    #[allow(dead_code)]
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        // Foreign errors arrive unclassified; anything that matters for
        // policy is wrapped explicitly at the call site.
        Error::with_kind(ErrorKind::Internal, err)
    }
}

impl Error {
    pub fn with_kind<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, err: E) -> Error {
        error!(target: "riffle", "{:?}: {:?}", kind, err);
        let inner = DynBacktraceError::from(err);
        Error { kind, inner }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_resource(&self) -> bool {
        self.kind == ErrorKind::Resource
    }

    pub fn message(&self) -> String {
        format!("{:?}", self.inner)
    }
}

fn mk(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::with_kind(kind, SimpleErr(msg.into()))
}

pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::Internal, msg)
}

pub fn err_input(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::InvalidInput, msg)
}

pub fn err_range(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::OutOfRange, msg)
}

pub fn err_conv(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::Conversion, msg)
}

pub fn err_resource(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::Resource, msg)
}

pub fn err_unimpl(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::NotImplemented, msg)
}

pub fn err_cancelled(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::Cancelled, msg)
}

pub fn err_internal(msg: impl Into<Cow<'static, str>>) -> Error {
    mk(ErrorKind::Internal, msg)
}

#[test]
fn test_error_kinds() {
    let e = err_range("decimal overflow after rescale");
    assert_eq!(e.kind(), ErrorKind::OutOfRange);
    assert!(!e.is_resource());
    assert!(err_resource("page pin failed").is_resource());
}
