//! Error kinds raised at the public boundary of the allocator facade and
//! the lock/inflation path. `invariant-violation` is deliberately not one
//! of these: it is unrecoverable and handled by [`fatal`] instead.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcError {
    /// All three pools (young, immix, large) failed to satisfy an
    /// allocation request after escalation.
    OutOfMemory,
    /// An inflation attempt raced and lost to another thread; the header
    /// is already in a consistent (if different) state and the caller
    /// should re-read it rather than retry the inflation itself.
    LockError,
    /// `contend_for_lock` timed out before acquiring.
    LockTimeout,
    /// `contend_for_lock` was interrupted before acquiring.
    LockInterrupted,
}

impl fmt::Display for GcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GcError::OutOfMemory => "out of memory: young, immix and large pools are exhausted",
            GcError::LockError => "header inflation raced and lost",
            GcError::LockTimeout => "timed out waiting for object lock",
            GcError::LockInterrupted => "interrupted while waiting for object lock",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for GcError {}

pub type GcResult<T> = Result<T, GcError>;

/// Raise an invariant violation: print the failed check plus a captured
/// backtrace, then abort. Collection is all-or-nothing per safepoint, so
/// there is no way to unwind out of a broken collector state and keep
/// running.
#[cold]
#[inline(never)]
pub fn fatal(check: &str) -> ! {
    eprintln!("ossuary: invariant violation: {}", check);
    eprintln!("{:?}", backtrace::Backtrace::new());
    std::process::abort();
}

#[macro_export]
macro_rules! invariant {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            $crate::error::fatal(concat!($msg, " (", stringify!($cond), ")"));
        }
    };
}
