use std::array::TryFromSliceError;
use std::num::TryFromIntError;
use std::str::Utf8Error;

use thiserror::Error;

/// The error type for sandnet operations.
///
/// Every `Err` that leaves a dispatch or intrinsic call is fatal to the
/// guest call that raised it. Failures of the host OS call itself are
/// not errors at this level: they are relayed to the guest as the
/// call's return value.
#[derive(Error, Debug)]
pub enum SandnetError {
    /// Guest memory access out of bounds
    #[error("Guest access of {1} bytes at {0:#x} is out of bounds, memory size is {2}")]
    BoundsCheckFailed(u64, usize, usize),

    /// Checked Add Overflow
    #[error("Couldnt add {1} to guest address {0:#x}")]
    CheckedAddOverflow(u32, u64),

    /// A generic error with a message
    #[error("{0}")]
    Error(String),

    /// A direct intrinsic was called by the guest but it was not registered.
    #[error("Intrinsic {0} was not found")]
    HostFunctionNotFound(String),

    /// Reading Writing or Seeking data failed.
    #[error("Reading Writing or Seeking data failed {0:?}")]
    IOError(#[from] std::io::Error),

    /// Failed to convert to Integer
    #[error("Failed To Convert Size to usize")]
    IntConversionFailure(#[from] TryFromIntError),

    /// A guest string ran off the end of guest memory
    #[error("Guest string at {0:#x} is not NUL-terminated within memory")]
    InvalidGuestString(u64),

    /// Conversion of str to Json failed
    #[error("Conversion of str data to json failed")]
    JsonConversionFailure(#[source] serde_json::Error),

    /// The memory request exceeds the maximum size allowed
    #[error("Memory requested {0} exceeds maximum size allowed {1}")]
    MemoryRequestTooBig(usize, usize),

    /// mmap Failed.
    #[error("mmap failed with os error {0:?}")]
    MmapFailed(Option<i32>),

    /// a Prometheus error occurred
    #[error("Prometheus Error {0:?}")]
    Prometheus(#[from] prometheus::Error),

    /// Error occurred converting a slice to an array
    #[error("TryFromSliceError {0:?}")]
    TryFromSliceError(#[from] TryFromSliceError),

    /// A function was called with an incorrect number of arguments
    #[error("The number of arguments to the function is wrong: got {0:?} expected {1:?}")]
    UnexpectedNoOfArguments(usize, usize),

    /// The guest invoked an operation that is never allowed in a sandbox
    #[error("Unsupported operation {0} called by guest")]
    UnsupportedOperation(String),

    /// Slice conversion to UTF8 failed
    #[error("Slice Conversion of UTF8 data to str failed")]
    UTF8SliceConversionFailure(#[from] Utf8Error),
}

/// How the orchestrator should classify a failed guest call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    /// The guest handed the translator something it must not touch
    SandboxViolation,
    /// The guest asked for an operation the platform never permits
    UnsupportedOperation,
    /// The host side itself failed (allocation, configuration, metrics)
    Internal,
}

impl SandnetError {
    /// Classify this error for the orchestrator that invoked the guest
    pub fn trap_kind(&self) -> TrapKind {
        match self {
            SandnetError::BoundsCheckFailed(..)
            | SandnetError::CheckedAddOverflow(..)
            | SandnetError::InvalidGuestString(_)
            | SandnetError::IntConversionFailure(_)
            | SandnetError::TryFromSliceError(_)
            | SandnetError::UnexpectedNoOfArguments(..)
            | SandnetError::UTF8SliceConversionFailure(_) => TrapKind::SandboxViolation,
            SandnetError::UnsupportedOperation(_) | SandnetError::HostFunctionNotFound(_) => {
                TrapKind::UnsupportedOperation
            }
            SandnetError::Error(_)
            | SandnetError::IOError(_)
            | SandnetError::JsonConversionFailure(_)
            | SandnetError::MemoryRequestTooBig(..)
            | SandnetError::MmapFailed(_)
            | SandnetError::Prometheus(_) => TrapKind::Internal,
        }
    }
}

/// Creates a `SandnetError::Error` from a string literal or format string
#[macro_export]
macro_rules! new_error {
    ($msg:literal $(,)?) => {{
        let __args = std::format_args!($msg);
        let __err_msg = match __args.as_str() {
            Some(msg) => String::from(msg),
            None => std::format!($msg),
        };
        $crate::SandnetError::Error(__err_msg)
    }};
    ($fmtstr:expr, $($arg:tt)*) => {{
           let __err_msg = std::format!($fmtstr, $($arg)*);
           $crate::error::SandnetError::Error(__err_msg)
    }};
}

/// Logs an error at `error` level then returns it from the enclosing
/// function. Accepts either a `SandnetError` value or a format string.
#[macro_export]
macro_rules! log_then_return {
    ($msg:literal $(,)?) => {{
        let __err = $crate::new_error!($msg);
        log::error!("{}", __err);
        return Err(__err);
    }};
    ($err:expr $(,)?) => {{
        let __err = $err;
        log::error!("{}", __err);
        return Err(__err);
    }};
    ($fmtstr:expr, $($arg:tt)*) => {{
        let __err = $crate::new_error!($fmtstr, $($arg)*);
        log::error!("{}", __err);
        return Err(__err);
    }};
}
