///
/// Reporting helpers for the C boundary.
///
/// The C call surface cannot carry a `HostError`, so failures are logged
/// here with the operation name and turned into either a status code
/// (`0` / negative errno) or an `Option` for calls that return a pointer.
///

use crate::error::HostResult;

/// Log a failed call and drop the error, keeping the success value.
pub fn report<T>(op: &'static str, result: HostResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(op, errno = err.errno(), "{}", err);
            None
        }
    }
}

/// Log a failed call and convert it into `0` or a negative errno.
pub fn report_status(op: &'static str, result: HostResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            tracing::warn!(op, errno = err.errno(), "{}", err);
            -err.errno()
        }
    }
}
