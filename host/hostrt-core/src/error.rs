///
/// Host error types.
///
/// Every failure a primitive can hit falls into one of three families:
/// the backing store could not provide memory (or a configured limit was
/// reached), the native substrate call failed, or the caller broke the
/// usage contract in a way we were able to detect.
///

use thiserror::Error;

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Allocation failed for {what}")]
    Allocation { what: &'static str },

    #[error("Substrate call {op} failed: {reason}")]
    Substrate { op: &'static str, reason: String },

    #[error("Misuse: {0}")]
    Misuse(#[from] MisuseKind),
}

/// Programmer errors that are detected instead of left undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MisuseKind {
    #[error("unlock called by a thread that does not hold the mutex")]
    UnlockNotOwner,

    #[error("non-recursive mutex relocked by its owner")]
    SelfDeadlock,

    #[error("thread {0} is not joinable (unknown, already joined or detached)")]
    NotJoinable(u64),

    #[error("thread {0} joined itself")]
    JoinSelf(u64),

    #[error("TLS slot {0} used after free")]
    SlotFreed(u64),

    #[error("TLS slot {0} belongs to another registry")]
    ForeignSlot(u64),

    #[error("semaphore initial count {0} is negative")]
    NegativeCount(i64),

    #[error("null handle passed to {0}")]
    NullHandle(&'static str),
}

impl HostError {
    pub fn substrate(op: &'static str, reason: impl ToString) -> Self {
        HostError::Substrate {
            op,
            reason: reason.to_string(),
        }
    }

    /// Positive errno describing this error, for the C ABI.
    pub fn errno(&self) -> i32 {
        match self {
            HostError::Allocation { .. } => libc::ENOMEM,
            HostError::Substrate { .. } => libc::EIO,
            HostError::Misuse(kind) => match kind {
                MisuseKind::UnlockNotOwner => libc::EPERM,
                MisuseKind::SelfDeadlock | MisuseKind::JoinSelf(_) => libc::EDEADLK,
                MisuseKind::NotJoinable(_) => libc::ESRCH,
                MisuseKind::SlotFreed(_)
                | MisuseKind::ForeignSlot(_)
                | MisuseKind::NegativeCount(_)
                | MisuseKind::NullHandle(_) => libc::EINVAL,
            },
        }
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, HostError::Misuse(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for HostError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        HostError::substrate("lock", "native lock poisoned by a panicking holder")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = HostError::Allocation { what: "semaphore" };
        assert!(err.to_string().contains("Allocation failed"));
        assert!(err.to_string().contains("semaphore"));

        let err = HostError::substrate("thread_create", "resource temporarily unavailable");
        assert!(err.to_string().contains("thread_create"));
        assert!(err.to_string().contains("resource temporarily unavailable"));

        let err = HostError::from(MisuseKind::NotJoinable(7));
        assert!(err.to_string().contains("Misuse"));
        assert!(err.to_string().contains("thread 7"));

        let err = HostError::from(MisuseKind::NegativeCount(-3));
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(HostError::Allocation { what: "mutex" }.errno(), libc::ENOMEM);
        assert_eq!(HostError::substrate("lock", "x").errno(), libc::EIO);
        assert_eq!(HostError::from(MisuseKind::UnlockNotOwner).errno(), libc::EPERM);
        assert_eq!(HostError::from(MisuseKind::SelfDeadlock).errno(), libc::EDEADLK);
        assert_eq!(HostError::from(MisuseKind::NotJoinable(1)).errno(), libc::ESRCH);
        assert_eq!(HostError::from(MisuseKind::SlotFreed(2)).errno(), libc::EINVAL);
    }

    #[test]
    fn test_poison_maps_to_substrate() {
        let lock = std::sync::Mutex::new(0);
        let _ = std::thread::scope(|s| {
            s.spawn(|| -> () {
                let _guard = lock.lock().unwrap();
                panic!("poison")
            })
            .join()
        });
        let err: HostError = lock.lock().unwrap_err().into();
        assert!(matches!(err, HostError::Substrate { op: "lock", .. }));
        assert!(!err.is_misuse());
    }
}
