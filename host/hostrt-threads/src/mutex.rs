//!
//! Mutex for the host layer
//!
//! The lock state (owner and recursion depth) lives behind a native
//! `std::sync::Mutex` and waiters park on a `Condvar`. Owning the state
//! ourselves is what lets one type offer both semantics:
//!
//! - recursive: the owner may lock again and must unlock as many times
//! - non-recursive: the owner locking again is reported as `SelfDeadlock`
//!
//! Unlock from a thread that does not hold the lock is reported as
//! `UnlockNotOwner`. No fairness between waiters is promised.
//!

use std::sync::{Condvar, Mutex};

use hostrt_core::{report, report_status, HostError, HostResult, MisuseKind};

use crate::raw::{alloc_object, free_object};
use crate::thread::{current, ThreadHandle};

struct LockState {
    owner: Option<ThreadHandle>,
    depth: usize,
}

pub struct HostMutex {
    recursive: bool,
    state: Mutex<LockState>,
    released: Condvar,
}

impl HostMutex {
    pub fn new(recursive: bool) -> Self {
        Self {
            recursive,
            state: Mutex::new(LockState { owner: None, depth: 0 }),
            released: Condvar::new(),
        }
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Block until the calling thread owns the lock.
    pub fn lock(&self) -> HostResult<()> {
        let me = current();
        let mut state = self.state.lock()?;
        if state.owner == Some(me) {
            return self.relock(&mut state);
        }
        while state.owner.is_some() {
            state = self.released.wait(state)?;
        }
        state.owner = Some(me);
        state.depth = 1;
        Ok(())
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_lock(&self) -> HostResult<bool> {
        let me = current();
        let mut state = self.state.lock()?;
        match state.owner {
            Some(owner) if owner == me => self.relock(&mut state).map(|()| true),
            Some(_) => Ok(false),
            None => {
                state.owner = Some(me);
                state.depth = 1;
                Ok(true)
            }
        }
    }

    pub fn unlock(&self) -> HostResult<()> {
        let mut state = self.state.lock()?;
        if state.owner != Some(current()) {
            return Err(MisuseKind::UnlockNotOwner.into());
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
        Ok(())
    }

    fn relock(&self, state: &mut LockState) -> HostResult<()> {
        if !self.recursive {
            return Err(MisuseKind::SelfDeadlock.into());
        }
        state.depth = state
            .depth
            .checked_add(1)
            .ok_or_else(|| HostError::substrate("mutex_lock", "recursion depth overflow"))?;
        Ok(())
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_mutex_alloc(recursive: i32) -> *mut HostMutex {
    report("mutex_alloc", alloc_object(HostMutex::new(recursive != 0), "mutex"))
        .unwrap_or(std::ptr::null_mut())
}

/// # Safety
/// `m` must be null or a live pointer from `hostrt_mutex_alloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_mutex_lock(m: *mut HostMutex) -> i32 {
    let result = match unsafe { m.as_ref() } {
        Some(mutex) => mutex.lock(),
        None => Err(MisuseKind::NullHandle("mutex_lock").into()),
    };
    report_status("mutex_lock", result)
}

/// # Safety
/// `m` must be null or a live pointer from `hostrt_mutex_alloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_mutex_unlock(m: *mut HostMutex) -> i32 {
    let result = match unsafe { m.as_ref() } {
        Some(mutex) => mutex.unlock(),
        None => Err(MisuseKind::NullHandle("mutex_unlock").into()),
    };
    report_status("mutex_unlock", result)
}

/// # Safety
/// `m` must be null or a pointer from `hostrt_mutex_alloc` that no thread
/// holds or waits on.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_mutex_free(m: *mut HostMutex) {
    unsafe { free_object(m) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_mutex_basic() {
        let m = HostMutex::new(false);
        assert!(!m.is_recursive());
        m.lock().unwrap();
        m.unlock().unwrap();
        assert!(m.try_lock().unwrap());
        m.unlock().unwrap();
    }

    #[test]
    fn test_non_recursive_relock_is_detected() {
        let m = HostMutex::new(false);
        m.lock().unwrap();

        let err = m.lock().unwrap_err();
        assert!(matches!(err, HostError::Misuse(MisuseKind::SelfDeadlock)));
        assert!(m.try_lock().unwrap_err().is_misuse());

        m.unlock().unwrap();
        assert!(m.unlock().unwrap_err().is_misuse());
    }

    #[test]
    fn test_recursive_depth() {
        let m = Arc::new(HostMutex::new(true));
        m.lock().unwrap();
        m.lock().unwrap();
        assert!(m.try_lock().unwrap());

        let other = Arc::clone(&m);
        let blocked = thread::spawn(move || other.try_lock().unwrap()).join().unwrap();
        assert!(!blocked);

        m.unlock().unwrap();
        m.unlock().unwrap();
        let other = Arc::clone(&m);
        let still_blocked = thread::spawn(move || other.try_lock().unwrap()).join().unwrap();
        assert!(!still_blocked);

        m.unlock().unwrap();
        let other = Arc::clone(&m);
        let acquired = thread::spawn(move || {
            let ok = other.try_lock().unwrap();
            other.unlock().unwrap();
            ok
        })
        .join()
        .unwrap();
        assert!(acquired);
    }

    #[test]
    fn test_unlock_from_other_thread() {
        let m = Arc::new(HostMutex::new(false));
        m.lock().unwrap();

        let other = Arc::clone(&m);
        let err = thread::spawn(move || other.unlock().unwrap_err()).join().unwrap();
        assert!(matches!(err, HostError::Misuse(MisuseKind::UnlockNotOwner)));

        m.unlock().unwrap();
    }

    #[test]
    fn test_mutex_concurrent() {
        let m = hostrt_mutex_alloc(0);
        assert!(!m.is_null());
        let counter = Arc::new(std::sync::atomic::AtomicI64::new(0));

        let handles: Vec<_> = (0..10).map(|_| {
            let m_ptr = m as usize;
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                unsafe {
                    let m = m_ptr as *mut HostMutex;
                    for _ in 0..100 {
                        assert_eq!(hostrt_mutex_lock(m), 0);
                        let value = counter.load(std::sync::atomic::Ordering::Relaxed);
                        counter.store(value + 1, std::sync::atomic::Ordering::Relaxed);
                        assert_eq!(hostrt_mutex_unlock(m), 0);
                    }
                }
            })
        }).collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1000);
        unsafe { hostrt_mutex_free(m) };
    }

    #[test]
    fn test_c_abi_null_and_misuse_codes() {
        unsafe {
            assert_eq!(hostrt_mutex_lock(std::ptr::null_mut()), -libc::EINVAL);

            let m = hostrt_mutex_alloc(0);
            assert_eq!(hostrt_mutex_unlock(m), -libc::EPERM);
            assert_eq!(hostrt_mutex_lock(m), 0);
            assert_eq!(hostrt_mutex_lock(m), -libc::EDEADLK);
            assert_eq!(hostrt_mutex_unlock(m), 0);
            hostrt_mutex_free(m);
        }
    }
}
