//!
//! Counting Semaphore
//!
//! No native counting semaphore is assumed: the permit count sits behind a
//! `std::sync::Mutex` and waiters block on a `Condvar`. The count is only
//! read or written with the lock held and never goes below zero.
//!
//! Waiters are not ordered. A release wakes one waiter, and every woken
//! waiter re-checks the count before taking a permit, so spurious or
//! stolen wakeups simply put it back to sleep.
//!

use std::sync::{Condvar, Mutex};

use hostrt_core::{report, report_status, HostResult, MisuseKind};

use crate::raw::{alloc_object, free_object};

pub struct Semaphore {
    count: Mutex<i64>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `initial` permits. Negative counts are rejected.
    pub fn new(initial: i64) -> HostResult<Self> {
        if initial < 0 {
            return Err(MisuseKind::NegativeCount(initial).into());
        }
        Ok(Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        })
    }

    /// Take one permit, blocking while none are available.
    pub fn acquire(&self) -> HostResult<()> {
        let mut count = self.count.lock()?;
        while *count <= 0 {
            count = self.available.wait(count)?;
        }
        *count -= 1;
        Ok(())
    }

    pub fn try_acquire(&self) -> HostResult<bool> {
        let mut count = self.count.lock()?;
        if *count <= 0 {
            return Ok(false);
        }
        *count -= 1;
        Ok(true)
    }

    /// Return one permit and wake a waiter.
    pub fn release(&self) -> HostResult<()> {
        let mut count = self.count.lock()?;
        *count += 1;
        if *count > 0 {
            self.available.notify_one();
        }
        Ok(())
    }

    /// Snapshot of the permit count; stale as soon as the lock is dropped.
    pub fn available_permits(&self) -> HostResult<i64> {
        Ok(*self.count.lock()?)
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_sem_alloc(count: i32) -> *mut Semaphore {
    let sem = Semaphore::new(count as i64).and_then(|sem| alloc_object(sem, "semaphore"));
    report("sem_alloc", sem).unwrap_or(std::ptr::null_mut())
}

/// # Safety
/// `sem` must be null or a pointer from `hostrt_sem_alloc` with no thread
/// blocked inside it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_sem_free(sem: *mut Semaphore) {
    unsafe { free_object(sem) }
}

/// # Safety
/// `sem` must be null or a live pointer from `hostrt_sem_alloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_sem_up(sem: *mut Semaphore) -> i32 {
    let result = match unsafe { sem.as_ref() } {
        Some(sem) => sem.release(),
        None => Err(MisuseKind::NullHandle("sem_up").into()),
    };
    report_status("sem_up", result)
}

/// # Safety
/// `sem` must be null or a live pointer from `hostrt_sem_alloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_sem_down(sem: *mut Semaphore) -> i32 {
    let result = match unsafe { sem.as_ref() } {
        Some(sem) => sem.acquire(),
        None => Err(MisuseKind::NullHandle("sem_down").into()),
    };
    report_status("sem_down", result)
}
