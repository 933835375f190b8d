//!
//! Thread Lifecycle
//!
//! Threads are spawned on OS threads through `std::thread::Builder` and
//! identified by a `ThreadHandle`, a process-wide sequential id. The id is
//! assigned when the thread is spawned, or lazily the first time a thread
//! that was not spawned here asks for `current()`.
//!
//! The right to join lives in the `ThreadManager` that spawned the thread.
//! `join` and `detach` both consume it, so a second join, a join after
//! detach, or a join of a handle from another manager is reported as misuse
//! instead of being undefined.
//!
//! `exit()` unwinds with a private marker payload. The spawn trampoline
//! catches it and returns normally, so thread-local destructors (including
//! TLS slot destructors) run exactly as they would on a plain return.
//!

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use hostrt_core::{report, report_status, HostError, HostResult, MisuseKind, ThreadConfig};

use crate::host::default_host;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Opaque identity of a host thread. Never zero.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadHandle(u64);

impl ThreadHandle {
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

fn next_thread_id() -> u64 {
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle of the calling thread.
pub fn current() -> ThreadHandle {
    CURRENT_ID.with(|id| {
        if id.get() == 0 {
            id.set(next_thread_id());
        }
        ThreadHandle(id.get())
    })
}

pub fn equal(a: ThreadHandle, b: ThreadHandle) -> bool {
    a == b
}

/// Numeric identity of the calling thread, for logs.
pub fn tid() -> i64 {
    current().0 as i64
}

pub fn current_thread_name() -> Option<String> {
    thread::current().name().map(str::to_string)
}

/// Unwind payload used by `exit()`.
struct ThreadExit;

/// Terminate the calling thread.
///
/// Only threads spawned by a `ThreadManager` return cleanly from this; on any
/// other thread the unwind propagates like a panic.
pub fn exit() -> ! {
    tracing::trace!(thread = tid(), "thread exit");
    panic::resume_unwind(Box::new(ThreadExit))
}

fn run_entry<F: FnOnce()>(handle: ThreadHandle, entry: F) {
    CURRENT_ID.with(|id| id.set(handle.0));
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
        if payload.is::<ThreadExit>() {
            return;
        }
        panic::resume_unwind(payload);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "thread panicked".to_string()
    }
}

/// Owns the join right of every thread it spawned.
pub struct ThreadManager {
    config: ThreadConfig,
    joinable: Mutex<HashMap<ThreadHandle, JoinHandle<()>>>,
}

impl ThreadManager {
    pub fn new(config: ThreadConfig) -> Self {
        Self {
            config,
            joinable: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn `entry` on a new joinable thread named `<prefix>-<id>`.
    pub fn spawn<F>(&self, entry: F) -> HostResult<ThreadHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = ThreadHandle(next_thread_id());
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.name_prefix, handle.0));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        let mut joinable = self.joinable.lock()?;
        let join = builder
            .spawn(move || run_entry(handle, entry))
            .map_err(|e| HostError::substrate("thread_create", e))?;
        joinable.insert(handle, join);

        tracing::debug!(thread = handle.0, parent = tid(), "thread spawned");
        Ok(handle)
    }

    /// Block until `handle` terminates and release its resources.
    pub fn join(&self, handle: ThreadHandle) -> HostResult<()> {
        if handle == current() {
            return Err(MisuseKind::JoinSelf(handle.0).into());
        }
        let join = self
            .joinable
            .lock()?
            .remove(&handle)
            .ok_or(MisuseKind::NotJoinable(handle.0))?;

        let result = join
            .join()
            .map_err(|payload| HostError::substrate("thread_join", panic_message(payload.as_ref())));
        tracing::debug!(thread = handle.0, ok = result.is_ok(), "thread joined");
        result
    }

    /// Give up the join right; the thread cleans up after itself on exit.
    pub fn detach(&self, handle: ThreadHandle) -> HostResult<()> {
        let join = self
            .joinable
            .lock()?
            .remove(&handle)
            .ok_or(MisuseKind::NotJoinable(handle.0))?;
        drop(join);
        tracing::debug!(thread = handle.0, "thread detached");
        Ok(())
    }

    pub fn is_joinable(&self, handle: ThreadHandle) -> HostResult<bool> {
        Ok(self.joinable.lock()?.contains_key(&handle))
    }

    pub fn joinable_count(&self) -> HostResult<usize> {
        Ok(self.joinable.lock()?.len())
    }
}

/// Thread entry point for the C ABI. Uses the unwinding ABI so that
/// `hostrt_thread_exit` can unwind through it.
pub type ThreadEntry = extern "C-unwind" fn(*mut c_void);

struct StartArg(*mut c_void);

unsafe impl Send for StartArg {}

impl StartArg {
    fn into_raw(self) -> *mut c_void {
        self.0
    }
}

/// Spawn `entry(arg)`; returns the thread handle or 0 on failure.
#[unsafe(no_mangle)]
pub extern "C" fn hostrt_thread_create(entry: Option<ThreadEntry>, arg: *mut c_void) -> u64 {
    let Some(entry) = entry else {
        report_status("thread_create", Err(MisuseKind::NullHandle("thread_create").into()));
        return 0;
    };
    let arg = StartArg(arg);
    let spawned = default_host().threads.spawn(move || entry(arg.into_raw()));
    report("thread_create", spawned).map_or(0, ThreadHandle::into_raw)
}

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_thread_join(handle: u64) -> i32 {
    let result = ThreadHandle::from_raw(handle)
        .ok_or_else(|| HostError::from(MisuseKind::NullHandle("thread_join")))
        .and_then(|handle| default_host().threads.join(handle));
    report_status("thread_join", result)
}

/// Detach the calling thread.
#[unsafe(no_mangle)]
pub extern "C" fn hostrt_thread_detach() -> i32 {
    report_status("thread_detach", default_host().threads.detach(current()))
}

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_thread_detach_handle(handle: u64) -> i32 {
    let result = ThreadHandle::from_raw(handle)
        .ok_or_else(|| HostError::from(MisuseKind::NullHandle("thread_detach")))
        .and_then(|handle| default_host().threads.detach(handle));
    report_status("thread_detach", result)
}

#[unsafe(no_mangle)]
pub extern "C-unwind" fn hostrt_thread_exit() -> ! {
    exit()
}

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_thread_self() -> u64 {
    current().into_raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_thread_equal(a: u64, b: u64) -> i32 {
    if a == b { 1 } else { 0 }
}

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_gettid() -> i64 {
    tid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn manager() -> ThreadManager {
        ThreadManager::new(ThreadConfig::default())
    }

    #[test]
    fn test_current_is_stable() {
        assert!(equal(current(), current()));
        assert_eq!(tid(), current().id() as i64);
        assert_ne!(current().into_raw(), 0);
    }

    #[test]
    fn test_spawn_and_join() {
        let threads = manager();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let handle = threads.spawn(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }).unwrap();
        assert!(threads.is_joinable(handle).unwrap());

        threads.join(handle).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(threads.joinable_count().unwrap(), 0);
    }

    #[test]
    fn test_spawned_thread_sees_its_handle() {
        let threads = manager();
        let seen = Arc::new(AtomicU64::new(0));
        let s = Arc::clone(&seen);

        let handle = threads.spawn(move || {
            s.store(current().into_raw(), Ordering::SeqCst);
        }).unwrap();
        threads.join(handle).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), handle.into_raw());
        assert!(!equal(handle, current()));
    }

    #[test]
    fn test_thread_name_uses_prefix() {
        let threads = ThreadManager::new(ThreadConfig {
            name_prefix: "lkl".to_string(),
            stack_size: Some(256 * 1024),
        });
        let name = Arc::new(Mutex::new(None));
        let n = Arc::clone(&name);

        let handle = threads.spawn(move || {
            *n.lock().unwrap() = current_thread_name();
        }).unwrap();
        threads.join(handle).unwrap();

        assert_eq!(*name.lock().unwrap(), Some(format!("lkl-{}", handle.id())));
    }

    #[test]
    fn test_exit_stops_thread() {
        let threads = manager();
        let reached = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&reached);

        let handle = threads.spawn(move || {
            r.fetch_add(1, Ordering::SeqCst);
            exit();
        }).unwrap();

        threads.join(handle).unwrap();
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_double_join_is_misuse() {
        let threads = manager();
        let handle = threads.spawn(|| {}).unwrap();
        threads.join(handle).unwrap();

        let err = threads.join(handle).unwrap_err();
        assert!(matches!(err, HostError::Misuse(MisuseKind::NotJoinable(id)) if id == handle.id()));
    }

    #[test]
    fn test_join_after_detach_is_misuse() {
        let threads = manager();
        let handle = threads.spawn(|| {}).unwrap();
        threads.detach(handle).unwrap();

        assert!(!threads.is_joinable(handle).unwrap());
        assert!(threads.join(handle).unwrap_err().is_misuse());
        assert!(threads.detach(handle).unwrap_err().is_misuse());
    }

    #[test]
    fn test_join_self_is_misuse() {
        let threads = manager();
        let err = threads.join(current()).unwrap_err();
        assert!(matches!(err, HostError::Misuse(MisuseKind::JoinSelf(_))));
    }

    #[test]
    fn test_join_reports_panic() {
        let threads = manager();
        let handle = threads.spawn(|| panic!("entry failed")).unwrap();

        let err = threads.join(handle).unwrap_err();
        assert!(matches!(err, HostError::Substrate { op: "thread_join", .. }));
        assert!(err.to_string().contains("entry failed"));
        assert!(!threads.is_joinable(handle).unwrap());
    }

    #[test]
    fn test_c_abi_equal_and_null_handle() {
        let me = hostrt_thread_self();
        assert_eq!(hostrt_thread_equal(me, me), 1);
        assert_eq!(hostrt_thread_equal(me, me + 1), 0);
        assert_eq!(hostrt_gettid(), me as i64);
        assert_eq!(hostrt_thread_join(0), -libc::EINVAL);
        assert_eq!(hostrt_thread_create(None, std::ptr::null_mut()), 0);
    }
}
