///
/// The `HostOps` operations table.
///
/// Field order groups the primitives the way an embedding runtime wires
/// them up; the table is `#[repr(C)]` so a C header can mirror it. Status
/// returning entries use `0` for success and a negative errno on failure.
///

use std::ffi::c_void;

use hostrt_threads::{
    hostrt_gettid, hostrt_mutex_alloc, hostrt_mutex_free, hostrt_mutex_lock,
    hostrt_mutex_unlock, hostrt_sem_alloc, hostrt_sem_down, hostrt_sem_free, hostrt_sem_up,
    hostrt_thread_create, hostrt_thread_detach, hostrt_thread_equal, hostrt_thread_exit,
    hostrt_thread_join, hostrt_thread_self, hostrt_tls_alloc, hostrt_tls_free, hostrt_tls_get,
    hostrt_tls_set, HostMutex, Semaphore, ThreadEntry, TlsDestructor, TlsKey,
};

#[repr(C)]
pub struct HostOps {
    pub sem_alloc: extern "C" fn(i32) -> *mut Semaphore,
    pub sem_free: unsafe extern "C" fn(*mut Semaphore),
    pub sem_up: unsafe extern "C" fn(*mut Semaphore) -> i32,
    pub sem_down: unsafe extern "C" fn(*mut Semaphore) -> i32,

    pub mutex_alloc: extern "C" fn(i32) -> *mut HostMutex,
    pub mutex_lock: unsafe extern "C" fn(*mut HostMutex) -> i32,
    pub mutex_unlock: unsafe extern "C" fn(*mut HostMutex) -> i32,
    pub mutex_free: unsafe extern "C" fn(*mut HostMutex),

    pub thread_create: extern "C" fn(Option<ThreadEntry>, *mut c_void) -> u64,
    pub thread_detach: extern "C" fn() -> i32,
    pub thread_exit: extern "C-unwind" fn() -> !,
    pub thread_join: extern "C" fn(u64) -> i32,
    pub thread_self: extern "C" fn() -> u64,
    pub thread_equal: extern "C" fn(u64, u64) -> i32,
    pub gettid: extern "C" fn() -> i64,

    pub tls_alloc: extern "C" fn(Option<TlsDestructor>) -> *mut TlsKey,
    pub tls_free: unsafe extern "C" fn(*mut TlsKey),
    pub tls_set: unsafe extern "C" fn(*mut TlsKey, *mut c_void) -> i32,
    pub tls_get: unsafe extern "C" fn(*mut TlsKey) -> *mut c_void,
}

pub static HOSTRT_OPS: HostOps = HostOps {
    sem_alloc: hostrt_sem_alloc,
    sem_free: hostrt_sem_free,
    sem_up: hostrt_sem_up,
    sem_down: hostrt_sem_down,

    mutex_alloc: hostrt_mutex_alloc,
    mutex_lock: hostrt_mutex_lock,
    mutex_unlock: hostrt_mutex_unlock,
    mutex_free: hostrt_mutex_free,

    thread_create: hostrt_thread_create,
    thread_detach: hostrt_thread_detach,
    thread_exit: hostrt_thread_exit,
    thread_join: hostrt_thread_join,
    thread_self: hostrt_thread_self,
    thread_equal: hostrt_thread_equal,
    gettid: hostrt_gettid,

    tls_alloc: hostrt_tls_alloc,
    tls_free: hostrt_tls_free,
    tls_set: hostrt_tls_set,
    tls_get: hostrt_tls_get,
};

#[unsafe(no_mangle)]
pub extern "C" fn hostrt_host_ops() -> *const HostOps {
    &HOSTRT_OPS
}
