///
/// hostrt Runtime Static Library
///
/// Re-exports the C call surface of the threading primitives and publishes
/// it as a `HostOps` table of function pointers. An embedding runtime either
/// links the `hostrt_*` symbols directly or reads the table once through
/// `hostrt_host_ops()` and dispatches through it.
///
/// Contains:
/// - Semaphore ops (sem_alloc, sem_free, sem_up, sem_down)
/// - Mutex ops (mutex_alloc, mutex_lock, mutex_unlock, mutex_free)
/// - Thread ops (thread_create, thread_detach, thread_exit, thread_join,
///   thread_self, thread_equal, gettid)
/// - TLS ops (tls_alloc, tls_free, tls_set, tls_get)
///

mod ops;

pub use hostrt_core::*;
pub use hostrt_threads::*;

pub use ops::*;
