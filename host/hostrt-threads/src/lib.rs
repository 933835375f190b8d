//!
//! hostrt-threads - Host Threading Primitives
//!
//! Provides the synchronization and thread-lifecycle primitives a portable
//! runtime needs from whatever threading substrate the host process offers.
//!
//! ## Mutex and Semaphore
//!
//! - `HostMutex::new(recursive)` - exclusive lock, optionally recursive
//! - `Semaphore::new(count)` - counting semaphore, no FIFO guarantee
//!
//! Both are built from a native lock plus a condition wait, so recursion,
//! ownership checks and permit counting behave the same on every substrate.
//!
//! ## Thread-Local Storage
//!
//! - `TlsRegistry::allocate(destructor)` - register a slot
//! - `set` / `get` - per-thread value for a slot
//! - destructors fire once per thread that still holds a non-null value
//!
//! ## Threads
//!
//! - `ThreadManager::spawn` / `join` / `detach`
//! - `exit()` unwinds back to the spawn trampoline
//! - `current()`, `equal()`, `tid()` for identity
//!
//! ## C ABI
//!
//! Every primitive also exports `hostrt_*` functions taking raw pointers.
//! Those run against the process-wide `default_host()` and report failures
//! through `hostrt_core::report` as negative errno values.
//!

pub mod host;
pub mod mutex;
pub mod raw;
pub mod semaphore;
pub mod thread;
pub mod tls;

pub use host::*;
pub use mutex::*;
pub use semaphore::*;
pub use thread::*;
pub use tls::*;
