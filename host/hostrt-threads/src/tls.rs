//!
//! Thread-Local Storage Slots
//!
//! A `TlsRegistry` hands out slots (`TlsKey`). Each thread keeps its own
//! value per slot in a native `thread_local!` map, so threads never see each
//! other's values and `get` before `set` yields null.
//!
//! ## Destructors
//!
//! A slot may carry a destructor. When a thread ends (return or `exit()`)
//! its map is dropped, and for every slot that is still registered and
//! holds a non-null value the destructor runs once with that value. Slots
//! freed before the thread ended are skipped.
//!
//! ## Identity
//!
//! Slot ids come from one process-wide counter and are never reused, so a
//! stale value left behind by a freed slot cannot be read through a newer
//! slot.
//!

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use hostrt_core::{report, report_status, HostError, HostResult, MisuseKind, TlsConfig};

use crate::host::default_host;
use crate::raw::{alloc_object, free_object};

/// Called with the last value a terminating thread stored in the slot.
pub type TlsDestructor = unsafe extern "C" fn(*mut c_void);

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

struct SlotShared {
    id: u64,
    registry: u64,
    destructor: Option<TlsDestructor>,
    live: AtomicBool,
}

/// A registered slot. Clones refer to the same slot.
#[derive(Clone)]
pub struct TlsKey {
    shared: Arc<SlotShared>,
}

impl TlsKey {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn has_destructor(&self) -> bool {
        self.shared.destructor.is_some()
    }
}

#[derive(Default)]
struct LocalValues {
    values: HashMap<u64, (Arc<SlotShared>, *mut c_void)>,
}

impl LocalValues {
    /// Forget values of slots that have been freed.
    fn prune(&mut self) {
        self.values.retain(|_, (slot, _)| slot.live.load(Ordering::Acquire));
    }
}

impl Drop for LocalValues {
    fn drop(&mut self) {
        for (_, (slot, value)) in self.values.drain() {
            if value.is_null() || !slot.live.load(Ordering::Acquire) {
                continue;
            }
            if let Some(destructor) = slot.destructor {
                tracing::trace!(slot = slot.id, "running TLS destructor");
                unsafe { destructor(value) };
            }
        }
    }
}

thread_local! {
    static LOCAL_VALUES: RefCell<LocalValues> = RefCell::new(LocalValues::default());
}

pub struct TlsRegistry {
    id: u64,
    max_keys: usize,
    slots: Mutex<HashMap<u64, Arc<SlotShared>>>,
}

impl TlsRegistry {
    pub fn new(config: &TlsConfig) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            max_keys: config.max_keys,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a slot with an optional per-thread destructor.
    pub fn allocate(&self, destructor: Option<TlsDestructor>) -> HostResult<TlsKey> {
        let mut slots = self.slots.lock()?;
        if slots.len() >= self.max_keys {
            return Err(HostError::Allocation { what: "TLS slot" });
        }
        let shared = Arc::new(SlotShared {
            id: NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed),
            registry: self.id,
            destructor,
            live: AtomicBool::new(true),
        });
        slots.insert(shared.id, Arc::clone(&shared));

        tracing::debug!(slot = shared.id, destructor = destructor.is_some(), "TLS slot allocated");
        Ok(TlsKey { shared })
    }

    /// Deregister a slot. Values still stored by live threads are forgotten
    /// without running the destructor.
    pub fn free(&self, key: &TlsKey) -> HostResult<()> {
        self.check_owner(key)?;
        let removed = self.slots.lock()?.remove(&key.id());
        if removed.is_none() {
            return Err(MisuseKind::SlotFreed(key.id()).into());
        }
        key.shared.live.store(false, Ordering::Release);
        // Other threads drop their stale values on their next set.
        let _ = LOCAL_VALUES.try_with(|local| local.borrow_mut().prune());
        tracing::debug!(slot = key.id(), "TLS slot freed");
        Ok(())
    }

    /// Store `value` for the calling thread.
    pub fn set(&self, key: &TlsKey, value: *mut c_void) -> HostResult<()> {
        self.check_live(key)?;
        LOCAL_VALUES
            .try_with(|local| {
                let mut local = local.borrow_mut();
                local.prune();
                if value.is_null() {
                    local.values.remove(&key.id());
                } else {
                    local.values.insert(key.id(), (Arc::clone(&key.shared), value));
                }
            })
            .map_err(|_| HostError::substrate("tls_set", "thread-local storage is being torn down"))
    }

    /// The calling thread's value, or null if it never set one.
    pub fn get(&self, key: &TlsKey) -> HostResult<*mut c_void> {
        self.check_live(key)?;
        LOCAL_VALUES
            .try_with(|local| {
                local
                    .borrow()
                    .values
                    .get(&key.id())
                    .map_or(std::ptr::null_mut(), |(_, value)| *value)
            })
            .map_err(|_| HostError::substrate("tls_get", "thread-local storage is being torn down"))
    }

    pub fn len(&self) -> HostResult<usize> {
        Ok(self.slots.lock()?.len())
    }

    pub fn is_empty(&self) -> HostResult<bool> {
        Ok(self.len()? == 0)
    }

    fn check_owner(&self, key: &TlsKey) -> HostResult<()> {
        if key.shared.registry != self.id {
            return Err(MisuseKind::ForeignSlot(key.id()).into());
        }
        Ok(())
    }

    fn check_live(&self, key: &TlsKey) -> HostResult<()> {
        self.check_owner(key)?;
        if !key.shared.live.load(Ordering::Acquire) {
            return Err(MisuseKind::SlotFreed(key.id()).into());
        }
        Ok(())
    }
}

/// Register a slot on the default host; returns null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn hostrt_tls_alloc(destructor: Option<TlsDestructor>) -> *mut TlsKey {
    let registry = &default_host().tls;
    let key = registry.allocate(destructor).and_then(|key| {
        alloc_object(key.clone(), "TLS key").inspect_err(|_| {
            report("tls_alloc_rollback", registry.free(&key));
        })
    });
    report("tls_alloc", key).unwrap_or(std::ptr::null_mut())
}

/// # Safety
/// `key` must be null or a pointer from `hostrt_tls_alloc`; no thread may use
/// it afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_tls_free(key: *mut TlsKey) {
    let Some(k) = (unsafe { key.as_ref() }) else {
        return;
    };
    report("tls_free", default_host().tls.free(k));
    unsafe { free_object(key) }
}

/// # Safety
/// `key` must be null or a live pointer from `hostrt_tls_alloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_tls_set(key: *mut TlsKey, data: *mut c_void) -> i32 {
    let result = match unsafe { key.as_ref() } {
        Some(key) => default_host().tls.set(key, data),
        None => Err(MisuseKind::NullHandle("tls_set").into()),
    };
    report_status("tls_set", result)
}

/// # Safety
/// `key` must be null or a live pointer from `hostrt_tls_alloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_tls_get(key: *mut TlsKey) -> *mut c_void {
    let result = match unsafe { key.as_ref() } {
        Some(key) => default_host().tls.get(key),
        None => Err(MisuseKind::NullHandle("tls_get").into()),
    };
    report("tls_get", result).unwrap_or(std::ptr::null_mut())
}
