///
/// Raw allocation for objects handed across the C boundary.
///
/// The C surface promises a null result when memory is unavailable, so
/// objects are placed with `std::alloc::alloc` rather than `Box::new`, which
/// aborts the process on allocation failure.
///

use std::alloc::{alloc, dealloc, Layout};

use hostrt_core::{HostError, HostResult};

/// Move `value` into freshly allocated memory.
pub fn alloc_object<T>(value: T, what: &'static str) -> HostResult<*mut T> {
    let layout = Layout::new::<T>();
    debug_assert!(layout.size() != 0, "zero-sized objects are not allocated");
    unsafe {
        let ptr = alloc(layout) as *mut T;
        if ptr.is_null() {
            return Err(HostError::Allocation { what });
        }
        std::ptr::write(ptr, value);
        Ok(ptr)
    }
}

/// Drop and release an object created by `alloc_object`.
///
/// # Safety
/// `ptr` must come from `alloc_object::<T>` and must not be used afterwards.
pub unsafe fn free_object<T>(ptr: *mut T) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        std::ptr::drop_in_place(ptr);
        dealloc(ptr as *mut u8, Layout::new::<T>());
    }
}
