//! Typed facades, one per Ecsact ABI module.
//!
//! Facades that only forward calls (`Meta`, `Static`, `Wasm`) are the
//! resolved function tables themselves. Facades that also need runtime state
//! (`Core`, `Dynamic`, `Serialize`, `Async`) are short-lived views borrowed
//! from [`EcsactRuntime`](crate::EcsactRuntime).

pub mod async_api;
pub mod core_api;
pub mod dynamic_api;
pub mod meta_api;
pub mod serialize_api;
pub mod static_api;
pub mod wasm_api;

pub use async_api::Async;
pub use core_api::Core;
pub use dynamic_api::Dynamic;
pub use meta_api::Meta;
pub use serialize_api::Serialize;
pub use static_api::{Static, StaticInfo};
pub use wasm_api::Wasm;

use crate::options::{ExecutionOptions, NativeAllocator};
use std::ffi::{c_char, CStr};

/// Frees a set of execution options on every exit path.
pub(crate) struct FreeOnDrop<'o, A: NativeAllocator>(pub(crate) &'o mut [ExecutionOptions<A>]);

impl<A: NativeAllocator> Drop for FreeOnDrop<'_, A> {
    fn drop(&mut self) {
        for options in self.0.iter_mut() {
            options.free();
        }
    }
}

/// Copy a native, nul-terminated name. `None` for a null pointer.
pub(crate) fn native_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null names from the runtime are nul-terminated and static.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Read an id list through the usual `(max, out, out_count)` pattern.
pub(crate) fn read_ids(count: i32, fill: impl FnOnce(i32, *mut i32, *mut i32)) -> Vec<i32> {
    if count <= 0 {
        return Vec::new();
    }
    let mut ids = vec![0i32; count as usize];
    let mut written = 0i32;
    fill(count, ids.as_mut_ptr(), &mut written);
    ids.truncate(written.clamp(0, count) as usize);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_are_truncated_to_what_native_wrote() {
        let ids = read_ids(4, |max, out, out_count| unsafe {
            assert_eq!(max, 4);
            *out = 7;
            *out.add(1) = 9;
            *out_count = 2;
        });
        assert_eq!(ids, [7, 9]);
        assert!(read_ids(0, |_, _, _| panic!("not called")).is_empty());
    }

    #[test]
    fn null_names_are_none() {
        assert_eq!(native_str(std::ptr::null()), None);
        assert_eq!(native_str(c"example.Health".as_ptr()).as_deref(), Some("example.Health"));
    }
}
