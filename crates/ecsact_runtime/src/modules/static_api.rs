//! Static module: ids and names compiled into a runtime build.

use super::native_str;
use crate::error::RuntimeError;
use crate::ffi::*;
use crate::loader::AbiModule;
use std::ptr;

native_fns! {
    pub struct Static: AbiModule::Static {
        components: "ecsact_static_components" => StaticListFn,
        systems: "ecsact_static_systems" => StaticListFn,
        actions: "ecsact_static_actions" => StaticListFn,
        on_reload: "ecsact_static_on_reload" => StaticReloadFn,
        off_reload: "ecsact_static_off_reload" => StaticReloadFn,
    }
}

/// One entry of a static id list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticInfo {
    pub id: i32,
    pub name: String,
}

fn read_list(f: StaticListFn) -> Vec<StaticInfo> {
    let mut list: *const RawStaticInfo = ptr::null();
    let mut count = 0i32;
    unsafe { f(&mut list, &mut count) };
    if list.is_null() || count <= 0 {
        return Vec::new();
    }
    // SAFETY: the runtime owns `count` static entries at `list`.
    let entries = unsafe { std::slice::from_raw_parts(list, count as usize) };
    entries
        .iter()
        .map(|entry| StaticInfo {
            id: entry.id,
            name: native_str(entry.name).unwrap_or_default(),
        })
        .collect()
}

impl Static {
    pub fn components(&self) -> Result<Vec<StaticInfo>, RuntimeError> {
        Ok(read_list(self.components.get()?))
    }

    pub fn systems(&self) -> Result<Vec<StaticInfo>, RuntimeError> {
        Ok(read_list(self.systems.get()?))
    }

    pub fn actions(&self) -> Result<Vec<StaticInfo>, RuntimeError> {
        Ok(read_list(self.actions.get()?))
    }

    /// Register a callback for hot reloads of the runtime's static data.
    ///
    /// The native side passes no user data, so the callback is a plain
    /// `extern "C"` function.
    pub fn on_reload(&self, callback: StaticReloadCallback) -> Result<(), RuntimeError> {
        let f = self.on_reload.get()?;
        unsafe { f(callback) };
        Ok(())
    }

    pub fn off_reload(&self, callback: StaticReloadCallback) -> Result<(), RuntimeError> {
        let f = self.off_reload.get()?;
        unsafe { f(callback) };
        Ok(())
    }
}
