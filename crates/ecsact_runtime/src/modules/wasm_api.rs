//! Wasm module: system implementations provided as WebAssembly exports.

use crate::error::{RuntimeError, WasmError};
use crate::ffi::*;
use crate::loader::AbiModule;
use crate::types::{native_len, SystemId};
use std::ffi::{c_char, CString};
use std::path::Path;
use std::ptr;

native_fns! {
    pub struct Wasm: AbiModule::Wasm {
        load_file: "ecsactsi_wasm_load_file" => WasmLoadFileFn,
        set_trap_handler: "ecsactsi_wasm_set_trap_handler" => WasmSetTrapHandlerFn,
        last_error_message: "ecsactsi_wasm_last_error_message" => WasmLastErrorFn,
        reset: "ecsactsi_wasm_reset" => WasmResetFn,
    }
}

impl Wasm {
    /// Load `path` and bind each `(system id, export name)` pair.
    pub fn load(&self, path: &Path, systems: &[(SystemId, &str)]) -> Result<(), RuntimeError> {
        let f = self.load_file.get()?;
        let path = CString::new(path.to_string_lossy().as_bytes())?;
        let exports = systems
            .iter()
            .map(|(_, name)| CString::new(*name))
            .collect::<Result<Vec<_>, _>>()?;
        let count = native_len("wasm systems", systems.len())?;
        let mut ids: Vec<SystemId> = systems.iter().map(|(id, _)| *id).collect();
        let mut names: Vec<*const c_char> = exports.iter().map(|name| name.as_ptr()).collect();

        let code = unsafe {
            f(
                path.as_ptr(),
                count,
                ids.as_mut_ptr(),
                names.as_mut_ptr(),
            )
        };
        if let Err(err) = WasmError::from_code(code) {
            tracing::warn!(path = ?path, error = %err, "wasm load failed");
            return Err(err.into());
        }
        Ok(())
    }

    pub fn set_trap_handler(&self, handler: Option<WasmTrapHandler>) -> Result<(), RuntimeError> {
        let f = self.set_trap_handler.get()?;
        unsafe { f(handler) };
        Ok(())
    }

    /// Message describing the most recent load failure; empty if none.
    pub fn last_error_message(&self) -> Result<String, RuntimeError> {
        let f = self.last_error_message.get()?;
        let len = unsafe { f(ptr::null_mut(), 0) };
        if len <= 0 {
            return Ok(String::new());
        }
        let mut buf = vec![0u8; len as usize + 1];
        let capacity = native_len("error message bytes", buf.len())?;
        let written = unsafe { f(buf.as_mut_ptr().cast(), capacity) };
        buf.truncate(written.clamp(0, len) as usize);
        if let Some(nul) = buf.iter().position(|&b| b == 0) {
            buf.truncate(nul);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Drop every loaded wasm module.
    pub fn reset(&self) -> Result<(), RuntimeError> {
        let f = self.reset.get()?;
        unsafe { f() };
        Ok(())
    }
}
