//! Serialize module: runtime-defined wire encoding of actions and components.

use crate::error::RuntimeError;
use crate::ffi::*;
use crate::loader::AbiModule;
use crate::payload::{ActionData, AlignedBytes, ComponentData};
use crate::types::{ActionId, ComponentId, TypeMeta, TypeRegistry};
use std::ffi::c_void;

native_fns! {
    pub struct SerializeFns: AbiModule::Serialize {
        serialize_action_size: "ecsact_serialize_action_size" => SerializeSizeFn,
        serialize_action: "ecsact_serialize_action" => SerializeFn,
        deserialize_action: "ecsact_deserialize_action" => DeserializeFn,
        serialize_component_size: "ecsact_serialize_component_size" => SerializeSizeFn,
        serialize_component: "ecsact_serialize_component" => SerializeFn,
        deserialize_component: "ecsact_deserialize_component" => DeserializeFn,
    }
}

/// Serialize facade borrowed from a runtime.
pub struct Serialize<'r> {
    fns: &'r SerializeFns,
    types: &'r TypeRegistry,
}

fn written(what: &'static str, id: i32, code: i32, limit: usize) -> Result<usize, RuntimeError> {
    usize::try_from(code)
        .ok()
        .filter(|&n| n <= limit)
        .ok_or(RuntimeError::Serialization { what, id, code })
}

unsafe fn encode(
    what: &'static str,
    size_fn: SerializeSizeFn,
    encode_fn: SerializeFn,
    id: i32,
    data: *const c_void,
) -> Result<Vec<u8>, RuntimeError> {
    let size = size_fn(id);
    let capacity = written(what, id, size, usize::MAX)?;
    let mut out = vec![0u8; capacity];
    let code = encode_fn(id, data, out.as_mut_ptr());
    let len = written(what, id, code, capacity)?;
    out.truncate(len);
    Ok(out)
}

unsafe fn decode(
    what: &'static str,
    size_fn: SerializeSizeFn,
    decode_fn: DeserializeFn,
    meta: &TypeMeta,
    bytes: &[u8],
) -> Result<AlignedBytes, RuntimeError> {
    let expected = written(what, meta.id, size_fn(meta.id), usize::MAX)?;
    if bytes.len() < expected {
        return Err(RuntimeError::Serialization {
            what,
            id: meta.id,
            code: i32::try_from(bytes.len()).unwrap_or(i32::MAX),
        });
    }
    let mut out = AlignedBytes::zeroed(meta.size, meta.align)?;
    let code = decode_fn(meta.id, bytes.as_ptr(), out.as_mut_ptr().cast());
    written(what, meta.id, code, bytes.len())?;
    Ok(out)
}

impl<'r> Serialize<'r> {
    pub(crate) fn new(fns: &'r SerializeFns, types: &'r TypeRegistry) -> Self {
        Self { fns, types }
    }

    pub fn serialize_action_size(&self, action_id: ActionId) -> Result<usize, RuntimeError> {
        let f = self.fns.serialize_action_size.get()?;
        written("serialize_action_size", action_id, unsafe { f(action_id) }, usize::MAX)
    }

    pub fn serialize_action(&self, action: &ActionData) -> Result<Vec<u8>, RuntimeError> {
        let size = self.fns.serialize_action_size.get()?;
        let f = self.fns.serialize_action.get()?;
        self.types.check_action(action)?;
        unsafe { encode("serialize_action", size, f, action.action_id(), action.as_ptr()) }
    }

    pub fn deserialize_action(&self, action_id: ActionId, bytes: &[u8]) -> Result<ActionData, RuntimeError> {
        let size = self.fns.serialize_action_size.get()?;
        let f = self.fns.deserialize_action.get()?;
        let meta = self.types.action(action_id)?;
        let out = unsafe { decode("deserialize_action", size, f, meta, bytes) }?;
        Ok(ActionData::from_aligned(action_id, out))
    }

    pub fn serialize_component_size(&self, component_id: ComponentId) -> Result<usize, RuntimeError> {
        let f = self.fns.serialize_component_size.get()?;
        written("serialize_component_size", component_id, unsafe { f(component_id) }, usize::MAX)
    }

    pub fn serialize_component(&self, component: &ComponentData) -> Result<Vec<u8>, RuntimeError> {
        let size = self.fns.serialize_component_size.get()?;
        let f = self.fns.serialize_component.get()?;
        self.types.check_component(component)?;
        unsafe {
            encode(
                "serialize_component",
                size,
                f,
                component.component_id(),
                component.as_ptr(),
            )
        }
    }

    pub fn deserialize_component(
        &self,
        component_id: ComponentId,
        bytes: &[u8],
    ) -> Result<ComponentData, RuntimeError> {
        let size = self.fns.serialize_component_size.get()?;
        let f = self.fns.deserialize_component.get()?;
        let meta = self.types.component(component_id)?;
        let out = unsafe { decode("deserialize_component", size, f, meta, bytes) }?;
        Ok(ComponentData::from_aligned(component_id, out))
    }
}
