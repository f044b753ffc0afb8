//! C ABI mirror of the Ecsact runtime headers.
//!
//! Layouts here are the wire format between this crate and a native runtime
//! build; field order and widths must not change.

use crate::types::{ActionId, ComponentId, EntityId, RegistryId, SystemId};
use std::ffi::{c_char, c_void};
use std::ptr;

/// Opaque `ecsact_system_execution_context`.
#[repr(C)]
pub struct RawContext {
    _private: [u8; 0],
}

/// `ecsact_component`
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawComponent {
    pub component_id: ComponentId,
    pub component_data: *const c_void,
}

/// `ecsact_action`
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawAction {
    pub action_id: ActionId,
    pub action_data: *const c_void,
}

/// `ecsact_execution_options`
///
/// Parallel arrays: `*_entities[i]` pairs with `*_components[i]`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawExecutionOptions {
    pub add_components_length: i32,
    pub add_components_entities: *mut EntityId,
    pub add_components: *mut RawComponent,

    pub update_components_length: i32,
    pub update_components_entities: *mut EntityId,
    pub update_components: *mut RawComponent,

    pub remove_components_length: i32,
    pub remove_components_entities: *mut EntityId,
    pub remove_components: *mut ComponentId,

    pub actions_length: i32,
    pub actions: *mut RawAction,

    pub create_entities_length: i32,
    pub create_entities: *mut i32,
    pub create_entities_components_length: *mut i32,
    pub create_entities_components: *mut *mut RawComponent,

    pub destroy_entities_length: i32,
    pub destroy_entities: *mut EntityId,
}

impl Default for RawExecutionOptions {
    fn default() -> Self {
        Self {
            add_components_length: 0,
            add_components_entities: ptr::null_mut(),
            add_components: ptr::null_mut(),
            update_components_length: 0,
            update_components_entities: ptr::null_mut(),
            update_components: ptr::null_mut(),
            remove_components_length: 0,
            remove_components_entities: ptr::null_mut(),
            remove_components: ptr::null_mut(),
            actions_length: 0,
            actions: ptr::null_mut(),
            create_entities_length: 0,
            create_entities: ptr::null_mut(),
            create_entities_components_length: ptr::null_mut(),
            create_entities_components: ptr::null_mut(),
            destroy_entities_length: 0,
            destroy_entities: ptr::null_mut(),
        }
    }
}

/// `ecsact_component_event_callback`
pub type ComponentEventCallback = unsafe extern "C" fn(
    event: i32,
    entity_id: EntityId,
    component_id: ComponentId,
    component_data: *const c_void,
    callback_user_data: *mut c_void,
);

/// `ecsact_execution_events_collector`
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawEventsCollector {
    pub init_callback: Option<ComponentEventCallback>,
    pub init_callback_user_data: *mut c_void,
    pub update_callback: Option<ComponentEventCallback>,
    pub update_callback_user_data: *mut c_void,
    pub remove_callback: Option<ComponentEventCallback>,
    pub remove_callback_user_data: *mut c_void,
}

/// Entry of the `ecsact_static_*` lists.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawStaticInfo {
    pub id: i32,
    pub name: *const c_char,
}

/// `ecsact_system_execution_impl`
pub type SystemExecutionImpl = unsafe extern "C" fn(context: *mut RawContext);

/// `ecsact_static_reload_callback`
pub type StaticReloadCallback = unsafe extern "C" fn();

/// `ecsactsi_wasm_trap_handler`
pub type WasmTrapHandler = unsafe extern "C" fn(system_id: SystemId, trap_message: *const c_char);

// core
pub type CreateRegistryFn = unsafe extern "C" fn(name: *const c_char) -> RegistryId;
pub type RegistryFn = unsafe extern "C" fn(registry: RegistryId);
pub type CreateEntityFn = unsafe extern "C" fn(registry: RegistryId) -> EntityId;
pub type EntityFn = unsafe extern "C" fn(registry: RegistryId, entity: EntityId);
pub type EntityExistsFn = unsafe extern "C" fn(registry: RegistryId, entity: EntityId) -> bool;
pub type CountEntitiesFn = unsafe extern "C" fn(registry: RegistryId) -> i32;
pub type GetEntitiesFn = unsafe extern "C" fn(
    registry: RegistryId,
    max_entities_count: i32,
    out_entities: *mut EntityId,
    out_entities_count: *mut i32,
);
pub type WriteComponentFn = unsafe extern "C" fn(
    registry: RegistryId,
    entity: EntityId,
    component_id: ComponentId,
    component_data: *const c_void,
) -> i32;
pub type HasComponentFn =
    unsafe extern "C" fn(registry: RegistryId, entity: EntityId, component_id: ComponentId) -> bool;
pub type GetComponentFn = unsafe extern "C" fn(
    registry: RegistryId,
    entity: EntityId,
    component_id: ComponentId,
) -> *const c_void;
pub type CountComponentsFn = unsafe extern "C" fn(registry: RegistryId, entity: EntityId) -> i32;
pub type RemoveComponentFn =
    unsafe extern "C" fn(registry: RegistryId, entity: EntityId, component_id: ComponentId);
pub type ExecuteSystemsFn = unsafe extern "C" fn(
    registry: RegistryId,
    execution_count: i32,
    execution_options: *const RawExecutionOptions,
    events_collector: *const RawEventsCollector,
) -> i32;

// dynamic
pub type SetSystemExecutionImplFn =
    unsafe extern "C" fn(system_id: SystemId, implementation: Option<SystemExecutionImpl>) -> bool;
pub type ContextReadFn =
    unsafe extern "C" fn(context: *mut RawContext, id: i32, out_data: *mut c_void);
pub type ContextWriteFn =
    unsafe extern "C" fn(context: *mut RawContext, component_id: ComponentId, data: *const c_void);
pub type ContextRemoveFn = unsafe extern "C" fn(context: *mut RawContext, component_id: ComponentId);
pub type ContextHasFn =
    unsafe extern "C" fn(context: *mut RawContext, component_id: ComponentId) -> bool;
pub type ContextActionFn = unsafe extern "C" fn(context: *mut RawContext, out_action: *mut c_void);
pub type ContextGenerateFn = unsafe extern "C" fn(
    context: *mut RawContext,
    component_count: i32,
    component_ids: *mut ComponentId,
    components_data: *mut *const c_void,
);
pub type ContextParentFn = unsafe extern "C" fn(context: *mut RawContext) -> *const RawContext;
pub type ContextSameFn = unsafe extern "C" fn(a: *const RawContext, b: *const RawContext) -> bool;
pub type ContextEntityFn = unsafe extern "C" fn(context: *const RawContext) -> EntityId;
pub type ContextIdFn = unsafe extern "C" fn(context: *mut RawContext) -> SystemId;

// meta
pub type CountFn = unsafe extern "C" fn() -> i32;
pub type CountInFn = unsafe extern "C" fn(owner: i32) -> i32;
pub type GetIdsFn = unsafe extern "C" fn(max_count: i32, out_ids: *mut i32, out_count: *mut i32);
pub type GetIdsInFn =
    unsafe extern "C" fn(owner: i32, max_count: i32, out_ids: *mut i32, out_count: *mut i32);
pub type NameFn = unsafe extern "C" fn(id: i32) -> *const c_char;

// serialize
pub type SerializeSizeFn = unsafe extern "C" fn(id: i32) -> i32;
pub type SerializeFn = unsafe extern "C" fn(id: i32, input: *const c_void, out: *mut u8) -> i32;
pub type DeserializeFn = unsafe extern "C" fn(id: i32, input: *const u8, out: *mut c_void) -> i32;

// static
pub type StaticListFn = unsafe extern "C" fn(out_list: *mut *const RawStaticInfo, out_count: *mut i32);
pub type StaticReloadFn = unsafe extern "C" fn(callback: StaticReloadCallback);

// async
pub type AsyncConnectFn = unsafe extern "C" fn(connection_string: *const c_char) -> i32;
pub type AsyncDisconnectFn = unsafe extern "C" fn();
pub type AsyncFlushEventsFn = unsafe extern "C" fn(
    execution_events: *const RawEventsCollector,
    async_events: *const c_void,
);
pub type AsyncEnqueueFn = unsafe extern "C" fn(options: RawExecutionOptions) -> i32;

// wasm
pub type WasmLoadFileFn = unsafe extern "C" fn(
    wasm_file_path: *const c_char,
    systems_count: i32,
    system_ids: *mut SystemId,
    wasm_exports: *mut *const c_char,
) -> i32;
pub type WasmSetTrapHandlerFn = unsafe extern "C" fn(handler: Option<WasmTrapHandler>);
pub type WasmLastErrorFn = unsafe extern "C" fn(out_message: *mut c_char, message_max_length: i32) -> i32;
pub type WasmResetFn = unsafe extern "C" fn();
