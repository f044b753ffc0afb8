//! System execution context handed to host system implementations.

use crate::binding::Dispatcher;
use crate::error::RuntimeError;
use crate::ffi::RawContext;
use crate::payload::{ActionData, AlignedBytes, ComponentData};
use crate::types::{native_len, Action, ActionId, Component, ComponentId, EntityId, SystemId};
use std::collections::HashSet;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

/// Borrowed view of an `ecsact_system_execution_context`.
///
/// Only valid while the native runtime is executing the system it was
/// created for; the lifetime ties it to that callback. Reads and writes are
/// checked by the native runtime against the system's declared capabilities.
pub struct SystemExecutionContext<'a> {
    raw: NonNull<RawContext>,
    dispatcher: &'a Dispatcher,
}

impl<'a> SystemExecutionContext<'a> {
    pub(crate) fn new(dispatcher: &'a Dispatcher, raw: NonNull<RawContext>) -> Self {
        Self { raw, dispatcher }
    }

    #[inline]
    fn raw(&self) -> *mut RawContext {
        self.raw.as_ptr()
    }

    /// Id of the system (or action) being executed.
    pub fn id(&self) -> Result<SystemId, RuntimeError> {
        let f = self.dispatcher.context.context_id.get()?;
        Ok(unsafe { f(self.raw()) })
    }

    /// Entity this execution is operating on.
    pub fn entity(&self) -> Result<EntityId, RuntimeError> {
        let f = self.dispatcher.context.context_entity.get()?;
        Ok(unsafe { f(self.raw()) })
    }

    /// Copy the current value of `C` for this entity.
    pub fn get<C: Component>(&self) -> Result<C, RuntimeError> {
        let f = self.dispatcher.context.context_get.get()?;
        let mut value = C::zeroed();
        unsafe { f(self.raw(), C::ID, (&mut value as *mut C).cast::<c_void>()) };
        Ok(value)
    }

    /// Type-erased [`get`](Self::get), sized by the type registry.
    pub fn get_data(&self, component_id: ComponentId) -> Result<ComponentData, RuntimeError> {
        let f = self.dispatcher.context.context_get.get()?;
        let meta = self.dispatcher.types.component(component_id)?;
        let mut bytes = AlignedBytes::zeroed(meta.size, meta.align)?;
        unsafe { f(self.raw(), component_id, bytes.as_mut_ptr().cast()) };
        Ok(ComponentData::from_aligned(component_id, bytes))
    }

    pub fn has<C: Component>(&self) -> Result<bool, RuntimeError> {
        self.has_id(C::ID)
    }

    pub fn has_id(&self, component_id: ComponentId) -> Result<bool, RuntimeError> {
        let f = self.dispatcher.context.context_has.get()?;
        Ok(unsafe { f(self.raw(), component_id) })
    }

    pub fn add<C: Component>(&self, component: &C) -> Result<(), RuntimeError> {
        self.add_data(&ComponentData::new(component))
    }

    pub fn add_data(&self, component: &ComponentData) -> Result<(), RuntimeError> {
        let f = self.dispatcher.context.context_add.get()?;
        unsafe { f(self.raw(), component.component_id(), component.as_ptr()) };
        Ok(())
    }

    pub fn update<C: Component>(&self, component: &C) -> Result<(), RuntimeError> {
        self.update_data(&ComponentData::new(component))
    }

    pub fn update_data(&self, component: &ComponentData) -> Result<(), RuntimeError> {
        let f = self.dispatcher.context.context_update.get()?;
        unsafe { f(self.raw(), component.component_id(), component.as_ptr()) };
        Ok(())
    }

    pub fn remove<C: Component>(&self) -> Result<(), RuntimeError> {
        self.remove_id(C::ID)
    }

    pub fn remove_id(&self, component_id: ComponentId) -> Result<(), RuntimeError> {
        let f = self.dispatcher.context.context_remove.get()?;
        unsafe { f(self.raw(), component_id) };
        Ok(())
    }

    /// Payload of the action that triggered this execution.
    pub fn action<A: Action>(&self) -> Result<A, RuntimeError> {
        let f = self.dispatcher.context.context_action.get()?;
        let mut value = A::zeroed();
        unsafe { f(self.raw(), (&mut value as *mut A).cast::<c_void>()) };
        Ok(value)
    }

    /// Type-erased [`action`](Self::action).
    pub fn action_data(&self, action_id: ActionId) -> Result<ActionData, RuntimeError> {
        let f = self.dispatcher.context.context_action.get()?;
        let meta = self.dispatcher.types.action(action_id)?;
        let mut bytes = AlignedBytes::zeroed(meta.size, meta.align)?;
        unsafe { f(self.raw(), bytes.as_mut_ptr().cast()) };
        Ok(ActionData::from_aligned(action_id, bytes))
    }

    /// Spawn a new entity seeded with `components` in one native call.
    pub fn generate(&self, components: &[ComponentData]) -> Result<(), RuntimeError> {
        if components.is_empty() {
            return Err(RuntimeError::EmptyGenerate);
        }
        let mut seen = HashSet::with_capacity(components.len());
        for component in components {
            if !seen.insert(component.component_id()) {
                return Err(RuntimeError::DuplicateGenerateComponent(
                    component.component_id(),
                ));
            }
        }
        let f = self.dispatcher.context.context_generate.get()?;
        let count = native_len("generated components", components.len())?;

        let mut ids: Vec<ComponentId> = components.iter().map(ComponentData::component_id).collect();
        let mut data: Vec<*const c_void> = components.iter().map(ComponentData::as_ptr).collect();
        unsafe {
            f(
                self.raw(),
                count,
                ids.as_mut_ptr(),
                data.as_mut_ptr(),
            )
        };
        Ok(())
    }

    /// Context of the enclosing system, or `None` at the top level.
    pub fn parent(&self) -> Result<Option<SystemExecutionContext<'a>>, RuntimeError> {
        let f = self.dispatcher.context.context_parent.get()?;
        let parent = unsafe { f(self.raw()) };
        Ok(NonNull::new(parent.cast_mut()).map(|raw| SystemExecutionContext {
            raw,
            dispatcher: self.dispatcher,
        }))
    }

    /// Whether both handles refer to the same native context.
    pub fn same(&self, other: &SystemExecutionContext<'_>) -> Result<bool, RuntimeError> {
        let f = self.dispatcher.context.context_same.get()?;
        Ok(unsafe { f(self.raw(), other.raw()) })
    }
}

impl fmt::Debug for SystemExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemExecutionContext")
            .field("raw", &self.raw)
            .finish()
    }
}
