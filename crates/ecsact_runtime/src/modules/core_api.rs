//! Core module: registries, entities, components and system execution.

use super::FreeOnDrop;
use crate::binding::{ExecutionGuard, RuntimeToken};
use crate::error::{check_status, RuntimeError};
use crate::events::{ComponentEventKind, EventBus, EventSink};
use crate::ffi::*;
use crate::loader::AbiModule;
use crate::options::{ExecutionOptions, NativeAllocator, SystemAllocator};
use crate::payload::{AlignedBytes, ComponentData};
use crate::types::{native_len, Component, ComponentId, EntityId, RegistryId, TypeRegistry};
use std::ffi::CString;
use std::ptr;

native_fns! {
    pub struct CoreFns: AbiModule::Core {
        create_registry: "ecsact_create_registry" => CreateRegistryFn,
        destroy_registry: "ecsact_destroy_registry" => RegistryFn,
        clear_registry: "ecsact_clear_registry" => RegistryFn,
        create_entity: "ecsact_create_entity" => CreateEntityFn,
        ensure_entity: "ecsact_ensure_entity" => EntityFn,
        entity_exists: "ecsact_entity_exists" => EntityExistsFn,
        destroy_entity: "ecsact_destroy_entity" => EntityFn,
        count_entities: "ecsact_count_entities" => CountEntitiesFn,
        get_entities: "ecsact_get_entities" => GetEntitiesFn,
        add_component: "ecsact_add_component" => WriteComponentFn,
        has_component: "ecsact_has_component" => HasComponentFn,
        get_component: "ecsact_get_component" => GetComponentFn,
        count_components: "ecsact_count_components" => CountComponentsFn,
        update_component: "ecsact_update_component" => WriteComponentFn,
        remove_component: "ecsact_remove_component" => RemoveComponentFn,
        execute_systems: "ecsact_execute_systems" => ExecuteSystemsFn,
    }
}

/// Core facade borrowed from a runtime.
///
/// Successful add/update/remove calls emit exactly one component event on the
/// runtime's [`EventBus`].
pub struct Core<'r> {
    fns: &'r CoreFns,
    events: &'r mut EventBus,
    types: &'r TypeRegistry,
    token: RuntimeToken,
}

impl<'r> Core<'r> {
    pub(crate) fn new(
        fns: &'r CoreFns,
        events: &'r mut EventBus,
        types: &'r TypeRegistry,
        token: RuntimeToken,
    ) -> Self {
        Self {
            fns,
            events,
            types,
            token,
        }
    }

    pub fn create_registry(&self, name: &str) -> Result<RegistryId, RuntimeError> {
        let f = self.fns.create_registry.get()?;
        let name = CString::new(name)?;
        let registry = unsafe { f(name.as_ptr()) };
        tracing::debug!(%registry, name = ?name, "created registry");
        Ok(registry)
    }

    pub fn destroy_registry(&self, registry: RegistryId) -> Result<(), RuntimeError> {
        let f = self.fns.destroy_registry.get()?;
        unsafe { f(registry) };
        Ok(())
    }

    pub fn clear_registry(&self, registry: RegistryId) -> Result<(), RuntimeError> {
        let f = self.fns.clear_registry.get()?;
        unsafe { f(registry) };
        Ok(())
    }

    pub fn create_entity(&self, registry: RegistryId) -> Result<EntityId, RuntimeError> {
        let f = self.fns.create_entity.get()?;
        Ok(unsafe { f(registry) })
    }

    /// Create `entity` with a caller-chosen id if it does not exist yet.
    pub fn ensure_entity(&self, registry: RegistryId, entity: EntityId) -> Result<(), RuntimeError> {
        let f = self.fns.ensure_entity.get()?;
        unsafe { f(registry, entity) };
        Ok(())
    }

    pub fn entity_exists(&self, registry: RegistryId, entity: EntityId) -> Result<bool, RuntimeError> {
        let f = self.fns.entity_exists.get()?;
        Ok(unsafe { f(registry, entity) })
    }

    /// Destroy `entity` and announce it to entity-destroyed subscribers.
    pub fn destroy_entity(&mut self, registry: RegistryId, entity: EntityId) -> Result<(), RuntimeError> {
        let f = self.fns.destroy_entity.get()?;
        unsafe { f(registry, entity) };
        self.events.emit_entity_destroyed(entity);
        Ok(())
    }

    pub fn count_entities(&self, registry: RegistryId) -> Result<usize, RuntimeError> {
        let f = self.fns.count_entities.get()?;
        Ok(unsafe { f(registry) }.max(0) as usize)
    }

    pub fn get_entities(&self, registry: RegistryId) -> Result<Vec<EntityId>, RuntimeError> {
        let count = self.fns.count_entities.get()?;
        let get = self.fns.get_entities.get()?;
        let max = unsafe { count(registry) };
        if max <= 0 {
            return Ok(Vec::new());
        }
        let mut entities = vec![EntityId::from_raw(-1); max as usize];
        let mut written = 0i32;
        unsafe { get(registry, max, entities.as_mut_ptr(), &mut written) };
        entities.truncate(written.clamp(0, max) as usize);
        Ok(entities)
    }

    pub fn add_component<C: Component>(
        &mut self,
        registry: RegistryId,
        entity: EntityId,
        component: &C,
    ) -> Result<(), RuntimeError> {
        self.add_component_data(registry, entity, &ComponentData::new(component))
    }

    pub fn add_component_data(
        &mut self,
        registry: RegistryId,
        entity: EntityId,
        component: &ComponentData,
    ) -> Result<(), RuntimeError> {
        let f = self.fns.add_component.get()?;
        self.types.check_component(component)?;
        let code = unsafe { f(registry, entity, component.component_id(), component.as_ptr()) };
        check_status("ecsact_add_component", code)?;
        self.events.emit(ComponentEventKind::Init, entity, component);
        Ok(())
    }

    pub fn has_component<C: Component>(
        &self,
        registry: RegistryId,
        entity: EntityId,
    ) -> Result<bool, RuntimeError> {
        self.has_component_id(registry, entity, C::ID)
    }

    pub fn has_component_id(
        &self,
        registry: RegistryId,
        entity: EntityId,
        component_id: ComponentId,
    ) -> Result<bool, RuntimeError> {
        let f = self.fns.has_component.get()?;
        Ok(unsafe { f(registry, entity, component_id) })
    }

    pub fn get_component<C: Component>(
        &self,
        registry: RegistryId,
        entity: EntityId,
    ) -> Result<C, RuntimeError> {
        let data = self.get_component_data(registry, entity, C::ID)?;
        Ok(data.get::<C>()?)
    }

    /// Copy a component out of the registry.
    pub fn get_component_data(
        &self,
        registry: RegistryId,
        entity: EntityId,
        component_id: ComponentId,
    ) -> Result<ComponentData, RuntimeError> {
        let f = self.fns.get_component.get()?;
        let meta = self.types.component(component_id)?;
        let src = unsafe { f(registry, entity, component_id) };
        if src.is_null() {
            return Err(RuntimeError::ComponentNotFound {
                entity,
                component: component_id,
            });
        }
        // SAFETY: a non-null result points at `meta.size` bytes of component data.
        Ok(unsafe { ComponentData::read_native(meta, src) }?)
    }

    pub fn count_components(&self, registry: RegistryId, entity: EntityId) -> Result<usize, RuntimeError> {
        let f = self.fns.count_components.get()?;
        Ok(unsafe { f(registry, entity) }.max(0) as usize)
    }

    pub fn update_component<C: Component>(
        &mut self,
        registry: RegistryId,
        entity: EntityId,
        component: &C,
    ) -> Result<(), RuntimeError> {
        self.update_component_data(registry, entity, &ComponentData::new(component))
    }

    pub fn update_component_data(
        &mut self,
        registry: RegistryId,
        entity: EntityId,
        component: &ComponentData,
    ) -> Result<(), RuntimeError> {
        let f = self.fns.update_component.get()?;
        self.types.check_component(component)?;
        let code = unsafe { f(registry, entity, component.component_id(), component.as_ptr()) };
        check_status("ecsact_update_component", code)?;
        self.events.emit(ComponentEventKind::Update, entity, component);
        Ok(())
    }

    pub fn remove_component<C: Component>(
        &mut self,
        registry: RegistryId,
        entity: EntityId,
    ) -> Result<(), RuntimeError> {
        self.remove_component_id(registry, entity, C::ID)
    }

    /// Remove a component; the remove event carries its last value.
    ///
    /// Without `ecsact_get_component` the event payload is zeroed. Removing
    /// a component the entity lacks fails with `ComponentNotFound` and
    /// emits nothing.
    pub fn remove_component_id(
        &mut self,
        registry: RegistryId,
        entity: EntityId,
        component_id: ComponentId,
    ) -> Result<(), RuntimeError> {
        let f = self.fns.remove_component.get()?;
        let meta = self.types.component(component_id)?;
        let last = match self.get_component_data(registry, entity, component_id) {
            Ok(data) => data,
            Err(RuntimeError::MissingMethod(_)) => {
                if let Ok(false) = self.has_component_id(registry, entity, component_id) {
                    return Err(RuntimeError::ComponentNotFound {
                        entity,
                        component: component_id,
                    });
                }
                ComponentData::from_aligned(component_id, AlignedBytes::zeroed(meta.size, meta.align)?)
            }
            Err(err) => return Err(err),
        };
        unsafe { f(registry, entity, component_id) };
        self.events.emit(ComponentEventKind::Remove, entity, &last);
        Ok(())
    }

    /// Run one tick with no pending mutations.
    pub fn execute_tick(&mut self, registry: RegistryId) -> Result<(), RuntimeError> {
        self.execute_systems::<SystemAllocator>(registry, &mut [])
    }

    /// Run one tick per entry of `options`.
    ///
    /// Every batch is allocated before the call and freed afterwards,
    /// whatever the outcome. Component events reported by the native
    /// collector are fanned out before this returns.
    pub fn execute_systems<A: NativeAllocator>(
        &mut self,
        registry: RegistryId,
        options: &mut [ExecutionOptions<A>],
    ) -> Result<(), RuntimeError> {
        let f = self.fns.execute_systems.get()?;

        let mut batches = FreeOnDrop(options);
        let destroyed: Vec<EntityId> = batches
            .0
            .iter()
            .flat_map(|batch| batch.destroyed_entities().iter().copied())
            .collect();
        let mut raw = Vec::with_capacity(batches.0.len());
        for batch in batches.0.iter_mut() {
            raw.push(*batch.alloc()?);
        }
        let (execution_count, options_ptr) = if raw.is_empty() {
            (1, ptr::null())
        } else {
            (native_len("execution options", raw.len())?, raw.as_ptr())
        };

        let listening = self.events.has_component_listeners();
        let mut sink = EventSink::new(self.events, self.types);
        let collector = sink.collector();
        let collector_ptr: *const RawEventsCollector = if listening {
            &collector
        } else {
            ptr::null()
        };

        let code = {
            let _binding = ExecutionGuard::bind(self.token)?;
            unsafe { f(registry, execution_count, options_ptr, collector_ptr) }
        };
        drop(batches);
        check_status("ecsact_execute_systems", code)?;

        let errors = sink.into_errors();
        for entity in destroyed {
            self.events.emit_entity_destroyed(entity);
        }
        if let Some(first) = errors.first() {
            tracing::error!(count = errors.len(), "component events could not be marshaled");
            return Err(first.clone().into());
        }
        Ok(())
    }
}
