//! End-to-end tests against an in-process mock of the Ecsact C ABI.
//!
//! The mock keeps its registry in thread-local state and is exposed to the
//! runtime through a `SymbolTable`, so every call crosses the same
//! `extern "C"` boundary a real runtime library would.

use ecsact_runtime::ffi::{RawContext, RawEventsCollector, RawExecutionOptions, SystemExecutionImpl};
use ecsact_runtime::{
    current_runtime, define_action, Action, define_component, ActionData, Component, ComponentData, ComponentEventKind,
    ComponentId, EcsactRuntime, EntityId, ExecutionOptions, MarshalError, RegistryId, RuntimeError,
    RuntimeToken, SymbolTable, SystemId, TypeRegistry,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::{c_char, c_void};
use std::rc::Rc;
use std::slice;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Health {
    current: i32,
    max: i32,
}
define_component!(Health, 1, "mock.Health");

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Position {
    x: f32,
    y: f32,
}
define_component!(Position, 2, "mock.Position");

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Heal {
    amount: i32,
}
define_action!(Heal, 1, "mock.Heal");

const DAMAGE_SYSTEM: SystemId = 10;
const INIT: i32 = 0;
const UPDATE: i32 = 1;
const REMOVE: i32 = 2;

// ---- mock native runtime --------------------------------------------------

#[derive(Default)]
struct MockState {
    next_entity: i32,
    entities: BTreeMap<i32, BTreeMap<ComponentId, Vec<u8>>>,
    execute_status: i32,
    binding_seen: Option<Option<RuntimeToken>>,
    system: Option<SystemExecutionImpl>,
    events: Vec<(i32, EntityId, ComponentId, Vec<u8>)>,
    serialize_calls: usize,
}

thread_local! {
    static MOCK: RefCell<MockState> = RefCell::new(MockState::default());
}

fn with_mock<R>(f: impl FnOnce(&mut MockState) -> R) -> R {
    MOCK.with(|mock| f(&mut mock.borrow_mut()))
}

fn component_size(id: ComponentId) -> usize {
    if id == Health::ID {
        std::mem::size_of::<Health>()
    } else if id == Position::ID {
        std::mem::size_of::<Position>()
    } else {
        0
    }
}

unsafe fn read_payload(id: ComponentId, data: *const c_void) -> Vec<u8> {
    slice::from_raw_parts(data.cast::<u8>(), component_size(id)).to_vec()
}

impl MockState {
    fn spawn(&mut self) -> EntityId {
        let id = self.next_entity;
        self.next_entity += 1;
        self.entities.insert(id, BTreeMap::new());
        EntityId::from_raw(id)
    }

    fn add(&mut self, entity: EntityId, id: ComponentId, bytes: Vec<u8>) -> i32 {
        let Some(components) = self.entities.get_mut(&entity.id()) else {
            return 1;
        };
        if components.contains_key(&id) {
            return 2;
        }
        components.insert(id, bytes.clone());
        self.events.push((INIT, entity, id, bytes));
        0
    }

    fn update(&mut self, entity: EntityId, id: ComponentId, bytes: Vec<u8>) -> i32 {
        let Some(components) = self.entities.get_mut(&entity.id()) else {
            return 1;
        };
        let Some(slot) = components.get_mut(&id) else {
            return 2;
        };
        *slot = bytes.clone();
        self.events.push((UPDATE, entity, id, bytes));
        0
    }

    fn remove(&mut self, entity: EntityId, id: ComponentId) {
        if let Some(bytes) = self
            .entities
            .get_mut(&entity.id())
            .and_then(|components| components.remove(&id))
        {
            self.events.push((REMOVE, entity, id, bytes));
        }
    }
}

unsafe extern "C" fn create_registry(_name: *const c_char) -> RegistryId {
    RegistryId::from_raw(0)
}

unsafe extern "C" fn create_entity(_registry: RegistryId) -> EntityId {
    with_mock(|m| m.spawn())
}

unsafe extern "C" fn destroy_entity(_registry: RegistryId, entity: EntityId) {
    with_mock(|m| {
        m.entities.remove(&entity.id());
    });
}

unsafe extern "C" fn entity_exists(_registry: RegistryId, entity: EntityId) -> bool {
    with_mock(|m| m.entities.contains_key(&entity.id()))
}

unsafe extern "C" fn count_entities(_registry: RegistryId) -> i32 {
    with_mock(|m| m.entities.len() as i32)
}

unsafe extern "C" fn get_entities(
    _registry: RegistryId,
    max: i32,
    out: *mut EntityId,
    out_count: *mut i32,
) {
    with_mock(|m| {
        let mut written = 0;
        for id in m.entities.keys().take(max as usize) {
            *out.add(written) = EntityId::from_raw(*id);
            written += 1;
        }
        *out_count = written as i32;
    })
}

unsafe extern "C" fn add_component(
    _registry: RegistryId,
    entity: EntityId,
    id: ComponentId,
    data: *const c_void,
) -> i32 {
    let bytes = read_payload(id, data);
    with_mock(|m| {
        let status = m.add(entity, id, bytes);
        m.events.clear();
        status
    })
}

unsafe extern "C" fn update_component(
    _registry: RegistryId,
    entity: EntityId,
    id: ComponentId,
    data: *const c_void,
) -> i32 {
    let bytes = read_payload(id, data);
    with_mock(|m| {
        let status = m.update(entity, id, bytes);
        m.events.clear();
        status
    })
}

unsafe extern "C" fn has_component(_registry: RegistryId, entity: EntityId, id: ComponentId) -> bool {
    with_mock(|m| {
        m.entities
            .get(&entity.id())
            .is_some_and(|components| components.contains_key(&id))
    })
}

unsafe extern "C" fn get_component(_registry: RegistryId, entity: EntityId, id: ComponentId) -> *const c_void {
    with_mock(|m| {
        m.entities
            .get(&entity.id())
            .and_then(|components| components.get(&id))
            .map_or(std::ptr::null(), |bytes| bytes.as_ptr().cast())
    })
}

unsafe extern "C" fn remove_component(_registry: RegistryId, entity: EntityId, id: ComponentId) {
    with_mock(|m| {
        m.remove(entity, id);
        m.events.clear();
    })
}

unsafe fn apply_options(options: &RawExecutionOptions) {
    for i in 0..options.add_components_length as usize {
        let entity = *options.add_components_entities.add(i);
        let component = *options.add_components.add(i);
        let bytes = read_payload(component.component_id, component.component_data);
        with_mock(|m| m.add(entity, component.component_id, bytes));
    }
    for i in 0..options.update_components_length as usize {
        let entity = *options.update_components_entities.add(i);
        let component = *options.update_components.add(i);
        let bytes = read_payload(component.component_id, component.component_data);
        with_mock(|m| m.update(entity, component.component_id, bytes));
    }
    for i in 0..options.remove_components_length as usize {
        let entity = *options.remove_components_entities.add(i);
        let id = *options.remove_components.add(i);
        with_mock(|m| m.remove(entity, id));
    }
    for i in 0..options.create_entities_length as usize {
        let count = *options.create_entities_components_length.add(i) as usize;
        let components = *options.create_entities_components.add(i);
        let entity = with_mock(|m| m.spawn());
        for j in 0..count {
            let component = *components.add(j);
            let bytes = read_payload(component.component_id, component.component_data);
            with_mock(|m| m.add(entity, component.component_id, bytes));
        }
    }
    for i in 0..options.destroy_entities_length as usize {
        let entity = *options.destroy_entities.add(i);
        with_mock(|m| m.entities.remove(&entity.id()));
    }
}

#[repr(C)]
struct MockContext {
    entity: EntityId,
    system_id: SystemId,
}

unsafe fn mock_context<'a>(context: *const RawContext) -> &'a MockContext {
    &*context.cast::<MockContext>()
}

unsafe fn run_systems() {
    let Some(system) = with_mock(|m| m.system) else {
        return;
    };
    let targets: Vec<EntityId> = with_mock(|m| {
        m.entities
            .iter()
            .filter(|(_, components)| components.contains_key(&Health::ID))
            .map(|(id, _)| EntityId::from_raw(*id))
            .collect()
    });
    for entity in targets {
        let mut context = MockContext {
            entity,
            system_id: DAMAGE_SYSTEM,
        };
        system((&mut context as *mut MockContext).cast::<RawContext>());
    }
}

unsafe fn deliver_events(collector: *const RawEventsCollector) {
    let events = with_mock(|m| std::mem::take(&mut m.events));
    let Some(collector) = collector.as_ref() else {
        return;
    };
    for (kind, entity, id, bytes) in events {
        let (callback, user_data) = match kind {
            INIT => (collector.init_callback, collector.init_callback_user_data),
            UPDATE => (collector.update_callback, collector.update_callback_user_data),
            _ => (collector.remove_callback, collector.remove_callback_user_data),
        };
        if let Some(callback) = callback {
            callback(kind, entity, id, bytes.as_ptr().cast(), user_data);
        }
    }
}

unsafe extern "C" fn execute_systems(
    _registry: RegistryId,
    execution_count: i32,
    options: *const RawExecutionOptions,
    collector: *const RawEventsCollector,
) -> i32 {
    let seen = current_runtime();
    with_mock(|m| m.binding_seen = Some(seen));
    for i in 0..execution_count as usize {
        if !options.is_null() {
            apply_options(&*options.add(i));
        }
        run_systems();
    }
    deliver_events(collector);
    with_mock(|m| m.execute_status)
}

unsafe extern "C" fn set_system_execution_impl(
    system_id: SystemId,
    implementation: Option<SystemExecutionImpl>,
) -> bool {
    if system_id != DAMAGE_SYSTEM {
        return false;
    }
    with_mock(|m| m.system = implementation);
    true
}

unsafe extern "C" fn context_id(context: *mut RawContext) -> SystemId {
    mock_context(context).system_id
}

unsafe extern "C" fn context_entity(context: *const RawContext) -> EntityId {
    mock_context(context).entity
}

unsafe extern "C" fn context_get(context: *mut RawContext, id: ComponentId, out: *mut c_void) {
    let entity = mock_context(context).entity;
    with_mock(|m| {
        if let Some(bytes) = m.entities.get(&entity.id()).and_then(|c| c.get(&id)) {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), out.cast::<u8>(), bytes.len());
        }
    })
}

unsafe extern "C" fn context_has(context: *mut RawContext, id: ComponentId) -> bool {
    let entity = mock_context(context).entity;
    with_mock(|m| m.entities.get(&entity.id()).is_some_and(|c| c.contains_key(&id)))
}

unsafe extern "C" fn context_update(context: *mut RawContext, id: ComponentId, data: *const c_void) {
    let entity = mock_context(context).entity;
    let bytes = read_payload(id, data);
    with_mock(|m| m.update(entity, id, bytes));
}

unsafe extern "C" fn context_generate(
    _context: *mut RawContext,
    count: i32,
    ids: *mut ComponentId,
    data: *mut *const c_void,
) {
    let entity = with_mock(|m| m.spawn());
    for i in 0..count as usize {
        let id = *ids.add(i);
        let bytes = read_payload(id, *data.add(i));
        with_mock(|m| m.add(entity, id, bytes));
    }
}

unsafe extern "C" fn context_same(a: *const RawContext, b: *const RawContext) -> bool {
    a == b
}

// Identity wire format: the serialized form is the raw payload.

unsafe extern "C" fn serialize_component_size(id: ComponentId) -> i32 {
    component_size(id) as i32
}

unsafe extern "C" fn serialize_action_size(id: i32) -> i32 {
    if id == Heal::ID {
        std::mem::size_of::<Heal>() as i32
    } else {
        0
    }
}

unsafe fn copy_out(size: i32, input: *const c_void, out: *mut u8) -> i32 {
    with_mock(|m| m.serialize_calls += 1);
    std::ptr::copy_nonoverlapping(input.cast::<u8>(), out, size as usize);
    size
}

unsafe extern "C" fn serialize_component(id: ComponentId, input: *const c_void, out: *mut u8) -> i32 {
    copy_out(serialize_component_size(id), input, out)
}

unsafe extern "C" fn serialize_action(id: i32, input: *const c_void, out: *mut u8) -> i32 {
    copy_out(serialize_action_size(id), input, out)
}

unsafe extern "C" fn deserialize_component(id: ComponentId, input: *const u8, out: *mut c_void) -> i32 {
    let size = serialize_component_size(id);
    std::ptr::copy_nonoverlapping(input, out.cast::<u8>(), size as usize);
    size
}

fn full_table() -> SymbolTable {
    SymbolTable::new("mock")
        .with("ecsact_create_registry", create_registry as *const ())
        .with("ecsact_create_entity", create_entity as *const ())
        .with("ecsact_destroy_entity", destroy_entity as *const ())
        .with("ecsact_entity_exists", entity_exists as *const ())
        .with("ecsact_count_entities", count_entities as *const ())
        .with("ecsact_get_entities", get_entities as *const ())
        .with("ecsact_add_component", add_component as *const ())
        .with("ecsact_update_component", update_component as *const ())
        .with("ecsact_has_component", has_component as *const ())
        .with("ecsact_get_component", get_component as *const ())
        .with("ecsact_remove_component", remove_component as *const ())
        .with("ecsact_execute_systems", execute_systems as *const ())
        .with("ecsact_set_system_execution_impl", set_system_execution_impl as *const ())
        .with("ecsact_system_execution_context_id", context_id as *const ())
        .with("ecsact_system_execution_context_entity", context_entity as *const ())
        .with("ecsact_system_execution_context_get", context_get as *const ())
        .with("ecsact_system_execution_context_has", context_has as *const ())
        .with("ecsact_system_execution_context_update", context_update as *const ())
        .with("ecsact_system_execution_context_generate", context_generate as *const ())
        .with("ecsact_system_execution_context_same", context_same as *const ())
        .with("ecsact_serialize_component_size", serialize_component_size as *const ())
        .with("ecsact_serialize_component", serialize_component as *const ())
        .with("ecsact_deserialize_component", deserialize_component as *const ())
        .with("ecsact_serialize_action_size", serialize_action_size as *const ())
        .with("ecsact_serialize_action", serialize_action as *const ())
}

fn types() -> TypeRegistry {
    TypeRegistry::new()
        .with_component::<Health>()
        .and_then(|t| t.with_component::<Position>())
        .and_then(|t| t.with_action::<Heal>())
        .unwrap()
}

fn runtime_with(table: SymbolTable) -> EcsactRuntime {
    with_mock(|m| *m = MockState::default());
    EcsactRuntime::from_source(Box::new(table), types())
}

/// The execution slot is process-wide; tests that execute run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---- tests ------------------------------------------------------------------

#[test]
fn missing_execute_symbol_leaves_the_rest_callable() {
    let _serial = serial();
    let mut table = full_table();
    assert!(table.remove("ecsact_execute_systems"));
    let mut runtime = runtime_with(table);

    assert!(!runtime.loaded_methods().contains("ecsact_execute_systems"));
    assert!(matches!(
        runtime.core().execute_tick(RegistryId::from_raw(0)),
        Err(RuntimeError::MissingMethod("ecsact_execute_systems"))
    ));

    let mut core = runtime.core();
    let registry = core.create_registry("default").unwrap();
    let entity = core.create_entity(registry).unwrap();
    core.add_component(registry, entity, &Health { current: 5, max: 5 })
        .unwrap();
    assert!(core.has_component::<Health>(registry, entity).unwrap());
    assert_eq!(core.count_entities(registry).unwrap(), 1);
}

#[test]
fn binding_is_cleared_after_a_failing_execute() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    with_mock(|m| m.execute_status = 2);

    let result = runtime.core().execute_tick(RegistryId::from_raw(0));
    assert!(matches!(result, Err(RuntimeError::ConstraintBroken)));
    assert_eq!(with_mock(|m| m.binding_seen), Some(Some(runtime.token())));
    assert_eq!(current_runtime(), None);

    with_mock(|m| m.execute_status = 0);
    runtime.core().execute_tick(RegistryId::from_raw(0)).unwrap();
    assert_eq!(current_runtime(), None);
}

#[test]
fn core_mutations_emit_exactly_one_event_each() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let log = Rc::new(RefCell::new(Vec::new()));

    let any = log.clone();
    runtime.events_mut().on_any(ComponentEventKind::Init, move |e| {
        any.borrow_mut().push(format!("any init {}", e.component_id()))
    });
    let init = log.clone();
    runtime
        .events_mut()
        .on_init::<Health, _>(move |_, h| init.borrow_mut().push(format!("init {}", h.current)));
    let update = log.clone();
    runtime
        .events_mut()
        .on_update::<Health, _>(move |_, h| update.borrow_mut().push(format!("update {}", h.current)));
    let remove = log.clone();
    runtime
        .events_mut()
        .on_remove::<Health, _>(move |_, h| remove.borrow_mut().push(format!("remove {}", h.current)));

    let mut core = runtime.core();
    let registry = core.create_registry("default").unwrap();
    let entity = core.create_entity(registry).unwrap();
    core.add_component(registry, entity, &Health { current: 10, max: 10 })
        .unwrap();
    core.update_component(registry, entity, &Health { current: 7, max: 10 })
        .unwrap();
    core.remove_component::<Health>(registry, entity).unwrap();

    assert_eq!(
        *log.borrow(),
        ["any init 1", "init 10", "update 7", "remove 7"]
    );
}

#[test]
fn native_errors_are_typed_and_suppress_events() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let hits = Rc::new(RefCell::new(0));
    let counter = hits.clone();
    runtime
        .events_mut()
        .on_any(ComponentEventKind::Init, move |_| *counter.borrow_mut() += 1);

    let mut core = runtime.core();
    let registry = core.create_registry("default").unwrap();
    let ghost = EntityId::from_raw(99);
    assert!(matches!(
        core.add_component(registry, ghost, &Health { current: 1, max: 1 }),
        Err(RuntimeError::EntityInvalid)
    ));

    let entity = core.create_entity(registry).unwrap();
    core.add_component(registry, entity, &Health { current: 1, max: 1 })
        .unwrap();
    assert!(matches!(
        core.add_component(registry, entity, &Health { current: 2, max: 2 }),
        Err(RuntimeError::ConstraintBroken)
    ));
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn unregistered_components_fail_before_reaching_native() {
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Unknown {
        value: u32,
    }
    define_component!(Unknown, 77, "mock.Unknown");

    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let mut core = runtime.core();
    let registry = core.create_registry("default").unwrap();
    let entity = core.create_entity(registry).unwrap();

    let err = core
        .add_component(registry, entity, &Unknown { value: 1 })
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Marshal(ecsact_runtime::MarshalError::UnknownComponent(77))
    ));
}

#[test]
fn execution_options_apply_and_collector_events_fan_out() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    runtime
        .events_mut()
        .on_init::<Health, _>(move |entity, h| sink.borrow_mut().push((entity, *h)));

    let registry = runtime.core().create_registry("default").unwrap();
    let entity = runtime.core().create_entity(registry).unwrap();

    let mut options = ExecutionOptions::new();
    options
        .add_component(entity, &Health { current: 3, max: 4 })
        .unwrap();
    options
        .create_entity_with(vec![ComponentData::new(&Health { current: 1, max: 1 })])
        .unwrap();
    runtime
        .core()
        .execute_systems(registry, std::slice::from_mut(&mut options))
        .unwrap();

    assert!(options.is_empty());
    assert!(!options.is_allocated());
    assert_eq!(
        *seen.borrow(),
        [
            (entity, Health { current: 3, max: 4 }),
            (EntityId::from_raw(1), Health { current: 1, max: 1 }),
        ]
    );
    assert_eq!(runtime.core().get_entities(registry).unwrap().len(), 2);
}

#[test]
fn host_systems_run_through_the_context() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let registry = runtime.core().create_registry("default").unwrap();
    let entity = runtime.core().create_entity(registry).unwrap();
    runtime
        .core()
        .add_component(registry, entity, &Health { current: 10, max: 10 })
        .unwrap();

    let visits = Arc::new(Mutex::new(Vec::new()));
    let record = visits.clone();
    runtime
        .dynamic()
        .set_system_execution_impl(DAMAGE_SYSTEM, move |ctx| {
            let mut health = ctx.get::<Health>()?;
            health.current -= 3;
            ctx.update(&health)?;
            record
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((ctx.id()?, ctx.entity()?, ctx.has::<Position>()?, ctx.same(ctx)?));
            Ok(())
        })
        .unwrap();
    assert!(runtime.dynamic().has_system_execution_impl(DAMAGE_SYSTEM));

    let updates = Rc::new(RefCell::new(Vec::new()));
    let sink = updates.clone();
    runtime
        .events_mut()
        .on_update::<Health, _>(move |_, h| sink.borrow_mut().push(h.current));

    runtime.core().execute_tick(registry).unwrap();

    assert_eq!(
        *visits.lock().unwrap(),
        [(DAMAGE_SYSTEM, entity, false, true)]
    );
    assert_eq!(*updates.borrow(), [7]);
    assert_eq!(
        runtime.core().get_component::<Health>(registry, entity).unwrap(),
        Health { current: 7, max: 10 }
    );
}

#[test]
fn rejected_system_ids_are_reported() {
    let _serial = serial();
    let runtime = runtime_with(full_table());
    let err = runtime
        .dynamic()
        .set_system_execution_impl(42, |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::SystemImplRejected(42)));
    assert!(!runtime.dynamic().has_system_execution_impl(42));
}

#[test]
fn generate_validates_component_sets_and_parent_may_be_missing() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let registry = runtime.core().create_registry("default").unwrap();
    let entity = runtime.core().create_entity(registry).unwrap();
    runtime
        .core()
        .add_component(registry, entity, &Health { current: 1, max: 1 })
        .unwrap();

    let outcome = Arc::new(Mutex::new(None));
    let record = outcome.clone();
    runtime
        .dynamic()
        .set_system_execution_impl(DAMAGE_SYSTEM, move |ctx| {
            let health = ComponentData::new(&Health { current: 2, max: 2 });
            let empty = ctx.generate(&[]);
            let duplicate = ctx.generate(&[health.clone(), health.clone()]);
            let spawned = ctx.generate(&[health, ComponentData::new(&Position { x: 1.0, y: 2.0 })]);
            let parent = ctx.parent();
            *record.lock().unwrap_or_else(PoisonError::into_inner) = Some((
                matches!(empty, Err(RuntimeError::EmptyGenerate)),
                matches!(duplicate, Err(RuntimeError::DuplicateGenerateComponent(1))),
                spawned.is_ok(),
                matches!(
                    parent,
                    Err(RuntimeError::MissingMethod("ecsact_system_execution_context_parent"))
                ),
            ));
            Ok(())
        })
        .unwrap();

    runtime.core().execute_tick(registry).unwrap();

    assert_eq!(*outcome.lock().unwrap(), Some((true, true, true, true)));
    assert_eq!(runtime.core().count_entities(registry).unwrap(), 2);
}

#[test]
fn failing_system_implementations_do_not_abort_the_tick() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let registry = runtime.core().create_registry("default").unwrap();
    let entity = runtime.core().create_entity(registry).unwrap();
    runtime
        .core()
        .add_component(registry, entity, &Health { current: 1, max: 1 })
        .unwrap();
    runtime
        .dynamic()
        .set_system_execution_impl(DAMAGE_SYSTEM, |_| panic!("system bug"))
        .unwrap();

    runtime.core().execute_tick(registry).unwrap();
    assert_eq!(current_runtime(), None);
}

#[test]
fn serialization_rejects_payloads_that_disagree_with_the_registered_layout() {
    // same ids as Health and Heal, different layouts
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct ShortHealth {
        current: i32,
    }
    define_component!(ShortHealth, 1, "mock.Health");

    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct WideHeal {
        amount: i32,
        bonus: i32,
    }
    define_action!(WideHeal, 1, "mock.Heal");

    let _serial = serial();
    let runtime = runtime_with(full_table());
    let serialize = runtime.serialize();

    let health = Health { current: 3, max: 9 };
    let wire = serialize
        .serialize_component(&ComponentData::new(&health))
        .unwrap();
    assert_eq!(wire.len(), 8);
    let back = serialize.deserialize_component(Health::ID, &wire).unwrap();
    assert_eq!(back.get::<Health>().unwrap(), health);

    let err = serialize
        .serialize_component(&ComponentData::new(&ShortHealth { current: 3 }))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Marshal(MarshalError::SizeMismatch {
            id: 1,
            expected: 8,
            actual: 4
        })
    ));

    let err = serialize
        .serialize_action(&ActionData::new(&WideHeal { amount: 1, bonus: 2 }))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Marshal(MarshalError::SizeMismatch {
            id: 1,
            expected: 4,
            actual: 8
        })
    ));

    // only the well-formed payload reached native code
    assert_eq!(with_mock(|m| m.serialize_calls), 1);
}

#[test]
fn removing_an_absent_component_emits_nothing() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let hits = Rc::new(RefCell::new(0));
    let counter = hits.clone();
    runtime
        .events_mut()
        .on_any(ComponentEventKind::Remove, move |_| *counter.borrow_mut() += 1);

    let mut core = runtime.core();
    let registry = core.create_registry("default").unwrap();
    let entity = core.create_entity(registry).unwrap();
    let err = core.remove_component::<Health>(registry, entity).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ComponentNotFound { entity: e, component: c } if e == entity && c == Health::ID
    ));
    assert_eq!(*hits.borrow(), 0);

    // without get_component the presence check falls back to has_component
    let mut table = full_table();
    assert!(table.remove("ecsact_get_component"));
    let mut runtime = runtime_with(table);
    let mut core = runtime.core();
    let entity = core.create_entity(registry).unwrap();
    assert!(matches!(
        core.remove_component::<Health>(registry, entity),
        Err(RuntimeError::ComponentNotFound { .. })
    ));
}

#[test]
fn host_requested_destruction_is_announced() {
    let _serial = serial();
    let mut runtime = runtime_with(full_table());
    let destroyed = Rc::new(RefCell::new(Vec::new()));
    let sink = destroyed.clone();
    runtime
        .events_mut()
        .on_entity_destroyed(move |entity| sink.borrow_mut().push(entity));

    let mut core = runtime.core();
    let registry = core.create_registry("default").unwrap();
    let first = core.create_entity(registry).unwrap();
    let second = core.create_entity(registry).unwrap();

    core.destroy_entity(registry, first).unwrap();
    assert!(!core.entity_exists(registry, first).unwrap());
    assert_eq!(*destroyed.borrow(), [first]);

    let mut options = ExecutionOptions::new();
    options.destroy_entity(second).unwrap();
    core.execute_systems(registry, slice::from_mut(&mut options))
        .unwrap();
    assert!(!core.entity_exists(registry, second).unwrap());
    assert_eq!(*destroyed.borrow(), [first, second]);
}
