//! Component event fan-out.
//!
//! Init/update/remove events arrive from two places: Core facade calls and
//! the native events collector during `execute_systems`. Both go through
//! [`EventBus::emit`], which notifies "any component" subscribers before
//! component-specific ones.
//!
//! Entity teardown requested by the host (Core `destroy_entity`, or a
//! destroy queued in execution options) is announced separately through
//! [`EventBus::emit_entity_destroyed`].

use crate::error::MarshalError;
use crate::ffi::RawEventsCollector;
use crate::payload::ComponentData;
use crate::types::{Component, ComponentId, EntityId, TypeRegistry};
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentEventKind {
    Init,
    Update,
    Remove,
}

impl fmt::Display for ComponentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentEventKind::Init => f.write_str("init"),
            ComponentEventKind::Update => f.write_str("update"),
            ComponentEventKind::Remove => f.write_str("remove"),
        }
    }
}

/// One component event, borrowed for the duration of delivery.
#[derive(Copy, Clone, Debug)]
pub struct ComponentEvent<'a> {
    pub kind: ComponentEventKind,
    pub entity: EntityId,
    pub component: &'a ComponentData,
}

impl ComponentEvent<'_> {
    pub fn component_id(&self) -> ComponentId {
        self.component.component_id()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&ComponentEvent<'_>)>;
type EntityCallback = Box<dyn FnMut(EntityId)>;

struct Subscriber {
    id: SubscriptionId,
    kind: ComponentEventKind,
    filter: Option<ComponentId>,
    callback: Callback,
}

/// Subscribers for component events, owned by one runtime instance.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    destroyed: Vec<(SubscriptionId, EntityCallback)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    fn subscribe(
        &mut self,
        kind: ComponentEventKind,
        filter: Option<ComponentId>,
        callback: Callback,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.subscribers.push(Subscriber {
            id,
            kind,
            filter,
            callback,
        });
        id
    }

    /// Subscribe to every `kind` event regardless of component.
    pub fn on_any<F>(&mut self, kind: ComponentEventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&ComponentEvent<'_>) + 'static,
    {
        self.subscribe(kind, None, Box::new(callback))
    }

    /// Subscribe to `kind` events for one component id.
    pub fn on_component<F>(
        &mut self,
        kind: ComponentEventKind,
        component_id: ComponentId,
        callback: F,
    ) -> SubscriptionId
    where
        F: FnMut(&ComponentEvent<'_>) + 'static,
    {
        self.subscribe(kind, Some(component_id), Box::new(callback))
    }

    fn on_typed<C, F>(&mut self, kind: ComponentEventKind, mut callback: F) -> SubscriptionId
    where
        C: Component,
        F: FnMut(EntityId, &C) + 'static,
    {
        self.on_component(kind, C::ID, move |event| match event.component.get::<C>() {
            Ok(value) => callback(event.entity, &value),
            Err(err) => tracing::warn!(
                component = C::NAME,
                entity = %event.entity,
                error = %err,
                "dropping undecodable component event"
            ),
        })
    }

    pub fn on_init<C, F>(&mut self, callback: F) -> SubscriptionId
    where
        C: Component,
        F: FnMut(EntityId, &C) + 'static,
    {
        self.on_typed::<C, F>(ComponentEventKind::Init, callback)
    }

    pub fn on_update<C, F>(&mut self, callback: F) -> SubscriptionId
    where
        C: Component,
        F: FnMut(EntityId, &C) + 'static,
    {
        self.on_typed::<C, F>(ComponentEventKind::Update, callback)
    }

    pub fn on_remove<C, F>(&mut self, callback: F) -> SubscriptionId
    where
        C: Component,
        F: FnMut(EntityId, &C) + 'static,
    {
        self.on_typed::<C, F>(ComponentEventKind::Remove, callback)
    }

    /// Subscribe to entities the host destroyed through this runtime.
    pub fn on_entity_destroyed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(EntityId) + 'static,
    {
        let id = self.next_id();
        self.destroyed.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.len();
        self.subscribers.retain(|s| s.id != id);
        self.destroyed.retain(|(sub, _)| *sub != id);
        self.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.subscribers.len() + self.destroyed.len()
    }

    /// Whether anything listens for component events.
    pub(crate) fn has_component_listeners(&self) -> bool {
        !self.subscribers.is_empty()
    }

    pub fn emit_entity_destroyed(&mut self, entity: EntityId) {
        for (_, callback) in self.destroyed.iter_mut() {
            callback(entity);
        }
    }

    /// Deliver one event to matching subscribers. The runtime calls this for
    /// every facade mutation and collected native event.
    pub fn emit(&mut self, kind: ComponentEventKind, entity: EntityId, component: &ComponentData) {
        let event = ComponentEvent {
            kind,
            entity,
            component,
        };
        let id = component.component_id();
        for subscriber in self
            .subscribers
            .iter_mut()
            .filter(|s| s.kind == kind && s.filter.is_none())
        {
            (subscriber.callback)(&event);
        }
        for subscriber in self
            .subscribers
            .iter_mut()
            .filter(|s| s.kind == kind && s.filter == Some(id))
        {
            (subscriber.callback)(&event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("destroyed", &self.destroyed.len())
            .finish()
    }
}

/// Target of the native events collector for one execute call.
pub(crate) struct EventSink<'a> {
    bus: &'a mut EventBus,
    types: &'a TypeRegistry,
    errors: Vec<MarshalError>,
}

impl<'a> EventSink<'a> {
    pub(crate) fn new(bus: &'a mut EventBus, types: &'a TypeRegistry) -> Self {
        Self {
            bus,
            types,
            errors: Vec::new(),
        }
    }

    /// Collector pointing back at `self`; valid while `self` is not moved.
    pub(crate) fn collector(&mut self) -> RawEventsCollector {
        let user_data = (self as *mut EventSink<'a>).cast::<c_void>();
        RawEventsCollector {
            init_callback: Some(init_trampoline),
            init_callback_user_data: user_data,
            update_callback: Some(update_trampoline),
            update_callback_user_data: user_data,
            remove_callback: Some(remove_trampoline),
            remove_callback_user_data: user_data,
        }
    }

    /// Payloads that could not be marshaled during collection.
    pub(crate) fn into_errors(self) -> Vec<MarshalError> {
        self.errors
    }

    fn deliver(
        &mut self,
        kind: ComponentEventKind,
        entity: EntityId,
        component_id: ComponentId,
        data: *const c_void,
    ) {
        let component = self.types.component(component_id).and_then(|meta| {
            if data.is_null() && meta.size > 0 {
                return Err(MarshalError::SizeMismatch {
                    id: component_id,
                    expected: meta.size,
                    actual: 0,
                });
            }
            // SAFETY: native hands us `meta.size` readable bytes for this id.
            unsafe { ComponentData::read_native(meta, data) }
        });
        match component {
            Ok(component) => self.bus.emit(kind, entity, &component),
            Err(err) => {
                tracing::warn!(%kind, %entity, component_id, error = %err, "unmarshalable component event");
                self.errors.push(err);
            }
        }
    }
}

unsafe fn collect(
    kind: ComponentEventKind,
    entity: EntityId,
    component_id: ComponentId,
    data: *const c_void,
    user_data: *mut c_void,
) {
    if user_data.is_null() {
        return;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: user_data is the EventSink installed by `collector`.
        let sink = &mut *user_data.cast::<EventSink<'_>>();
        sink.deliver(kind, entity, component_id, data);
    }));
    if result.is_err() {
        tracing::error!(%kind, %entity, component_id, "component event subscriber panicked");
    }
}

unsafe extern "C" fn init_trampoline(
    _event: i32,
    entity: EntityId,
    component_id: ComponentId,
    data: *const c_void,
    user_data: *mut c_void,
) {
    collect(ComponentEventKind::Init, entity, component_id, data, user_data)
}

unsafe extern "C" fn update_trampoline(
    _event: i32,
    entity: EntityId,
    component_id: ComponentId,
    data: *const c_void,
    user_data: *mut c_void,
) {
    collect(ComponentEventKind::Update, entity, component_id, data, user_data)
}

unsafe extern "C" fn remove_trampoline(
    _event: i32,
    entity: EntityId,
    component_id: ComponentId,
    data: *const c_void,
    user_data: *mut c_void,
) {
    collect(ComponentEventKind::Remove, entity, component_id, data, user_data)
}
