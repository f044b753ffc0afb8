use crate::component_set::ComponentIdSet;
use ecsact_runtime::{Component, ComponentData, ComponentId, EntityId};
use std::fmt;

/// Handle assigned to each registered behavior type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BehaviorTypeId(u32);

impl BehaviorTypeId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the raw index backing this handle.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BehaviorTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host object attached to an entity proxy while its behavior type applies.
///
/// Every callback defaults to doing nothing. Errors are reported by the pool
/// and never stop other behaviors from receiving the same event.
pub trait SyncBehavior {
    /// Called once right after the behavior is attached.
    fn on_entity_initialized(&mut self, _entity: EntityId) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_init_component(&mut self, _entity: EntityId, _component: &ComponentData) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_update_component(&mut self, _entity: EntityId, _component: &ComponentData) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_remove_component(&mut self, _entity: EntityId, _component: &ComponentData) -> anyhow::Result<()> {
        Ok(())
    }
}

type Factory = Box<dyn Fn() -> Box<dyn SyncBehavior>>;

/// Declares a behavior type: the components it requires and the components
/// whose lifecycle events it wants to observe.
pub struct BehaviorDescriptor {
    name: String,
    required: ComponentIdSet,
    init: ComponentIdSet,
    update: ComponentIdSet,
    remove: ComponentIdSet,
    factory: Factory,
}

impl BehaviorDescriptor {
    /// Create a descriptor; `factory` builds one behavior instance per attach.
    pub fn new<F, B>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> B + 'static,
        B: SyncBehavior + 'static,
    {
        Self {
            name: name.into(),
            required: ComponentIdSet::new(),
            init: ComponentIdSet::new(),
            update: ComponentIdSet::new(),
            remove: ComponentIdSet::new(),
            factory: Box::new(move || Box::new(factory())),
        }
    }

    /// Only attach while `C` is present.
    pub fn requires<C: Component>(self) -> Self {
        self.requires_id(C::ID)
    }

    pub fn requires_id(mut self, id: ComponentId) -> Self {
        self.required.insert(id);
        self
    }

    pub fn on_init<C: Component>(self) -> Self {
        self.on_init_id(C::ID)
    }

    pub fn on_init_id(mut self, id: ComponentId) -> Self {
        self.init.insert(id);
        self
    }

    pub fn on_update<C: Component>(self) -> Self {
        self.on_update_id(C::ID)
    }

    pub fn on_update_id(mut self, id: ComponentId) -> Self {
        self.update.insert(id);
        self
    }

    pub fn on_remove<C: Component>(self) -> Self {
        self.on_remove_id(C::ID)
    }

    pub fn on_remove_id(mut self, id: ComponentId) -> Self {
        self.remove.insert(id);
        self
    }

    /// Require `C` and observe its whole lifecycle.
    pub fn tracks<C: Component>(self) -> Self {
        self.requires::<C>()
            .on_init::<C>()
            .on_update::<C>()
            .on_remove::<C>()
    }

    /// Unique behavior name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &ComponentIdSet {
        &self.required
    }

    pub fn init_interest(&self) -> &ComponentIdSet {
        &self.init
    }

    pub fn update_interest(&self) -> &ComponentIdSet {
        &self.update
    }

    pub fn remove_interest(&self) -> &ComponentIdSet {
        &self.remove
    }

    /// Every component id this descriptor mentions.
    pub fn all_components(&self) -> ComponentIdSet {
        self.required
            .iter()
            .chain(self.init.iter())
            .chain(self.update.iter())
            .chain(self.remove.iter())
            .collect()
    }

    /// Whether the descriptor references any components at all.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.init.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    pub(crate) fn instantiate(&self) -> Box<dyn SyncBehavior> {
        (self.factory)()
    }
}

impl fmt::Debug for BehaviorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorDescriptor")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("init", &self.init)
            .field("update", &self.update)
            .field("remove", &self.remove)
            .finish()
    }
}
