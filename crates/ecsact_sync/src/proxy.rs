//! Host objects representing entities.

use crate::behavior::{BehaviorTypeId, SyncBehavior};
use ecsact_runtime::EntityId;
use std::collections::BTreeMap;
use std::fmt;

/// Host side of proxy management, e.g. a scene graph.
///
/// The pool decides when proxies exist and are active; the host only
/// mirrors those decisions.
pub trait ProxyHost {
    fn create(&mut self, entity: EntityId, name: &str);
    fn activate(&mut self, entity: EntityId);
    fn deactivate(&mut self, entity: EntityId);
    fn rename(&mut self, entity: EntityId, name: &str);
    fn destroy(&mut self, entity: EntityId);

    fn behavior_attached(&mut self, _entity: EntityId, _behavior: &str) {}
    fn behavior_detached(&mut self, _entity: EntityId, _behavior: &str) {}
}

/// Host that ignores every notification.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullHost;

impl ProxyHost for NullHost {
    fn create(&mut self, _entity: EntityId, _name: &str) {}
    fn activate(&mut self, _entity: EntityId) {}
    fn deactivate(&mut self, _entity: EntityId) {}
    fn rename(&mut self, _entity: EntityId, _name: &str) {}
    fn destroy(&mut self, _entity: EntityId) {}
}

pub(crate) fn active_name(entity: EntityId) -> String {
    format!("entity {entity}")
}

pub(crate) fn pooled_name(entity: EntityId) -> String {
    format!("entity {entity} (pooled)")
}

/// Pool-side record of one entity's proxy and its attached behaviors.
pub struct EntityProxy {
    entity: EntityId,
    name: String,
    active: bool,
    preferred: bool,
    pub(crate) behaviors: BTreeMap<BehaviorTypeId, Box<dyn SyncBehavior>>,
}

impl EntityProxy {
    pub(crate) fn new(entity: EntityId, preferred: bool) -> Self {
        Self {
            entity,
            name: active_name(entity),
            active: true,
            preferred,
            behaviors: BTreeMap::new(),
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Preferred proxies were assigned by the caller and are never
    /// deactivated automatically.
    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub fn has_behavior(&self, id: BehaviorTypeId) -> bool {
        self.behaviors.contains_key(&id)
    }

    pub fn behavior_types(&self) -> impl Iterator<Item = BehaviorTypeId> + '_ {
        self.behaviors.keys().copied()
    }

    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    pub(crate) fn set_preferred(&mut self, preferred: bool) {
        self.preferred = preferred;
    }

    pub(crate) fn activate(&mut self, host: &mut impl ProxyHost) {
        if self.active {
            return;
        }
        self.active = true;
        self.name = active_name(self.entity);
        host.activate(self.entity);
        host.rename(self.entity, &self.name);
        tracing::debug!(entity = %self.entity, "proxy reactivated");
    }

    pub(crate) fn deactivate(&mut self, host: &mut impl ProxyHost) {
        if !self.active {
            return;
        }
        self.active = false;
        self.name = pooled_name(self.entity);
        host.deactivate(self.entity);
        host.rename(self.entity, &self.name);
        tracing::debug!(entity = %self.entity, "proxy deactivated");
    }
}

impl fmt::Debug for EntityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("entity", &self.entity)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("preferred", &self.preferred)
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .finish()
    }
}
