// pool.rs - Incremental behavior resolution per entity
//
// Each component event recomputes Types() for the entity's previous and
// next component sets and applies only the difference: behaviors that stop
// qualifying are detached, newly qualifying ones are attached and replayed
// the init events they missed. Proxies appear on first attach, go dormant
// when their last behavior leaves, and are destroyed only with the entity or
// the pool.

use crate::behavior::{BehaviorTypeId, SyncBehavior};
use crate::cache::ArchetypeCache;
use crate::component_set::ComponentIdSet;
use crate::error::SyncError;
use crate::proxy::{active_name, EntityProxy, NullHost, ProxyHost};
use crate::registry::{BehaviorSet, SealedBehaviors};
use crate::report::{CallbackFailure, CallbackStage, DispatchReport};
use ecsact_runtime::{ComponentData, ComponentId, EntityId, RuntimeSettings};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Default)]
struct TrackedEntity {
    components: ComponentIdSet,
    data: HashMap<ComponentId, ComponentData>,
    proxy: Option<EntityProxy>,
}

pub struct EntityProxyPool<H: ProxyHost = NullHost> {
    behaviors: SealedBehaviors,
    host: H,
    cache: ArchetypeCache<BehaviorSet>,
    entities: HashMap<EntityId, TrackedEntity>,
}

impl<H: ProxyHost> EntityProxyPool<H> {
    pub fn new(behaviors: SealedBehaviors, host: H) -> Self {
        Self::with_cache_capacity(behaviors, host, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(behaviors: SealedBehaviors, host: H, capacity: usize) -> Self {
        Self {
            behaviors,
            host,
            cache: ArchetypeCache::new(capacity),
            entities: HashMap::new(),
        }
    }

    pub fn from_settings(behaviors: SealedBehaviors, host: H, settings: &RuntimeSettings) -> Self {
        Self::with_cache_capacity(behaviors, host, settings.archetype_cache_capacity)
    }

    pub fn behaviors(&self) -> &SealedBehaviors {
        &self.behaviors
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn cache(&self) -> &ArchetypeCache<BehaviorSet> {
        &self.cache
    }

    /// Memoized [`SealedBehaviors::types`].
    pub fn types(&mut self, components: &ComponentIdSet) -> BehaviorSet {
        resolve(&mut self.cache, &self.behaviors, components)
    }

    pub fn is_tracked(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn tracked_count(&self) -> usize {
        self.entities.len()
    }

    pub fn components(&self, entity: EntityId) -> Option<&ComponentIdSet> {
        self.entities.get(&entity).map(|t| &t.components)
    }

    pub fn proxy(&self, entity: EntityId) -> Option<&EntityProxy> {
        self.entities.get(&entity).and_then(|t| t.proxy.as_ref())
    }

    /// Behavior types currently attached to `entity`'s proxy.
    pub fn attached_types(&self, entity: EntityId) -> BehaviorSet {
        self.proxy(entity)
            .map(|proxy| proxy.behavior_types().collect())
            .unwrap_or_default()
    }

    /// A component was added to `entity`. Starts tracking unseen entities.
    pub fn init_component(&mut self, entity: EntityId, component: &ComponentData) -> DispatchReport {
        let Self {
            behaviors,
            host,
            cache,
            entities,
        } = self;
        let id = component.component_id();
        let tracked = entities.entry(entity).or_default();

        let prev = tracked.components.clone();
        let next = prev.with(id);
        let prev_types = resolve(cache, behaviors, &prev);
        let next_types = resolve(cache, behaviors, &next);
        let mut report = DispatchReport::default();

        tracked.data.insert(id, component.clone());

        for &behavior in prev_types.difference(&next_types) {
            detach(tracked, host, behaviors, entity, behavior, &mut report);
        }

        let added: Vec<BehaviorTypeId> = next_types.difference(&prev_types).copied().collect();
        attach(tracked, host, behaviors, entity, &added, &prev, &mut report);

        if let Some(proxy) = tracked.proxy.as_mut() {
            for (&behavior_id, behavior) in proxy.behaviors.iter_mut() {
                if interested(behaviors, behavior_id, id, CallbackStage::Init) {
                    invoke(&mut report, behaviors, entity, behavior_id, CallbackStage::Init, Some(id), || {
                        behavior.on_init_component(entity, component)
                    });
                }
            }
        }

        tracked.components = next;
        settle(tracked, host);
        report
    }

    /// A tracked component changed value. The behavior set cannot change.
    pub fn update_component(
        &mut self,
        entity: EntityId,
        component: &ComponentData,
    ) -> Result<DispatchReport, SyncError> {
        let id = component.component_id();
        let tracked = self
            .entities
            .get_mut(&entity)
            .ok_or(SyncError::UntrackedEntity(entity))?;
        if !tracked.components.contains(id) {
            return Err(SyncError::ComponentNotPresent {
                entity,
                component: id,
            });
        }
        tracked.data.insert(id, component.clone());

        let mut report = DispatchReport::default();
        if let Some(proxy) = tracked.proxy.as_mut() {
            for (&behavior_id, behavior) in proxy.behaviors.iter_mut() {
                if interested(&self.behaviors, behavior_id, id, CallbackStage::Update) {
                    invoke(
                        &mut report,
                        &self.behaviors,
                        entity,
                        behavior_id,
                        CallbackStage::Update,
                        Some(id),
                        || behavior.on_update_component(entity, component),
                    );
                }
            }
        }
        Ok(report)
    }

    /// A tracked component was removed.
    ///
    /// Attached behaviors interested in the removal see `component` once,
    /// then behaviors that no longer qualify are detached and any that newly
    /// qualify are attached.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        component: &ComponentData,
    ) -> Result<DispatchReport, SyncError> {
        let Self {
            behaviors,
            host,
            cache,
            entities,
        } = self;
        let id = component.component_id();
        let tracked = entities
            .get_mut(&entity)
            .ok_or(SyncError::UntrackedEntity(entity))?;
        if !tracked.components.contains(id) {
            return Err(SyncError::ComponentNotPresent {
                entity,
                component: id,
            });
        }

        let prev = tracked.components.clone();
        let next = prev.without(id);
        let prev_types = resolve(cache, behaviors, &prev);
        let next_types = resolve(cache, behaviors, &next);
        let mut report = DispatchReport::default();

        if let Some(proxy) = tracked.proxy.as_mut() {
            for (&behavior_id, behavior) in proxy.behaviors.iter_mut() {
                if interested(behaviors, behavior_id, id, CallbackStage::Remove) {
                    invoke(&mut report, behaviors, entity, behavior_id, CallbackStage::Remove, Some(id), || {
                        behavior.on_remove_component(entity, component)
                    });
                }
            }
        }

        for &behavior in prev_types.difference(&next_types) {
            detach(tracked, host, behaviors, entity, behavior, &mut report);
        }

        tracked.components = next.clone();
        tracked.data.remove(&id);

        let added: Vec<BehaviorTypeId> = next_types.difference(&prev_types).copied().collect();
        attach(tracked, host, behaviors, entity, &added, &next, &mut report);

        settle(tracked, host);
        Ok(report)
    }

    /// Forget `entity`, detaching every behavior and destroying its proxy.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<DispatchReport, SyncError> {
        let tracked = self
            .entities
            .remove(&entity)
            .ok_or(SyncError::UntrackedEntity(entity))?;
        let mut report = DispatchReport::default();
        if let Some(proxy) = tracked.proxy {
            for behavior_id in proxy.behavior_types() {
                self.host
                    .behavior_detached(entity, self.behaviors.name(behavior_id));
                report.detached.push(behavior_id);
            }
            self.host.destroy(entity);
            tracing::debug!(%entity, "proxy destroyed");
        }
        Ok(report)
    }

    /// Stop tracking entities left without components, destroying their
    /// dormant proxies. Preferred proxies are kept. Returns how many entities
    /// were released.
    ///
    /// For entities destroyed natively without a destroy notification.
    pub fn prune_empty(&mut self) -> usize {
        let Self { host, entities, .. } = self;
        let before = entities.len();
        entities.retain(|&entity, tracked| {
            let preferred = tracked.proxy.as_ref().is_some_and(EntityProxy::is_preferred);
            if !tracked.components.is_empty() || preferred {
                return true;
            }
            if tracked.proxy.is_some() {
                host.destroy(entity);
            }
            false
        });
        let released = before - entities.len();
        if released > 0 {
            tracing::debug!(released, "pruned empty entities");
        }
        released
    }

    /// Destroy every proxy and stop tracking all entities.
    pub fn clear(&mut self) {
        for (entity, tracked) in self.entities.drain() {
            if tracked.proxy.is_some() {
                self.host.destroy(entity);
            }
        }
        tracing::debug!("proxy pool cleared");
    }

    /// Mark `entity`'s proxy as caller-assigned, creating it if needed.
    /// Preferred proxies stay active with no behaviors attached.
    pub fn set_preferred_proxy(&mut self, entity: EntityId) {
        let tracked = self.entities.entry(entity).or_default();
        match tracked.proxy.as_mut() {
            Some(proxy) => {
                proxy.set_preferred(true);
                proxy.activate(&mut self.host);
            }
            None => {
                self.host.create(entity, &active_name(entity));
                tracked.proxy = Some(EntityProxy::new(entity, true));
            }
        }
    }

    /// Return `entity`'s proxy to normal pooling. Returns false if it was
    /// not preferred.
    pub fn clear_preferred_proxy(&mut self, entity: EntityId) -> bool {
        let Some(tracked) = self.entities.get_mut(&entity) else {
            return false;
        };
        let Some(proxy) = tracked.proxy.as_mut().filter(|p| p.is_preferred()) else {
            return false;
        };
        proxy.set_preferred(false);
        settle(tracked, &mut self.host);
        true
    }
}

fn resolve(
    cache: &mut ArchetypeCache<BehaviorSet>,
    behaviors: &SealedBehaviors,
    components: &ComponentIdSet,
) -> BehaviorSet {
    cache.get_or_insert_with(components, || behaviors.types(components))
}

fn interested(
    behaviors: &SealedBehaviors,
    behavior: BehaviorTypeId,
    component: ComponentId,
    stage: CallbackStage,
) -> bool {
    behaviors.descriptor(behavior).is_some_and(|d| match stage {
        CallbackStage::Init => d.init_interest().contains(component),
        CallbackStage::Update => d.update_interest().contains(component),
        CallbackStage::Remove => d.remove_interest().contains(component),
        CallbackStage::EntityInitialized => false,
    })
}

/// Attach `added` behaviors, replaying init for every id in `replay` each
/// one is init-interested in.
fn attach(
    tracked: &mut TrackedEntity,
    host: &mut impl ProxyHost,
    behaviors: &SealedBehaviors,
    entity: EntityId,
    added: &[BehaviorTypeId],
    replay: &ComponentIdSet,
    report: &mut DispatchReport,
) {
    if added.is_empty() {
        return;
    }
    let proxy = tracked.proxy.get_or_insert_with(|| {
        host.create(entity, &active_name(entity));
        tracing::debug!(%entity, "proxy created");
        EntityProxy::new(entity, false)
    });
    proxy.activate(host);

    for &behavior_id in added {
        let Some(descriptor) = behaviors.descriptor(behavior_id) else {
            continue;
        };
        let mut behavior: Box<dyn SyncBehavior> = descriptor.instantiate();
        host.behavior_attached(entity, descriptor.name());
        invoke(report, behaviors, entity, behavior_id, CallbackStage::EntityInitialized, None, || {
            behavior.on_entity_initialized(entity)
        });
        for other in replay.iter().filter(|id| descriptor.init_interest().contains(*id)) {
            if let Some(data) = tracked.data.get(&other) {
                invoke(report, behaviors, entity, behavior_id, CallbackStage::Init, Some(other), || {
                    behavior.on_init_component(entity, data)
                });
            }
        }
        proxy.behaviors.insert(behavior_id, behavior);
        report.attached.push(behavior_id);
    }
}

fn detach(
    tracked: &mut TrackedEntity,
    host: &mut impl ProxyHost,
    behaviors: &SealedBehaviors,
    entity: EntityId,
    behavior: BehaviorTypeId,
    report: &mut DispatchReport,
) {
    let Some(proxy) = tracked.proxy.as_mut() else {
        return;
    };
    if proxy.behaviors.remove(&behavior).is_some() {
        host.behavior_detached(entity, behaviors.name(behavior));
        report.detached.push(behavior);
    }
}

/// Deactivate a proxy left without behaviors unless it is preferred.
fn settle(tracked: &mut TrackedEntity, host: &mut impl ProxyHost) {
    if let Some(proxy) = tracked.proxy.as_mut() {
        if proxy.behavior_count() == 0 && !proxy.is_preferred() {
            proxy.deactivate(host);
        }
    }
}

/// Run one behavior callback, recording errors and panics instead of
/// propagating them.
fn invoke(
    report: &mut DispatchReport,
    behaviors: &SealedBehaviors,
    entity: EntityId,
    behavior: BehaviorTypeId,
    stage: CallbackStage,
    component: Option<ComponentId>,
    callback: impl FnOnce() -> anyhow::Result<()>,
) {
    let message = match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => format!("{err:#}"),
        Err(payload) => panic_message(payload),
    };
    let behavior_name = behaviors.name(behavior).to_string();
    tracing::warn!(
        %entity,
        behavior = %behavior_name,
        %stage,
        component = ?component,
        error = %message,
        "sync callback failed"
    );
    report.failures.push(CallbackFailure {
        behavior,
        behavior_name,
        stage,
        component,
        message,
    });
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
