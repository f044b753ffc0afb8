//! Wires an [`EntityProxyPool`] to a runtime's [`EventBus`].

use crate::error::SyncError;
use crate::pool::EntityProxyPool;
use crate::proxy::{NullHost, ProxyHost};
use crate::report::CallbackFailure;
use ecsact_runtime::{ComponentEvent, ComponentEventKind, EntityId, EventBus, SubscriptionId};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

#[derive(Default)]
struct Outcomes {
    errors: Vec<SyncError>,
    failures: Vec<CallbackFailure>,
}

/// Feeds every component event from an [`EventBus`] into a pool, and drops
/// entities from the pool when the runtime reports them destroyed.
///
/// Event delivery has no return channel, so pool errors and callback
/// failures are queued here until the caller takes them.
pub struct SyncBridge<H: ProxyHost + 'static = NullHost> {
    pool: Rc<RefCell<EntityProxyPool<H>>>,
    outcomes: Rc<RefCell<Outcomes>>,
    subscriptions: Vec<SubscriptionId>,
}

impl<H: ProxyHost + 'static> SyncBridge<H> {
    pub fn attach(pool: EntityProxyPool<H>, events: &mut EventBus) -> Self {
        let pool = Rc::new(RefCell::new(pool));
        let outcomes = Rc::new(RefCell::new(Outcomes::default()));
        let mut subscriptions: Vec<SubscriptionId> = [
            ComponentEventKind::Init,
            ComponentEventKind::Update,
            ComponentEventKind::Remove,
        ]
        .into_iter()
        .map(|kind| {
            let pool = Rc::clone(&pool);
            let outcomes = Rc::clone(&outcomes);
            events.on_any(kind, move |event| forward(&pool, &outcomes, event))
        })
        .collect();

        let destroyed_pool = Rc::clone(&pool);
        subscriptions.push(events.on_entity_destroyed(move |entity| forget(&destroyed_pool, entity)));
        tracing::debug!("sync bridge attached");

        Self {
            pool,
            outcomes,
            subscriptions,
        }
    }

    pub fn pool(&self) -> Ref<'_, EntityProxyPool<H>> {
        self.pool.borrow()
    }

    pub fn pool_mut(&self) -> RefMut<'_, EntityProxyPool<H>> {
        self.pool.borrow_mut()
    }

    /// Drain the pool errors collected since the last call.
    pub fn take_errors(&self) -> Vec<SyncError> {
        std::mem::take(&mut self.outcomes.borrow_mut().errors)
    }

    /// Drain the behavior callback failures collected since the last call.
    pub fn take_failures(&self) -> Vec<CallbackFailure> {
        std::mem::take(&mut self.outcomes.borrow_mut().failures)
    }

    /// Unsubscribe from `events` and hand the pool back.
    ///
    /// `events` must be the bus passed to [`attach`](Self::attach); with any
    /// other bus the subscriptions stay alive and `None` is returned.
    pub fn detach(self, events: &mut EventBus) -> Option<EntityProxyPool<H>> {
        for id in &self.subscriptions {
            events.unsubscribe(*id);
        }
        tracing::debug!("sync bridge detached");
        Rc::try_unwrap(self.pool).ok().map(RefCell::into_inner)
    }
}

fn forget<H: ProxyHost>(pool: &RefCell<EntityProxyPool<H>>, entity: EntityId) {
    let Ok(mut pool) = pool.try_borrow_mut() else {
        tracing::error!(%entity, "entity destroyed while the proxy pool is busy; dropped");
        return;
    };
    // entities that never held a component were never tracked
    if pool.destroy_entity(entity).is_ok() {
        tracing::debug!(%entity, "stopped tracking destroyed entity");
    }
}

fn forward<H: ProxyHost>(
    pool: &RefCell<EntityProxyPool<H>>,
    outcomes: &RefCell<Outcomes>,
    event: &ComponentEvent<'_>,
) {
    let Ok(mut pool) = pool.try_borrow_mut() else {
        tracing::error!(
            entity = %event.entity,
            component = event.component_id(),
            kind = %event.kind,
            "component event raised while the proxy pool is busy; dropped"
        );
        return;
    };
    let result = match event.kind {
        ComponentEventKind::Init => Ok(pool.init_component(event.entity, event.component)),
        ComponentEventKind::Update => pool.update_component(event.entity, event.component),
        ComponentEventKind::Remove => pool.remove_component(event.entity, event.component),
    };
    let mut outcomes = outcomes.borrow_mut();
    match result {
        Ok(report) => outcomes.failures.extend(report.failures),
        Err(err) => {
            tracing::warn!(error = %err, kind = %event.kind, "sync event rejected");
            outcomes.errors.push(err);
        }
    }
}
