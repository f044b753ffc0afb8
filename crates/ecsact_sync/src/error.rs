use ecsact_runtime::{ComponentId, EntityId};
use thiserror::Error;

/// Misuse of an [`EntityProxyPool`](crate::EntityProxyPool).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("entity {0} has no tracked components")]
    UntrackedEntity(EntityId),

    #[error("component {component} was never initialized on entity {entity}")]
    ComponentNotPresent {
        entity: EntityId,
        component: ComponentId,
    },
}

/// Errors that can occur while registering a behavior type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("behavior '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("behavior '{name}' does not reference any components")]
    EmptyInterest { name: String },
}
