//! Entity Sync
//!
//! Keeps host-side proxy objects in step with ECS entities:
//! - Behavior types declare required and lifecycle-interested component ids
//! - `Types(component set)` decides which behaviors apply to an entity
//! - Component init/update/remove apply only the difference in behavior sets
//!
//! Registration happens once on a [`BehaviorRegistry`]; sealing it yields the
//! read-only [`SealedBehaviors`] the [`EntityProxyPool`] resolves against.

mod behavior;
mod bridge;
mod cache;
mod component_set;
mod error;
mod pool;
mod proxy;
mod registry;
mod report;

pub use behavior::{BehaviorDescriptor, BehaviorTypeId, SyncBehavior};
pub use bridge::SyncBridge;
pub use cache::ArchetypeCache;
pub use component_set::ComponentIdSet;
pub use error::{RegistrationError, SyncError};
pub use pool::EntityProxyPool;
pub use proxy::{EntityProxy, NullHost, ProxyHost};
pub use registry::{BehaviorRegistry, BehaviorSet, SealedBehaviors};
pub use report::{CallbackFailure, CallbackStage, DispatchReport};
