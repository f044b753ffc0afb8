use crate::behavior::BehaviorTypeId;
use ecsact_runtime::ComponentId;
use std::fmt;

/// Lifecycle callback a failure happened in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallbackStage {
    EntityInitialized,
    Init,
    Update,
    Remove,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackStage::EntityInitialized => "entity initialized",
            CallbackStage::Init => "init",
            CallbackStage::Update => "update",
            CallbackStage::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// One behavior callback that returned an error or panicked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackFailure {
    pub behavior: BehaviorTypeId,
    pub behavior_name: String,
    pub stage: CallbackStage,
    pub component: Option<ComponentId>,
    pub message: String,
}

/// Outcome of applying one component event to an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attached: Vec<BehaviorTypeId>,
    pub detached: Vec<BehaviorTypeId>,
    pub failures: Vec<CallbackFailure>,
}

impl DispatchReport {
    /// Whether every callback succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether the behavior set changed.
    pub fn changed(&self) -> bool {
        !self.attached.is_empty() || !self.detached.is_empty()
    }
}
