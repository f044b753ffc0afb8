//! Dynamic module: host system implementations and context accessors.

use crate::binding::{system_execution_trampoline, Dispatcher};
use crate::context::SystemExecutionContext;
use crate::error::RuntimeError;
use crate::ffi::*;
use crate::loader::AbiModule;
use crate::types::SystemId;
use std::sync::Arc;

native_fns! {
    pub struct DynamicFns: AbiModule::Dynamic {
        set_system_execution_impl: "ecsact_set_system_execution_impl" => SetSystemExecutionImplFn,
        context_action: "ecsact_system_execution_context_action" => ContextActionFn,
        context_add: "ecsact_system_execution_context_add" => ContextWriteFn,
        context_remove: "ecsact_system_execution_context_remove" => ContextRemoveFn,
        context_get: "ecsact_system_execution_context_get" => ContextReadFn,
        context_update: "ecsact_system_execution_context_update" => ContextWriteFn,
        context_has: "ecsact_system_execution_context_has" => ContextHasFn,
        context_generate: "ecsact_system_execution_context_generate" => ContextGenerateFn,
        context_parent: "ecsact_system_execution_context_parent" => ContextParentFn,
        context_same: "ecsact_system_execution_context_same" => ContextSameFn,
        context_entity: "ecsact_system_execution_context_entity" => ContextEntityFn,
        context_id: "ecsact_system_execution_context_id" => ContextIdFn,
    }
}

/// Dynamic facade borrowed from a runtime.
pub struct Dynamic<'r> {
    fns: &'r DynamicFns,
    dispatcher: &'r Arc<Dispatcher>,
}

impl<'r> Dynamic<'r> {
    pub(crate) fn new(fns: &'r DynamicFns, dispatcher: &'r Arc<Dispatcher>) -> Self {
        Self { fns, dispatcher }
    }

    /// Route native execution of `system_id` to `implementation`.
    ///
    /// Replaces any implementation previously set for the same system.
    pub fn set_system_execution_impl<F>(
        &self,
        system_id: SystemId,
        implementation: F,
    ) -> Result<(), RuntimeError>
    where
        F: Fn(&SystemExecutionContext<'_>) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        let f = self.fns.set_system_execution_impl.get()?;
        self.dispatcher.set_system(system_id, Arc::new(implementation));
        let accepted = unsafe { f(system_id, Some(system_execution_trampoline)) };
        if !accepted {
            self.dispatcher.clear_system(system_id);
            return Err(RuntimeError::SystemImplRejected(system_id));
        }
        tracing::debug!(system_id, "system implementation installed");
        Ok(())
    }

    /// Unset the implementation for `system_id`. Returns whether one was set.
    pub fn clear_system_execution_impl(&self, system_id: SystemId) -> Result<bool, RuntimeError> {
        let f = self.fns.set_system_execution_impl.get()?;
        unsafe { f(system_id, None) };
        Ok(self.dispatcher.clear_system(system_id))
    }

    pub fn has_system_execution_impl(&self, system_id: SystemId) -> bool {
        self.dispatcher.system(system_id).is_some()
    }
}
