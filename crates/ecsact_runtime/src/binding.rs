// binding.rs - Locating the owning runtime from native callbacks
//
// Native system execution calls back with nothing but an opaque context
// pointer. Each runtime instance registers a dispatcher in a process-wide
// table and receives a generation-tagged token; `execute_systems` publishes
// that token in a single slot for the duration of the native call. Native
// worker threads may invoke callbacks, so the slot is process-wide rather
// than thread-local, and only one execution may be in flight at a time.

use crate::context::SystemExecutionContext;
use crate::error::RuntimeError;
use crate::ffi::RawContext;
use crate::modules::dynamic_api::DynamicFns;
use crate::types::{SystemId, TypeRegistry};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Host implementation of one Ecsact system.
pub(crate) type SystemImpl =
    dyn Fn(&SystemExecutionContext<'_>) -> Result<(), RuntimeError> + Send + Sync;

/// Handle identifying a runtime instance in the dispatcher table.
///
/// Format: [32-bit generation | 32-bit index]. Generations start at 1 so a
/// live token is never zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeToken {
    index: u32,
    generation: u32,
}

impl RuntimeToken {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for RuntimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Everything a native callback needs to reach host code.
pub(crate) struct Dispatcher {
    pub(crate) context: DynamicFns,
    pub(crate) types: Arc<TypeRegistry>,
    systems: RwLock<HashMap<SystemId, Arc<SystemImpl>>>,
}

impl Dispatcher {
    pub(crate) fn new(context: DynamicFns, types: Arc<TypeRegistry>) -> Self {
        Self {
            context,
            types,
            systems: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn set_system(&self, id: SystemId, implementation: Arc<SystemImpl>) {
        self.systems
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, implementation);
    }

    pub(crate) fn clear_system(&self, id: SystemId) -> bool {
        self.systems
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub(crate) fn system(&self, id: SystemId) -> Option<Arc<SystemImpl>> {
        self.systems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

struct Slot {
    generation: u32,
    dispatcher: Option<Arc<Dispatcher>>,
}

#[derive(Default)]
struct DispatcherTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

static TABLE: Lazy<RwLock<DispatcherTable>> = Lazy::new(|| RwLock::new(DispatcherTable::default()));

const NO_RUNTIME: u64 = 0;
static CURRENT: AtomicU64 = AtomicU64::new(NO_RUNTIME);

pub(crate) fn register(dispatcher: Arc<Dispatcher>) -> RuntimeToken {
    let mut table = TABLE.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(index) = table.free.pop() {
        let slot = &mut table.slots[index as usize];
        slot.dispatcher = Some(dispatcher);
        return RuntimeToken {
            index,
            generation: slot.generation,
        };
    }
    let index = table.slots.len() as u32;
    table.slots.push(Slot {
        generation: 1,
        dispatcher: Some(dispatcher),
    });
    RuntimeToken {
        index,
        generation: 1,
    }
}

/// Drop the dispatcher for `token`; stale copies of the token stop resolving.
pub(crate) fn unregister(token: RuntimeToken) -> bool {
    let mut table = TABLE.write().unwrap_or_else(PoisonError::into_inner);
    let Some(slot) = table.slots.get_mut(token.index as usize) else {
        return false;
    };
    if slot.generation != token.generation || slot.dispatcher.is_none() {
        return false;
    }
    slot.dispatcher = None;
    slot.generation = slot.generation.wrapping_add(1).max(1);
    table.free.push(token.index);
    true
}

pub(crate) fn lookup(token: RuntimeToken) -> Option<Arc<Dispatcher>> {
    let table = TABLE.read().unwrap_or_else(PoisonError::into_inner);
    let slot = table.slots.get(token.index as usize)?;
    if slot.generation != token.generation {
        return None;
    }
    slot.dispatcher.clone()
}

/// Runtime whose `execute_systems` call is currently in flight, if any.
pub fn current_runtime() -> Option<RuntimeToken> {
    match CURRENT.load(Ordering::Acquire) {
        NO_RUNTIME => None,
        bits => Some(RuntimeToken::from_bits(bits)),
    }
}

/// Publishes a runtime token for one native execute call.
///
/// Dropping the guard clears the slot on every exit path, unwinding included.
pub(crate) struct ExecutionGuard {
    token: RuntimeToken,
}

impl ExecutionGuard {
    pub(crate) fn bind(token: RuntimeToken) -> Result<Self, RuntimeError> {
        CURRENT
            .compare_exchange(
                NO_RUNTIME,
                token.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| RuntimeError::ReentrantExecution)?;
        Ok(Self { token })
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        let released = CURRENT.compare_exchange(
            self.token.to_bits(),
            NO_RUNTIME,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug_assert!(released.is_ok(), "execution binding replaced while in flight");
    }
}

/// `ecsact_system_execution_impl` installed for every host system.
pub(crate) unsafe extern "C" fn system_execution_trampoline(context: *mut RawContext) {
    match panic::catch_unwind(AssertUnwindSafe(|| dispatch_system(context))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "system implementation failed"),
        Err(_) => tracing::error!("system implementation panicked"),
    }
}

fn dispatch_system(context: *mut RawContext) -> Result<(), RuntimeError> {
    let raw = NonNull::new(context).ok_or(RuntimeError::NoActiveExecution)?;
    let token = current_runtime().ok_or(RuntimeError::NoActiveExecution)?;
    let dispatcher = lookup(token).ok_or(RuntimeError::NoActiveExecution)?;
    let context = SystemExecutionContext::new(&dispatcher, raw);
    let system_id = context.id()?;
    let implementation = dispatcher
        .system(system_id)
        .ok_or(RuntimeError::MissingSystemImpl(system_id))?;
    implementation(&context)
}

/// Serializes unit tests that touch the process-wide execution slot.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            DynamicFns::missing(),
            Arc::new(TypeRegistry::new()),
        ))
    }

    #[test]
    fn token_bits_round_trip() {
        let token = RuntimeToken {
            index: 7,
            generation: 3,
        };
        assert_eq!(RuntimeToken::from_bits(token.to_bits()), token);
        assert_ne!(token.to_bits(), NO_RUNTIME);
    }

    #[test]
    fn stale_tokens_stop_resolving() {
        let token = register(dispatcher());
        assert!(lookup(token).is_some());
        assert!(unregister(token));
        assert!(lookup(token).is_none());
        assert!(!unregister(token));

        let reused = register(dispatcher());
        assert!(lookup(token).is_none());
        assert!(lookup(reused).is_some());
        unregister(reused);
    }

    #[test]
    fn guard_rejects_nested_binding_and_clears_on_drop() {
        let _serial = TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let token = register(dispatcher());
        {
            let _guard = ExecutionGuard::bind(token).unwrap();
            assert_eq!(current_runtime(), Some(token));
            assert!(matches!(
                ExecutionGuard::bind(token),
                Err(RuntimeError::ReentrantExecution)
            ));
        }
        assert_eq!(current_runtime(), None);
        unregister(token);
    }

    #[test]
    fn guard_clears_when_unwinding() {
        let _serial = TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let token = register(dispatcher());
        let result = panic::catch_unwind(|| {
            let _guard = ExecutionGuard::bind(token).unwrap();
            panic!("native call trapped");
        });
        assert!(result.is_err());
        assert_eq!(current_runtime(), None);
        unregister(token);
    }

    #[test]
    fn callbacks_without_a_bound_runtime_fail() {
        let _serial = TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut fake = 0u8;
        let err = dispatch_system(&mut fake as *mut u8 as *mut RawContext).unwrap_err();
        assert!(matches!(err, RuntimeError::NoActiveExecution));
    }
}
