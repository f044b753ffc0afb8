// runtime.rs - One loaded Ecsact runtime
//
// Owns the symbol source, every module's function table, the type registry
// and the event bus. Facades are borrowed views over these. Unloading resets
// every table to "missing" before the library handle is released, so a
// facade call after unload reports MissingMethod rather than jumping into
// unmapped code.

use crate::binding::{self, Dispatcher, RuntimeToken};
use crate::error::LoadError;
use crate::events::EventBus;
use crate::loader::{LoadedMethods, NativeLibrary, SymbolSource};
use crate::modules::async_api::AsyncFns;
use crate::modules::core_api::CoreFns;
use crate::modules::dynamic_api::DynamicFns;
use crate::modules::serialize_api::SerializeFns;
use crate::modules::{Async, Core, Dynamic, Meta, Serialize, Static, Wasm};
use crate::types::TypeRegistry;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub struct EcsactRuntime {
    source: Option<Box<dyn SymbolSource>>,
    loaded: LoadedMethods,
    core: CoreFns,
    dynamic: DynamicFns,
    meta: Meta,
    serialize: SerializeFns,
    statics: Static,
    async_fns: AsyncFns,
    wasm: Wasm,
    types: Arc<TypeRegistry>,
    events: EventBus,
    dispatcher: Arc<Dispatcher>,
    token: RuntimeToken,
}

impl EcsactRuntime {
    /// Open a runtime library from disk.
    pub fn load(path: impl AsRef<Path>, types: TypeRegistry) -> Result<Self, LoadError> {
        let library = NativeLibrary::open(path)?;
        Ok(Self::from_source(Box::new(library), types))
    }

    /// Bind to an already available symbol source, such as a statically
    /// linked runtime.
    pub fn from_source(source: Box<dyn SymbolSource>, types: TypeRegistry) -> Self {
        let mut loaded = LoadedMethods::default();
        let core = CoreFns::resolve(source.as_ref(), &mut loaded);
        let dynamic = DynamicFns::resolve(source.as_ref(), &mut loaded);
        let meta = Meta::resolve(source.as_ref(), &mut loaded);
        let serialize = SerializeFns::resolve(source.as_ref(), &mut loaded);
        let statics = Static::resolve(source.as_ref(), &mut loaded);
        let async_fns = AsyncFns::resolve(source.as_ref(), &mut loaded);
        let wasm = Wasm::resolve(source.as_ref(), &mut loaded);

        let types = Arc::new(types);
        let dispatcher = Arc::new(Dispatcher::new(dynamic, types.clone()));
        let token = binding::register(dispatcher.clone());

        tracing::info!(
            source = %source.describe(),
            symbols = loaded.len(),
            %token,
            "ecsact runtime loaded"
        );

        Self {
            source: Some(source),
            loaded,
            core,
            dynamic,
            meta,
            serialize,
            statics,
            async_fns,
            wasm,
            types,
            events: EventBus::new(),
            dispatcher,
            token,
        }
    }

    /// Release the library. Safe to call more than once.
    pub fn unload(&mut self) {
        let Some(source) = self.source.take() else {
            return;
        };
        self.core = CoreFns::missing();
        self.dynamic = DynamicFns::missing();
        self.meta = Meta::missing();
        self.serialize = SerializeFns::missing();
        self.statics = Static::missing();
        self.async_fns = AsyncFns::missing();
        self.wasm = Wasm::missing();
        self.loaded.clear();

        binding::unregister(self.token);
        self.dispatcher = Arc::new(Dispatcher::new(DynamicFns::missing(), self.types.clone()));

        tracing::info!(source = %source.describe(), "ecsact runtime unloaded");
        drop(source);
    }

    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    /// Where the symbols came from, while loaded.
    pub fn describe(&self) -> Option<String> {
        self.source.as_ref().map(|source| source.describe())
    }

    pub fn loaded_methods(&self) -> &LoadedMethods {
        &self.loaded
    }

    pub fn token(&self) -> RuntimeToken {
        self.token
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn core(&mut self) -> Core<'_> {
        Core::new(&self.core, &mut self.events, &self.types, self.token)
    }

    pub fn dynamic(&self) -> Dynamic<'_> {
        Dynamic::new(&self.dynamic, &self.dispatcher)
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn serialize(&self) -> Serialize<'_> {
        Serialize::new(&self.serialize, &self.types)
    }

    pub fn statics(&self) -> &Static {
        &self.statics
    }

    pub fn async_module(&mut self) -> Async<'_> {
        Async::new(&self.async_fns, &mut self.events, &self.types)
    }

    pub fn wasm(&self) -> &Wasm {
        &self.wasm
    }
}

impl Drop for EcsactRuntime {
    fn drop(&mut self) {
        self.unload();
    }
}

impl fmt::Debug for EcsactRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcsactRuntime")
            .field("source", &self.describe())
            .field("symbols", &self.loaded.len())
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::loader::{AbiModule, SymbolTable};
    use crate::types::RegistryId;
    use std::ffi::c_char;

    unsafe extern "C" fn create_registry(_name: *const c_char) -> RegistryId {
        RegistryId::from_raw(3)
    }

    unsafe extern "C" fn count_packages() -> i32 {
        2
    }

    fn runtime() -> EcsactRuntime {
        let table = SymbolTable::new("unit")
            .with("ecsact_create_registry", create_registry as *const ())
            .with("ecsact_meta_count_packages", count_packages as *const ());
        EcsactRuntime::from_source(Box::new(table), TypeRegistry::new())
    }

    #[test]
    fn only_present_symbols_are_callable() {
        let mut runtime = runtime();
        assert_eq!(runtime.core().create_registry("default").unwrap(), RegistryId::from_raw(3));
        assert_eq!(runtime.meta().count_packages().unwrap(), 2);
        assert!(matches!(
            runtime.core().create_entity(RegistryId::from_raw(3)),
            Err(RuntimeError::MissingMethod("ecsact_create_entity"))
        ));
        assert!(matches!(
            runtime.wasm().reset(),
            Err(RuntimeError::MissingMethod("ecsactsi_wasm_reset"))
        ));
    }

    #[test]
    fn loaded_methods_are_grouped_by_module() {
        let runtime = runtime();
        let loaded = runtime.loaded_methods();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.module(AbiModule::Core).collect::<Vec<_>>(), ["ecsact_create_registry"]);
        assert_eq!(
            loaded.module(AbiModule::Meta).collect::<Vec<_>>(),
            ["ecsact_meta_count_packages"]
        );
    }

    #[test]
    fn unload_is_idempotent_and_disables_every_method() {
        let mut runtime = runtime();
        let token = runtime.token();
        runtime.unload();
        runtime.unload();

        assert!(!runtime.is_loaded());
        assert!(runtime.loaded_methods().is_empty());
        assert!(binding::lookup(token).is_none());
        assert!(matches!(
            runtime.core().create_registry("default"),
            Err(RuntimeError::MissingMethod("ecsact_create_registry"))
        ));
        assert!(matches!(
            runtime.meta().count_packages(),
            Err(RuntimeError::MissingMethod("ecsact_meta_count_packages"))
        ));
    }
}
