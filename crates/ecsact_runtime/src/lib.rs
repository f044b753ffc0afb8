//! Ecsact Runtime Binding
//!
//! Host-side binding for native runtimes implementing the Ecsact C ABI:
//! - Dynamic library loading with tolerant symbol resolution
//! - Typed module facades (core, dynamic, meta, serialize, static, async, wasm)
//! - System execution context marshaling and callback dispatch
//! - Execution options batching in native memory
//!
//! Every native entry point is optional. Calling a facade method whose symbol
//! was not exported by the loaded library returns
//! [`RuntimeError::MissingMethod`] instead of touching a null pointer.

#[macro_use]
mod macros;

mod binding;
mod context;
mod error;
mod events;
pub mod ffi;
mod loader;
pub mod modules;
mod options;
mod payload;
mod runtime;
mod settings;
mod types;

pub use binding::{current_runtime, RuntimeToken};
pub use context::SystemExecutionContext;
pub use error::{LoadError, MarshalError, OptionsError, RuntimeError, SettingsError, WasmError};
pub use events::{ComponentEvent, ComponentEventKind, EventBus, SubscriptionId};
pub use loader::{AbiModule, LoadedMethods, NativeFn, NativeLibrary, SymbolSource, SymbolTable};
pub use options::{ExecutionOptions, NativeAllocator, PlaceholderId, SystemAllocator};
pub use payload::{ActionData, ComponentData};
pub use runtime::EcsactRuntime;
pub use settings::RuntimeSettings;
pub use types::{
    Action, ActionId, Component, ComponentId, EntityId, RegistryId, SystemId, TypeKind,
    TypeMeta, TypeRegistry,
};

pub use bytemuck;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
