//! Symbol resolution for native runtimes.
//!
//! Missing exports are expected: older or partial runtime builds only
//! implement some ABI modules. Resolution never fails; each facade method
//! reports [`RuntimeError::MissingMethod`] when its pointer is absent.

use crate::error::{LoadError, RuntimeError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::c_void;
use std::fmt;
use std::mem::{size_of, transmute_copy};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Anything that can hand out exported function pointers by name.
pub trait SymbolSource {
    fn resolve(&self, name: &str) -> Option<NonNull<c_void>>;

    /// Human readable origin, for logs.
    fn describe(&self) -> String;
}

/// Runtime library opened from disk.
pub struct NativeLibrary {
    path: PathBuf,
    library: libloading::Library,
}

impl NativeLibrary {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(LoadError::NotFound { path });
        }
        // SAFETY: loading a runtime library runs its initializers; callers
        // opt into this by pointing us at an Ecsact runtime build.
        let library = unsafe { libloading::Library::new(&path) }.map_err(|source| {
            LoadError::Open {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Self { path, library })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SymbolSource for NativeLibrary {
    fn resolve(&self, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is read as an opaque address; it is only called
        // through the typed pointer matching its C declaration.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Explicit name -> address table.
///
/// Used for runtimes linked into the host binary and for mock runtimes in
/// tests.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    label: String,
    symbols: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            symbols: HashMap::new(),
        }
    }

    /// Builder-style insert. `address` is usually `some_fn as *const ()`.
    pub fn with(mut self, name: impl Into<String>, address: *const ()) -> Self {
        self.insert(name, address);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, address: *const ()) {
        self.symbols.insert(name.into(), address as usize);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.symbols.remove(name).is_some()
    }
}

impl SymbolSource for SymbolTable {
    fn resolve(&self, name: &str) -> Option<NonNull<c_void>> {
        self.symbols
            .get(name)
            .and_then(|&address| NonNull::new(address as *mut c_void))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// ABI module a symbol belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbiModule {
    Core,
    Dynamic,
    Meta,
    Serialize,
    Static,
    Async,
    Wasm,
}

impl fmt::Display for AbiModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AbiModule::Core => "core",
            AbiModule::Dynamic => "dynamic",
            AbiModule::Meta => "meta",
            AbiModule::Serialize => "serialize",
            AbiModule::Static => "static",
            AbiModule::Async => "async",
            AbiModule::Wasm => "wasm",
        };
        f.write_str(name)
    }
}

/// Symbols that resolved, grouped by module.
#[derive(Clone, Debug, Default)]
pub struct LoadedMethods {
    modules: BTreeMap<AbiModule, BTreeSet<&'static str>>,
}

impl LoadedMethods {
    pub fn contains(&self, name: &str) -> bool {
        self.modules.values().any(|set| set.contains(name))
    }

    pub fn module(&self, module: AbiModule) -> impl Iterator<Item = &'static str> + '_ {
        self.modules
            .get(&module)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AbiModule, &'static str)> + '_ {
        self.modules
            .iter()
            .flat_map(|(module, set)| set.iter().map(move |name| (*module, *name)))
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&mut self) {
        self.modules.clear();
    }

    fn insert(&mut self, module: AbiModule, name: &'static str) {
        self.modules.entry(module).or_default().insert(name);
    }
}

/// A possibly-unresolved native function pointer.
#[derive(Copy, Clone)]
pub struct NativeFn<F: Copy> {
    name: &'static str,
    ptr: Option<F>,
}

impl<F: Copy> NativeFn<F> {
    pub(crate) const fn missing(name: &'static str) -> Self {
        Self { name, ptr: None }
    }

    /// Resolved pointer, or `MissingMethod` naming the symbol.
    #[inline]
    pub fn get(&self) -> Result<F, RuntimeError> {
        self.ptr.ok_or(RuntimeError::MissingMethod(self.name))
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.ptr.is_some()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<F: Copy> fmt::Debug for NativeFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Resolves symbols for one module and records what was found.
pub(crate) struct Resolver<'a> {
    source: &'a dyn SymbolSource,
    loaded: &'a mut LoadedMethods,
    module: AbiModule,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        source: &'a dyn SymbolSource,
        loaded: &'a mut LoadedMethods,
        module: AbiModule,
    ) -> Self {
        Self {
            source,
            loaded,
            module,
        }
    }

    /// # Safety
    /// `F` must be an `unsafe extern "C" fn` type matching the C declaration
    /// of `name`.
    pub(crate) unsafe fn load<F: Copy>(&mut self, name: &'static str) -> NativeFn<F> {
        debug_assert_eq!(size_of::<F>(), size_of::<*mut c_void>());
        let ptr = self.source.resolve(name).map(|address| {
            let raw = address.as_ptr();
            transmute_copy::<*mut c_void, F>(&raw)
        });
        if ptr.is_some() {
            tracing::debug!(module = %self.module, symbol = name, "resolved native symbol");
            self.loaded.insert(self.module, name);
        }
        NativeFn { name, ptr }
    }
}
