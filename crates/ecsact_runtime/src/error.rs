use crate::types::{ActionId, ComponentId, EntityId, SystemId};
use std::ffi::NulError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by facade calls into the native runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("native method `{0}` is not available in the loaded runtime")]
    MissingMethod(&'static str),

    #[error("entity is invalid")]
    EntityInvalid,

    #[error("constraint broken")]
    ConstraintBroken,

    #[error("`{function}` returned unknown error code {code}")]
    UnknownErrorCode { function: &'static str, code: i32 },

    #[error("systems are already executing on this process")]
    ReentrantExecution,

    #[error("no runtime is bound to the current system execution")]
    NoActiveExecution,

    #[error("no implementation registered for system {0}")]
    MissingSystemImpl(SystemId),

    #[error("native runtime rejected the implementation for system {0}")]
    SystemImplRejected(SystemId),

    #[error("component {component} is not present on entity {entity}")]
    ComponentNotFound {
        entity: EntityId,
        component: ComponentId,
    },

    #[error("generate requires at least one component")]
    EmptyGenerate,

    #[error("generate received component {0} more than once")]
    DuplicateGenerateComponent(ComponentId),

    #[error("{what} failed for id {id}: native returned {code}")]
    Serialization {
        what: &'static str,
        id: i32,
        code: i32,
    },

    #[error("string passed to the runtime contains a nul byte")]
    InvalidName(#[from] NulError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Wasm(#[from] WasmError),
}

/// Failure to open a runtime library.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("runtime library {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("failed to open runtime library {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// Component or action payloads that cannot be mapped to a registered type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("component id {0} is not registered")]
    UnknownComponent(ComponentId),

    #[error("action id {0} is not registered")]
    UnknownAction(ActionId),

    #[error("payload for id {id} expects {expected} bytes but received {actual} bytes")]
    SizeMismatch {
        id: i32,
        expected: usize,
        actual: usize,
    },

    #[error("payload holds id {actual} but id {expected} was requested")]
    IdMismatch { expected: i32, actual: i32 },

    #[error("id {id} re-registered with a different layout ({previous} vs {requested})")]
    LayoutConflict {
        id: i32,
        previous: String,
        requested: String,
    },

    #[error("invalid payload layout: size {size}, align {align}")]
    InvalidLayout { size: usize, align: usize },

    #[error("{len} {what} exceed the native i32 count range")]
    CountOverflow { what: &'static str, len: usize },
}

/// Misuse of an [`ExecutionOptions`](crate::ExecutionOptions) batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("execution options are allocated; free them before adding more work")]
    Sealed,

    #[error("unknown placeholder entity {0}")]
    UnknownPlaceholder(i32),

    #[error("too many entries for a native execution options array")]
    TooManyEntries,

    #[error("native allocation of {size} bytes (align {align}) failed")]
    AllocationFailed { size: usize, align: usize },
}

/// Error codes reported by `ecsactsi_wasm_load_file`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WasmError {
    #[error("wasm file could not be opened")]
    OpenFail,
    #[error("wasm file could not be read")]
    ReadFail,
    #[error("wasm module failed to compile")]
    CompileFail,
    #[error("wasm module failed to instantiate")]
    InstantiateFail,
    #[error("wasm export not found")]
    ExportNotFound,
    #[error("wasm export has an invalid signature")]
    ExportInvalid,
    #[error("wasm load failed with unknown code {0}")]
    Unknown(i32),
}

impl WasmError {
    pub(crate) fn from_code(code: i32) -> Result<(), WasmError> {
        match code {
            0 => Ok(()),
            1 => Err(Self::OpenFail),
            2 => Err(Self::ReadFail),
            3 => Err(Self::CompileFail),
            4 => Err(Self::InstantiateFail),
            5 => Err(Self::ExportNotFound),
            6 => Err(Self::ExportInvalid),
            other => Err(Self::Unknown(other)),
        }
    }
}

/// Failure to read runtime settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Map `ecsact_add_error` / `ecsact_update_error` / `ecsact_execute_systems_error`.
pub(crate) fn check_status(function: &'static str, code: i32) -> Result<(), RuntimeError> {
    match code {
        0 => Ok(()),
        1 => Err(RuntimeError::EntityInvalid),
        2 => Err(RuntimeError::ConstraintBroken),
        code => Err(RuntimeError::UnknownErrorCode { function, code }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_typed_errors() {
        assert!(check_status("ecsact_add_component", 0).is_ok());
        assert!(matches!(
            check_status("ecsact_add_component", 1),
            Err(RuntimeError::EntityInvalid)
        ));
        assert!(matches!(
            check_status("ecsact_update_component", 2),
            Err(RuntimeError::ConstraintBroken)
        ));
        assert!(matches!(
            check_status("ecsact_execute_systems", 9),
            Err(RuntimeError::UnknownErrorCode { code: 9, .. })
        ));
    }

    #[test]
    fn wasm_codes() {
        assert_eq!(WasmError::from_code(0), Ok(()));
        assert_eq!(WasmError::from_code(5), Err(WasmError::ExportNotFound));
        assert_eq!(WasmError::from_code(42), Err(WasmError::Unknown(42)));
    }
}
