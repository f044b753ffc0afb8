// types.rs - Ids and runtime type registration
//
// Components and actions are identified by the i32 ids the schema compiler
// assigns, not by Rust TypeIds. The registry maps those ids to payload
// layouts so type-erased data can cross the native boundary safely.

use crate::error::MarshalError;
use crate::payload::{ActionData, ComponentData};
use std::collections::HashMap;
use std::fmt;
use std::mem::{align_of, size_of};

pub type ComponentId = i32;
pub type ActionId = i32;
pub type SystemId = i32;

/// Entity handle assigned by the native runtime.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(i32);

impl EntityId {
    pub const fn from_raw(id: i32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry handle assigned by the native runtime.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryId(i32);

impl RegistryId {
    pub const fn from_raw(id: i32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of payload a [`TypeMeta`] describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Component,
    Action,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Component => f.write_str("component"),
            TypeKind::Action => f.write_str("action"),
        }
    }
}

/// Metadata describing a payload's memory layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeMeta {
    pub id: i32,
    pub name: String,
    pub kind: TypeKind,
    pub size: usize,
    pub align: usize,
}

impl TypeMeta {
    fn layout_string(&self) -> String {
        format!("size {}, align {}", self.size, self.align)
    }
}

/// POD component generated from an Ecsact schema.
///
/// Implementors must match the native layout exactly; `bytemuck::Pod`
/// rules out padding and non-POD fields.
pub trait Component: bytemuck::Pod + Send + Sync {
    /// Schema-assigned component id.
    const ID: ComponentId;

    /// Fully qualified schema name, for diagnostics.
    const NAME: &'static str;

    fn meta() -> TypeMeta {
        TypeMeta {
            id: Self::ID,
            name: Self::NAME.to_string(),
            kind: TypeKind::Component,
            size: size_of::<Self>(),
            align: align_of::<Self>(),
        }
    }
}

/// POD action generated from an Ecsact schema.
pub trait Action: bytemuck::Pod + Send + Sync {
    /// Schema-assigned action id.
    const ID: ActionId;

    /// Fully qualified schema name, for diagnostics.
    const NAME: &'static str;

    fn meta() -> TypeMeta {
        TypeMeta {
            id: Self::ID,
            name: Self::NAME.to_string(),
            kind: TypeKind::Action,
            size: size_of::<Self>(),
            align: align_of::<Self>(),
        }
    }
}

/// Implement [`Component`] for a POD struct.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
/// struct Health { current: i32, max: i32 }
///
/// define_component!(Health, 1, "example.Health");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $id:expr, $name:expr) => {
        impl $crate::Component for $ty {
            const ID: $crate::ComponentId = $id;
            const NAME: &'static str = $name;
        }
    };
}

/// Implement [`Action`] for a POD struct.
#[macro_export]
macro_rules! define_action {
    ($ty:ty, $id:expr, $name:expr) => {
        impl $crate::Action for $ty {
            const ID: $crate::ActionId = $id;
            const NAME: &'static str = $name;
        }
    };
}

/// Explicit id -> layout table, populated once at startup.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    components: HashMap<ComponentId, TypeMeta>,
    actions: HashMap<ActionId, TypeMeta>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a Rust component type.
    pub fn with_component<C: Component>(mut self) -> Result<Self, MarshalError> {
        self.register(C::meta())?;
        Ok(self)
    }

    /// Builder-style registration of a Rust action type.
    pub fn with_action<A: Action>(mut self) -> Result<Self, MarshalError> {
        self.register(A::meta())?;
        Ok(self)
    }

    pub fn register_component<C: Component>(&mut self) -> Result<(), MarshalError> {
        self.register(C::meta())
    }

    pub fn register_action<A: Action>(&mut self) -> Result<(), MarshalError> {
        self.register(A::meta())
    }

    /// Register a layout described at runtime (generated tables, scripting).
    ///
    /// Re-registration must match the previous layout.
    pub fn register(&mut self, meta: TypeMeta) -> Result<(), MarshalError> {
        if meta.align == 0 || !meta.align.is_power_of_two() {
            return Err(MarshalError::InvalidLayout {
                size: meta.size,
                align: meta.align,
            });
        }
        let table = match meta.kind {
            TypeKind::Component => &mut self.components,
            TypeKind::Action => &mut self.actions,
        };
        if let Some(previous) = table.get(&meta.id) {
            if previous.size != meta.size || previous.align != meta.align {
                return Err(MarshalError::LayoutConflict {
                    id: meta.id,
                    previous: previous.layout_string(),
                    requested: meta.layout_string(),
                });
            }
        }
        tracing::debug!(id = meta.id, kind = %meta.kind, name = %meta.name, "registered type");
        table.insert(meta.id, meta);
        Ok(())
    }

    pub fn component(&self, id: ComponentId) -> Result<&TypeMeta, MarshalError> {
        self.components
            .get(&id)
            .ok_or(MarshalError::UnknownComponent(id))
    }

    pub fn action(&self, id: ActionId) -> Result<&TypeMeta, MarshalError> {
        self.actions.get(&id).ok_or(MarshalError::UnknownAction(id))
    }

    /// Look up `component`'s layout and reject payloads of the wrong size.
    pub fn check_component(&self, component: &ComponentData) -> Result<&TypeMeta, MarshalError> {
        let meta = self.component(component.component_id())?;
        check_size(meta, component.bytes().len())
    }

    /// Look up `action`'s layout and reject payloads of the wrong size.
    pub fn check_action(&self, action: &ActionData) -> Result<&TypeMeta, MarshalError> {
        let meta = self.action(action.action_id())?;
        check_size(meta, action.bytes().len())
    }

    pub fn components(&self) -> impl Iterator<Item = &TypeMeta> {
        self.components.values()
    }

    pub fn actions(&self) -> impl Iterator<Item = &TypeMeta> {
        self.actions.values()
    }
}

fn check_size(meta: &TypeMeta, actual: usize) -> Result<&TypeMeta, MarshalError> {
    if meta.size != actual {
        return Err(MarshalError::SizeMismatch {
            id: meta.id,
            expected: meta.size,
            actual,
        });
    }
    Ok(meta)
}

/// Convert a host-side length to the i32 counts the C ABI takes.
pub(crate) fn native_len(what: &'static str, len: usize) -> Result<i32, MarshalError> {
    i32::try_from(len).map_err(|_| MarshalError::CountOverflow { what, len })
}
