//! Owned, type-erased component and action payloads.
//!
//! Payload bytes live in an allocation aligned for the payload type so the
//! pointer handed to native code can be read as the schema struct directly.

use crate::error::MarshalError;
use crate::types::{Action, ActionId, Component, ComponentId, TypeKind, TypeMeta};
use std::alloc::{self, Layout};
use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};
use std::slice;

/// Heap bytes with a caller-chosen alignment.
pub(crate) struct AlignedBytes {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: AlignedBytes uniquely owns its allocation; no interior sharing.
unsafe impl Send for AlignedBytes {}
unsafe impl Sync for AlignedBytes {}

impl AlignedBytes {
    pub(crate) fn zeroed(size: usize, align: usize) -> Result<Self, MarshalError> {
        let layout = Layout::from_size_align(size, align.max(1))
            .map_err(|_| MarshalError::InvalidLayout { size, align })?;
        Ok(Self::allocate(layout))
    }

    pub(crate) fn copy_from(bytes: &[u8], align: usize) -> Result<Self, MarshalError> {
        let mut out = Self::zeroed(bytes.len(), align)?;
        out.as_mut_slice().copy_from_slice(bytes);
        Ok(out)
    }

    /// Copy `size` bytes out of native memory.
    ///
    /// # Safety
    /// `src` must be valid for reads of `size` bytes.
    pub(crate) unsafe fn read_native(
        src: *const c_void,
        size: usize,
        align: usize,
    ) -> Result<Self, MarshalError> {
        let mut out = Self::zeroed(size, align)?;
        if size > 0 {
            ptr::copy_nonoverlapping(src.cast::<u8>(), out.as_mut_ptr(), size);
        }
        Ok(out)
    }

    fn allocate(layout: Layout) -> Self {
        if layout.size() == 0 {
            // Zero-sized payloads (tag components) never touch the allocator.
            return Self {
                ptr: NonNull::dangling(),
                layout,
            };
        }
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        Self { ptr, layout }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub(crate) fn align(&self) -> usize {
        self.layout.align()
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes (or dangling with len 0).
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: unique ownership, valid for len bytes.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }
}

impl Clone for AlignedBytes {
    fn clone(&self) -> Self {
        let mut out = Self::allocate(self.layout);
        out.as_mut_slice().copy_from_slice(self.as_slice());
        out
    }
}

impl Drop for AlignedBytes {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            // SAFETY: allocated in `allocate` with this exact layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

impl PartialEq for AlignedBytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for AlignedBytes {}

fn read_pod<T: bytemuck::Pod>(id: i32, bytes: &[u8]) -> Result<T, MarshalError> {
    bytemuck::try_pod_read_unaligned(bytes).map_err(|_| MarshalError::SizeMismatch {
        id,
        expected: std::mem::size_of::<T>(),
        actual: bytes.len(),
    })
}

fn checked_bytes(meta: &TypeMeta, bytes: &[u8]) -> Result<AlignedBytes, MarshalError> {
    if bytes.len() != meta.size {
        return Err(MarshalError::SizeMismatch {
            id: meta.id,
            expected: meta.size,
            actual: bytes.len(),
        });
    }
    AlignedBytes::copy_from(bytes, meta.align)
}

/// Owned payload for a single component instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ComponentData {
    component_id: ComponentId,
    bytes: AlignedBytes,
}

impl ComponentData {
    /// Copy a Rust-typed component.
    pub fn new<C: Component>(value: &C) -> Self {
        let bytes = AlignedBytes::copy_from(bytemuck::bytes_of(value), std::mem::align_of::<C>())
            .unwrap_or_else(|_| unreachable!("Rust types always have a valid layout"));
        Self {
            component_id: C::ID,
            bytes,
        }
    }

    /// Build from raw bytes checked against registered metadata.
    pub fn from_bytes(meta: &TypeMeta, bytes: &[u8]) -> Result<Self, MarshalError> {
        if meta.kind != TypeKind::Component {
            return Err(MarshalError::UnknownComponent(meta.id));
        }
        Ok(Self {
            component_id: meta.id,
            bytes: checked_bytes(meta, bytes)?,
        })
    }

    /// Copy a component out of native memory.
    ///
    /// # Safety
    /// `src` must point to `meta.size` readable bytes.
    pub(crate) unsafe fn read_native(meta: &TypeMeta, src: *const c_void) -> Result<Self, MarshalError> {
        Ok(Self {
            component_id: meta.id,
            bytes: AlignedBytes::read_native(src, meta.size, meta.align)?,
        })
    }

    pub(crate) fn from_aligned(component_id: ComponentId, bytes: AlignedBytes) -> Self {
        Self {
            component_id,
            bytes,
        }
    }

    #[inline]
    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.bytes.align()
    }

    /// Pointer suitable for `const void*` payload parameters.
    #[inline]
    pub fn as_ptr(&self) -> *const c_void {
        if self.bytes.len() == 0 {
            ptr::null()
        } else {
            self.bytes.as_ptr().cast()
        }
    }

    /// Decode as a typed component, checking id and size.
    pub fn get<C: Component>(&self) -> Result<C, MarshalError> {
        if self.component_id != C::ID {
            return Err(MarshalError::IdMismatch {
                expected: C::ID,
                actual: self.component_id,
            });
        }
        read_pod(self.component_id, self.bytes())
    }
}

impl<C: Component> From<&C> for ComponentData {
    fn from(value: &C) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for ComponentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentData")
            .field("component_id", &self.component_id)
            .field("bytes", &self.bytes())
            .finish()
    }
}

/// Owned payload for a single action instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ActionData {
    action_id: ActionId,
    bytes: AlignedBytes,
}

impl ActionData {
    pub fn new<A: Action>(value: &A) -> Self {
        let bytes = AlignedBytes::copy_from(bytemuck::bytes_of(value), std::mem::align_of::<A>())
            .unwrap_or_else(|_| unreachable!("Rust types always have a valid layout"));
        Self {
            action_id: A::ID,
            bytes,
        }
    }

    pub fn from_bytes(meta: &TypeMeta, bytes: &[u8]) -> Result<Self, MarshalError> {
        if meta.kind != TypeKind::Action {
            return Err(MarshalError::UnknownAction(meta.id));
        }
        Ok(Self {
            action_id: meta.id,
            bytes: checked_bytes(meta, bytes)?,
        })
    }

    pub(crate) fn from_aligned(action_id: ActionId, bytes: AlignedBytes) -> Self {
        Self { action_id, bytes }
    }

    #[inline]
    pub fn action_id(&self) -> ActionId {
        self.action_id
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.bytes.align()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const c_void {
        if self.bytes.len() == 0 {
            ptr::null()
        } else {
            self.bytes.as_ptr().cast()
        }
    }

    pub fn get<A: Action>(&self) -> Result<A, MarshalError> {
        if self.action_id != A::ID {
            return Err(MarshalError::IdMismatch {
                expected: A::ID,
                actual: self.action_id,
            });
        }
        read_pod(self.action_id, self.bytes())
    }
}

impl<A: Action> From<&A> for ActionData {
    fn from(value: &A) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for ActionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionData")
            .field("action_id", &self.action_id)
            .field("bytes", &self.bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{define_action, define_component, TypeRegistry};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Health {
        current: i32,
        max: i32,
    }
    define_component!(Health, 1, "test.Health");

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Mass {
        kg: f64,
    }
    define_component!(Mass, 2, "test.Mass");

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Attack {
        target: i32,
    }
    define_action!(Attack, 1, "test.Attack");

    #[test]
    fn typed_component_round_trips_through_data() {
        let data = ComponentData::new(&Health { current: 7, max: 10 });
        assert_eq!(data.component_id(), 1);
        assert_eq!(data.bytes().len(), 8);
        assert_eq!(data.get::<Health>().unwrap(), Health { current: 7, max: 10 });
    }

    #[test]
    fn payload_pointer_is_aligned_for_the_type() {
        let data = ComponentData::new(&Mass { kg: 2.5 });
        assert_eq!(data.align(), 8);
        assert_eq!(data.as_ptr() as usize % 8, 0);
    }

    #[test]
    fn decoding_as_the_wrong_type_fails() {
        let data = ComponentData::new(&Health { current: 1, max: 1 });
        assert_eq!(
            data.get::<Mass>().unwrap_err(),
            MarshalError::IdMismatch { expected: 2, actual: 1 }
        );
    }

    #[test]
    fn raw_bytes_are_checked_against_metadata() {
        let types = TypeRegistry::new().with_component::<Health>().unwrap();
        let meta = types.component(1).unwrap();

        let err = ComponentData::from_bytes(meta, &[0u8; 3]).unwrap_err();
        assert_eq!(
            err,
            MarshalError::SizeMismatch { id: 1, expected: 8, actual: 3 }
        );

        let bytes = bytemuck::bytes_of(&Health { current: 4, max: 9 }).to_vec();
        let data = ComponentData::from_bytes(meta, &bytes).unwrap();
        assert_eq!(data.get::<Health>().unwrap().max, 9);
    }

    #[test]
    fn action_data_decodes() {
        let data = ActionData::new(&Attack { target: 12 });
        assert_eq!(data.action_id(), 1);
        assert_eq!(data.get::<Attack>().unwrap(), Attack { target: 12 });
    }

    #[test]
    fn native_reads_copy_the_payload() {
        let types = TypeRegistry::new().with_component::<Health>().unwrap();
        let source = Health { current: 3, max: 5 };
        let data = unsafe {
            ComponentData::read_native(
                types.component(1).unwrap(),
                &source as *const Health as *const c_void,
            )
        }
        .unwrap();
        assert_eq!(data.get::<Health>().unwrap(), source);
    }
}
