// options.rs - Batched mutations for one execute call
//
// Pending work is kept in Rust collections until `alloc`, which copies it
// into native-memory-backed flat arrays laid out as
// `ecsact_execution_options`. `free` releases every allocation and clears the
// batch. alloc -> execute -> free is one cycle.

use crate::error::OptionsError;
use crate::ffi::{RawAction, RawComponent, RawExecutionOptions};
use crate::payload::{ActionData, ComponentData};
use crate::types::{Action, Component, ComponentId, EntityId};
use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::Arc;

/// Allocator for memory handed to the native runtime.
pub trait NativeAllocator {
    /// Allocate `layout` bytes; `layout.size()` is never zero.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same layout.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Global Rust allocator.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemAllocator;

impl NativeAllocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0);
        // SAFETY: non-zero size checked by callers.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        alloc::dealloc(ptr.as_ptr(), layout);
    }
}

impl<A: NativeAllocator + ?Sized> NativeAllocator for Arc<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}

/// Placeholder id for an entity created by an execution batch.
///
/// The native runtime assigns the real [`EntityId`] during execution.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PlaceholderId(i32);

impl PlaceholderId {
    pub fn id(&self) -> i32 {
        self.0
    }
}

struct PendingCreate {
    placeholder: PlaceholderId,
    components: Vec<ComponentData>,
}

/// Native blocks owned by one allocated batch.
struct Allocation {
    raw: RawExecutionOptions,
    blocks: Vec<(NonNull<u8>, Layout)>,
}

/// Collects blocks during `alloc`; releases them if materialization fails.
struct BlockSet<'a, A: NativeAllocator> {
    allocator: &'a A,
    blocks: Vec<(NonNull<u8>, Layout)>,
}

impl<'a, A: NativeAllocator> BlockSet<'a, A> {
    fn new(allocator: &'a A) -> Self {
        Self {
            allocator,
            blocks: Vec::new(),
        }
    }

    fn raw(&mut self, layout: Layout) -> Result<NonNull<u8>, OptionsError> {
        let ptr = self
            .allocator
            .allocate(layout)
            .ok_or(OptionsError::AllocationFailed {
                size: layout.size(),
                align: layout.align(),
            })?;
        self.blocks.push((ptr, layout));
        Ok(ptr)
    }

    fn array<T: Copy>(&mut self, items: &[T]) -> Result<*mut T, OptionsError> {
        if items.is_empty() {
            return Ok(ptr::null_mut());
        }
        let layout = Layout::array::<T>(items.len()).map_err(|_| OptionsError::TooManyEntries)?;
        let dst = self.raw(layout)?.as_ptr().cast::<T>();
        // SAFETY: dst was just allocated for `items.len()` elements of T.
        unsafe { ptr::copy_nonoverlapping(items.as_ptr(), dst, items.len()) };
        Ok(dst)
    }

    fn payload(&mut self, bytes: &[u8], align: usize) -> Result<*const std::ffi::c_void, OptionsError> {
        if bytes.is_empty() {
            return Ok(ptr::null());
        }
        let layout = Layout::from_size_align(bytes.len(), align.max(1)).map_err(|_| {
            OptionsError::AllocationFailed {
                size: bytes.len(),
                align,
            }
        })?;
        let dst = self.raw(layout)?.as_ptr();
        // SAFETY: dst holds bytes.len() writable bytes.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
        Ok(dst.cast_const().cast())
    }

    fn component(&mut self, component: &ComponentData) -> Result<RawComponent, OptionsError> {
        Ok(RawComponent {
            component_id: component.component_id(),
            component_data: self.payload(component.bytes(), component.align())?,
        })
    }

    fn into_blocks(mut self) -> Vec<(NonNull<u8>, Layout)> {
        std::mem::take(&mut self.blocks)
    }
}

impl<A: NativeAllocator> Drop for BlockSet<'_, A> {
    fn drop(&mut self) {
        for (ptr, layout) in self.blocks.drain(..) {
            // SAFETY: every block came from this allocator with this layout.
            unsafe { self.allocator.deallocate(ptr, layout) };
        }
    }
}

fn len_i32(len: usize) -> Result<i32, OptionsError> {
    i32::try_from(len).map_err(|_| OptionsError::TooManyEntries)
}

/// Pending entity/component mutations and actions for one execute call.
pub struct ExecutionOptions<A: NativeAllocator = SystemAllocator> {
    allocator: A,
    creates: Vec<PendingCreate>,
    adds: Vec<(EntityId, ComponentData)>,
    updates: Vec<(EntityId, ComponentData)>,
    removes: Vec<(EntityId, ComponentId)>,
    actions: Vec<ActionData>,
    destroys: Vec<EntityId>,
    next_placeholder: i32,
    allocation: Option<Allocation>,
}

impl ExecutionOptions<SystemAllocator> {
    pub fn new() -> Self {
        Self::with_allocator(SystemAllocator)
    }
}

impl Default for ExecutionOptions<SystemAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: NativeAllocator> ExecutionOptions<A> {
    pub fn with_allocator(allocator: A) -> Self {
        Self {
            allocator,
            creates: Vec::new(),
            adds: Vec::new(),
            updates: Vec::new(),
            removes: Vec::new(),
            actions: Vec::new(),
            destroys: Vec::new(),
            next_placeholder: 0,
            allocation: None,
        }
    }

    fn ensure_open(&self) -> Result<(), OptionsError> {
        if self.allocation.is_some() {
            Err(OptionsError::Sealed)
        } else {
            Ok(())
        }
    }

    /// Queue creation of a new entity with no components.
    pub fn create_entity(&mut self) -> Result<PlaceholderId, OptionsError> {
        self.create_entity_with(Vec::new())
    }

    /// Queue creation of a new entity seeded with `components`.
    pub fn create_entity_with(
        &mut self,
        components: Vec<ComponentData>,
    ) -> Result<PlaceholderId, OptionsError> {
        self.ensure_open()?;
        let placeholder = PlaceholderId(self.next_placeholder);
        self.next_placeholder += 1;
        self.creates.push(PendingCreate {
            placeholder,
            components,
        });
        Ok(placeholder)
    }

    /// Add a seed component to an entity queued with [`create_entity`](Self::create_entity).
    pub fn add_created_component(
        &mut self,
        placeholder: PlaceholderId,
        component: ComponentData,
    ) -> Result<(), OptionsError> {
        self.ensure_open()?;
        let pending = self
            .creates
            .iter_mut()
            .find(|pending| pending.placeholder == placeholder)
            .ok_or(OptionsError::UnknownPlaceholder(placeholder.0))?;
        pending.components.push(component);
        Ok(())
    }

    pub fn add_component<C: Component>(&mut self, entity: EntityId, component: &C) -> Result<(), OptionsError> {
        self.add_component_data(entity, ComponentData::new(component))
    }

    pub fn add_component_data(&mut self, entity: EntityId, component: ComponentData) -> Result<(), OptionsError> {
        self.ensure_open()?;
        self.adds.push((entity, component));
        Ok(())
    }

    pub fn update_component<C: Component>(&mut self, entity: EntityId, component: &C) -> Result<(), OptionsError> {
        self.update_component_data(entity, ComponentData::new(component))
    }

    pub fn update_component_data(&mut self, entity: EntityId, component: ComponentData) -> Result<(), OptionsError> {
        self.ensure_open()?;
        self.updates.push((entity, component));
        Ok(())
    }

    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> Result<(), OptionsError> {
        self.remove_component_id(entity, C::ID)
    }

    pub fn remove_component_id(&mut self, entity: EntityId, component_id: ComponentId) -> Result<(), OptionsError> {
        self.ensure_open()?;
        self.removes.push((entity, component_id));
        Ok(())
    }

    pub fn push_action<T: Action>(&mut self, action: &T) -> Result<(), OptionsError> {
        self.push_action_data(ActionData::new(action))
    }

    pub fn push_action_data(&mut self, action: ActionData) -> Result<(), OptionsError> {
        self.ensure_open()?;
        self.actions.push(action);
        Ok(())
    }

    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), OptionsError> {
        self.ensure_open()?;
        self.destroys.push(entity);
        Ok(())
    }

    /// Entities queued for destruction.
    pub fn destroyed_entities(&self) -> &[EntityId] {
        &self.destroys
    }

    /// Whether any mutation or action is pending.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty()
            && self.adds.is_empty()
            && self.updates.is_empty()
            && self.removes.is_empty()
            && self.actions.is_empty()
            && self.destroys.is_empty()
    }

    pub fn is_allocated(&self) -> bool {
        self.allocation.is_some()
    }

    /// Materialize the batch into native memory.
    ///
    /// Calling `alloc` again before [`free`](Self::free) returns the same
    /// arrays.
    pub fn alloc(&mut self) -> Result<&RawExecutionOptions, OptionsError> {
        if self.allocation.is_none() {
            self.allocation = Some(self.materialize()?);
        }
        match &self.allocation {
            Some(allocation) => Ok(&allocation.raw),
            None => unreachable!("allocation stored above"),
        }
    }

    fn materialize(&self) -> Result<Allocation, OptionsError> {
        let mut blocks = BlockSet::new(&self.allocator);
        let mut raw = RawExecutionOptions::default();

        let (entities, components): (Vec<EntityId>, Vec<&ComponentData>) =
            self.adds.iter().map(|(e, c)| (*e, c)).unzip();
        let components = components
            .into_iter()
            .map(|c| blocks.component(c))
            .collect::<Result<Vec<_>, _>>()?;
        raw.add_components_length = len_i32(entities.len())?;
        raw.add_components_entities = blocks.array(&entities)?;
        raw.add_components = blocks.array(&components)?;

        let (entities, components): (Vec<EntityId>, Vec<&ComponentData>) =
            self.updates.iter().map(|(e, c)| (*e, c)).unzip();
        let components = components
            .into_iter()
            .map(|c| blocks.component(c))
            .collect::<Result<Vec<_>, _>>()?;
        raw.update_components_length = len_i32(entities.len())?;
        raw.update_components_entities = blocks.array(&entities)?;
        raw.update_components = blocks.array(&components)?;

        let (entities, ids): (Vec<EntityId>, Vec<ComponentId>) = self.removes.iter().copied().unzip();
        raw.remove_components_length = len_i32(entities.len())?;
        raw.remove_components_entities = blocks.array(&entities)?;
        raw.remove_components = blocks.array(&ids)?;

        let actions = self
            .actions
            .iter()
            .map(|action| {
                Ok(RawAction {
                    action_id: action.action_id(),
                    action_data: blocks.payload(action.bytes(), action.align())?,
                })
            })
            .collect::<Result<Vec<_>, OptionsError>>()?;
        raw.actions_length = len_i32(actions.len())?;
        raw.actions = blocks.array(&actions)?;

        let placeholders: Vec<i32> = self.creates.iter().map(|c| c.placeholder.0).collect();
        let mut counts = Vec::with_capacity(self.creates.len());
        let mut lists = Vec::with_capacity(self.creates.len());
        for pending in &self.creates {
            let components = pending
                .components
                .iter()
                .map(|c| blocks.component(c))
                .collect::<Result<Vec<_>, _>>()?;
            counts.push(len_i32(components.len())?);
            lists.push(blocks.array(&components)?);
        }
        raw.create_entities_length = len_i32(placeholders.len())?;
        raw.create_entities = blocks.array(&placeholders)?;
        raw.create_entities_components_length = blocks.array(&counts)?;
        raw.create_entities_components = blocks.array(&lists)?;

        raw.destroy_entities_length = len_i32(self.destroys.len())?;
        raw.destroy_entities = blocks.array(&self.destroys)?;

        Ok(Allocation {
            raw,
            blocks: blocks.into_blocks(),
        })
    }

    /// Release native memory and clear every pending list.
    ///
    /// A no-op when nothing was allocated or queued.
    pub fn free(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            for (ptr, layout) in allocation.blocks {
                // SAFETY: blocks were allocated by `self.allocator` in `materialize`.
                unsafe { self.allocator.deallocate(ptr, layout) };
            }
        }
        self.creates.clear();
        self.adds.clear();
        self.updates.clear();
        self.removes.clear();
        self.actions.clear();
        self.destroys.clear();
        self.next_placeholder = 0;
    }
}

impl<A: NativeAllocator> Drop for ExecutionOptions<A> {
    fn drop(&mut self) {
        self.free();
    }
}

impl<A: NativeAllocator> fmt::Debug for ExecutionOptions<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("creates", &self.creates.len())
            .field("adds", &self.adds.len())
            .field("updates", &self.updates.len())
            .field("removes", &self.removes.len())
            .field("actions", &self.actions.len())
            .field("destroys", &self.destroys.len())
            .field("allocated", &self.is_allocated())
            .finish()
    }
}
