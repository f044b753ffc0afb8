// registry.rs - Behavior type registration and resolution
//
// Registration builds, per component id, the behavior types interested in
// that id. Sealing freezes those tables; `types()` is then a pure function
// of a component-id set, evaluated on demand instead of precomputing every
// combination of known ids.

use crate::behavior::{BehaviorDescriptor, BehaviorTypeId};
use crate::component_set::ComponentIdSet;
use crate::error::RegistrationError;
use ecsact_runtime::ComponentId;
use std::collections::{BTreeSet, HashMap};

/// Ordered set of behavior types.
pub type BehaviorSet = BTreeSet<BehaviorTypeId>;

#[derive(Default)]
pub struct BehaviorRegistry {
    behaviors: Vec<BehaviorDescriptor>,
    name_lookup: HashMap<String, BehaviorTypeId>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: BehaviorDescriptor) -> Result<BehaviorTypeId, RegistrationError> {
        if descriptor.is_empty() {
            return Err(RegistrationError::EmptyInterest {
                name: descriptor.name().to_string(),
            });
        }
        let name_key = descriptor.name().to_string();
        if self.name_lookup.contains_key(&name_key) {
            return Err(RegistrationError::DuplicateName { name: name_key });
        }

        let id = BehaviorTypeId::new(self.behaviors.len() as u32);
        tracing::debug!(behavior = %name_key, %id, components = ?descriptor.all_components(), "registered behavior type");
        self.name_lookup.insert(name_key, id);
        self.behaviors.push(descriptor);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Freeze registration and build the per-component interest tables.
    pub fn seal(self) -> SealedBehaviors {
        let mut interested: HashMap<ComponentId, BehaviorSet> = HashMap::new();
        let mut known = ComponentIdSet::new();
        for (index, descriptor) in self.behaviors.iter().enumerate() {
            let id = BehaviorTypeId::new(index as u32);
            for component in descriptor.all_components().iter() {
                known.insert(component);
                interested.entry(component).or_default().insert(id);
            }
        }
        SealedBehaviors {
            behaviors: self.behaviors,
            name_lookup: self.name_lookup,
            interested,
            known,
        }
    }
}

/// Read-only behavior tables produced by [`BehaviorRegistry::seal`].
pub struct SealedBehaviors {
    behaviors: Vec<BehaviorDescriptor>,
    name_lookup: HashMap<String, BehaviorTypeId>,
    interested: HashMap<ComponentId, BehaviorSet>,
    known: ComponentIdSet,
}

impl SealedBehaviors {
    pub fn descriptor(&self, id: BehaviorTypeId) -> Option<&BehaviorDescriptor> {
        self.behaviors.get(id.index() as usize)
    }

    pub fn name(&self, id: BehaviorTypeId) -> &str {
        self.descriptor(id).map_or("<unknown>", |d| d.name())
    }

    pub fn lookup(&self, name: &str) -> Option<BehaviorTypeId> {
        self.name_lookup.get(name).copied()
    }

    /// Component ids referenced by any registered behavior.
    pub fn known_components(&self) -> &ComponentIdSet {
        &self.known
    }

    pub fn iter(&self) -> impl Iterator<Item = (BehaviorTypeId, &BehaviorDescriptor)> {
        self.behaviors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| (BehaviorTypeId::new(index as u32), descriptor))
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Behavior types that apply to an entity holding `components`.
    ///
    /// A type applies when at least one id it references is present and all
    /// of its required ids are present. Ids no behavior references are
    /// ignored.
    pub fn types(&self, components: &ComponentIdSet) -> BehaviorSet {
        let present = components.intersection(&self.known);
        present
            .iter()
            .filter_map(|id| self.interested.get(&id))
            .flatten()
            .copied()
            .filter(|id| {
                self.descriptor(*id)
                    .is_some_and(|d| d.required().is_subset(&present))
            })
            .collect()
    }

    /// `Types(next) \ Types(prev)`
    pub fn added_types(&self, prev: &ComponentIdSet, next: &ComponentIdSet) -> BehaviorSet {
        self.types(next).difference(&self.types(prev)).copied().collect()
    }

    /// `Types(prev) \ Types(next)`
    pub fn removed_types(&self, prev: &ComponentIdSet, next: &ComponentIdSet) -> BehaviorSet {
        self.types(prev).difference(&self.types(next)).copied().collect()
    }
}
