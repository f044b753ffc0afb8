// component_set.rs - Per-entity component id sets
//
// Ids are kept sorted and deduplicated so equal sets compare and hash
// equal regardless of insertion order; the archetype cache relies on that.

use ecsact_runtime::ComponentId;
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentIdSet {
    ids: Vec<ComponentId>,
}

impl ComponentIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`; returns false if it was already present.
    pub fn insert(&mut self, id: ComponentId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(at) => {
                self.ids.insert(at, id);
                true
            }
        }
    }

    /// Remove `id`; returns false if it was absent.
    pub fn remove(&mut self, id: ComponentId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(at) => {
                self.ids.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn is_subset(&self, other: &ComponentIdSet) -> bool {
        self.ids.iter().all(|id| other.contains(*id))
    }

    /// Ids present in both sets.
    pub fn intersection(&self, other: &ComponentIdSet) -> ComponentIdSet {
        Self {
            ids: self
                .ids
                .iter()
                .copied()
                .filter(|id| other.contains(*id))
                .collect(),
        }
    }

    /// Copy with `id` added.
    pub fn with(&self, id: ComponentId) -> ComponentIdSet {
        let mut next = self.clone();
        next.insert(id);
        next
    }

    /// Copy with `id` removed.
    pub fn without(&self, id: ComponentId) -> ComponentIdSet {
        let mut next = self.clone();
        next.remove(id);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.ids.iter().copied()
    }

    pub fn as_slice(&self) -> &[ComponentId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<ComponentId> for ComponentIdSet {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        let mut ids: Vec<ComponentId> = iter.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }
}

impl Extend<ComponentId> for ComponentIdSet {
    fn extend<I: IntoIterator<Item = ComponentId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl fmt::Debug for ComponentIdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(&self.ids).finish()
    }
}
