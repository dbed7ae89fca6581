use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use crate::error::{MetadataError, Result};
use crate::hierarchy::{ClassId, HierarchyGraph};

/// Resolves taxa (node labels or a relationship type) to the single
/// most-specific concrete class they identify.
///
/// Results are memoized per canonicalized taxa set; the graph itself is
/// never consulted twice for the same set. A re-scan replaces the graph
/// and therefore the whole dictionary, which invalidates the cache
/// wholesale.
pub struct ClassDictionary {
    graph: Arc<HierarchyGraph>,
    cache: DashMap<Vec<String>, String>,
    #[cfg(test)]
    consultations: std::sync::atomic::AtomicUsize,
}

impl ClassDictionary {
    pub fn new(graph: Arc<HierarchyGraph>) -> Self {
        ClassDictionary {
            graph,
            cache: DashMap::new(),
            #[cfg(test)]
            consultations: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn graph(&self) -> &HierarchyGraph {
        &self.graph
    }

    /// Determines the leaf class for a set of taxa.
    ///
    /// Taxa naming nothing in the graph are ignored; interfaces and
    /// abstract classes never resolve. When the surviving candidates
    /// are not exactly one class, the taxa are ambiguous or
    /// unresolvable and that is the caller's error to handle, never an
    /// arbitrary pick.
    pub fn resolve(&self, taxa: &[String]) -> Result<String> {
        if taxa.is_empty() {
            return Err(MetadataError::EmptyTaxa);
        }

        // The vacant entry holds its shard lock across the graph query,
        // so concurrent callers for one key compute at most once.
        match self.cache.entry(canonical_taxa(taxa)) {
            Entry::Occupied(hit) => Ok(hit.get().clone()),
            Entry::Vacant(slot) => {
                let fqn = self.resolve_leaf(taxa)?;
                slot.insert(fqn.clone());
                Ok(fqn)
            }
        }
    }

    fn resolve_leaf(&self, taxa: &[String]) -> Result<String> {
        #[cfg(test)]
        self.consultations
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let mut candidates: Vec<ClassId> = Vec::new();
        for taxon in taxa {
            for id in self.graph.concrete_classes_named(taxon) {
                if !candidates.contains(&id) {
                    candidates.push(id);
                }
            }
        }

        let leaves: Vec<ClassId> = candidates
            .iter()
            .copied()
            .filter(|&candidate| {
                !candidates
                    .iter()
                    .any(|&other| self.graph.is_strict_descendant(other, candidate))
            })
            .collect();

        match leaves.as_slice() {
            [leaf] => Ok(self.graph.node(*leaf).name.clone()),
            _ => Err(MetadataError::AmbiguousOrUnresolvable {
                taxa: taxa.to_vec(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    #[cfg(test)]
    pub(crate) fn graph_consultations(&self) -> usize {
        self.consultations.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Sorted, deduplicated form of a taxa sequence, used as the cache key
/// so that permutations of one logical set share a single entry.
pub(crate) fn canonical_taxa(taxa: &[String]) -> Vec<String> {
    let mut key = taxa.to_vec();
    key.sort_unstable();
    key.dedup();
    key
}
