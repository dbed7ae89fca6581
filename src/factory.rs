use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::Any;

use crate::dictionary::{ClassDictionary, canonical_taxa};
use crate::error::{MetadataError, Result};
use crate::registry::TypeRegistry;

/// Anything carrying the taxa that determine an entity's runtime type:
/// a node's labels, or the single type name of a relationship.
pub trait TaxaSource {
    fn taxa(&self) -> &[String];
}

/// Builds default instances of the classes that taxa resolve to.
///
/// The factory keeps its own taxa-to-name cache in front of the
/// dictionary so bulk hydration pays for each distinct taxa set once,
/// and constructs through an explicit [`TypeRegistry`] rather than any
/// runtime reflection facility.
pub struct ObjectFactory {
    dictionary: ClassDictionary,
    registry: TypeRegistry,
    resolved: DashMap<Vec<String>, String>,
}

impl ObjectFactory {
    pub fn new(dictionary: ClassDictionary, registry: TypeRegistry) -> Self {
        ObjectFactory {
            dictionary,
            registry,
            resolved: DashMap::new(),
        }
    }

    pub fn dictionary(&self) -> &ClassDictionary {
        &self.dictionary
    }

    /// Resolves the taxa to a class and constructs a fresh instance.
    ///
    /// Resolution failures surface as [`MetadataError::UnresolvableType`]
    /// and a resolved class without a registered constructor as
    /// [`MetadataError::InstantiationFailure`]; neither is retried,
    /// since without a re-scan the outcome cannot change.
    pub fn instantiate(&self, taxa: &[String]) -> Result<Box<dyn Any + Send>> {
        if taxa.is_empty() {
            return Err(MetadataError::EmptyTaxa);
        }

        let fqn = match self.resolved.entry(canonical_taxa(taxa)) {
            Entry::Occupied(hit) => hit.get().clone(),
            Entry::Vacant(slot) => {
                let fqn = self.dictionary.resolve(taxa).map_err(|source| {
                    MetadataError::UnresolvableType {
                        taxa: taxa.to_vec(),
                        source: Box::new(source),
                    }
                })?;
                slot.insert(fqn.clone());
                fqn
            }
        };

        self.registry
            .construct(&fqn)
            .ok_or(MetadataError::InstantiationFailure {
                fqn,
                reason: "no default constructor registered for this type",
            })
    }

    /// Like [`instantiate`](Self::instantiate), taking the taxa from a
    /// mapping request.
    pub fn instantiate_from(&self, source: &impl TaxaSource) -> Result<Box<dyn Any + Send>> {
        self.instantiate(source.taxa())
    }

    /// Instantiates and downcasts to a concrete Rust type.
    pub fn instantiate_as<T: Any>(&self, taxa: &[String]) -> Result<T> {
        let instance = self.instantiate(taxa)?;
        instance.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            let fqn = self
                .resolved
                .get(&canonical_taxa(taxa))
                .map(|hit| hit.value().clone())
                .unwrap_or_default();
            MetadataError::InstantiationFailure {
                fqn,
                reason: "registered constructor produced a different type",
            }
        })
    }
}
