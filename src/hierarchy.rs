use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::decode::{AnnotationRecord, ClassUnit, simple_name_of};
use crate::error::{MetadataError, Result};

/// Stable handle of a class node in the graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(u32);

/// A class in the hierarchy.
///
/// Nodes are created either by decoding a class file or by being named
/// as someone's superclass before their own bytes are seen; the latter
/// start out [`ClassState::Pending`] and are promoted in place.
#[derive(Debug)]
pub struct ClassNode {
    pub name: String,
    pub superclass: Option<ClassId>,
    pub subclasses: Vec<ClassId>,
    pub state: ClassState,
}

#[derive(Debug)]
pub enum ClassState {
    /// Forward-reference placeholder: only the name is known.
    Pending,
    Complete(ClassDetails),
}

/// Structural data of a fully-decoded class.
#[derive(Debug)]
pub struct ClassDetails {
    pub superclass_name: Option<String>,
    pub interfaces: BTreeSet<String>,
    pub annotations: Vec<AnnotationRecord>,
    pub field_annotations: BTreeMap<String, Vec<AnnotationRecord>>,
    pub method_annotations: BTreeMap<String, Vec<AnnotationRecord>>,
    pub is_abstract: bool,
}

impl ClassNode {
    pub fn is_complete(&self) -> bool {
        matches!(self.state, ClassState::Complete(_))
    }

    pub fn details(&self) -> Option<&ClassDetails> {
        match &self.state {
            ClassState::Complete(details) => Some(details),
            ClassState::Pending => None,
        }
    }

    pub fn simple_name(&self) -> &str {
        simple_name_of(&self.name)
    }
}

/// One scanned interface and its extends edges.
#[derive(Debug)]
pub struct InterfaceRecord {
    pub name: String,
    pub extends: BTreeSet<String>,
    /// Every super-interface reachable over extends edges, memoized by
    /// [`HierarchyGraph::build`]. Names outside the scan scope appear
    /// here too; only their own edges are unknown.
    pub all_extended: BTreeSet<String>,
}

/// The class/interface hierarchy assembled from one scan pass.
///
/// Built destructively by the scanner, then read-only: resolvers and
/// factories layer their own caches on top and a re-scan produces a
/// whole new graph. Annotation inheritance from superclasses is
/// deliberately not modelled.
#[derive(Debug, Default)]
pub struct HierarchyGraph {
    classes: Vec<ClassNode>,
    class_index: HashMap<String, ClassId>,
    interfaces: HashMap<String, InterfaceRecord>,
    annotation_index: HashMap<String, Vec<ClassId>>,
    implementer_index: HashMap<String, Vec<ClassId>>,
}

impl HierarchyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one decoded unit into the registries.
    ///
    /// Classes seen a second time keep their first decoding, matching
    /// the scanner's first-root-wins semantics when the same name is on
    /// the path twice.
    pub fn merge_unit(&mut self, unit: ClassUnit) {
        if unit.is_interface {
            self.interfaces
                .entry(unit.name.clone())
                .or_insert_with(|| InterfaceRecord {
                    name: unit.name,
                    extends: unit.interfaces,
                    all_extended: BTreeSet::new(),
                });
            return;
        }

        let id = self.intern(&unit.name);
        if self.classes[id.0 as usize].is_complete() {
            log::debug!("ignoring duplicate class unit for {}", unit.name);
            return;
        }

        let superclass = unit.superclass.clone();
        self.classes[id.0 as usize].state = ClassState::Complete(ClassDetails {
            superclass_name: unit.superclass,
            interfaces: unit.interfaces,
            annotations: unit.annotations,
            field_annotations: unit.field_annotations,
            method_annotations: unit.method_annotations,
            is_abstract: unit.is_abstract,
        });

        if let Some(super_name) = superclass {
            let super_id = self.intern(&super_name);
            self.classes[id.0 as usize].superclass = Some(super_id);
            self.classes[super_id.0 as usize].subclasses.push(id);
        }
    }

    /// Computes the derived indices once all units are merged.
    pub fn build(&mut self) {
        let interface_names: Vec<String> = self.interfaces.keys().cloned().collect();
        let mut closures: HashMap<String, BTreeSet<String>> = HashMap::new();
        for name in &interface_names {
            let closure = self.interface_closure(name, &mut closures);
            if let Some(record) = self.interfaces.get_mut(name) {
                record.all_extended = closure;
            }
        }

        self.annotation_index.clear();
        for (index, node) in self.classes.iter().enumerate() {
            let Some(details) = node.details() else {
                continue;
            };
            for annotation in &details.annotations {
                self.annotation_index
                    .entry(annotation.name.clone())
                    .or_default()
                    .push(ClassId(index as u32));
            }
        }

        // Every class implements its declared interfaces plus their
        // closures, and passes all of them to its whole subclass tree.
        let mut implementers: HashMap<String, BTreeSet<ClassId>> = HashMap::new();
        for (index, node) in self.classes.iter().enumerate() {
            let Some(details) = node.details() else {
                continue;
            };
            let id = ClassId(index as u32);
            for interface_name in &details.interfaces {
                let mut implemented: BTreeSet<&str> = BTreeSet::new();
                implemented.insert(interface_name);
                if let Some(record) = self.interfaces.get(interface_name) {
                    implemented.extend(record.all_extended.iter().map(String::as_str));
                }
                for name in implemented {
                    implementers.entry(name.to_string()).or_default().insert(id);
                }
            }
        }
        let mut index: HashMap<String, Vec<ClassId>> = HashMap::new();
        for (name, direct) in implementers {
            let mut all = direct.clone();
            for id in direct {
                self.collect_descendants(id, &mut all);
            }
            index.insert(name, all.into_iter().collect());
        }
        self.implementer_index = index;
    }

    fn intern(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.class_index.get(name) {
            return *id;
        }
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassNode {
            name: name.to_string(),
            superclass: None,
            subclasses: Vec::new(),
            state: ClassState::Pending,
        });
        self.class_index.insert(name.to_string(), id);
        id
    }

    /// Union of every super-interface name reachable from `name`,
    /// memoized. An in-progress marker breaks extends cycles, which a
    /// well-formed class path cannot contain anyway.
    fn interface_closure(
        &self,
        name: &str,
        memo: &mut HashMap<String, BTreeSet<String>>,
    ) -> BTreeSet<String> {
        if let Some(known) = memo.get(name) {
            return known.clone();
        }
        memo.insert(name.to_string(), BTreeSet::new());

        let mut closure = BTreeSet::new();
        if let Some(record) = self.interfaces.get(name) {
            for extended in record.extends.clone() {
                closure.extend(self.interface_closure(&extended, memo));
                closure.insert(extended);
            }
        }
        memo.insert(name.to_string(), closure.clone());
        closure
    }

    fn collect_descendants(&self, id: ClassId, into: &mut BTreeSet<ClassId>) {
        let mut queue: VecDeque<ClassId> = self.classes[id.0 as usize]
            .subclasses
            .iter()
            .copied()
            .collect();
        while let Some(next) = queue.pop_front() {
            if into.insert(next) {
                queue.extend(self.classes[next.0 as usize].subclasses.iter().copied());
            }
        }
    }

    pub fn node(&self, id: ClassId) -> &ClassNode {
        &self.classes[id.0 as usize]
    }

    pub fn class_by_name(&self, fqn: &str) -> Option<&ClassNode> {
        self.class_index.get(fqn).map(|id| self.node(*id))
    }

    /// Finds the single class carrying a simple name; more than one
    /// fully-qualified match is an error, none is `Ok(None)`.
    pub fn class_by_simple_name(&self, simple: &str) -> Result<Option<&ClassNode>> {
        let mut found: Option<&ClassNode> = None;
        for node in &self.classes {
            if node.simple_name() == simple {
                if found.is_some() {
                    return Err(MetadataError::AmbiguousSimpleName(simple.to_string()));
                }
                found = Some(node);
            }
        }
        Ok(found)
    }

    /// All classes carrying a class-level annotation, in scan order.
    pub fn classes_with_annotation(&self, annotation: &str) -> Vec<&ClassNode> {
        self.annotation_index
            .get(annotation)
            .map(|ids| ids.iter().map(|id| self.node(*id)).collect())
            .unwrap_or_default()
    }

    /// The class carrying an annotation under an exact name, if any.
    pub fn class_with_annotation(&self, annotation: &str, fqn: &str) -> Option<&ClassNode> {
        self.classes_with_annotation(annotation)
            .into_iter()
            .find(|node| node.name == fqn)
    }

    /// All classes implementing an interface, directly, through a
    /// super-interface, or through any ancestor class.
    pub fn implementers_of(&self, interface: &str) -> Vec<&ClassNode> {
        self.implementer_index
            .get(interface)
            .map(|ids| ids.iter().map(|id| self.node(*id)).collect())
            .unwrap_or_default()
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceRecord> {
        self.interfaces.get(name)
    }

    /// Root classes: no superclass edge. Never-decoded placeholders land
    /// here too, since their own superclass is unknown.
    pub fn roots(&self) -> Vec<&ClassNode> {
        self.classes
            .iter()
            .filter(|node| node.superclass.is_none())
            .collect()
    }

    /// Decoded, non-abstract classes whose simple name matches.
    pub fn concrete_classes_named(&self, simple: &str) -> Vec<ClassId> {
        self.classes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                node.simple_name() == simple
                    && node.details().is_some_and(|details| !details.is_abstract)
            })
            .map(|(index, _)| ClassId(index as u32))
            .collect()
    }

    /// Whether `descendant` sits strictly below `ancestor` on the
    /// superclass chain.
    pub fn is_strict_descendant(&self, descendant: ClassId, ancestor: ClassId) -> bool {
        if descendant == ancestor {
            return false;
        }
        // Forged units can close a superclass cycle; the walk is bounded
        // by the arena size so it always terminates.
        let mut remaining = self.classes.len();
        let mut cursor = self.classes[descendant.0 as usize].superclass;
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            if remaining == 0 {
                return false;
            }
            remaining -= 1;
            cursor = self.classes[id.0 as usize].superclass;
        }
        false
    }

    pub fn class_count(&self) -> usize {
        self.classes.iter().filter(|node| node.is_complete()).count()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Names of all decoded classes, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .classes
            .iter()
            .filter(|node| node.is_complete())
            .map(|node| node.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
