//! # class-atlas
//!
//! A metadata engine for compiled Java classes: parses `.class` byte
//! images directly (no runtime reflection), assembles the
//! class/interface hierarchy, and resolves sets of graph labels (taxa)
//! to the single most-specific concrete class they identify.
//!
//! ## Architecture
//!
//! - **pool**: Constant-pool decoding with 1-based tagged slots
//! - **decode**: Class-file header and annotation decoder producing structural records
//! - **scan**: Classpath scanning over directories, jar/zip archives and single files
//! - **hierarchy**: Arena-backed class/interface graph with derived indices
//! - **dictionary**: Leaf-class resolution with a concurrent memoization cache
//! - **registry**: Explicit fully-qualified-name to constructor bindings
//! - **factory**: Taxa-driven instantiation on top of dictionary and registry
//! - **error**: Typed failure taxonomy shared by all of the above
//!
//! Scanning is a destructive, single-threaded pass that yields an
//! immutable graph; resolution and instantiation are concurrent-safe
//! reads over it.

pub mod cli;
pub mod decode;
pub mod dictionary;
pub mod error;
pub mod factory;
pub mod hierarchy;
pub mod pool;
pub mod registry;
pub mod scan;

#[cfg(test)]
mod testbytes;

pub use decode::{AnnotationRecord, AnnotationValue, ClassUnit};
pub use dictionary::ClassDictionary;
pub use error::{MetadataError, Result};
pub use factory::{ObjectFactory, TaxaSource};
pub use hierarchy::HierarchyGraph;
pub use registry::TypeRegistry;
