use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

/// Errors raised by the metadata engine.
///
/// Decode failures are local to one class file and are contained by the
/// scanner; scan-root I/O failures abort the whole scan; resolution and
/// instantiation failures propagate to the caller as typed values.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("malformed class file: {0}")]
    MalformedUnit(String),

    #[error("scan root is not readable: {path}")]
    ScanRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan walk failed under {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("cannot read archive: {path}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot read file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot map to a class without at least one taxon")]
    EmptyTaxa,

    #[error("taxa {taxa:?} do not identify a unique concrete class")]
    AmbiguousOrUnresolvable { taxa: Vec<String> },

    #[error("more than one class has simple name: {0}")]
    AmbiguousSimpleName(String),

    #[error("no type could be resolved for taxa {taxa:?}")]
    UnresolvableType {
        taxa: Vec<String>,
        #[source]
        source: Box<MetadataError>,
    },

    #[error("unable to instantiate {fqn}: {reason}")]
    InstantiationFailure { fqn: String, reason: &'static str },
}
