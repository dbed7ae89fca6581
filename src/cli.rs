use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-atlas")]
#[command(about = "Scan compiled Java classes, build the type hierarchy and resolve labels to leaf classes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Scan root: a directory, a jar/zip archive or a single .class
    /// file. Repeatable; defaults to the CLASSPATH environment variable.
    #[arg(long = "root", value_name = "PATH")]
    pub roots: Vec<PathBuf>,

    /// Package to accept, e.g. org.example.domain. Repeatable; when
    /// absent every package is scanned.
    #[arg(long = "package", value_name = "PKG")]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Scan the roots and report the assembled hierarchy.
    Scan {
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Resolve a set of taxa to the leaf class they identify.
    Resolve {
        #[arg(value_name = "TAXON", required = true)]
        taxa: Vec<String>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Show one class, looked up by qualified or simple name, or list
    /// the classes carrying an annotation.
    Info {
        /// Fully-qualified name (contains a dot) or simple name.
        #[arg(value_name = "NAME", required_unless_present = "annotation")]
        name: Option<String>,

        /// Annotation type name to search by instead.
        #[arg(long, value_name = "FQN")]
        annotation: Option<String>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
