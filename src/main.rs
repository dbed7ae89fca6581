use anyhow::{Context, Result};
use clap::Parser;
use class_atlas::cli::{Cli, Commands, OutputFormat};
use class_atlas::decode::AnnotationRecord;
use class_atlas::dictionary::ClassDictionary;
use class_atlas::hierarchy::{ClassNode, HierarchyGraph};
use class_atlas::scan::scan;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let roots = resolve_roots(&cli)?;
    let start = Instant::now();
    let graph = scan(&roots, &cli.packages).with_context(|| {
        format!(
            "scan failed over roots: {}",
            roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;
    let scan_ms = start.elapsed().as_millis() as u64;

    match cli.command.clone() {
        Commands::Scan { format } => {
            let report = ScanReport {
                scanned_roots: roots.iter().map(|r| r.display().to_string()).collect(),
                packages: cli.packages.clone(),
                classes: graph.class_count(),
                interfaces: graph.interface_count(),
                roots: graph.roots().iter().map(|n| n.name.clone()).collect(),
                class_names: graph.class_names().iter().map(|n| n.to_string()).collect(),
                duration_ms: scan_ms,
            };
            print_report(&report, format, |r| {
                let mut out = String::new();
                out.push_str(&format!("classes: {}\n", r.classes));
                out.push_str(&format!("interfaces: {}\n", r.interfaces));
                out.push_str(&format!("duration_ms: {}\n", r.duration_ms));
                for name in &r.class_names {
                    out.push_str(&format!("- {name}\n"));
                }
                out
            })
        }
        Commands::Resolve { taxa, format } => {
            let dictionary = ClassDictionary::new(Arc::new(graph));
            let resolved = dictionary
                .resolve(&taxa)
                .with_context(|| format!("cannot resolve taxa {taxa:?}"))?;
            let report = ResolveReport {
                taxa,
                resolved,
                duration_ms: scan_ms,
            };
            print_report(&report, format, |r| {
                format!("taxa: {:?}\nresolved: {}\n", r.taxa, r.resolved)
            })
        }
        Commands::Info {
            name,
            annotation,
            format,
        } => {
            let reports = info_reports(&graph, name.as_deref(), annotation.as_deref())?;
            print_report(&reports, format, |all| {
                let mut out = String::new();
                for r in all {
                    out.push_str(&format!("class: {}\n", r.name));
                    if let Some(superclass) = &r.superclass {
                        out.push_str(&format!("  extends: {superclass}\n"));
                    }
                    for i in &r.interfaces {
                        out.push_str(&format!("  implements: {i}\n"));
                    }
                    for a in &r.annotations {
                        out.push_str(&format!("  annotated: {}\n", a.name));
                    }
                    for s in &r.subclasses {
                        out.push_str(&format!("  subclass: {s}\n"));
                    }
                }
                out
            })
        }
    }
}

/// Explicit --root flags win; otherwise the CLASSPATH variable is split
/// on the platform separator, mirroring how the scanned classes would
/// themselves be loaded.
fn resolve_roots(cli: &Cli) -> Result<Vec<PathBuf>> {
    if !cli.roots.is_empty() {
        return Ok(cli.roots.clone());
    }

    let separator = if cfg!(windows) { ';' } else { ':' };
    let classpath = std::env::var("CLASSPATH")
        .context("no --root given and the CLASSPATH environment variable is not set")?;
    let roots: Vec<PathBuf> = classpath
        .split(separator)
        .filter(|piece| !piece.is_empty())
        .map(PathBuf::from)
        .collect();
    if roots.is_empty() {
        anyhow::bail!("CLASSPATH is empty; pass --root");
    }
    Ok(roots)
}

#[derive(Debug, Serialize)]
struct ScanReport {
    scanned_roots: Vec<String>,
    packages: Vec<String>,
    classes: usize,
    interfaces: usize,
    roots: Vec<String>,
    class_names: Vec<String>,
    duration_ms: u64,
}

#[derive(Debug, Serialize)]
struct ResolveReport {
    taxa: Vec<String>,
    resolved: String,
    duration_ms: u64,
}

#[derive(Debug, Serialize)]
struct ClassReport {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    annotations: Vec<AnnotationRecord>,
    subclasses: Vec<String>,
    is_abstract: bool,
    fully_decoded: bool,
}

fn class_report(graph: &HierarchyGraph, node: &ClassNode) -> ClassReport {
    let details = node.details();
    ClassReport {
        name: node.name.clone(),
        superclass: details.and_then(|d| d.superclass_name.clone()),
        interfaces: details
            .map(|d| d.interfaces.iter().cloned().collect())
            .unwrap_or_default(),
        annotations: details
            .map(|d| d.annotations.clone())
            .unwrap_or_default(),
        subclasses: node
            .subclasses
            .iter()
            .map(|id| graph.node(*id).name.clone())
            .collect(),
        is_abstract: details.is_some_and(|d| d.is_abstract),
        fully_decoded: details.is_some(),
    }
}

fn info_reports(
    graph: &HierarchyGraph,
    name: Option<&str>,
    annotation: Option<&str>,
) -> Result<Vec<ClassReport>> {
    if let Some(annotation) = annotation {
        let carriers = graph.classes_with_annotation(annotation);
        if let Some(name) = name {
            let node = graph
                .class_with_annotation(annotation, name)
                .with_context(|| format!("no class {name} carries {annotation}"))?;
            return Ok(vec![class_report(graph, node)]);
        }
        return Ok(carriers
            .into_iter()
            .map(|node| class_report(graph, node))
            .collect());
    }

    let name = name.context("pass a class name or --annotation")?;
    let node = if name.contains('.') {
        graph.class_by_name(name)
    } else {
        graph.class_by_simple_name(name)?
    };
    let node = node.with_context(|| format!("class not found: {name}"))?;
    Ok(vec![class_report(graph, node)])
}

fn print_report<T: Serialize>(
    report: &T,
    format: OutputFormat,
    text: impl Fn(&T) -> String,
) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => text(report),
    };
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}
