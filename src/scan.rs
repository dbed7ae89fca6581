use ignore::WalkBuilder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::decode::read_class_unit;
use crate::error::{MetadataError, Result};
use crate::hierarchy::HierarchyGraph;

/// Scans the given roots for compiled class files under the accepted
/// package prefixes and assembles the hierarchy graph.
///
/// Roots may be directories, `.jar`/`.zip` archives or single `.class`
/// files; duplicated roots are scanned once. An empty package list
/// accepts every candidate. The pass is single-threaded and
/// run-to-completion: a missing or unreadable root aborts the whole
/// scan, while a malformed unit only skips that unit.
pub fn scan(roots: &[PathBuf], packages: &[String]) -> Result<HierarchyGraph> {
    let prefixes = package_prefixes(packages);
    let mut graph = HierarchyGraph::new();

    for root in dedup_roots(roots) {
        let metadata = root.metadata().map_err(|source| MetadataError::ScanRoot {
            path: root.clone(),
            source,
        })?;

        if metadata.is_dir() {
            scan_directory(&root, &prefixes, &mut graph)?;
        } else if is_archive(&root) {
            scan_archive(&root, &prefixes, &mut graph)?;
        } else {
            scan_class_file(&root, &mut graph)?;
        }
    }

    graph.build();
    Ok(graph)
}

/// `a.b.c` -> `a/b/c/`, the relative-path form candidates are matched
/// against.
pub fn package_prefixes(packages: &[String]) -> Vec<String> {
    packages
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| format!("{}/", p.replace('.', "/")))
        .collect()
}

/// Deduplicates roots that resolve to the same underlying location,
/// preserving first-seen order.
pub fn dedup_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen: Vec<PathBuf> = Vec::new();
    let mut unique = Vec::new();
    for root in roots {
        let canonical = root.canonicalize().unwrap_or_else(|_| root.clone());
        if !seen.contains(&canonical) {
            seen.push(canonical);
            unique.push(root.clone());
        }
    }
    unique
}

fn matches_prefix(relative: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|prefix| relative.starts_with(prefix))
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
}

fn scan_directory(root: &Path, prefixes: &[String], graph: &mut HierarchyGraph) -> Result<()> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(|source| MetadataError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if path.extension().is_none_or(|e| e != "class") {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if !matches_prefix(&relative, prefixes) {
            continue;
        }

        scan_class_file(path, graph)?;
    }

    Ok(())
}

fn scan_class_file(path: &Path, graph: &mut HierarchyGraph) -> Result<()> {
    let bytes = std::fs::read(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    merge_bytes(&bytes, &path.display().to_string(), graph);
    Ok(())
}

/// Scans every matching `.class` entry of a jar/zip. Archives nested
/// inside the archive are not recursed into.
fn scan_archive(path: &Path, prefixes: &[String], graph: &mut HierarchyGraph) -> Result<()> {
    let file = File::open(path).map_err(|source| MetadataError::ScanRoot {
        path: path.to_path_buf(),
        source,
    })?;
    // SAFETY: The file is opened read-only and remains valid for the
    // lifetime of the mmap. The mmap is dropped before the file.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| MetadataError::ScanRoot {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive =
        zip::ZipArchive::new(Cursor::new(&mmap[..])).map_err(|source| MetadataError::Archive {
            path: path.to_path_buf(),
            source,
        })?;

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping entry {i} of {}: {err}", path.display());
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !name.ends_with(".class") || !matches_prefix(&name, prefixes) {
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        if let Err(err) = entry.read_to_end(&mut bytes) {
            log::warn!("skipping {name} in {}: {err}", path.display());
            continue;
        }
        merge_bytes(&bytes, &format!("{}!{name}", path.display()), graph);
    }

    Ok(())
}

fn merge_bytes(bytes: &[u8], origin: &str, graph: &mut HierarchyGraph) {
    match read_class_unit(bytes) {
        Ok(Some(unit)) => {
            log::debug!("merged {} from {origin}", unit.name);
            graph.merge_unit(unit);
        }
        Ok(None) => log::debug!("{origin} is not a class file, skipped"),
        Err(err) => log::warn!("skipping {origin}: {err}"),
    }
}
