//! Artifact packaging: code tree (+ extra files) → zip archive bytes.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use cirrus_core::spec::CodeSource;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackagingError;

/// Vendor SDK cache, relative to the source root. Never shipped: the
/// function runtime provides its own copy.
pub const EXCLUDED_DIR: &str = "node_modules/aws-sdk";

/// Build a deflate-compressed zip of `code`.
///
/// Extra files land at the archive root under their base names; every file
/// under the source directory keeps its path relative to that directory.
/// An extra file shadows a tree file with the same archive name, and when
/// two extra files share a base name the later one wins.
/// Nothing here touches the network, so a failure leaves no remote trace.
pub fn pack(code: &CodeSource) -> Result<Vec<u8>, PackagingError> {
    let root = code.directory().ok_or(PackagingError::EmptySource)?;
    if !root.is_dir() {
        return Err(PackagingError::SourceNotFound(root.to_path_buf()));
    }

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut buf = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buf));
    let mut entries = 0usize;

    let extras = root_entries(code.extra_files())?;
    let shadowed: HashSet<&str> = extras.iter().map(|(name, _)| name.as_str()).collect();
    for (name, path) in &extras {
        append_file(&mut zip, path, name.clone(), options)?;
        entries += 1;
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(root, entry.path()));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = archive_name(root, entry.path())?;
        if shadowed.contains(name.as_str()) {
            tracing::debug!(entry = %name, "tree file shadowed by extra file");
            continue;
        }
        append_file(&mut zip, entry.path(), name, options)?;
        entries += 1;
    }

    zip.finish()?;
    tracing::debug!(
        source = %root.display(),
        entries,
        bytes = buf.len(),
        "code packaged"
    );
    Ok(buf)
}

/// Base names for the extra files, keeping only the last path per name.
fn root_entries(extras: &[PathBuf]) -> Result<Vec<(String, &Path)>, PackagingError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(extras.len());
    for extra in extras.iter().rev() {
        let name = extra
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PackagingError::InvalidPath(extra.clone()))?;
        if seen.insert(name.clone()) {
            entries.push((name, extra.as_path()));
        }
    }
    entries.reverse();
    Ok(entries)
}

fn append_file(
    zip: &mut ZipWriter<Cursor<&mut Vec<u8>>>,
    path: &Path,
    name: String,
    options: SimpleFileOptions,
) -> Result<(), PackagingError> {
    let mut file = File::open(path)?;
    let mode = file_mode(&file)?;
    zip.start_file(name, options.unix_permissions(mode))?;
    io::copy(&mut file, zip)?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(file: &File) -> io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(file.metadata()?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_file: &File) -> io::Result<u32> {
    Ok(0o644)
}

fn is_excluded(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .is_ok_and(|rel| rel.starts_with(EXCLUDED_DIR))
}

/// Forward-slash path relative to `root`, as zip entry names require.
fn archive_name(root: &Path, path: &Path) -> Result<String, PackagingError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| PackagingError::InvalidPath(path.to_path_buf()))?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return Err(PackagingError::InvalidPath(path.to_path_buf()));
    }
    Ok(parts.join("/"))
}
