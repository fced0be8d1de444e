//! Copies files matching glob patterns from a source checkout into a session directory.
//!
//! Symlinks are never followed: a matched link is recreated with its original target string.
//! Matched directories are copied recursively. `.git` directories are never descended into.
//! Glob patterns do not descend through a symlinked directory in their literal prefix; a literal
//! path through such a link is still copied.
//! Writes never pass through a symlinked directory already present in the destination.

use crate::errors::HiveError;
use anyhow::Result;
use globset::{GlobBuilder, GlobMatcher};
use log::{debug, info, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Files and symlinks written to the destination.
    pub copied: usize,
    pub unmatched: Vec<String>,
}

fn traversal(pattern: &str, path: impl AsRef<Path>) -> HiveError {
    HiveError::PathTraversal {
        pattern: pattern.to_string(),
        path: path.as_ref().display().to_string(),
    }
}

fn escapes_root(path: &Path) -> bool {
    path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

/// Leading path components free of glob syntax.
fn static_prefix(pattern: &str) -> PathBuf {
    pattern
        .split('/')
        .take_while(|segment| !segment.contains(GLOB_META))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

fn is_git_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

/// Rejects a walk root that resolves outside `source` through a symlinked directory.
fn ensure_within(source: &Path, candidate: &Path, pattern: &str) -> Result<()> {
    let canonical_source = source
        .canonicalize()
        .map_err(|e| HiveError::io("resolve", source.display(), e))?;
    let canonical = candidate
        .canonicalize()
        .map_err(|e| HiveError::io("resolve", candidate.display(), e))?;
    if !canonical.starts_with(&canonical_source) {
        return Err(traversal(pattern, candidate).into());
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(HiveError::cancelled("copy files").into());
    }
    Ok(())
}

/// Remove whatever occupies `path` without following a symlink there.
fn clear_destination(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| HiveError::io("remove", path.display(), e))?;
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks are only supported on unix",
    ))
}

struct Copier<'a> {
    cancel: &'a CancellationToken,
    source: &'a Path,
    dest: &'a Path,
    copied: usize,
}

impl Copier<'_> {
    /// Copy one entry identified by its path relative to the source root.
    fn copy_entry(&mut self, pattern: &str, rel: &Path) -> Result<()> {
        if escapes_root(rel) {
            return Err(traversal(pattern, rel).into());
        }

        self.ensure_dest_parents(pattern, rel)?;
        let src = self.source.join(rel);
        let target = self.dest.join(rel);
        let meta =
            fs::symlink_metadata(&src).map_err(|e| HiveError::io("stat", src.display(), e))?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HiveError::io("create directory", parent.display(), e))?;
        }

        if meta.file_type().is_symlink() {
            let link_target =
                fs::read_link(&src).map_err(|e| HiveError::io("read link", src.display(), e))?;
            clear_destination(&target)?;
            create_symlink(&link_target, &target)
                .map_err(|e| HiveError::io("symlink", target.display(), e))?;
            debug!("Linked {} -> {}", rel.display(), link_target.display());
            self.copied += 1;
        } else if meta.is_dir() {
            self.copy_tree(pattern, rel)?;
        } else {
            if fs::symlink_metadata(&target).is_ok_and(|m| !m.is_file()) {
                clear_destination(&target)?;
            }
            fs::copy(&src, &target).map_err(|e| HiveError::io("copy", src.display(), e))?;
            fs::set_permissions(&target, meta.permissions())
                .map_err(|e| HiveError::io("set permissions", target.display(), e))?;
            debug!("Copied {}", rel.display());
            self.copied += 1;
        }

        Ok(())
    }

    /// Rejects a destination whose parent directories include a symlink under `dest`.
    fn ensure_dest_parents(&self, pattern: &str, rel: &Path) -> Result<()> {
        let Some(parent) = rel.parent() else {
            return Ok(());
        };
        let mut current = self.dest.to_path_buf();
        for component in parent.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    return Err(traversal(pattern, &current).into());
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        Ok(())
    }

    fn copy_tree(&mut self, pattern: &str, rel: &Path) -> Result<()> {
        let root = self.source.join(rel);
        let target = self.dest.join(rel);
        if fs::symlink_metadata(&target).is_ok_and(|m| !m.is_dir()) {
            clear_destination(&target)?;
        }
        fs::create_dir_all(&target)
            .map_err(|e| HiveError::io("create directory", target.display(), e))?;

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker.into_iter().filter_entry(|e| !is_git_dir(e)) {
            check_cancelled(self.cancel)?;
            let entry = entry.map_err(|e| HiveError::io("walk", root.display(), e))?;
            if entry.file_name() == ".git" {
                continue;
            }
            self.copy_entry(pattern, &rel.join(entry.file_name()))?;
        }
        Ok(())
    }

    /// Returns whether anything matched.
    fn copy_pattern(&mut self, pattern: &str) -> Result<bool> {
        let normalized = pattern.trim().trim_start_matches("./");
        if escapes_root(Path::new(normalized)) {
            return Err(traversal(pattern, normalized).into());
        }

        let prefix = static_prefix(normalized);
        let root = self.source.join(&prefix);
        if fs::symlink_metadata(&root).is_err() {
            return Ok(false);
        }

        if !normalized.contains(GLOB_META) {
            if prefix.as_os_str().is_empty() {
                return Ok(false);
            }
            if let Some(parent) = root.parent() {
                ensure_within(self.source, parent, pattern)?;
            }
            check_cancelled(self.cancel)?;
            self.copy_entry(pattern, &prefix)?;
            return Ok(true);
        }

        ensure_within(self.source, &root, pattern)?;
        let matcher: GlobMatcher = GlobBuilder::new(normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| HiveError::config("copy", e))?
            .compile_matcher();

        let mut matched = false;
        let mut walker = WalkDir::new(&root)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_git_dir(e));

        while let Some(entry) = walker.next() {
            check_cancelled(self.cancel)?;
            let entry = entry.map_err(|e| HiveError::io("walk", root.display(), e))?;
            let Ok(rel) = entry.path().strip_prefix(self.source) else {
                return Err(traversal(pattern, entry.path()).into());
            };
            if rel.as_os_str().is_empty() || !matcher.is_match(rel) {
                continue;
            }

            matched = true;
            let rel = rel.to_path_buf();
            let is_dir = entry.file_type().is_dir();
            self.copy_entry(pattern, &rel)?;
            if is_dir {
                walker.skip_current_dir();
            }
        }

        Ok(matched)
    }
}

/// Copy every entry matching `patterns` (relative to `source`) into `dest`.
///
/// A pattern matching nothing is reported, not failed. Patterns or matches resolving outside
/// `source` fail the whole operation with [`HiveError::PathTraversal`].
pub fn copy_patterns(
    cancel: &CancellationToken,
    source: &Path,
    dest: &Path,
    patterns: &[String],
) -> Result<CopyReport> {
    let mut copier = Copier {
        cancel,
        source,
        dest,
        copied: 0,
    };
    let mut unmatched = Vec::new();

    for pattern in patterns {
        check_cancelled(cancel)?;
        if !copier.copy_pattern(pattern)? {
            warn!(
                "Copy pattern '{pattern}' matched nothing in {}",
                source.display()
            );
            unmatched.push(pattern.clone());
        }
    }

    info!(
        "Copied {} entries from {} into {}",
        copier.copied,
        source.display(),
        dest.display()
    );
    Ok(CopyReport {
        copied: copier.copied,
        unmatched,
    })
}
