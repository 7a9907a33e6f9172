//! Sync executor (run_sync)
//!
//! One-directional, incremental transfer of a remote directory tree into the
//! local content store. The destination mirrors the filtered source: files
//! are rewritten only when their content changed, and stale destination
//! entries are removed. Re-running against an unchanged source is a no-op.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, instrument};

use oprelay_api::{Platform, RunSyncRequest};
use oprelay_exec::{Channel, EntryKind};

use super::require_platform;
use crate::error::EngineError;

/// Transfer `request.source_directory` into `store_root/<environment>/`.
///
/// `exclude_paths` are glob patterns matched against source-relative paths;
/// matching entries and everything beneath a matching directory are left
/// out. Symlinks named in `sym_links_to_follow` are dereferenced and stored
/// as regular files; unlisted symlinks are skipped. All failures surface as
/// `Transfer`; there is no partial-success response.
#[instrument(skip_all, fields(environment = %request.remote_connection.environment))]
pub async fn run(
    channel: &dyn Channel,
    request: &RunSyncRequest,
    store_root: &Path,
) -> Result<(), EngineError> {
    require_platform("run_sync", channel.platform(), Platform::Unix)?;

    let source = request.source_directory.trim_end_matches('/');
    if source.is_empty() {
        return Err(EngineError::Transfer(
            "source directory is empty".to_string(),
        ));
    }

    let excludes = build_globset(&request.exclude_paths)?;
    let follow: HashSet<&str> = request
        .sym_links_to_follow
        .iter()
        .map(String::as_str)
        .collect();

    let entries = channel
        .list_tree(source)
        .await
        .map_err(|e| EngineError::Transfer(format!("listing {source}: {e}")))?;

    // a matching directory excludes its whole subtree
    let excluded_dirs: Vec<String> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Dir && excludes.is_match(&e.rel_path))
        .map(|e| format!("{}/", e.rel_path))
        .collect();
    let is_excluded = |rel: &str| {
        excludes.is_match(rel) || excluded_dirs.iter().any(|prefix| rel.starts_with(prefix))
    };

    let dest_root = store_root.join(&request.remote_connection.environment);
    tokio::fs::create_dir_all(&dest_root)
        .await
        .map_err(|e| EngineError::Transfer(format!("creating {}: {e}", dest_root.display())))?;

    let mut expected: HashSet<PathBuf> = HashSet::new();
    let mut written = 0usize;

    for entry in &entries {
        if is_excluded(&entry.rel_path) {
            continue;
        }

        let dest = dest_root.join(&entry.rel_path);
        match entry.kind {
            EntryKind::Dir => {
                tokio::fs::create_dir_all(&dest)
                    .await
                    .map_err(|e| EngineError::Transfer(format!("creating {}: {e}", dest.display())))?;
                expected.insert(PathBuf::from(&entry.rel_path));
            }
            EntryKind::File => {
                if transfer_file(channel, source, &entry.rel_path, &dest).await? {
                    written += 1;
                }
                expected.insert(PathBuf::from(&entry.rel_path));
            }
            EntryKind::Symlink => {
                if follow.contains(entry.rel_path.as_str()) {
                    // read_file dereferences, so the link lands as a
                    // regular file
                    if transfer_file(channel, source, &entry.rel_path, &dest).await? {
                        written += 1;
                    }
                    expected.insert(PathBuf::from(&entry.rel_path));
                }
                // unlisted symlinks are skipped
            }
        }
    }

    let removed = prune(&dest_root, &expected)?;

    info!(
        files = expected.len(),
        written, removed, "sync complete"
    );
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, EngineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| EngineError::Transfer(format!("exclude pattern {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| EngineError::Transfer(e.to_string()))
}

/// Write the remote file into the store if its content changed.
/// Returns whether a write happened.
async fn transfer_file(
    channel: &dyn Channel,
    source: &str,
    rel_path: &str,
    dest: &Path,
) -> Result<bool, EngineError> {
    let remote_path = format!("{source}/{rel_path}");
    let bytes = channel
        .read_file(&remote_path)
        .await
        .map_err(|e| EngineError::Transfer(format!("reading {remote_path}: {e}")))?;

    if let Ok(existing) = tokio::fs::read(dest).await
        && existing == bytes
    {
        debug!(path = %rel_path, "unchanged, skipping");
        return Ok(false);
    }

    // listing order is transport-dependent, so a file can precede its
    // directory entry
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EngineError::Transfer(format!("creating {}: {e}", parent.display())))?;
    }

    let file_name = dest
        .file_name()
        .ok_or_else(|| EngineError::Transfer(format!("invalid destination for {rel_path}")))?;
    let tmp = dest.with_file_name(format!("{}.oprelay-tmp", file_name.to_string_lossy()));

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| EngineError::Transfer(format!("writing {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, dest)
        .await
        .map_err(|e| EngineError::Transfer(format!("renaming {}: {e}", dest.display())))?;

    debug!(path = %rel_path, bytes = bytes.len(), "transferred");
    Ok(true)
}

/// Remove destination entries absent from the filtered source tree.
/// Returns the number of removed entries.
fn prune(dest_root: &Path, expected: &HashSet<PathBuf>) -> Result<usize, EngineError> {
    let mut removed = 0usize;

    for entry in walkdir::WalkDir::new(dest_root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
    {
        let entry = entry.map_err(|e| EngineError::Transfer(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(dest_root)
            .map_err(|e| EngineError::Transfer(e.to_string()))?;

        if expected.contains(rel) {
            continue;
        }

        let result = if entry.file_type().is_dir() {
            // children were pruned first, so the directory is empty by now
            std::fs::remove_dir(entry.path())
        } else {
            std::fs::remove_file(entry.path())
        };
        result.map_err(|e| {
            EngineError::Transfer(format!("removing {}: {e}", entry.path().display()))
        })?;

        debug!(path = %rel.display(), "pruned stale entry");
        removed += 1;
    }

    Ok(removed)
}
