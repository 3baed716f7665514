//! Copying an unpacked package into its plugin directory.

use crate::types::ReplaceMode;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Packaging leftovers that never belong in an installed plugin.
pub const EXCLUDED_DIRS: &[&str] = &[".git", "bin", "obj"];
pub const EXCLUDED_FILES: &[&str] = &[".gitignore"];

pub const HOOKS_DIR: &str = "hooks";
pub const INSTALLER_SCRIPT: &str = "install.sh";

fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        EXCLUDED_DIRS.contains(&name.as_ref())
    } else {
        EXCLUDED_FILES.contains(&name.as_ref())
    }
}

/// Recursively copies `source` into `dest` (created if needed), skipping the
/// excluded names at any depth. Returns the number of files copied.
pub fn copy_payload(source: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).with_context(|| format!("Could not create {}", dest.display()))?;

    let mut copied = 0;
    let walker = WalkDir::new(source)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_excluded(e));

    for entry in walker {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Could not copy {} to {}", entry.path().display(), target.display())
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> Result<()> {
    tracing::warn!("Skipping symlink {}", link.display());
    Ok(())
}

/// Replaces `dest` with a copy of `source`.
///
/// The copy is built in a hidden sibling directory and renamed into place, so
/// an interrupted run leaves either the old or the new plugin. When the
/// sibling cannot be created or renamed, falls back to deleting `dest` and
/// copying into it directly.
pub fn replace_directory(source: &Path, dest: &Path) -> Result<(ReplaceMode, usize)> {
    let parent = dest
        .parent()
        .ok_or_else(|| anyhow!("Invalid destination {}", dest.display()))?;
    let name = dest
        .file_name()
        .ok_or_else(|| anyhow!("Invalid destination {}", dest.display()))?
        .to_string_lossy()
        .to_string();
    fs::create_dir_all(parent).with_context(|| format!("Could not create {}", parent.display()))?;

    let staging = match tempfile::Builder::new()
        .prefix(&format!(".{}.staging-", name))
        .tempdir_in(parent)
    {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!("Staging directory unavailable ({}); copying in place", e);
            let copied = replace_in_place(source, dest)?;
            return Ok((ReplaceMode::InPlace, copied));
        }
    };

    let copied = copy_payload(source, staging.path())?;

    let previous = parent.join(format!(".{}.previous", name));
    if previous.exists() {
        fs::remove_dir_all(&previous)
            .with_context(|| format!("Could not remove stale {}", previous.display()))?;
    }
    let had_previous = dest.exists();
    if had_previous {
        fs::rename(dest, &previous)
            .with_context(|| format!("Could not move aside {}", dest.display()))?;
    }

    if let Err(e) = fs::rename(staging.path(), dest) {
        if had_previous {
            fs::rename(&previous, dest)
                .with_context(|| format!("Could not restore {}", dest.display()))?;
        }
        tracing::warn!("Could not swap staged plugin into place ({}); copying in place", e);
        let copied = replace_in_place(source, dest)?;
        return Ok((ReplaceMode::InPlace, copied));
    }

    if had_previous {
        if let Err(e) = fs::remove_dir_all(&previous) {
            tracing::warn!("Could not remove {}: {}", previous.display(), e);
        }
    }

    tracing::debug!("Swapped staged plugin into {}", dest.display());
    Ok((ReplaceMode::Staged, copied))
}

fn replace_in_place(source: &Path, dest: &Path) -> Result<usize> {
    if dest.exists() {
        fs::remove_dir_all(dest).with_context(|| format!("Could not remove {}", dest.display()))?;
    }
    copy_payload(source, dest)
}

/// Marks `hooks/**/*.sh` and a top-level `install.sh` executable. Missing
/// files and permission failures are logged, not fatal.
pub fn mark_entry_points_executable(plugin_dir: &Path) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(plugin_dir.join(HOOKS_DIR))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "sh"))
        .map(|e| e.into_path())
        .collect();

    let installer = plugin_dir.join(INSTALLER_SCRIPT);
    if installer.is_file() {
        candidates.push(installer);
    }

    if candidates.is_empty() {
        tracing::debug!("No hook scripts found under {}", plugin_dir.display());
    }

    candidates
        .into_iter()
        .filter(|path| match make_executable(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not mark {} executable: {}", path.display(), e);
                false
            }
        })
        .collect()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
