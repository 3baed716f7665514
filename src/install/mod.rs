//! Install-and-register: resolve a version, fetch and unpack it, replace the
//! plugin directory and register the session-start hook.

pub mod github;
pub mod payload;

use crate::config::{InstallerSettings, TargetLayout, APP_NAME};
use crate::download::{extract_archive, find_extracted_root};
use crate::error::{InstallError, Stage, StageContext};
use crate::settings::register_hook;
use crate::types::InstallSummary;
use anyhow::{anyhow, Context, Result};
use github::{resolve_release, ReleaseSource};
use payload::{mark_entry_points_executable, replace_directory, HOOKS_DIR};
use std::fs;
use std::path::{Path, PathBuf};

pub const HOOK_SCRIPT_NAME: &str = "session-start.sh";

pub fn hook_script_path(plugin_dir: &Path) -> PathBuf {
    plugin_dir.join(HOOKS_DIR).join(HOOK_SCRIPT_NAME)
}

/// The command string written to settings. Derived only from the plugin
/// directory so repeated installs produce the same string.
pub fn hook_command(plugin_dir: &Path) -> String {
    shell_quote(&hook_script_path(plugin_dir).to_string_lossy())
}

fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%=,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Canonical path of the project directory. Nothing is created here.
pub fn validate_target(target: &Path) -> Result<PathBuf> {
    let metadata = fs::metadata(target)
        .with_context(|| format!("Target directory {} does not exist", target.display()))?;
    if !metadata.is_dir() {
        return Err(anyhow!("Target {} is not a directory", target.display()));
    }
    fs::canonicalize(target)
        .with_context(|| format!("Could not resolve {}", target.display()))
}

pub async fn install_plugin<S: ReleaseSource>(
    source: &S,
    settings: &InstallerSettings,
    target: &Path,
) -> Result<InstallSummary, InstallError> {
    let root = validate_target(target).stage(Stage::Validate)?;
    let layout = TargetLayout::new(&root, settings.plugin_name());
    tracing::debug!("Target layout: {:?}", layout);

    let release = resolve_release(source, settings).await;
    tracing::info!(
        "Installing {} ({}) into {}",
        settings.repo,
        release.reference,
        layout.plugin_dir.display()
    );

    // Removed on drop, including when this future is dropped on Ctrl-C
    let workspace = tempfile::Builder::new()
        .prefix(&format!("{}-", APP_NAME))
        .tempdir()
        .context("Could not create temporary workspace")
        .stage(Stage::Fetch)?;
    tracing::debug!("Workspace: {}", workspace.path().display());

    let archive_path = workspace.path().join(format!(
        "{}.{}",
        settings.package_name(),
        settings.format.extension()
    ));
    source
        .download(&release.archive_url, &archive_path)
        .await
        .with_context(|| format!("Failed to download {}", release.archive_url))
        .stage(Stage::Fetch)?;

    let extract_dir = workspace.path().join("extracted");
    extract_archive(&archive_path, &extract_dir, settings.format).stage(Stage::Extract)?;
    let payload_root =
        find_extracted_root(&extract_dir, settings.package_name()).stage(Stage::Extract)?;

    let (replace_mode, files_installed) =
        replace_directory(&payload_root, &layout.plugin_dir).stage(Stage::Install)?;
    let executables = mark_entry_points_executable(&layout.plugin_dir);

    let script = hook_script_path(&layout.plugin_dir);
    if !script.is_file() {
        tracing::warn!(
            "Package does not contain {}; registering it anyway",
            script.display()
        );
    }

    let command = hook_command(&layout.plugin_dir);
    let registration = register_hook(&layout.settings_path, &command).stage(Stage::Register)?;

    if let Err(e) = workspace.close() {
        tracing::warn!("Could not remove temporary workspace: {}", e);
    }

    Ok(InstallSummary {
        release,
        plugin_dir: layout.plugin_dir,
        replace_mode,
        files_installed,
        executables,
        command,
        settings_path: layout.settings_path,
        registration,
    })
}
