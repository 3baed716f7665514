//! Merging the session-start hook into a shared `settings.json`.
//!
//! The settings file belongs to the user. Only `hooks.SessionStart` is ever
//! touched, and only by appending one group; everything else is carried
//! through as an opaque `serde_json::Value`.

use crate::types::{MergeOutcome, Registration};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const HOOKS_KEY: &str = "hooks";
pub const SESSION_START_KEY: &str = "SessionStart";

/// A settings document as loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    pub root: Value,
    pub backup: Option<PathBuf>,
}

pub fn backup_path(settings_path: &Path) -> PathBuf {
    let mut name = settings_path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Loads the document, starting empty when the file is missing or blank.
/// Unparsable content (or a non-object root) is renamed to `<path>.bak`
/// before starting over.
pub fn load_settings(path: &Path) -> Result<SettingsDocument> {
    if !path.exists() {
        tracing::debug!("No settings file at {}, starting empty", path.display());
        return Ok(SettingsDocument {
            root: json!({}),
            backup: None,
        });
    }

    // Raw bytes, so invalid UTF-8 counts as corrupt rather than unreadable
    let content = fs::read(path)
        .with_context(|| format!("Could not read settings file at {}", path.display()))?;

    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(SettingsDocument {
            root: json!({}),
            backup: None,
        });
    }

    match serde_json::from_slice::<Value>(&content) {
        Ok(root) if root.is_object() => Ok(SettingsDocument { root, backup: None }),
        Ok(_) | Err(_) => {
            let backup = backup_path(path);
            tracing::warn!(
                "{} is not a valid JSON object; moving it to {}",
                path.display(),
                backup.display()
            );
            fs::rename(path, &backup).with_context(|| {
                format!(
                    "Could not back up unparsable settings to {}",
                    backup.display()
                )
            })?;
            Ok(SettingsDocument {
                root: json!({}),
                backup: Some(backup),
            })
        }
    }
}

/// Pretty-printed with a single trailing newline.
pub fn save_settings(path: &Path, root: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    let mut content = serde_json::to_string_pretty(root)?;
    content.push('\n');
    fs::write(path, content)
        .with_context(|| format!("Could not write settings file at {}", path.display()))?;
    Ok(())
}

fn group_has_command(group: &Value, command: &str) -> bool {
    group
        .get(HOOKS_KEY)
        .and_then(|h| h.as_array())
        .into_iter()
        .flatten()
        .filter_map(|hook| hook.get("command").and_then(|c| c.as_str()))
        .any(|cmd| cmd == command)
}

pub fn hook_group(command: &str) -> Value {
    json!({
        "hooks": [{
            "type": "command",
            "command": command
        }]
    })
}

/// Adds `command` to `hooks.SessionStart` unless some group already carries it.
///
/// Existing groups keep their order and content; a new group always goes at
/// the end. Fails rather than overwrite `hooks` or `SessionStart` values of
/// the wrong JSON type.
pub fn merge_session_start_hook(mut root: Value, command: &str) -> Result<(Value, MergeOutcome)> {
    let root_obj = root
        .as_object_mut()
        .ok_or_else(|| anyhow!("Settings root must be a JSON object"))?;

    let hooks = root_obj
        .entry(HOOKS_KEY)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow!("'{}' in settings is not an object", HOOKS_KEY))?;

    let session_start = hooks
        .entry(SESSION_START_KEY)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| {
            anyhow!(
                "'{}.{}' in settings is not an array",
                HOOKS_KEY,
                SESSION_START_KEY
            )
        })?;

    if session_start.iter().any(|group| group_has_command(group, command)) {
        return Ok((root, MergeOutcome::AlreadyPresent));
    }

    session_start.push(hook_group(command));
    Ok((root, MergeOutcome::Added))
}

/// Load, merge and, when something changed, write back.
pub fn register_hook(settings_path: &Path, command: &str) -> Result<Registration> {
    let document = load_settings(settings_path)?;
    let (root, outcome) = merge_session_start_hook(document.root, command)?;

    let written = match outcome {
        MergeOutcome::Added => {
            save_settings(settings_path, &root)?;
            tracing::info!("Registered SessionStart hook in {}", settings_path.display());
            true
        }
        MergeOutcome::AlreadyPresent => {
            tracing::info!("SessionStart hook already configured");
            false
        }
    };

    Ok(Registration {
        outcome,
        backup: document.backup,
        written,
    })
}
