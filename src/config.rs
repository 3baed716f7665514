use crate::cli::Cli;
use crate::types::ArchiveFormat;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "plugin-bootstrap";
pub const CLAUDE_DIR_NAME: &str = ".claude";
pub const PLUGINS_DIR_NAME: &str = "plugins";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const DEFAULT_REPO: &str = "claude-plugins/session-bootstrap";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_WEB_URL: &str = "https://github.com";

pub const ENV_REPO: &str = "PLUGIN_BOOTSTRAP_REPO";
pub const ENV_PLUGIN_NAME: &str = "PLUGIN_BOOTSTRAP_PLUGIN_NAME";
pub const ENV_BRANCH: &str = "PLUGIN_BOOTSTRAP_BRANCH";
pub const ENV_FORMAT: &str = "PLUGIN_BOOTSTRAP_FORMAT";
pub const ENV_API_URL: &str = "PLUGIN_BOOTSTRAP_API_URL";
pub const ENV_WEB_URL: &str = "PLUGIN_BOOTSTRAP_WEB_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerSettings {
    pub repo: String,
    pub plugin_name: Option<String>,
    pub branch: String,
    pub format: ArchiveFormat,
    pub api_url: String,
    pub web_url: String,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            plugin_name: None,
            branch: DEFAULT_BRANCH.to_string(),
            format: ArchiveFormat::default(),
            api_url: DEFAULT_API_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
        }
    }
}

impl InstallerSettings {
    /// Repository name without the owner. GitHub archives unpack into a
    /// directory starting with this name.
    pub fn package_name(&self) -> &str {
        self.repo.rsplit('/').next().unwrap_or(&self.repo)
    }

    pub fn plugin_name(&self) -> &str {
        self.plugin_name.as_deref().unwrap_or_else(|| self.package_name())
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(repo) = non_empty(ENV_REPO) {
            self.repo = repo;
        }
        if let Some(name) = non_empty(ENV_PLUGIN_NAME) {
            self.plugin_name = Some(name);
        }
        if let Some(branch) = non_empty(ENV_BRANCH) {
            self.branch = branch;
        }
        if let Some(format) = non_empty(ENV_FORMAT) {
            match ArchiveFormat::parse(&format) {
                Some(format) => self.format = format,
                None => tracing::warn!("Ignoring unknown {} value '{}'", ENV_FORMAT, format),
            }
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = non_empty(ENV_WEB_URL) {
            self.web_url = url.trim_end_matches('/').to_string();
        }
    }

    pub fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(repo) = &cli.repo {
            self.repo = repo.clone();
        }
        if let Some(name) = &cli.plugin_name {
            self.plugin_name = Some(name.clone());
        }
        if let Some(branch) = &cli.branch {
            self.branch = branch.clone();
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_repo(&self.repo)?;
        let name = self.plugin_name();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(anyhow!("Invalid plugin name '{}'", name));
        }
        if self.branch.trim().is_empty() {
            return Err(anyhow!("Default branch name cannot be empty"));
        }
        Ok(())
    }
}

/// Defaults, then environment, then command line.
pub fn load_installer_settings(cli: &Cli) -> Result<InstallerSettings> {
    let mut settings = InstallerSettings::default();
    settings.apply_env_overrides(|key| std::env::var(key).ok());
    settings.apply_cli_overrides(cli);
    settings.validate()?;
    tracing::debug!("Installer settings: {:?}", settings);
    Ok(settings)
}

pub fn validate_repo(repo: &str) -> Result<()> {
    let mut parts = repo.split('/');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if is_repo_segment(owner) && is_repo_segment(name)
    );
    if valid {
        Ok(())
    } else {
        Err(anyhow!(
            "Invalid repository '{}'. Expected 'owner/name'.",
            repo
        ))
    }
}

fn is_repo_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Where things land inside a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    pub plugin_dir: PathBuf,
    pub settings_path: PathBuf,
}

impl TargetLayout {
    pub fn new(root: &Path, plugin_name: &str) -> Self {
        let claude_dir = root.join(CLAUDE_DIR_NAME);
        Self {
            plugin_dir: claude_dir.join(PLUGINS_DIR_NAME).join(plugin_name),
            settings_path: claude_dir.join(SETTINGS_FILE_NAME),
        }
    }
}
