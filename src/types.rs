use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ArchiveFormat {
    #[default]
    TarGz,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tar.gz" | "tar-gz" | "tgz" => Some(ArchiveFormat::TarGz),
            "zip" => Some(ArchiveFormat::Zip),
            _ => None,
        }
    }
}

/// Subset of the GitHub "latest release" payload we care about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GitHubRelease {
    #[serde(default)]
    pub tag_name: Option<String>,
}

/// What gets downloaded: a release tag, or the default branch when no tag resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseRef {
    Tag(String),
    Branch(String),
}

impl ReleaseRef {
    pub fn name(&self) -> &str {
        match self {
            ReleaseRef::Tag(tag) => tag,
            ReleaseRef::Branch(branch) => branch,
        }
    }
}

impl fmt::Display for ReleaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseRef::Tag(tag) => write!(f, "release {}", tag),
            ReleaseRef::Branch(branch) => write!(f, "branch {} (no release found)", branch),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    pub reference: ReleaseRef,
    pub archive_url: String,
}

impl ReleaseDescriptor {
    pub fn tag(&self) -> Option<&str> {
        match &self.reference {
            ReleaseRef::Tag(tag) => Some(tag),
            ReleaseRef::Branch(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Built beside the destination and renamed into place
    Staged,
    /// Destination removed, then copied into directly
    InPlace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub outcome: MergeOutcome,
    /// Set when an unparsable settings file was moved aside
    pub backup: Option<PathBuf>,
    pub written: bool,
}

#[derive(Debug, Clone)]
pub struct InstallSummary {
    pub release: ReleaseDescriptor,
    pub plugin_dir: PathBuf,
    pub replace_mode: ReplaceMode,
    pub files_installed: usize,
    pub executables: Vec<PathBuf>,
    pub command: String,
    pub settings_path: PathBuf,
    pub registration: Registration,
}
