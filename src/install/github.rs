//! GitHub release lookup and archive URLs.

use crate::config::InstallerSettings;
use crate::download::download_file;
use crate::types::{ArchiveFormat, GitHubRelease, ReleaseDescriptor, ReleaseRef};
use anyhow::Result;
use reqwest::StatusCode;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubReleaseError {
    #[error("No releases found for {repo}")]
    LatestNotFound { repo: String },
    #[error("Failed to get release info for {repo}: {status}")]
    RequestFailed { repo: String, status: StatusCode },
}

/// Where releases and archives come from. The installer only needs these two
/// calls, which keeps the network out of the orchestration logic.
pub trait ReleaseSource {
    /// Tag of the latest published release, `None` when the response had no tag.
    async fn latest_tag(&self, repo: &str) -> Result<Option<String>>;

    /// Fetch `url` into `dest`. Returns the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

pub fn build_latest_release_url(api_base: &str, repo: &str) -> String {
    format!(
        "{}/repos/{}/releases/latest",
        api_base.trim_end_matches('/'),
        repo
    )
}

pub fn build_archive_url(
    web_base: &str,
    repo: &str,
    reference: &ReleaseRef,
    format: ArchiveFormat,
) -> String {
    let (kind, name) = match reference {
        ReleaseRef::Tag(tag) => ("tags", tag.as_str()),
        ReleaseRef::Branch(branch) => ("heads", branch.as_str()),
    };
    format!(
        "{}/{}/archive/refs/{}/{}.{}",
        web_base.trim_end_matches('/'),
        repo,
        kind,
        name,
        format.extension()
    )
}

/// Picks the latest release tag, or the configured branch when the lookup
/// fails for any reason. Never errors.
pub async fn resolve_release<S: ReleaseSource>(
    source: &S,
    settings: &InstallerSettings,
) -> ReleaseDescriptor {
    let reference = match source.latest_tag(&settings.repo).await {
        Ok(Some(tag)) if !tag.trim().is_empty() => {
            tracing::info!("Latest release of {} is {}", settings.repo, tag);
            ReleaseRef::Tag(tag.trim().to_string())
        }
        Ok(_) => {
            tracing::warn!(
                "Latest release of {} has no tag; using branch '{}'",
                settings.repo,
                settings.branch
            );
            ReleaseRef::Branch(settings.branch.clone())
        }
        Err(e) => {
            tracing::warn!(
                "Could not resolve latest release of {} ({:#}); using branch '{}'",
                settings.repo,
                e,
                settings.branch
            );
            ReleaseRef::Branch(settings.branch.clone())
        }
    };

    let archive_url = build_archive_url(&settings.web_url, &settings.repo, &reference, settings.format);
    tracing::debug!("Archive URL: {}", archive_url);

    ReleaseDescriptor {
        reference,
        archive_url,
    }
}

pub struct GitHubSource {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    show_progress: bool,
}

impl GitHubSource {
    pub fn new(settings: &InstallerSettings, show_progress: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("plugin-bootstrap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        if token.is_some() {
            tracing::debug!("Using GITHUB_TOKEN");
        }
        Ok(Self {
            client,
            api_base: settings.api_url.clone(),
            token,
            show_progress,
        })
    }
}

impl ReleaseSource for GitHubSource {
    async fn latest_tag(&self, repo: &str) -> Result<Option<String>> {
        let url = build_latest_release_url(&self.api_base, repo);
        tracing::debug!("Fetching GitHub release info from: {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {}", token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            if response.status() == StatusCode::NOT_FOUND {
                return Err(GitHubReleaseError::LatestNotFound {
                    repo: repo.to_string(),
                }
                .into());
            }
            return Err(GitHubReleaseError::RequestFailed {
                repo: repo.to_string(),
                status: response.status(),
            }
            .into());
        }

        let release: GitHubRelease = response.json().await?;
        Ok(release.tag_name)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        download_file(&self.client, url, dest, self.show_progress).await
    }
}
