//! Release metadata and latest-release selection

use async_trait::async_trait;
use hopper_core::types::{GitHubConfig, UpdaterConfig};
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::version::Version;

/// Which releases count as candidates for "latest"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Use the host's own notion of the latest stable release
    #[default]
    StableOnly,
    /// Rank every release with a valid tag, pre-releases included
    IncludePrerelease,
}

impl ReleasePolicy {
    pub fn from_include_prerelease(include: bool) -> Self {
        if include {
            ReleasePolicy::IncludePrerelease
        } else {
            ReleasePolicy::StableOnly
        }
    }
}

/// One remote release with its first asset
#[derive(Debug, Clone)]
pub struct ReleaseInfo {
    pub tag: String,
    pub version: Version,
    pub asset_file_name: String,
    pub download_url: String,
    pub release_notes: String,
    pub is_pre_release: bool,
}

impl ReleaseInfo {
    fn from_raw(raw: RawRelease) -> Result<Self, FetchError> {
        let asset = raw
            .assets
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MissingAsset {
                tag: raw.tag_name.clone(),
            })?;

        Ok(Self {
            version: Version::parse(&raw.tag_name),
            tag: raw.tag_name,
            asset_file_name: asset.name,
            download_url: asset.browser_download_url,
            release_notes: raw.body.unwrap_or_default(),
            is_pre_release: raw.prerelease,
        })
    }
}

/// Wire shape of a release entry
#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    name: String,
    browser_download_url: String,
}

/// Anything that can resolve the latest release
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn fetch_latest(&self, policy: ReleasePolicy) -> Result<ReleaseInfo, FetchError>;
}

/// Release catalog backed by a GitHub-style REST API
pub struct ReleaseCatalog {
    client: reqwest::Client,
    github: GitHubConfig,
}

impl ReleaseCatalog {
    /// Build a catalog with the configured host, user agent and timeout
    pub fn new(config: &UpdaterConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.network.user_agent)
            .timeout(Duration::from_secs(config.network.http_timeout_secs))
            .build()
            .map_err(|e| FetchError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.github.clone()))
    }

    pub fn with_client(client: reqwest::Client, github: GitHubConfig) -> Self {
        Self { client, github }
    }

    fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.github.api_url.trim_end_matches('/'),
            self.github.repo_owner,
            self.github.repo_name
        )
    }

    /// The host's latest stable release
    pub async fn get_latest(&self) -> Result<ReleaseInfo, FetchError> {
        let url = format!("{}/latest", self.releases_url());
        let raw: RawRelease = self.get_json(&url).await?;
        ReleaseInfo::from_raw(raw)
    }

    /// Highest valid version among all releases, pre-releases included
    pub async fn get_highest(&self) -> Result<ReleaseInfo, FetchError> {
        let url = self.releases_url();
        let raws: Vec<RawRelease> = self.get_json(&url).await?;
        let total = raws.len();

        let best = raws
            .into_iter()
            .filter(|raw| {
                let valid = Version::parse(&raw.tag_name).is_valid();
                if !valid {
                    debug!("Skipping release with unparsable tag {:?}", raw.tag_name);
                }
                valid
            })
            .max_by(|a, b| Version::parse(&a.tag_name).cmp(&Version::parse(&b.tag_name)))
            .ok_or(FetchError::NoValidReleases)?;

        debug!("Selected {} out of {} releases", best.tag_name, total);
        ReleaseInfo::from_raw(best)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!("Fetching release metadata from: {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status();
        if is_rate_limited(status, response.headers()) {
            return Err(FetchError::RateLimited {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ReleaseSource for ReleaseCatalog {
    async fn fetch_latest(&self, policy: ReleasePolicy) -> Result<ReleaseInfo, FetchError> {
        let result = match policy {
            ReleasePolicy::StableOnly => self.get_latest().await,
            ReleasePolicy::IncludePrerelease => self.get_highest().await,
        };

        match &result {
            Ok(release) => info!(
                tag = %release.tag,
                asset = %release.asset_file_name,
                "Resolved latest release"
            ),
            Err(e) => warn!("Failed to check for updates: {}", e),
        }

        result
    }
}

/// 429, or a 403 that reports an exhausted quota
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}
