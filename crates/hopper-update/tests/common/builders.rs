//! Builders for release payloads and updater configurations

use hopper_core::types::{RetryPolicy, UpdaterConfig};
use hopper_update::releases::ReleaseInfo;
use hopper_update::version::Version;
use serde_json::{json, Value};
use std::path::Path;

use super::constants::*;

/// Builds one release entry in the releases API's JSON shape
#[derive(Debug, Clone)]
pub struct ReleaseJsonBuilder {
    tag_name: String,
    body: Option<String>,
    prerelease: bool,
    assets: Vec<(String, String)>,
}

impl ReleaseJsonBuilder {
    pub fn new(tag: &str) -> Self {
        Self {
            tag_name: tag.to_string(),
            body: None,
            prerelease: false,
            assets: Vec::new(),
        }
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn prerelease(mut self) -> Self {
        self.prerelease = true;
        self
    }

    pub fn asset(mut self, name: &str, url: &str) -> Self {
        self.assets.push((name.to_string(), url.to_string()));
        self
    }

    /// One asset pointing at `ASSET_PATH` on `base_url`
    pub fn with_standard_asset(self, base_url: &str) -> Self {
        let url = format!("{}{}", base_url, ASSET_PATH);
        self.asset(ASSET_NAME, &url)
    }

    pub fn build(self) -> Value {
        let assets: Vec<Value> = self
            .assets
            .into_iter()
            .map(|(name, url)| json!({ "name": name, "browser_download_url": url }))
            .collect();

        json!({
            "tag_name": self.tag_name,
            "body": self.body,
            "prerelease": self.prerelease,
            "draft": false,
            "assets": assets,
        })
    }
}

/// A `ReleaseInfo` as a fake release source would return it
pub fn release_info(tag: &str, download_url: &str) -> ReleaseInfo {
    ReleaseInfo {
        tag: tag.to_string(),
        version: Version::parse(tag),
        asset_file_name: ASSET_NAME.to_string(),
        download_url: download_url.to_string(),
        release_notes: RELEASE_NOTES.to_string(),
        is_pre_release: Version::parse(tag).is_pre_release(),
    }
}

/// Updater configuration pointing at a mock API and a temporary working dir
pub fn test_config(api_url: &str, working_dir: &Path) -> UpdaterConfig {
    let mut config = UpdaterConfig::default();
    config.github.api_url = api_url.to_string();
    config.github.repo_owner = TEST_OWNER.to_string();
    config.github.repo_name = TEST_REPO.to_string();
    config.network.http_timeout_secs = 5;
    config.network.download_timeout_secs = 5;
    config.update.working_dir = working_dir.to_path_buf();
    config.update.staging_file_name = "hopper-staged".to_string();

    let quick = RetryPolicy::fixed(5, 1);
    config
        .retry_policies
        .operations
        .insert("replace".to_string(), quick.clone());
    config
        .retry_policies
        .operations
        .insert("remove".to_string(), quick);
    config
}
