//! Shared test constants

pub const TEST_OWNER: &str = "hopper-rs";
pub const TEST_REPO: &str = "hopper";

pub const TAG_V1_0_0: &str = "v1.0.0";
pub const TAG_V1_0_1: &str = "v1.0.1";
pub const TAG_V1_1_0_PRE2: &str = "v1.1.0-pre2";
pub const TAG_V1_1_0_PRE10: &str = "v1.1.0-pre10";

pub const ASSET_NAME: &str = "hopper-x86_64-unknown-linux-gnu";
pub const ASSET_PATH: &str = "/downloads/hopper-x86_64-unknown-linux-gnu";

pub const OLD_BINARY_CONTENT: &[u8] = b"#!/bin/sh\necho old build\n";
pub const NEW_BINARY_CONTENT: &[u8] = b"#!/bin/sh\necho new build\n";

pub const RELEASE_NOTES: &str = "## Changes\n- Faster startup";

/// Path of the releases collection on the mock API
pub fn releases_path() -> String {
    format!("/repos/{}/{}/releases", TEST_OWNER, TEST_REPO)
}

/// Path of the latest-release endpoint on the mock API
pub fn latest_path() -> String {
    format!("{}/latest", releases_path())
}
