//! Streaming asset download
//!
//! The asset is written to the staging path in fixed-size chunks while
//! [`ProgressTracker`] turns byte counts into percentage events. A failed
//! download leaves whatever was written on disk; removing the staging file
//! is the clean stage's job.

use futures_util::StreamExt;
use hopper_core::types::UpdaterConfig;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::progress::{ProgressHub, ProgressTracker};

/// Streams release assets to local files
pub struct Downloader {
    client: reqwest::Client,
    chunk_size: usize,
    progress: ProgressHub,
}

impl Downloader {
    /// Build a downloader using the configured timeout, user agent and chunk size
    pub fn new(config: &UpdaterConfig, progress: ProgressHub) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.network.user_agent)
            .timeout(Duration::from_secs(config.network.download_timeout_secs))
            .build()?;

        Ok(Self::with_client(
            client,
            config.network.download_chunk_size,
            progress,
        ))
    }

    pub fn with_client(client: reqwest::Client, chunk_size: usize, progress: ProgressHub) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
            progress,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Download `url` into `destination`, returning the number of bytes written
    ///
    /// Listeners get `on_download_complete` or `on_download_failed` exactly
    /// once, after the last progress event.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        info!("Downloading {} to {:?}", url, destination);

        let result = self.stream_to_file(url, destination).await;

        match &result {
            Ok(bytes) => {
                info!(bytes, "Download completed");
                self.progress.complete();
            }
            Err(e) => {
                warn!("Download failed: {}", e);
                self.progress.failed();
            }
        }

        result
    }

    async fn stream_to_file(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let mut tracker = ProgressTracker::new(response.content_length());
        match tracker.total() {
            Some(total) => debug!("Content length: {} bytes", total),
            None => debug!("Content length unknown, progress disabled"),
        }

        let io_err = |source: std::io::Error| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let file = File::create(destination).map_err(io_err)?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk: bytes::Bytes = chunk?;
            for piece in chunk.chunks(self.chunk_size) {
                writer.write_all(piece).map_err(io_err)?;
                if let Some(percent) = tracker.advance(piece.len() as u64) {
                    self.progress.progress(percent);
                }
            }
        }

        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;

        Ok(tracker.bytes_read())
    }
}
