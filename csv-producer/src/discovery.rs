use std::sync::Arc;
use std::time::Duration;

use common_s3::S3Client;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    metrics_consts::{DISCOVERY_PASSES, LISTING_FAILURES},
    processor::{FileProcessor, FileReport},
};

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub bucket: String,
    pub prefix: String,
    pub extension: String,
    pub poll_interval: Duration,
}

impl From<&Config> for DiscoveryConfig {
    fn from(config: &Config) -> Self {
        Self {
            bucket: config.bucket.0.clone(),
            prefix: config.path_prefix.clone(),
            extension: config.file_extension.clone(),
            poll_interval: config.process_interval.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Scanning,
    Idling(Duration),
}

/// Result of a single scan over the bucket.
#[derive(Debug, Default)]
pub struct PassReport {
    pub files: Vec<FileReport>,
}

impl PassReport {
    pub fn completed(&self) -> usize {
        self.files.iter().filter(|f| f.is_completed()).count()
    }

    pub fn abandoned(&self) -> usize {
        self.files.len() - self.completed()
    }
}

/// Periodically lists the bucket and hands every matching object to the processor, one
/// after another. No state is kept between passes, so unchanged files are sent again.
pub struct DiscoveryLoop {
    store: Arc<dyn S3Client>,
    processor: FileProcessor,
    config: DiscoveryConfig,
}

impl DiscoveryLoop {
    pub fn new(
        store: Arc<dyn S3Client>,
        processor: FileProcessor,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            store,
            processor,
            config,
        }
    }

    /// Keys under the prefix that end with the configured extension, in listing order.
    /// A listing failure is logged and treated as an empty bucket.
    pub async fn discover(&self) -> Vec<String> {
        let DiscoveryConfig { bucket, prefix, .. } = &self.config;
        info!("Checking for files in s3://{}/{}", bucket, prefix);

        match self.store.list_keys(bucket, prefix).await {
            Ok(keys) => keys
                .into_iter()
                .filter(|key| key.ends_with(self.config.extension.as_str()))
                .collect(),
            Err(e) => {
                error!(
                    bucket = bucket.as_str(),
                    prefix = prefix.as_str(),
                    error = %e,
                    "Failed to list objects"
                );
                metrics::counter!(LISTING_FAILURES).increment(1);
                Vec::new()
            }
        }
    }

    pub async fn run_pass(&self) -> PassReport {
        metrics::counter!(DISCOVERY_PASSES).increment(1);
        let keys = self.discover().await;

        let mut report = PassReport::default();
        if keys.is_empty() {
            warn!(
                "No files found in s3://{}/{}",
                self.config.bucket, self.config.prefix
            );
            return report;
        }

        info!("Found {} files to process", keys.len());
        for key in keys {
            report.files.push(self.processor.process(&key).await);
        }

        info!(
            completed = report.completed(),
            abandoned = report.abandoned(),
            "Finished processing all files"
        );
        report
    }

    /// Advances the loop by one state: a scan is always followed by a full idle interval.
    pub async fn step(&self, state: LoopState) -> LoopState {
        match state {
            LoopState::Scanning => {
                self.run_pass().await;
                info!(
                    "Waiting for {} seconds before checking again",
                    self.config.poll_interval.as_secs()
                );
                LoopState::Idling(self.config.poll_interval)
            }
            LoopState::Idling(wait) => {
                tokio::time::sleep(wait).await;
                LoopState::Scanning
            }
        }
    }

    /// Runs `passes` scans with the usual idle interval between them.
    pub async fn run_passes(&self, passes: usize) -> Vec<PassReport> {
        let mut reports = Vec::with_capacity(passes);
        for pass in 0..passes {
            if pass > 0 {
                self.step(LoopState::Idling(self.config.poll_interval)).await;
            }
            reports.push(self.run_pass().await);
        }
        reports
    }

    pub async fn run(&self) {
        let mut state = LoopState::Scanning;
        loop {
            state = self.step(state).await;
        }
    }
}
