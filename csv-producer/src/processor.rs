use std::sync::Arc;
use std::time::Duration;

use common_s3::S3Client;
use tracing::{error, info};

use crate::{
    config::Config,
    encode::BatchEncoder,
    error::FileError,
    extract::{NormalizedRow, RowExtractor},
    metrics_consts::{FILES_PROCESSED, MESSAGES_PUBLISHED, ROWS_EXTRACTED},
    publish::Publisher,
};

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub bucket: String,
    pub topic: String,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
}

impl From<&Config> for ProcessorConfig {
    fn from(config: &Config) -> Self {
        Self {
            bucket: config.bucket.0.clone(),
            topic: config.kafka_topic.0.clone(),
            chunk_size: config.chunk_size.get(),
            chunk_delay: config.chunk_delay.0,
        }
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Completed,
    Abandoned(FileError),
}

/// What happened to one file during one pass.
#[derive(Debug)]
pub struct FileReport {
    pub key: String,
    pub rows: usize,
    pub chunks_published: usize,
    pub messages_published: usize,
    pub outcome: FileOutcome,
}

impl FileReport {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            rows: 0,
            chunks_published: 0,
            messages_published: 0,
            outcome: FileOutcome::Completed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Completed)
    }

    pub fn error(&self) -> Option<&FileError> {
        match &self.outcome {
            FileOutcome::Completed => None,
            FileOutcome::Abandoned(e) => Some(e),
        }
    }
}

/// Drives one object through fetch, extraction, encoding and publishing in fixed-size chunks.
pub struct FileProcessor {
    store: Arc<dyn S3Client>,
    extractor: RowExtractor,
    encoder: BatchEncoder,
    publisher: Arc<dyn Publisher>,
    config: ProcessorConfig,
}

impl FileProcessor {
    pub fn new(
        store: Arc<dyn S3Client>,
        extractor: RowExtractor,
        encoder: BatchEncoder,
        publisher: Arc<dyn Publisher>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            encoder,
            publisher,
            config,
        }
    }

    /// Processes `key` to the end or until the first failure. Never fails itself: whatever
    /// went wrong is logged and returned in the report, and chunks that were already
    /// published stay published.
    pub async fn process(&self, key: &str) -> FileReport {
        let mut report = FileReport::new(key);
        let bucket = self.config.bucket.as_str();

        info!(bucket, key, "Attempting to download object");
        let result = self.process_chunks(key, &mut report).await;
        metrics::counter!(ROWS_EXTRACTED).increment(report.rows as u64);

        match result {
            Ok(()) => {
                info!(
                    bucket,
                    key,
                    rows = report.rows,
                    chunks = report.chunks_published,
                    "Finished processing file"
                );
                metrics::counter!(FILES_PROCESSED, "outcome" => "completed").increment(1);
            }
            Err(e) => {
                error!(
                    bucket,
                    key,
                    kind = e.kind(),
                    error = %e,
                    rows = report.rows,
                    chunks = report.chunks_published,
                    "Abandoning file for this pass"
                );
                metrics::counter!(FILES_PROCESSED, "outcome" => e.kind()).increment(1);
                report.outcome = FileOutcome::Abandoned(e);
            }
        }

        report
    }

    async fn process_chunks(&self, key: &str, report: &mut FileReport) -> Result<(), FileError> {
        let content = self.store.get_bytes(&self.config.bucket, key).await?;
        let chunk_size = self.config.chunk_size;

        let mut chunk = Vec::with_capacity(chunk_size);
        for row in self.extractor.extract(&content) {
            chunk.push(row?);
            report.rows += 1;

            if chunk.len() == chunk_size {
                let full = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
                self.publish_chunk(key, &full, report).await?;

                if !self.config.chunk_delay.is_zero() {
                    info!(
                        key,
                        "Waiting {} seconds before the next chunk",
                        self.config.chunk_delay.as_secs()
                    );
                    tokio::time::sleep(self.config.chunk_delay).await;
                }
            }
        }

        if !chunk.is_empty() {
            self.publish_chunk(key, &chunk, report).await?;
        }

        Ok(())
    }

    // The chunk is encoded in full before anything is sent
    async fn publish_chunk(
        &self,
        key: &str,
        chunk: &[NormalizedRow],
        report: &mut FileReport,
    ) -> Result<(), FileError> {
        let messages = self.encoder.encode_batch(chunk)?;
        let sent = self.publisher.publish(&self.config.topic, messages).await?;

        report.chunks_published += 1;
        report.messages_published += sent;
        metrics::counter!(MESSAGES_PUBLISHED).increment(sent as u64);

        info!(
            key,
            chunk = report.chunks_published,
            messages = sent,
            "Published chunk"
        );
        Ok(())
    }
}
