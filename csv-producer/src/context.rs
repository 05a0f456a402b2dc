use std::sync::Arc;

use anyhow::{Context, Error};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{config::Credentials, Client as AwsS3SdkClient};
use common_kafka::kafka_producer::create_kafka_producer;
use common_s3::{S3Client, S3Impl};
use tracing::info;

use crate::{
    config::Config,
    discovery::{DiscoveryConfig, DiscoveryLoop},
    encode::BatchEncoder,
    extract::RowExtractor,
    processor::{FileProcessor, ProcessorConfig},
    publish::{KafkaPublisher, Publisher},
    schema::{SchemaDefinition, SchemaFilter},
};

/// Long-lived handles shared by every pass. Building one fails if the schema is unusable
/// or the Kafka cluster can't be reached.
pub struct AppContext {
    pub config: Config,
    pub schema: Arc<SchemaDefinition>,
    pub store: Arc<dyn S3Client>,
    pub publisher: Arc<dyn Publisher>,
}

impl AppContext {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let schema = SchemaDefinition::load(&config.schema_path)
            .with_context(|| format!("loading schema from {}", config.schema_path))?;
        info!(
            "Loaded schema {} with {} fields",
            config.schema_path,
            schema.fields().len()
        );

        let store = Arc::new(S3Impl::new(create_s3_client(config).await));

        let producer = create_kafka_producer(&config.kafka)
            .await
            .context("connecting to kafka")?;
        let publisher = Arc::new(KafkaPublisher::new(producer, config.kafka_flush_timeout.0));

        Ok(Self {
            config: config.clone(),
            schema: Arc::new(schema),
            store,
            publisher,
        })
    }

    pub fn discovery_loop(&self) -> DiscoveryLoop {
        let processor = FileProcessor::new(
            self.store.clone(),
            RowExtractor::new(
                SchemaFilter::new(self.schema.clone()),
                self.config.column_delimiter.0,
            ),
            BatchEncoder::new(self.schema.clone()),
            self.publisher.clone(),
            ProcessorConfig::from(&self.config),
        );

        DiscoveryLoop::new(
            self.store.clone(),
            processor,
            DiscoveryConfig::from(&self.config),
        )
    }
}

async fn create_s3_client(config: &Config) -> AwsS3SdkClient {
    let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.0.clone()))
        .credentials_provider(Credentials::new(
            config.aws_access_key_id.as_str(),
            config.aws_secret_access_key.as_str(),
            None,
            None,
            "environment",
        ));

    if let Some(endpoint) = &config.aws_endpoint_url.0 {
        aws_config_builder = aws_config_builder.endpoint_url(endpoint.as_str());
    }

    let aws_config = aws_config_builder.load().await;

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);
    if config.aws_endpoint_url.0.is_some() {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    AwsS3SdkClient::from_conf(s3_config_builder.build())
}
