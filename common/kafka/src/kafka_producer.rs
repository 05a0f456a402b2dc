use crate::config::KafkaConfig;

use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use thiserror::Error;
use tracing::{debug, error, info};

pub struct KafkaContext;

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        debug!(
            client = %stats.name,
            queued_messages = stats.msg_cnt,
            "rdkafka statistics"
        );
    }
}

pub async fn create_kafka_producer(
    config: &KafkaConfig,
) -> Result<FutureProducer<KafkaContext>, KafkaError> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.kafka_hosts.as_str())
        .set("statistics.interval.ms", "10000")
        .set("linger.ms", config.kafka_producer_linger_ms.to_string())
        .set(
            "message.timeout.ms",
            config.kafka_message_timeout_ms.to_string(),
        )
        .set(
            "compression.codec",
            config.kafka_compression_codec.to_owned(),
        )
        .set(
            "queue.buffering.max.kbytes",
            (config.kafka_producer_queue_mib * 1024).to_string(),
        );

    if config.kafka_tls {
        client_config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    };

    debug!("rdkafka configuration: {:?}", client_config);
    let api: FutureProducer<KafkaContext> = client_config.create_with_context(KafkaContext)?;

    // "Ping" the Kafka brokers by requesting metadata
    match api
        .client()
        .fetch_metadata(None, std::time::Duration::from_secs(15))
    {
        Ok(metadata) => {
            info!(
                "Successfully connected to Kafka brokers. Found {} topics.",
                metadata.topics().len()
            );
        }
        Err(error) => {
            error!("Failed to fetch metadata from Kafka brokers: {:?}", error);
            return Err(error);
        }
    }

    Ok(api)
}

#[derive(Error, Debug)]
pub enum KafkaProduceError {
    #[error("failed to produce to kafka: {error}")]
    KafkaProduceError { error: KafkaError },
    #[error("failed to produce to kafka (timeout)")]
    KafkaProduceCanceled,
}

/// Enqueues every payload in order and waits for each delivery report.
///
/// Enqueueing stops at the first payload the producer refuses; payloads enqueued before it are
/// still awaited, so the returned vector holds one result per payload actually handed to
/// librdkafka plus the failing one, in passed-in order.
pub async fn send_payloads_to_kafka<C, P>(
    kafka_producer: &FutureProducer<C>,
    topic: &str,
    payloads: impl IntoIterator<Item = P>,
) -> Vec<Result<(), KafkaProduceError>>
where
    C: rdkafka::ClientContext + 'static,
    P: AsRef<[u8]>,
{
    let mut handles = Vec::new();
    let mut enqueue_error = None;

    for payload in payloads {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(topic).payload(payload.as_ref());

        match kafka_producer.send_result(record) {
            Ok(future_handle) => handles.push(future_handle),
            Err((e, _)) => {
                enqueue_error = Some(KafkaProduceError::KafkaProduceError { error: e });
                break;
            }
        }
    }

    let mut results = Vec::with_capacity(handles.len() + 1);
    for future_handle in handles {
        match future_handle.await {
            Ok(Ok(_)) => results.push(Ok(())),
            Ok(Err((e, _))) => results.push(Err(KafkaProduceError::KafkaProduceError { error: e })),
            Err(_) => results.push(Err(KafkaProduceError::KafkaProduceCanceled)),
        }
    }

    if let Some(e) = enqueue_error {
        results.push(Err(e));
    }

    results
}

/// Blocks until every outstanding message has been acknowledged or the timeout elapses.
pub fn flush_producer<C>(
    kafka_producer: &FutureProducer<C>,
    timeout: std::time::Duration,
) -> Result<(), KafkaError>
where
    C: rdkafka::ClientContext + 'static,
{
    kafka_producer.flush(timeout)
}
