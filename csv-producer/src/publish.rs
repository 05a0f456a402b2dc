use std::time::Duration;

use async_trait::async_trait;
use common_kafka::kafka_producer::{flush_producer, send_payloads_to_kafka, KafkaContext};
use rdkafka::producer::FutureProducer;
use tracing::info;

use crate::{encode::EncodedMessage, error::PublishError};

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Sends `messages` to `topic` in order and returns once all of them are acknowledged.
    /// Messages delivered before a failure stay delivered.
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<EncodedMessage>,
    ) -> Result<usize, PublishError>;
}

pub struct KafkaPublisher {
    producer: FutureProducer<KafkaContext>,
    flush_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(producer: FutureProducer<KafkaContext>, flush_timeout: Duration) -> Self {
        Self {
            producer,
            flush_timeout,
        }
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<EncodedMessage>,
    ) -> Result<usize, PublishError> {
        if messages.is_empty() {
            return Ok(0);
        }

        let total = messages.len();
        let results = send_payloads_to_kafka(&self.producer, topic, &messages).await;

        let mut sent = 0;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => sent += 1,
                Err(source) => {
                    return Err(PublishError::Delivery {
                        index,
                        total,
                        source,
                    })
                }
            }
        }

        // Every delivery report is in, this only drains anything librdkafka still holds
        flush_producer(&self.producer, self.flush_timeout).map_err(PublishError::Flush)?;

        info!(topic, sent, "Sent messages to Kafka");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_kafka::test::create_mock_kafka;

    #[tokio::test]
    async fn test_publish_returns_count_sent() {
        let (_cluster, producer) = create_mock_kafka().await;
        let publisher = KafkaPublisher::new(producer, Duration::from_secs(5));

        let messages = vec![
            EncodedMessage::from(vec![0x02, 0x02]),
            EncodedMessage::from(vec![0x00]),
        ];
        let sent = publisher.publish("complaints", messages).await.unwrap();
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn test_publish_empty_batch_is_noop() {
        let (_cluster, producer) = create_mock_kafka().await;
        let publisher = KafkaPublisher::new(producer, Duration::from_secs(5));

        let sent = publisher.publish("complaints", Vec::new()).await.unwrap();
        assert_eq!(sent, 0);
    }
}
