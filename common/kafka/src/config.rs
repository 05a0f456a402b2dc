use std::str::FromStr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    // No default: a worker pointed at the wrong brokers should refuse to start
    #[envconfig(from = "KAFKA_BOOTSTRAP_SERVERS")]
    pub kafka_hosts: BootstrapServers,
}

/// Comma separated broker list, rejected when blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapServers(pub String);

impl BootstrapServers {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct EmptyBootstrapServersError;

impl std::fmt::Display for EmptyBootstrapServersError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bootstrap server list is empty")
    }
}

impl FromStr for BootstrapServers {
    type Err = EmptyBootstrapServersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.split(',').all(|h| h.trim().is_empty()) {
            Err(EmptyBootstrapServersError)
        } else {
            Ok(BootstrapServers(trimmed.to_owned()))
        }
    }
}
