use common_kafka::kafka_producer::KafkaProduceError;
use common_s3::S3Error;
use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::schema::PrimitiveKind;

/// Startup failures caused by missing or invalid environment values.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("failed to load configuration from env: {0}")]
    Env(#[from] envconfig::Error),
}

/// Startup failures while reading the output schema.
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("failed to read schema file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse avro schema: {0}")]
    Parse(apache_avro::Error),
    #[error("schema must be an avro record")]
    NotARecord,
    #[error("schema record declares no fields")]
    NoFields,
    #[error("field {field} is not supported: {reason}")]
    UnsupportedField { field: String, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field {0} is not part of the schema")]
    UnknownField(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to parse delimited record: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("field {0} is not part of the schema")]
    UnknownField(String),
    #[error("field {field} is required but has no value")]
    MissingRequired { field: String },
    #[error("value {value:?} of field {field} cannot be read as {kind}")]
    Coercion {
        field: String,
        value: String,
        kind: PrimitiveKind,
    },
    #[error("avro writer rejected the record: {0}")]
    Avro(apache_avro::Error),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to deliver message {index} of {total}: {source}")]
    Delivery {
        index: usize,
        total: usize,
        source: KafkaProduceError,
    },
    #[error("failed to flush producer: {0}")]
    Flush(KafkaError),
}

/// Everything that can abandon one file for the current pass.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("object store access failed: {0}")]
    StoreAccess(#[from] S3Error),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl FileError {
    /// Short label used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            FileError::StoreAccess(S3Error::NotFound(_)) => "not_found",
            FileError::StoreAccess(_) => "store_access",
            FileError::Extract(_) => "extract",
            FileError::Encoding(_) => "encoding",
            FileError::Publish(_) => "publish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_kinds() {
        let not_found: FileError = S3Error::NotFound("a.csv".to_string()).into();
        assert_eq!(not_found.kind(), "not_found");

        let transient: FileError = S3Error::OperationFailed("timeout".to_string()).into();
        assert_eq!(transient.kind(), "store_access");

        let encoding: FileError = EncodingError::UnknownField("x".to_string()).into();
        assert_eq!(encoding.kind(), "encoding");
    }

    #[test]
    fn test_coercion_message_names_field_and_kind() {
        let err = EncodingError::Coercion {
            field: "ano".to_string(),
            value: "dois mil".to_string(),
            kind: PrimitiveKind::Int,
        };
        assert_eq!(
            err.to_string(),
            "value \"dois mil\" of field ano cannot be read as int"
        );
    }
}
