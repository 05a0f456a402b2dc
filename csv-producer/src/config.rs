use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

pub use common_kafka::config::KafkaConfig;

use crate::error::ConfigurationError;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "AWS_DEFAULT_REGION")]
    pub aws_region: NonEmptyString,

    #[envconfig(from = "AWS_ACCESS_KEY_ID")]
    pub aws_access_key_id: NonEmptyString,

    #[envconfig(from = "AWS_SECRET_ACCESS_KEY")]
    pub aws_secret_access_key: NonEmptyString,

    // Set for MinIO/LocalStack, which also switches the client to path-style addressing
    #[envconfig(from = "AWS_ENDPOINT_URL", default = "")]
    pub aws_endpoint_url: OptionalValue<NonEmptyString>,

    #[envconfig(from = "S3_BUCKET_NAME")]
    pub bucket: NonEmptyString,

    #[envconfig(from = "S3_PATH_PREFIX", default = "")]
    pub path_prefix: String,

    #[envconfig(default = ".csv")]
    pub file_extension: String,

    #[envconfig(default = ";")]
    pub column_delimiter: Delimiter,

    #[envconfig(default = "schemas/reclamacoes.avsc")]
    pub schema_path: String,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(from = "KAFKA_TOPIC")]
    pub kafka_topic: NonEmptyString,

    #[envconfig(default = "10")]
    pub chunk_size: NonZeroUsize,

    #[envconfig(from = "PROCESS_INTERVAL_SECS", default = "60")]
    pub process_interval: EnvSecsDuration,

    #[envconfig(from = "CHUNK_DELAY_SECS", default = "20")]
    pub chunk_delay: EnvSecsDuration,

    #[envconfig(from = "KAFKA_FLUSH_TIMEOUT_MS", default = "30000")]
    pub kafka_flush_timeout: EnvMsDuration,

    #[envconfig(default = "")]
    pub metrics_bind: OptionalValue<SocketAddr>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigurationError> {
        Ok(Self::init_from_env()?)
    }
}

/// Seeds the environment from the file named by `DOTENV_PATH`, or from `.env` in the
/// working directory. Returns the file that was loaded; a missing `.env` is not an error.
/// Variables already set in the environment win.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match std::env::var("DOTENV_PATH") {
        Ok(path) => dotenvy::from_path(&path).map(|()| Some(PathBuf::from(path))),
        Err(_) => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e),
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvSecsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvDurationError;

impl FromStr for EnvSecsDuration {
    type Err = ParseEnvDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = s.parse::<u64>().map_err(|_| ParseEnvDurationError)?;

        Ok(EnvSecsDuration(time::Duration::from_secs(secs)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

impl FromStr for EnvMsDuration {
    type Err = ParseEnvDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}

/// An optional value where an empty string, as left by `VAR=` in compose files, means unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalValue<T>(pub Option<T>);

impl<T: FromStr> FromStr for OptionalValue<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Ok(OptionalValue(None))
        } else {
            s.parse().map(|value| OptionalValue(Some(value)))
        }
    }
}

/// Single-byte column separator. Accepts one ASCII character, or `\t`/`tab`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter(pub u8);

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidDelimiterError;

impl FromStr for Delimiter {
    type Err = InvalidDelimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "\\t" | "tab" => Ok(Delimiter(b'\t')),
            _ => match s.as_bytes() {
                [byte] if byte.is_ascii() && *byte != b'"' && *byte != b'\n' => {
                    Ok(Delimiter(*byte))
                }
                _ => Err(InvalidDelimiterError),
            },
        }
    }
}
