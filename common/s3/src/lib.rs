//! Object store client abstraction for the ingestion worker
//!
//! A thin wrapper around the AWS S3 list/get operations, behind a trait so the
//! pipeline can be exercised against an in-memory mock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client as AwsS3SdkClient;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum S3Error {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("S3 operation failed: {0}")]
    OperationFailed(String),
}

/// Object store operations used by the worker
#[async_trait]
pub trait S3Client: Send + Sync {
    /// List every key under `prefix`, following continuation tokens until exhausted
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, S3Error>;

    /// Fetch the full body of an object
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, S3Error>;
}

pub struct S3Impl {
    client: AwsS3SdkClient,
}

impl S3Impl {
    pub fn new(client: AwsS3SdkClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl S3Client for S3Impl {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, S3Error> {
        debug!("Listing keys in bucket {} with prefix {}", bucket, prefix);
        let mut keys = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut cmd = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = continuation_token {
                cmd = cmd.continuation_token(token);
            }
            let output = cmd.send().await.map_err(|e| {
                S3Error::OperationFailed(format!(
                    "Failed to list s3://{bucket}/{prefix}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

            if let Some(contents) = output.contents {
                keys.extend(contents.into_iter().filter_map(|o| o.key));
            }
            match output.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, S3Error> {
        let get_object_output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let error_message = format!(
                    "Failed to get object s3://{bucket}/{key}: {}",
                    DisplayErrorContext(&e)
                );
                if let GetObjectError::NoSuchKey(_) = e.into_service_error() {
                    S3Error::NotFound(key.to_string())
                } else {
                    S3Error::OperationFailed(error_message)
                }
            })?;

        let body_bytes = get_object_output.body.collect().await.map_err(|e| {
            S3Error::OperationFailed(format!("Failed to read body of s3://{bucket}/{key}: {e}"))
        })?;

        Ok(body_bytes.to_vec())
    }
}

/// Mock S3 client for testing - always available, no conditional compilation needed
///
/// Objects are kept per bucket in key order, which is also the order real S3 lists them in.
#[derive(Clone, Default)]
pub struct MockS3Client {
    objects: BTreeMap<(String, String), Result<Vec<u8>, S3Error>>,
    list_error: Option<S3Error>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MockS3Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object that lists and reads successfully
    pub fn with_object(self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.with_object_ret(bucket, key, Ok(body.into()))
    }

    /// Store an object that lists normally but answers reads with `response`
    pub fn with_object_ret(
        mut self,
        bucket: &str,
        key: &str,
        response: Result<Vec<u8>, S3Error>,
    ) -> Self {
        self.objects
            .insert((bucket.to_string(), key.to_string()), response);
        self
    }

    /// Make every listing call fail
    pub fn with_list_error(mut self, error: S3Error) -> Self {
        self.list_error = Some(error);
        self
    }

    /// Keys passed to `get_bytes`, in call order
    pub fn fetched_keys(&self) -> Vec<String> {
        self.fetched
            .lock()
            .map(|fetched| fetched.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl S3Client for MockS3Client {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, S3Error> {
        if let Some(error) = &self.list_error {
            return Err(error.clone());
        }
        Ok(self
            .objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, S3Error> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(key.to_string());
        }
        match self.objects.get(&(bucket.to_string(), key.to_string())) {
            Some(response) => response.clone(),
            None => Err(S3Error::NotFound(key.to_string())),
        }
    }
}
