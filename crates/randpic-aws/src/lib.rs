//! S3 storage for randpic
//!
//! [`S3Store`] implements [`ObjectStore`] with `aws-sdk-s3`.
//! The `binary` feature builds two entry points around [`randpic::handler::PhotoHandler`]:
//!
//! + `randpic-lambda` runs under the Lambda runtime and answers API Gateway proxy events
//! + `randpic-serve` is a plain HTTP server for local use

use randpic::store::{ObjectStore, StoreError, StoreResult};

use std::time::Duration;

use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the default credential chain and region
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl From<Client> for S3Store {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn presigned_get_url(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(StoreError::backend)?;
        let req = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(StoreError::backend)?;
        Ok(req.uri().to_owned())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StoreError::NotFound {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                });
            }
            Err(err) => return Err(StoreError::backend(err)),
        };
        let body = output.body.collect().await.map_err(StoreError::backend)?;
        Ok(body.into_bytes())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> StoreResult {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_owned))
            .send()
            .await
            .map_err(StoreError::backend)?;
        debug!(bucket, key, size, "put object");
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<String>> {
        let mut pages = self.client.list_objects_v2().bucket(bucket).into_paginator().send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(StoreError::backend)?;
            keys.extend(page.contents().iter().filter_map(|obj| obj.key()).map(str::to_owned));
        }
        debug!(bucket, count = keys.len(), "listed objects");
        Ok(keys)
    }
}
