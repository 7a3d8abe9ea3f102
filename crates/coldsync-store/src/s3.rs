//! S3 object store client

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{GlacierJobParameters, RestoreRequest, Tier};
use aws_sdk_s3::Client;
use coldsync_config::StoreConfig;
use coldsync_types::{
    Error, ListPage, ObjectBody, ObjectStore, RemoteEntry, RestoreAck, RestoreTier, Result,
    StorageClass,
};
use std::time::SystemTime;
use tracing::debug;

/// Error code S3 returns when a restore for the object is already running
const RESTORE_IN_PROGRESS: &str = "RestoreAlreadyInProgress";

/// Object store backed by Amazon S3 or an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from the default credential chain plus `config` overrides.
    ///
    /// The client is created once per run and shared by every worker.
    pub async fn connect(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self::from_client(Client::from_conf(builder.build()))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| Error::listing(prefix, DisplayErrorContext(&e).to_string()))?;

        let mut entries = Vec::with_capacity(output.contents().len());
        for object in output.contents() {
            let Some(key) = object.key() else {
                continue;
            };
            let modified = object.last_modified().ok_or_else(|| {
                Error::listing(prefix, format!("Object '{}' has no last-modified time", key))
            })?;
            let last_modified = SystemTime::try_from(*modified).map_err(|e| {
                Error::listing(prefix, format!("Object '{}' has an invalid timestamp: {}", key, e))
            })?;

            entries.push(RemoteEntry {
                key: key.to_string(),
                last_modified,
                storage_class: object
                    .storage_class()
                    .and_then(|class| StorageClass::from_name(class.as_str())),
            });
        }

        debug!(
            "Listed {} objects under s3://{}/{}",
            entries.len(),
            bucket,
            prefix
        );

        Ok(ListPage {
            entries,
            next_token: output.next_continuation_token().map(String::from),
            truncated: output.is_truncated().unwrap_or(false),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::transfer(key, DisplayErrorContext(&e).to_string()))?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        storage_class: Option<StorageClass>,
    ) -> Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_storage_class(
                storage_class.map(|class| aws_sdk_s3::types::StorageClass::from(class.as_str())),
            )
            .send()
            .await
            .map_err(|e| Error::transfer(key, DisplayErrorContext(&e).to_string()))?;

        debug!("Uploaded {} bytes to s3://{}/{}", size, bucket, key);
        Ok(())
    }

    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RestoreTier,
    ) -> Result<RestoreAck> {
        let days = i32::try_from(days)
            .map_err(|_| Error::transfer(key, format!("Restore days out of range: {}", days)))?;
        let job = GlacierJobParameters::builder()
            .tier(Tier::from(tier.as_str()))
            .build()
            .map_err(|e| Error::store(e.to_string()))?;
        let request = RestoreRequest::builder()
            .days(days)
            .glacier_job_parameters(job)
            .build();

        match self
            .client
            .restore_object()
            .bucket(bucket)
            .key(key)
            .restore_request(request)
            .send()
            .await
        {
            Ok(_) => Ok(RestoreAck::Initiated),
            Err(e) => {
                if e.as_service_error().and_then(ProvideErrorMetadata::code)
                    == Some(RESTORE_IN_PROGRESS)
                {
                    Ok(RestoreAck::AlreadyInProgress)
                } else {
                    Err(Error::transfer(key, DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }
}
