use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;

use crate::error::Error;
use crate::store::BlobStore;

const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// Production blob store backed by S3/MinIO. Download URLs are
/// presigned GETs with a fixed TTL.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes))
            .content_type(content_type_for(path))
            .send()
            .await
            .map_err(|e| Error::Remote(format!("s3 put_object {path}: {e}")))?;
        Ok(())
    }

    async fn url(&self, path: &str) -> Result<String, Error> {
        let presign = PresigningConfig::expires_in(std::time::Duration::from_secs(
            PRESIGN_TTL_SECS,
        ))
        .context("presign config")
        .map_err(Error::remote)?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presign)
            .await
            .map_err(|e| Error::Remote(format!("s3 presign_get {path}: {e}")))?;
        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("s3 delete_object {path}: {e}")))?;
        Ok(())
    }
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::content_type_for;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("post_images/a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("post_images/a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("profile_images/b.png"), "image/png");
        assert_eq!(content_type_for("c.webp"), "image/webp");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
