use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

/// Connection settings for an S3-compatible store such as MinIO.
pub struct StorageSettings<'a> {
    pub endpoint: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub bucket: &'a str,
    /// Base the browser uses to fetch objects; may differ from `endpoint` behind a proxy.
    pub public_url: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// One public-read bucket of user uploads.
#[derive(Clone)]
pub struct ObjectStore {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl ObjectStore {
    pub async fn connect(settings: StorageSettings<'_>) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(settings.endpoint)
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                settings.access_key,
                settings.secret_key,
                None,
                None,
                "skealed-storage",
            ))
            .force_path_style(true)
            .build();

        let store = Self {
            client: S3Client::from_conf(config),
            bucket: settings.bucket.to_string(),
            public_url: settings.public_url.trim_end_matches('/').to_string(),
        };
        store.ensure_public_bucket().await;

        tracing::info!(endpoint = %settings.endpoint, bucket = %store.bucket, "object store ready");
        store
    }

    /// Creates the bucket and opens it for anonymous reads. Both calls fail
    /// harmlessly once the bucket is set up, so errors are only logged.
    async fn ensure_public_bucket(&self) {
        if let Err(e) = self.client.create_bucket().bucket(&self.bucket).send().await {
            tracing::debug!(bucket = %self.bucket, error = %e, "create_bucket skipped");
        }

        let policy = public_read_policy(&self.bucket);
        if let Err(e) = self
            .client
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(policy)
            .send()
            .await
        {
            tracing::warn!(bucket = %self.bucket, error = %e, "could not set public-read policy");
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.public_url, self.bucket)
    }

    pub async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<StoredObject, String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| format!("upload failed: {e}"))?;

        Ok(StoredObject { key: key.to_string(), url: self.url_for(key) })
    }

    pub async fn remove(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| format!("delete failed: {e}"))?;
        Ok(())
    }
}

fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{bucket}/*")],
        }],
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_grants_reads_on_objects_only() {
        let policy: serde_json::Value = serde_json::from_str(&public_read_policy("avatars")).unwrap();
        let statement = &policy["Statement"][0];
        assert_eq!(statement["Action"][0], "s3:GetObject");
        assert_eq!(statement["Resource"][0], "arn:aws:s3:::avatars/*");
    }
}
