use aws_sdk_s3::Client;

use crate::audit::{AuditAction, AuditEvent};
use crate::aws::classify;
use crate::error::ProvisionerError;

/// Removes a bucket the stack retained on delete: every object version and
/// delete marker, then the bucket itself.
///
/// The template keeps the log bucket through a stack delete, so removing it
/// is a separate, explicit step taken only after the stack is gone.
pub struct BucketRemover {
    client: Client,
    actor: String,
}

impl BucketRemover {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
            actor: "trailstack".to_string(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Returns the number of object versions deleted. A bucket that is
    /// already gone counts as removed.
    pub async fn remove(&self, bucket: &str) -> Result<usize, ProvisionerError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {}
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                tracing::info!(bucket = %bucket, "bucket already gone");
                return Ok(0);
            }
            Err(e) => return Err(classify("s3:HeadBucket", e)),
        }

        let deleted = self.empty(bucket).await?;

        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify("s3:DeleteBucket", e))?;

        AuditEvent::new(AuditAction::DeleteBucket, bucket, &self.actor)
            .with_details(serde_json::json!({ "object_versions_deleted": deleted }))
            .emit();
        tracing::info!(bucket = %bucket, versions = deleted, "S3 bucket deleted");
        Ok(deleted)
    }

    async fn empty(&self, bucket: &str) -> Result<usize, ProvisionerError> {
        let mut deleted = 0;
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(|e| classify("s3:ListObjectVersions", e))?;

            let versions = resp
                .versions()
                .iter()
                .map(|v| (v.key(), v.version_id()))
                .chain(
                    resp.delete_markers()
                        .iter()
                        .map(|m| (m.key(), m.version_id())),
                );

            for (key, version_id) in versions {
                let Some(key) = key else { continue };
                self.client
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .set_version_id(version_id.map(String::from))
                    .send()
                    .await
                    .map_err(|e| classify("s3:DeleteObject", e))?;
                deleted += 1;
            }

            if resp.is_truncated() == Some(true) {
                key_marker = resp.next_key_marker().map(String::from);
                version_marker = resp.next_version_id_marker().map(String::from);
            } else {
                break;
            }
        }

        Ok(deleted)
    }
}
