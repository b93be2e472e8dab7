use std::collections::BTreeMap;

use trailstack_core::ResourceKind;

use crate::aws::classify;
use crate::error::ProvisionerError;
use crate::provider::{BoxFuture, ResourceProbe};

/// Existence probes that go straight to each service, ignoring the
/// CloudFormation stack record.
pub struct AwsResourceProbe {
    s3: aws_sdk_s3::Client,
    cloudtrail: aws_sdk_cloudtrail::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
    iam: aws_sdk_iam::Client,
    ssm: aws_sdk_ssm::Client,
}

impl AwsResourceProbe {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(config),
            cloudtrail: aws_sdk_cloudtrail::Client::new(config),
            logs: aws_sdk_cloudwatchlogs::Client::new(config),
            iam: aws_sdk_iam::Client::new(config),
            ssm: aws_sdk_ssm::Client::new(config),
        }
    }

    // ── S3 ───────────────────────────────────────────────────────────────────

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ProvisionerError> {
        match self.s3.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(classify("s3:HeadBucket", e)),
        }
    }

    async fn list_buckets(&self, prefix: &str) -> Result<Vec<String>, ProvisionerError> {
        let resp = self
            .s3
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify("s3:ListBuckets", e))?;
        Ok(resp
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .filter(|name| name.starts_with(prefix))
            .map(String::from)
            .collect())
    }

    async fn bucket_attributes(
        &self,
        bucket: &str,
    ) -> Result<BTreeMap<String, String>, ProvisionerError> {
        let mut attrs = BTreeMap::new();

        let versioning = self
            .s3
            .get_bucket_versioning()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify("s3:GetBucketVersioning", e))?;
        attrs.insert(
            "versioning".to_string(),
            versioning
                .status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "Disabled".to_string()),
        );

        match self.s3.get_bucket_encryption().bucket(bucket).send().await {
            Ok(resp) => {
                if let Some(algorithm) = resp
                    .server_side_encryption_configuration()
                    .and_then(|config| config.rules().first())
                    .and_then(|rule| rule.apply_server_side_encryption_by_default())
                    .map(|default| default.sse_algorithm().as_str().to_string())
                {
                    attrs.insert("encryption".to_string(), algorithm);
                }
            }
            Err(e) => {
                tracing::debug!(bucket = %bucket, error = %e, "no encryption configuration readable");
            }
        }

        Ok(attrs)
    }

    // ── CloudTrail ───────────────────────────────────────────────────────────

    async fn trail_exists(&self, trail: &str) -> Result<bool, ProvisionerError> {
        match self.cloudtrail.get_trail().name(trail).send().await {
            Ok(resp) => Ok(resp.trail().is_some()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_trail_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(classify("cloudtrail:GetTrail", e)),
        }
    }

    async fn list_trails(&self, prefix: &str) -> Result<Vec<String>, ProvisionerError> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .cloudtrail
                .list_trails()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("cloudtrail:ListTrails", e))?;

            names.extend(
                resp.trails()
                    .iter()
                    .filter_map(|t| t.name())
                    .filter(|name| name.starts_with(prefix))
                    .map(String::from),
            );

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(names)
    }

    async fn trail_attributes(
        &self,
        trail: &str,
    ) -> Result<BTreeMap<String, String>, ProvisionerError> {
        let mut attrs = BTreeMap::new();

        let status = self
            .cloudtrail
            .get_trail_status()
            .name(trail)
            .send()
            .await
            .map_err(|e| classify("cloudtrail:GetTrailStatus", e))?;
        attrs.insert(
            "is_logging".to_string(),
            status.is_logging().unwrap_or(false).to_string(),
        );

        let resp = self
            .cloudtrail
            .get_trail()
            .name(trail)
            .send()
            .await
            .map_err(|e| classify("cloudtrail:GetTrail", e))?;
        if let Some(t) = resp.trail() {
            if let Some(bucket) = t.s3_bucket_name() {
                attrs.insert("s3_bucket".to_string(), bucket.to_string());
            }
            attrs.insert(
                "is_multi_region".to_string(),
                t.is_multi_region_trail().unwrap_or(false).to_string(),
            );
            attrs.insert(
                "log_file_validation".to_string(),
                t.log_file_validation_enabled().unwrap_or(false).to_string(),
            );
        }

        Ok(attrs)
    }

    // ── CloudWatch Logs ──────────────────────────────────────────────────────

    async fn list_log_groups(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, Option<i32>)>, ProvisionerError> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .logs
                .describe_log_groups()
                .log_group_name_prefix(prefix)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("logs:DescribeLogGroups", e))?;

            groups.extend(resp.log_groups().iter().filter_map(|g| {
                g.log_group_name()
                    .map(|name| (name.to_string(), g.retention_in_days()))
            }));

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(groups)
    }

    // ── IAM ──────────────────────────────────────────────────────────────────

    async fn role_exists(&self, role: &str) -> Result<bool, ProvisionerError> {
        match self.iam.get_role().role_name(role).send().await {
            Ok(resp) => Ok(resp.role().is_some()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_no_such_entity_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(classify("iam:GetRole", e)),
        }
    }

    async fn list_roles(&self, prefix: &str) -> Result<Vec<String>, ProvisionerError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let resp = self
                .iam
                .list_roles()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify("iam:ListRoles", e))?;

            names.extend(
                resp.roles()
                    .iter()
                    .map(|r| r.role_name())
                    .filter(|name| name.starts_with(prefix))
                    .map(String::from),
            );

            match resp.marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }
        Ok(names)
    }

    async fn role_attributes(
        &self,
        role: &str,
    ) -> Result<BTreeMap<String, String>, ProvisionerError> {
        let resp = self
            .iam
            .get_role()
            .role_name(role)
            .send()
            .await
            .map_err(|e| classify("iam:GetRole", e))?;
        Ok(resp
            .role()
            .map(|r| BTreeMap::from([("arn".to_string(), r.arn().to_string())]))
            .unwrap_or_default())
    }

    // ── SSM ──────────────────────────────────────────────────────────────────

    async fn parameter_exists(&self, name: &str) -> Result<bool, ProvisionerError> {
        match self.ssm.get_parameter().name(name).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_parameter_not_found()) => {
                Ok(false)
            }
            Err(e) => Err(classify("ssm:GetParameter", e)),
        }
    }

    async fn list_parameters(&self, path: &str) -> Result<Vec<String>, ProvisionerError> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .ssm
                .get_parameters_by_path()
                .path(path)
                .recursive(true)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ssm:GetParametersByPath", e))?;

            names.extend(
                resp.parameters()
                    .iter()
                    .filter_map(|p| p.name())
                    .map(String::from),
            );

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(names)
    }
}

impl ResourceProbe for AwsResourceProbe {
    fn exists<'a>(
        &'a self,
        kind: ResourceKind,
        key: &'a str,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            match kind {
                ResourceKind::S3Bucket => self.bucket_exists(key).await,
                ResourceKind::CloudTrailTrail => self.trail_exists(key).await,
                ResourceKind::LogGroup => Ok(self
                    .list_log_groups(key)
                    .await?
                    .iter()
                    .any(|(name, _)| name == key)),
                ResourceKind::IamRole => self.role_exists(key).await,
                ResourceKind::SsmParameter => self.parameter_exists(key).await,
            }
        })
    }

    fn discover<'a>(
        &'a self,
        kind: ResourceKind,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>> {
        Box::pin(async move {
            match kind {
                ResourceKind::S3Bucket => self.list_buckets(prefix).await,
                ResourceKind::CloudTrailTrail => self.list_trails(prefix).await,
                ResourceKind::LogGroup => Ok(self
                    .list_log_groups(prefix)
                    .await?
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect()),
                ResourceKind::IamRole => self.list_roles(prefix).await,
                ResourceKind::SsmParameter => self.list_parameters(prefix).await,
            }
        })
    }

    fn attributes<'a>(
        &'a self,
        kind: ResourceKind,
        key: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, ProvisionerError>> {
        Box::pin(async move {
            match kind {
                ResourceKind::S3Bucket => self.bucket_attributes(key).await,
                ResourceKind::CloudTrailTrail => self.trail_attributes(key).await,
                ResourceKind::LogGroup => {
                    let retention = self
                        .list_log_groups(key)
                        .await?
                        .into_iter()
                        .find(|(name, _)| name == key)
                        .and_then(|(_, days)| days);
                    Ok(BTreeMap::from([(
                        "retention_days".to_string(),
                        retention.map_or_else(|| "never expire".to_string(), |d| d.to_string()),
                    )]))
                }
                ResourceKind::IamRole => self.role_attributes(key).await,
                ResourceKind::SsmParameter => Ok(BTreeMap::new()),
            }
        })
    }
}
