use serde::{Deserialize, Serialize};
use trailstack_core::{param_keys, ResourceDescriptor, ResourceKind, StackSpec};

/// The CloudFormation template for the audit foundation.
pub const AUDIT_FOUNDATION_TEMPLATE: &str = include_str!("../templates/audit-foundation.yaml");

pub const DEFAULT_STACK_NAME: &str = "audit-foundation";
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 365;

/// Logical ids inside the template.
pub mod logical {
    pub const BUCKET: &str = "AuditLogBucket";
    pub const TRAIL: &str = "AuditTrail";
    pub const LOG_GROUP: &str = "AuditLogGroup";
    pub const ROLE: &str = "CloudTrailLogsRole";
}

/// Runtime inputs the manifest is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundationSettings {
    pub stack_name: String,
    pub environment: String,
    pub account_id: String,
    pub log_retention_days: u32,
}

/// Physical names derived from the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundationNames {
    pub bucket: String,
    pub trail: String,
    pub log_group: String,
    pub role: String,
}

impl FoundationSettings {
    pub fn names(&self) -> FoundationNames {
        let stack = &self.stack_name;
        FoundationNames {
            bucket: format!("{stack}-logs-{}", self.account_id),
            trail: format!("{stack}-trail"),
            log_group: format!("/aws/cloudtrail/{stack}"),
            role: format!("{stack}-cloudtrail-logs"),
        }
    }

    pub fn default_parameter_prefix(&self) -> String {
        param_keys::default_prefix(&self.environment, &self.stack_name)
    }
}

pub struct Manifest;

impl Manifest {
    /// The audit-logging bundle: bucket (retained on destroy), trail, log
    /// group, and the role CloudTrail uses to deliver into the log group.
    pub fn audit_foundation(settings: &FoundationSettings) -> StackSpec {
        let names = settings.names();

        StackSpec::new(&settings.stack_name)
            .with_parameter("StackName", &settings.stack_name)
            .with_parameter("Environment", &settings.environment)
            .with_parameter("BucketName", &names.bucket)
            .with_parameter("TrailName", &names.trail)
            .with_parameter("LogGroupName", &names.log_group)
            .with_parameter("RoleName", &names.role)
            .with_parameter("LogRetentionDays", settings.log_retention_days.to_string())
            .with_resource(
                ResourceDescriptor::new(logical::BUCKET, ResourceKind::S3Bucket, &names.bucket)
                    .retained(),
            )
            .with_resource(ResourceDescriptor::new(
                logical::TRAIL,
                ResourceKind::CloudTrailTrail,
                &names.trail,
            ))
            .with_resource(ResourceDescriptor::new(
                logical::LOG_GROUP,
                ResourceKind::LogGroup,
                &names.log_group,
            ))
            .with_resource(ResourceDescriptor::new(
                logical::ROLE,
                ResourceKind::IamRole,
                &names.role,
            ))
    }

    /// Name prefixes used to list live resources of each kind that belong
    /// to this stack by naming convention.
    pub fn discovery_prefixes(settings: &FoundationSettings) -> Vec<(ResourceKind, String)> {
        let stack = &settings.stack_name;
        vec![
            (ResourceKind::S3Bucket, format!("{stack}-")),
            (ResourceKind::CloudTrailTrail, format!("{stack}-")),
            (ResourceKind::LogGroup, format!("/aws/cloudtrail/{stack}")),
            (ResourceKind::IamRole, format!("{stack}-")),
        ]
    }
}
