use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The kinds of live resource the audit foundation is made of.
///
/// Each kind has its own direct existence probe, independent of the stack
/// record.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    S3Bucket,
    #[serde(rename = "cloudtrail_trail")]
    CloudTrailTrail,
    LogGroup,
    IamRole,
    SsmParameter,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::S3Bucket,
        ResourceKind::CloudTrailTrail,
        ResourceKind::LogGroup,
        ResourceKind::IamRole,
        ResourceKind::SsmParameter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::S3Bucket => "s3_bucket",
            ResourceKind::CloudTrailTrail => "cloudtrail_trail",
            ResourceKind::LogGroup => "log_group",
            ResourceKind::IamRole => "iam_role",
            ResourceKind::SsmParameter => "ssm_parameter",
        }
    }

    /// Map a CloudFormation resource type (e.g. `AWS::S3::Bucket`) to a kind.
    /// Types without a direct probe (bucket policies, etc.) return `None`.
    pub fn from_cfn_type(cfn_type: &str) -> Option<Self> {
        match cfn_type {
            "AWS::S3::Bucket" => Some(ResourceKind::S3Bucket),
            "AWS::CloudTrail::Trail" => Some(ResourceKind::CloudTrailTrail),
            "AWS::Logs::LogGroup" => Some(ResourceKind::LogGroup),
            "AWS::IAM::Role" => Some(ResourceKind::IamRole),
            "AWS::SSM::Parameter" => Some(ResourceKind::SsmParameter),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::S3Bucket => "S3 Bucket",
            ResourceKind::CloudTrailTrail => "CloudTrail Trail",
            ResourceKind::LogGroup => "CloudWatch Log Group",
            ResourceKind::IamRole => "IAM Role",
            ResourceKind::SsmParameter => "SSM Parameter",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownResourceKind(s.to_string()))
    }
}

/// Identity of a live resource: its kind plus the physical key the
/// provider knows it by (bucket name, trail name, log group name, ...).
///
/// Ordered so reports render deterministically. Serialized as the
/// `<kind>/<key>` string so it can key JSON maps.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub key: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

impl FromStr for ResourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, key) = s
            .split_once('/')
            .filter(|(_, key)| !key.is_empty())
            .ok_or_else(|| CoreError::InvalidResourceId(s.to_string()))?;
        Ok(ResourceId::new(kind.parse()?, key))
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ResourceId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A declared logical resource inside a stack spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Logical id inside the template, e.g. "AuditLogBucket".
    pub logical_id: String,
    pub kind: ResourceKind,
    /// Expected physical name, e.g. "audit-foundation-logs-123456789012".
    pub key: String,
    /// Kept in place when the stack is destroyed (e.g. the log bucket).
    #[serde(default)]
    pub retain_on_destroy: bool,
}

impl ResourceDescriptor {
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            key: key.into(),
            retain_on_destroy: false,
        }
    }

    pub fn retained(mut self) -> Self {
        self.retain_on_destroy = true;
        self
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.kind, self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_display() {
        for kind in ResourceKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: ResourceKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn resource_id_display_and_parse_agree() {
        let id = ResourceId::new(ResourceKind::LogGroup, "/aws/cloudtrail/audit-foundation");
        let text = id.to_string();
        assert_eq!(text, "log_group//aws/cloudtrail/audit-foundation");
        assert_eq!(text.parse::<ResourceId>().unwrap(), id);
    }

    #[test]
    fn resource_id_serializes_as_string() {
        let id = ResourceId::new(ResourceKind::S3Bucket, "logs");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"s3_bucket/logs\"");
        let back: ResourceId = serde_json::from_str("\"s3_bucket/logs\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn resource_id_rejects_missing_key() {
        assert!("s3_bucket/".parse::<ResourceId>().is_err());
        assert!("s3_bucket".parse::<ResourceId>().is_err());
        assert!("bogus/x".parse::<ResourceId>().is_err());
    }

    #[test]
    fn cfn_types_map_to_kinds() {
        assert_eq!(
            ResourceKind::from_cfn_type("AWS::CloudTrail::Trail"),
            Some(ResourceKind::CloudTrailTrail)
        );
        assert_eq!(ResourceKind::from_cfn_type("AWS::S3::BucketPolicy"), None);
    }
}
