use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::resource::{ResourceDescriptor, ResourceId};

/// Template parameters, name → value.
pub type Parameters = BTreeMap<String, String>;

/// Declarative description of one named resource bundle.
///
/// `parameters` are passed through to the provider on create/update.
/// `resources` are never created by this layer directly; they are the
/// declared membership used for drift comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSpec {
    pub name: String,
    pub parameters: Parameters,
    pub resources: Vec<ResourceDescriptor>,
}

impl StackSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resources.push(resource);
        self
    }

    /// Physical ids of every declared resource, in set form.
    pub fn declared_ids(&self) -> BTreeSet<ResourceId> {
        self.resources.iter().map(ResourceDescriptor::id).collect()
    }

    /// Logical ids marked retain-on-destroy.
    pub fn retained_logical_ids(&self) -> BTreeSet<String> {
        self.resources
            .iter()
            .filter(|r| r.retain_on_destroy)
            .map(|r| r.logical_id.clone())
            .collect()
    }

    /// Physical ids marked retain-on-destroy.
    pub fn retained_ids(&self) -> BTreeSet<ResourceId> {
        self.resources
            .iter()
            .filter(|r| r.retain_on_destroy)
            .map(ResourceDescriptor::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;

    #[test]
    fn retained_sets_follow_descriptor_flags() {
        let spec = StackSpec::new("audit-foundation")
            .with_resource(
                ResourceDescriptor::new("AuditLogBucket", ResourceKind::S3Bucket, "logs").retained(),
            )
            .with_resource(ResourceDescriptor::new(
                "AuditTrail",
                ResourceKind::CloudTrailTrail,
                "trail",
            ));

        assert_eq!(
            spec.retained_logical_ids().into_iter().collect::<Vec<_>>(),
            vec!["AuditLogBucket".to_string()]
        );
        assert_eq!(spec.declared_ids().len(), 2);
        assert!(spec.retained_ids().contains(&ResourceId::new(ResourceKind::S3Bucket, "logs")));
    }
}
