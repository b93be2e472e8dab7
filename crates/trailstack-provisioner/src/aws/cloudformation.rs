use std::collections::{BTreeMap, BTreeSet};

use aws_sdk_cloudformation::types::{Capability, Parameter, Stack};
use aws_sdk_cloudformation::Client;
use trailstack_core::{
    Parameters, ResourceEvent, ResourceKind, ResourceRecord, ResourceStatus, StackState,
    StackStatus,
};

use crate::aws::{classify, service_message};
use crate::error::ProvisionerError;
use crate::provider::{BoxFuture, Operation, OperationHandle, ProviderClient, UpdateOutcome};

const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// CloudFormation-backed stack provider. Holds the template; callers only
/// pass parameters.
pub struct CloudFormationProvider {
    client: Client,
    template_body: String,
}

impl CloudFormationProvider {
    pub fn new(client: Client, template_body: impl Into<String>) -> Self {
        Self {
            client,
            template_body: template_body.into(),
        }
    }

    fn cfn_parameters(parameters: &Parameters) -> Vec<Parameter> {
        parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect()
    }

    async fn status(&self, name: &str) -> Result<Option<StackStatus>, ProvisionerError> {
        let resp = match self.client.describe_stacks().stack_name(name).send().await {
            Ok(resp) => resp,
            Err(e) if is_missing_stack(service_message(&e)) => return Ok(None),
            Err(e) => return Err(classify("cloudformation:DescribeStacks", e)),
        };
        resp.stacks().first().map(stack_status).transpose()
    }

    async fn resources(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, ResourceRecord>, ProvisionerError> {
        let resp = self
            .client
            .describe_stack_resources()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| classify("cloudformation:DescribeStackResources", e))?;

        Ok(resp
            .stack_resources()
            .iter()
            .filter_map(|r| {
                let logical_id = r.logical_resource_id()?;
                let resource_type = r.resource_type().unwrap_or_default();
                let record = ResourceRecord {
                    resource_type: resource_type.to_string(),
                    kind: ResourceKind::from_cfn_type(resource_type),
                    physical_id: r.physical_resource_id().map(String::from),
                    status: ResourceStatus::from_cfn(
                        r.resource_status().map(|s| s.as_str()).unwrap_or_default(),
                    ),
                    reason: r.resource_status_reason().map(String::from),
                };
                Some((logical_id.to_string(), record))
            })
            .collect())
    }
}

impl ProviderClient for CloudFormationProvider {
    fn describe<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<StackState>, ProvisionerError>> {
        Box::pin(async move {
            let resp = match self.client.describe_stacks().stack_name(name).send().await {
                Ok(resp) => resp,
                Err(e) if is_missing_stack(service_message(&e)) => return Ok(None),
                Err(e) => return Err(classify("cloudformation:DescribeStacks", e)),
            };

            let Some(stack) = resp.stacks().first() else {
                return Ok(None);
            };
            let status = stack_status(stack)?;
            if status == StackStatus::Absent {
                return Ok(None);
            }

            let outputs = stack
                .outputs()
                .iter()
                .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
                .collect();

            // Resource detail only matters once the stack settles; skip the
            // extra call on every in-flight poll.
            let resources = if status.is_terminal() {
                self.resources(name).await?
            } else {
                BTreeMap::new()
            };

            Ok(Some(StackState {
                name: name.to_string(),
                status,
                status_reason: stack.stack_status_reason().map(String::from),
                resources,
                outputs,
            }))
        })
    }

    fn create<'a>(
        &'a self,
        name: &'a str,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, Result<OperationHandle, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .create_stack()
                .stack_name(name)
                .template_body(&self.template_body)
                .set_parameters(Some(Self::cfn_parameters(parameters)))
                .capabilities(Capability::CapabilityNamedIam)
                .send()
                .await
                .map_err(|e| classify("cloudformation:CreateStack", e))?;

            let stack_id = resp.stack_id().map(String::from);
            tracing::info!(stack = %name, stack_id = ?stack_id, "CloudFormation create accepted");

            Ok(OperationHandle {
                provider_id: stack_id,
                ..OperationHandle::new(name, Operation::Create)
            })
        })
    }

    fn update<'a>(
        &'a self,
        name: &'a str,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, Result<UpdateOutcome, ProvisionerError>> {
        Box::pin(async move {
            let result = self
                .client
                .update_stack()
                .stack_name(name)
                .template_body(&self.template_body)
                .set_parameters(Some(Self::cfn_parameters(parameters)))
                .capabilities(Capability::CapabilityNamedIam)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let stack_id = resp.stack_id().map(String::from);
                    tracing::info!(stack = %name, stack_id = ?stack_id, "CloudFormation update accepted");
                    Ok(UpdateOutcome::Started(OperationHandle {
                        provider_id: stack_id,
                        ..OperationHandle::new(name, Operation::Update)
                    }))
                }
                Err(e) if is_no_changes(service_message(&e)) => Ok(UpdateOutcome::NoChanges),
                Err(e) => Err(classify("cloudformation:UpdateStack", e)),
            }
        })
    }

    fn delete<'a>(
        &'a self,
        name: &'a str,
        retain: &'a BTreeSet<String>,
    ) -> BoxFuture<'a, Result<OperationHandle, ProvisionerError>> {
        Box::pin(async move {
            let mut req = self.client.delete_stack().stack_name(name);

            // CloudFormation only accepts RetainResources for a stack in
            // DELETE_FAILED. Otherwise retention comes from the template's
            // DeletionPolicy, which already retains the log bucket.
            if !retain.is_empty() {
                if self.status(name).await? == Some(StackStatus::DeleteFailed) {
                    req = req.set_retain_resources(Some(retain.iter().cloned().collect()));
                } else {
                    tracing::debug!(stack = %name, retain = ?retain, "retention governed by template DeletionPolicy");
                }
            }

            req.send()
                .await
                .map_err(|e| classify("cloudformation:DeleteStack", e))?;
            tracing::info!(stack = %name, "CloudFormation delete accepted");

            Ok(OperationHandle::new(name, Operation::Delete))
        })
    }

    fn list_resource_events<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResourceEvent>, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .describe_stack_events()
                .stack_name(name)
                .send()
                .await
                .map_err(|e| classify("cloudformation:DescribeStackEvents", e))?;

            // Newest first. Keep only the most recent operation: stop at the
            // stack-level event that started it.
            let mut events = Vec::new();
            for event in resp.stack_events() {
                let status = event
                    .resource_status()
                    .map(|s| s.as_str())
                    .unwrap_or_default();
                let is_stack = event.resource_type() == Some(STACK_RESOURCE_TYPE);

                if let Some(logical_id) = event.logical_resource_id() {
                    events.push(ResourceEvent {
                        logical_id: logical_id.to_string(),
                        status: ResourceStatus::from_cfn(status),
                        reason: event.resource_status_reason().map(String::from),
                        timestamp: event
                            .timestamp()
                            .and_then(|t| jiff::Timestamp::from_second(t.secs()).ok()),
                    });
                }

                if is_stack && is_operation_start(status) {
                    break;
                }
            }
            events.reverse();
            Ok(events)
        })
    }
}

fn stack_status(stack: &Stack) -> Result<StackStatus, ProvisionerError> {
    let raw = stack.stack_status().ok_or_else(|| {
        ProvisionerError::Provider(format!(
            "stack {} returned without a status",
            stack.stack_name().unwrap_or_default()
        ))
    })?;
    parse_status(raw.as_str())
}

fn parse_status(raw: &str) -> Result<StackStatus, ProvisionerError> {
    StackStatus::from_cfn(raw).map_err(|e| ProvisionerError::Provider(e.to_string()))
}

fn is_missing_stack(message: Option<&str>) -> bool {
    message.is_some_and(|m| m.contains("does not exist"))
}

fn is_no_changes(message: Option<&str>) -> bool {
    message.is_some_and(|m| m.contains("No updates are to be performed"))
}

fn is_operation_start(status: &str) -> bool {
    matches!(
        status,
        "CREATE_IN_PROGRESS" | "UPDATE_IN_PROGRESS" | "DELETE_IN_PROGRESS" | "IMPORT_IN_PROGRESS"
    )
}
