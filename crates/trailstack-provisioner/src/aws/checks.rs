use crate::error::format_err_chain;
use crate::prereq::{CheckResult, PrerequisiteCheck};
use crate::provider::BoxFuture;

/// Credentials resolve, and (when pinned) belong to the expected account.
pub struct CallerIdentityCheck {
    client: aws_sdk_sts::Client,
    expected_account: Option<String>,
}

impl CallerIdentityCheck {
    pub fn new(client: aws_sdk_sts::Client, expected_account: Option<String>) -> Self {
        Self {
            client,
            expected_account,
        }
    }
}

impl PrerequisiteCheck for CallerIdentityCheck {
    fn name(&self) -> &str {
        "credentials"
    }

    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move {
            let resp = match self.client.get_caller_identity().send().await {
                Ok(resp) => resp,
                Err(e) => {
                    return CheckResult::fail(
                        self.name(),
                        format!("could not resolve caller identity: {}", format_err_chain(&e)),
                    );
                }
            };

            let account = resp.account().unwrap_or("unknown");
            let arn = resp.arn().unwrap_or("unknown");
            match self.expected_account.as_deref() {
                Some(expected) if expected != account => CheckResult::fail(
                    self.name(),
                    format!("credentials belong to account {account}, expected {expected}"),
                ),
                Some(_) => CheckResult::pass(self.name(), format!("{arn} ({account})")),
                None => CheckResult::warn(
                    self.name(),
                    format!("{arn} ({account}); account id is not pinned in config"),
                ),
            }
        })
    }
}

/// The template parses and CloudFormation accepts it.
pub struct TemplateCheck {
    client: aws_sdk_cloudformation::Client,
    template_body: String,
}

impl TemplateCheck {
    pub fn new(client: aws_sdk_cloudformation::Client, template_body: impl Into<String>) -> Self {
        Self {
            client,
            template_body: template_body.into(),
        }
    }
}

impl PrerequisiteCheck for TemplateCheck {
    fn name(&self) -> &str {
        "template"
    }

    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move {
            match self
                .client
                .validate_template()
                .template_body(&self.template_body)
                .send()
                .await
            {
                Ok(resp) => CheckResult::pass(
                    self.name(),
                    format!("{} parameters declared", resp.parameters().len()),
                ),
                Err(e) => CheckResult::fail(self.name(), format_err_chain(&e)),
            }
        })
    }
}
