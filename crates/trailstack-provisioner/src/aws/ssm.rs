use std::collections::BTreeMap;

use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;
use trailstack_core::param_keys;

use crate::aws::classify;
use crate::error::ProvisionerError;
use crate::provider::BoxFuture;
use crate::sink::PublicationSink;

/// `DeleteParameters` accepts at most this many names per call.
const DELETE_BATCH: usize = 10;

/// Publishes stack outputs to SSM Parameter Store as plain `String`
/// parameters under a path prefix.
pub struct SsmParameterSink {
    client: Client,
}

impl SsmParameterSink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Full parameter names under `prefix`, paginated.
    async fn parameters_under(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, ProvisionerError> {
        let path = param_keys::normalize_prefix(prefix);
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .client
                .get_parameters_by_path()
                .path(&path)
                .recursive(true)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ssm:GetParametersByPath", e))?;

            for param in resp.parameters() {
                if let Some(name) = param.name() {
                    out.push((
                        name.to_string(),
                        param.value().unwrap_or_default().to_string(),
                    ));
                }
            }

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(out)
    }
}

impl PublicationSink for SsmParameterSink {
    fn publish<'a>(
        &'a self,
        prefix: &'a str,
        values: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            for (key, value) in values {
                // SSM rejects empty values.
                if value.is_empty() {
                    tracing::debug!(key = %key, "skipping empty output");
                    continue;
                }
                let name = param_keys::parameter(prefix, key);
                self.client
                    .put_parameter()
                    .name(&name)
                    .value(value)
                    .r#type(ParameterType::String)
                    .overwrite(true)
                    .send()
                    .await
                    .map_err(|e| classify("ssm:PutParameter", e))?;
                tracing::debug!(parameter = %name, "published");
            }
            Ok(())
        })
    }

    fn list_under<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, ProvisionerError>> {
        Box::pin(async move {
            Ok(self
                .parameters_under(prefix)
                .await?
                .into_iter()
                .filter_map(|(name, value)| {
                    param_keys::key_under(prefix, &name).map(|key| (key.to_string(), value))
                })
                .collect())
        })
    }

    fn delete_under<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<usize, ProvisionerError>> {
        Box::pin(async move {
            let names: Vec<String> = self
                .parameters_under(prefix)
                .await?
                .into_iter()
                .map(|(name, _)| name)
                .collect();

            let mut deleted = 0;
            for batch in names.chunks(DELETE_BATCH) {
                let resp = self
                    .client
                    .delete_parameters()
                    .set_names(Some(batch.to_vec()))
                    .send()
                    .await
                    .map_err(|e| classify("ssm:DeleteParameters", e))?;
                deleted += resp.deleted_parameters().len();
                if !resp.invalid_parameters().is_empty() {
                    tracing::warn!(
                        invalid = ?resp.invalid_parameters(),
                        "some parameters were already gone"
                    );
                }
            }
            Ok(deleted)
        })
    }
}
