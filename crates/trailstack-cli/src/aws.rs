use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use trailstack_provisioner::aws::{
    AwsResourceProbe, BucketRemover, CallerIdentityCheck, CloudFormationProvider,
    SsmParameterSink, TemplateCheck,
};
use trailstack_provisioner::manifest::AUDIT_FOUNDATION_TEMPLATE;
use trailstack_provisioner::{
    format_err_chain, DriftDetector, FoundationSettings, LifecycleController, Manifest,
    Orchestrator, Poller, PrerequisiteCheck, ProvisionerError,
};

use crate::config::{CredentialSource, TrailstackConfig};

#[derive(Debug, Clone, Serialize)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
    pub user_id: String,
}

/// Build an `SdkConfig` from a region and credential source.
pub async fn build_aws_config(region: &str, creds: &CredentialSource) -> aws_config::SdkConfig {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()));

    match creds {
        CredentialSource::Inline {
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            builder = builder.credentials_provider(aws_sdk_sts::config::Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.clone(),
                None,
                "trailstack-config",
            ));
        }
        CredentialSource::Profile { profile_name } => {
            builder = builder.profile_name(profile_name);
        }
        CredentialSource::DefaultChain => {}
    }

    builder.load().await
}

/// STS GetCallerIdentity. Credentials that do not resolve are a
/// prerequisite failure: nothing has been touched yet.
pub async fn caller_identity(
    config: &aws_config::SdkConfig,
) -> Result<CallerIdentity, ProvisionerError> {
    let sts = aws_sdk_sts::Client::new(config);
    let resp = sts.get_caller_identity().send().await.map_err(|e| {
        ProvisionerError::Prerequisite {
            failed: vec![format!("credentials: {}", format_err_chain(&e))],
        }
    })?;

    Ok(CallerIdentity {
        account_id: resp.account().unwrap_or_default().to_string(),
        arn: resp.arn().unwrap_or_default().to_string(),
        user_id: resp.user_id().unwrap_or_default().to_string(),
    })
}

/// Everything a command needs, wired against one AWS account.
pub struct Session {
    pub settings: FoundationSettings,
    pub identity: CallerIdentity,
    pub orchestrator: Orchestrator,
    pub bucket_remover: BucketRemover,
}

impl Session {
    pub async fn connect(
        config: &TrailstackConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ProvisionerError> {
        config.validate()?;

        let sdk = build_aws_config(&config.region, &config.credentials).await;
        let identity = caller_identity(&sdk).await?;
        let account_id = config
            .account_id
            .clone()
            .unwrap_or_else(|| identity.account_id.clone());
        let settings = config.foundation_settings(&account_id);

        tracing::info!(
            region = %config.region,
            account = %account_id,
            caller = %identity.arn,
            stack = %settings.stack_name,
            "connected"
        );

        let cfn = aws_sdk_cloudformation::Client::new(&sdk);
        let provider = Arc::new(CloudFormationProvider::new(
            cfn.clone(),
            AUDIT_FOUNDATION_TEMPLATE,
        ));
        let controller =
            LifecycleController::new(provider, Poller::with_tokio(config.poll.clone()))
                .with_cancellation(cancel)
                .with_actor(identity.arn.clone());

        let spec = Manifest::audit_foundation(&settings);
        let detector = Manifest::discovery_prefixes(&settings).into_iter().fold(
            DriftDetector::new(Arc::new(AwsResourceProbe::new(&sdk)))
                .with_retained(spec.retained_ids()),
            |detector, (kind, prefix)| detector.with_discovery(kind, prefix),
        );

        let checks: Vec<Box<dyn PrerequisiteCheck>> = vec![
            Box::new(CallerIdentityCheck::new(
                aws_sdk_sts::Client::new(&sdk),
                config.account_id.clone(),
            )),
            Box::new(TemplateCheck::new(cfn, AUDIT_FOUNDATION_TEMPLATE)),
        ];

        let orchestrator = Orchestrator::new(
            controller,
            detector,
            Arc::new(SsmParameterSink::new(aws_sdk_ssm::Client::new(&sdk))),
            config.effective_parameter_prefix(),
        )
        .with_checks(checks);

        let bucket_remover = BucketRemover::new(&sdk).with_actor(identity.arn.clone());

        Ok(Self {
            settings,
            identity,
            orchestrator,
            bucket_remover,
        })
    }
}
