//! AWS implementations of the provider, probe, sink, and prerequisite seams,
//! plus removal of the retained log bucket.

pub mod bucket;
pub mod checks;
pub mod cloudformation;
pub mod probe;
pub mod ssm;

use aws_sdk_cloudformation::error::{ProvideErrorMetadata, SdkError};

use crate::error::{format_err_chain, ProvisionerError};

pub use crate::aws::bucket::BucketRemover;
pub use crate::aws::checks::{CallerIdentityCheck, TemplateCheck};
pub use crate::aws::cloudformation::CloudFormationProvider;
pub use crate::aws::probe::AwsResourceProbe;
pub use crate::aws::ssm::SsmParameterSink;

/// Service error codes that mean "try again later".
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "InternalFailure",
];

/// Map an SDK error onto the engine taxonomy: network and throttling
/// failures become `ProviderUnavailable`, everything else `Provider`.
pub(crate) fn classify<E, R>(context: &str, err: SdkError<E, R>) -> ProvisionerError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(_) => err
            .as_service_error()
            .and_then(|e| e.code())
            .is_some_and(|code| TRANSIENT_CODES.contains(&code)),
        _ => false,
    };

    let msg = format!("{context}: {}", format_err_chain(&err));
    if transient {
        ProvisionerError::ProviderUnavailable(msg)
    } else {
        ProvisionerError::Provider(msg)
    }
}

/// Message of the modeled service error, if the call got that far.
pub(crate) fn service_message<E, R>(err: &SdkError<E, R>) -> Option<&str>
where
    E: ProvideErrorMetadata,
{
    err.as_service_error().and_then(|e| e.message())
}
