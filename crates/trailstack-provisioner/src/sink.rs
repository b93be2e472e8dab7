use std::collections::BTreeMap;

use crate::error::ProvisionerError;
use crate::provider::BoxFuture;

/// Key/value store that stack outputs are published to (e.g. SSM
/// Parameter Store). Keys are relative to `prefix`.
pub trait PublicationSink: Send + Sync {
    fn publish<'a>(
        &'a self,
        prefix: &'a str,
        values: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn list_under<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, ProvisionerError>>;

    /// Returns the number of entries deleted.
    fn delete_under<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<usize, ProvisionerError>>;
}
