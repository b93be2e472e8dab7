use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown stack status: {0}")]
    UnknownStatus(String),

    #[error("unknown resource kind: {0}")]
    UnknownResourceKind(String),

    #[error("invalid resource id: {0} (expected <kind>/<key>)")]
    InvalidResourceId(String),
}
