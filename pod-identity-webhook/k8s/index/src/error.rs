use thiserror::Error;

/// Failures while turning a watch event into index updates. These are logged and never reach
/// lookups.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{kind} has no namespace or name")]
    MissingIdentity { kind: &'static str },

    #[error("configmap has no {0:?} data key")]
    MissingData(&'static str),

    #[error("failed to parse configmap snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("failed to parse previous configmap snapshot, stale entries were kept: {0}")]
    PreviousSnapshot(#[source] Box<IngestError>),
}
