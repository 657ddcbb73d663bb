use thiserror::Error;

/// Why a single element of a classification answer was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("element is not a JSON object")]
    NotAnObject,

    #[error("element has no string stage")]
    MissingStage,

    #[error("stage '{label}' is not one of awareness, consideration, conversion")]
    UnknownStage { label: String },

    #[error("element matches no keyword in the batch (keyword: {keyword:?}, idx: {idx:?})")]
    Unmatched {
        keyword: Option<String>,
        idx: Option<u64>,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}
