use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training recipe: {0}")]
    InvalidSpec(String),

    #[error("required value `{0}` is unset (`??`); supply it before launching the run")]
    MissingValue(String),

    #[error("unknown {kind} `{name}`{}", .suggestion.as_ref().map(|s| format!(" (did you mean `{s}`?)")).unwrap_or_default())]
    UnknownReference {
        kind: &'static str,
        name: String,
        suggestion: Option<String>,
    },

    #[error("invalid override `{raw}`: {reason}")]
    Override { raw: String, reason: String },

    #[error("failed to parse recipe{}: {source}", .path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("launch error: {0}")]
    Launch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    pub(crate) fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidSpec(format!("{field} {reason}"))
    }
}
