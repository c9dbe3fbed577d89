use thiserror::Error;

/// Failure taxonomy for every study operation. `Conflict` covers duplicate
/// keys and lost updates; mutating operations retry once before surfacing it.
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict on {0}")]
    Conflict(&'static str),

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl StudyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
