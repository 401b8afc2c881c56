use thiserror::Error;

/// Why a simulated deployment step did not finish.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{step} failed: {reason}")]
    Failed { step: String, reason: String },

    #[error("{step} panicked")]
    Panicked { step: String },
}

impl StepError {
    pub fn failed(step: impl Into<String>, reason: impl Into<String>) -> Self {
        StepError::Failed {
            step: step.into(),
            reason: reason.into(),
        }
    }
}
