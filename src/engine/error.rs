use thiserror::Error;

/// Errors produced by the quiz engine. None of them are retried internally.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Attempt not found")]
    AttemptNotFound,

    #[error("Attempt is already finished")]
    AttemptFinished,

    #[error("Attempt is not finished yet")]
    AttemptNotFinished,

    /// The catalog holds no eligible question at all.
    #[error("The entrance quiz is not available")]
    NoQuestionsAvailable,

    /// The attempt has no slot that could be presented.
    #[error("No question available for this attempt")]
    NoQuestionAvailable,

    #[error("Inconsistent store state: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type QuizResult<T> = Result<T, QuizError>;
