use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;
use crate::buffer::BufferError;
use crate::stage::{SequencingError, StageId};

/// Erros de configuração e de I/O fora do fluxo da sessão.
#[derive(Debug, Error)]
pub enum EtapaError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors returned by the session controller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{missing} question(s) still unanswered")]
    Incomplete { missing: usize },

    #[error("question {0} does not belong to the current stage")]
    UnknownQuestion(String),

    #[error("option {option} is not valid for question {question}")]
    UnknownOption { question: String, option: String },

    #[error("cannot load questions for stage {stage}: {source}")]
    QuestionsUnavailable {
        stage: StageId,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Sequencing(#[from] SequencingError),

    #[error("no connection; answers remain buffered locally")]
    Offline,

    #[error("{stages} stage(s) still have unsubmitted answers")]
    PendingAnswers { stages: usize },

    #[error("finalization failed: {0}")]
    Finalize(#[source] BackendError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("session already completed")]
    Completed,

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

/// Classifies a [`SessionError`] for the caller's recovery decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Recoverable by the candidate (answer the remaining questions).
    Validation,
    /// Network or storage hiccup; retrying later can succeed.
    Transient,
    /// Stage ordering could not be established; advancement is refused.
    Sequencing,
    /// The operation can never succeed in this session.
    Terminal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Validation => write!(f, "Validation"),
            ErrorClass::Transient => write!(f, "Transient"),
            ErrorClass::Sequencing => write!(f, "Sequencing"),
            ErrorClass::Terminal => write!(f, "Terminal"),
        }
    }
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::Incomplete { .. }
            | SessionError::UnknownQuestion(_)
            | SessionError::UnknownOption { .. } => ErrorClass::Validation,
            SessionError::QuestionsUnavailable { .. }
            | SessionError::Offline
            | SessionError::PendingAnswers { .. }
            | SessionError::Finalize(_)
            | SessionError::Buffer(_) => ErrorClass::Transient,
            SessionError::Sequencing(_) => ErrorClass::Sequencing,
            SessionError::Completed | SessionError::InvalidTransition(_) => ErrorClass::Terminal,
        }
    }
}
