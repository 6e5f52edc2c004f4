pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::HttpBackend;
pub use error::BackendError;
pub use types::{AnswerOption, AnswerPair, AnswerSubmission, Question, StageDescriptor, StageList};

use crate::buffer::AnswerSheet;
use crate::session::TestSession;
use crate::stage::StageId;

/// Request/response calls the progression engine makes against the
/// assessment backend. Implemented over HTTP by [`HttpBackend`] and by
/// in-memory fakes in tests.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn fetch_session(&self, candidate_id: &str) -> Result<TestSession, BackendError>;

    /// Ordered stage list of the candidate's test.
    async fn fetch_stages(&self, candidate_id: &str) -> Result<StageList, BackendError>;

    /// Maps a non-canonical stage reference to a canonical id; `Ok(None)`
    /// when the backend has no match.
    async fn resolve_stage(
        &self,
        candidate_id: &str,
        raw: &str,
    ) -> Result<Option<StageId>, BackendError>;

    async fn fetch_questions(&self, stage: &StageId) -> Result<Vec<Question>, BackendError>;

    /// Idempotent for the same payload.
    async fn submit_answers(
        &self,
        candidate_id: &str,
        stage: &StageId,
        answers: &AnswerSheet,
    ) -> Result<(), BackendError>;

    /// Marks the session complete. Idempotent.
    async fn finalize(&self, candidate_id: &str) -> Result<(), BackendError>;
}
