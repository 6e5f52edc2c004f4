//! Wire types exchanged with the assessment backend.
//!
//! Field names follow the backend's snake_case JSON; the answer sheet is
//! flattened into an ordered list of pairs on submission.

use serde::{Deserialize, Serialize};

use crate::buffer::AnswerSheet;
use crate::stage::StageId;

/// One stage of a test as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub id: StageId,
    /// 1-based, unique within a test.
    pub display_order: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Response of the stage list query for a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageList {
    pub stages: Vec<StageDescriptor>,
    /// Advisory hint; the sequencer recomputes the successor from the
    /// ordering and only logs a disagreement.
    #[serde(default)]
    pub next_stage_id: Option<StageId>,
}

/// Response of the identifier resolution query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub stage_id: StageId,
}

/// A question belonging to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

/// One selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
}

/// A single `(question, option)` pair in a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPair {
    pub question_id: String,
    pub option_id: String,
}

/// Body of the answer submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub answers: Vec<AnswerPair>,
}

impl From<&AnswerSheet> for AnswerSubmission {
    fn from(sheet: &AnswerSheet) -> Self {
        Self {
            answers: sheet
                .iter()
                .map(|(question_id, option_id)| AnswerPair {
                    question_id: question_id.clone(),
                    option_id: option_id.clone(),
                })
                .collect(),
        }
    }
}
