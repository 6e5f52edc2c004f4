//! In-memory [`Backend`] used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{TimeZone, Utc};

use super::{AnswerOption, Backend, BackendError, Question, StageDescriptor, StageList};
use crate::buffer::AnswerSheet;
use crate::session::TestSession;
use crate::stage::StageId;

pub(crate) struct FakeBackend {
    stages: Vec<StageDescriptor>,
    next_hint: Option<StageId>,
    aliases: HashMap<String, StageId>,
    questions: HashMap<StageId, Vec<Question>>,
    fail_stages: AtomicBool,
    fail_resolve: AtomicBool,
    fail_submit: AtomicBool,
    fail_finalize: AtomicBool,
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Vec<(StageId, AnswerSheet)>>,
}

fn server_error() -> BackendError {
    BackendError::Status {
        status: 503,
        message: "unavailable".into(),
    }
}

impl FakeBackend {
    /// Stages ordered as given; each gets `questions` questions with ids
    /// `<stage>-q<n>` and options `a`, `b`, `c`.
    pub(crate) fn with_stages(ids: &[&str], questions: usize) -> Self {
        let stages = ids
            .iter()
            .enumerate()
            .map(|(i, id)| StageDescriptor {
                id: StageId::new(*id),
                display_order: (i + 1) as u32,
                title: format!("Etapa {}", i + 1),
                description: String::new(),
            })
            .collect::<Vec<_>>();
        let questions = stages
            .iter()
            .map(|s| {
                let list = (1..=questions)
                    .map(|n| Question {
                        id: format!("{}-q{n}", s.id),
                        text: format!("Question {n}"),
                        options: ["a", "b", "c"]
                            .iter()
                            .map(|o| AnswerOption {
                                id: o.to_string(),
                                text: o.to_uppercase(),
                            })
                            .collect(),
                    })
                    .collect();
                (s.id.clone(), list)
            })
            .collect();
        Self {
            stages,
            next_hint: None,
            aliases: HashMap::new(),
            questions,
            fail_stages: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            fail_finalize: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_alias(mut self, raw: &str, stage: &str) -> Self {
        self.aliases.insert(raw.to_string(), StageId::new(stage));
        self
    }

    pub(crate) fn with_next_hint(mut self, stage: Option<&str>) -> Self {
        self.next_hint = stage.map(StageId::new);
        self
    }

    pub(crate) fn fail_stages(&self, fail: bool) {
        self.fail_stages.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    /// Number of recorded calls whose name starts with `prefix`.
    pub(crate) fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub(crate) fn submitted(&self) -> Vec<(StageId, AnswerSheet)> {
        self.submitted.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Backend for FakeBackend {
    async fn fetch_session(&self, candidate_id: &str) -> Result<TestSession, BackendError> {
        self.record("session".into());
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Ok(TestSession::new(candidate_id, "test-1", Some(600), started))
    }

    async fn fetch_stages(&self, _candidate_id: &str) -> Result<StageList, BackendError> {
        self.record("stages".into());
        if self.fail_stages.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(StageList {
            stages: self.stages.clone(),
            next_stage_id: self.next_hint.clone(),
        })
    }

    async fn resolve_stage(
        &self,
        _candidate_id: &str,
        raw: &str,
    ) -> Result<Option<StageId>, BackendError> {
        self.record(format!("resolve:{raw}"));
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(self.aliases.get(raw).cloned())
    }

    async fn fetch_questions(&self, stage: &StageId) -> Result<Vec<Question>, BackendError> {
        self.record(format!("questions:{stage}"));
        self.questions
            .get(stage)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                status: 404,
                message: format!("no stage {stage}"),
            })
    }

    async fn submit_answers(
        &self,
        _candidate_id: &str,
        stage: &StageId,
        answers: &AnswerSheet,
    ) -> Result<(), BackendError> {
        self.record(format!("submit:{stage}"));
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        self.submitted
            .lock()
            .unwrap()
            .push((stage.clone(), answers.clone()));
        Ok(())
    }

    async fn finalize(&self, _candidate_id: &str) -> Result<(), BackendError> {
        self.record("finalize".into());
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(())
    }
}
