use std::fmt;

use tracing::{debug, info, warn};

use super::context::SessionContext;
use super::state::{Event, Phase, ProgressRecord, SessionMachine, Transition};
use crate::backend::{Backend, Question, StageList};
use crate::buffer::{AnswerSheet, BufferError, ResponseStore};
use crate::connectivity::{ConnectivityEdge, ConnectivityWatch};
use crate::error::SessionError;
use crate::stage::{
    NavigationState, SequencingError, StageId, StageRef, StageResolver, StageSequencer,
};

/// Non-blocking conditions the candidate should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A stage reference could not be resolved and was used as-is.
    UnresolvedStage { raw: String },
    /// Offline: the stage was kept in the local buffer instead of submitted.
    OfflineBuffered { stage: StageId },
    /// Submission failed; the answers stay buffered for the next attempt.
    SubmissionFailed { stage: StageId, reason: String },
    /// A buffered entry of another stage could not be read and was skipped.
    UnreadableBuffer { stage: StageId, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnresolvedStage { raw } => {
                write!(f, "stage reference {raw:?} could not be resolved")
            }
            Warning::OfflineBuffered { stage } => {
                write!(f, "offline: answers for stage {stage} saved locally")
            }
            Warning::SubmissionFailed { stage, reason } => {
                write!(f, "answers for stage {stage} not sent ({reason}); will retry")
            }
            Warning::UnreadableBuffer { stage, reason } => {
                write!(f, "saved answers for stage {stage} are unreadable ({reason})")
            }
        }
    }
}

/// Result of a successful [`SessionController::proceed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proceeded {
    /// Now answering the next stage.
    Advanced(NavigationState),
    Completed,
}

/// Outcome of resubmitting buffered stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub flushed: Vec<StageId>,
    /// Rejected or unreachable backend; still buffered for the next attempt.
    pub failed: Vec<(StageId, String)>,
    /// Entries that cannot be read back. Left on disk untouched.
    pub unreadable: Vec<(StageId, String)>,
}

/// Submits every buffered stage of the candidate except `skip`, clearing
/// each entry the backend accepts. Failures are reported, not retried, and
/// one bad entry never stops the others from being sent.
pub async fn flush_buffered(
    backend: &impl Backend,
    store: &impl ResponseStore,
    candidate_id: &str,
    skip: Option<&StageId>,
) -> Result<FlushReport, BufferError> {
    let mut report = FlushReport::default();
    for stage in store.pending_stages(candidate_id)? {
        if skip == Some(&stage) {
            continue;
        }
        let answers = match store.load(candidate_id, &stage) {
            Ok(answers) => answers,
            Err(e) => {
                warn!(candidate_id, %stage, error = %e, "skipping unreadable buffer entry");
                report.unreadable.push((stage, e.to_string()));
                continue;
            }
        };
        match backend.submit_answers(candidate_id, &stage, &answers).await {
            Ok(()) => {
                if let Err(e) = store.clear(candidate_id, &stage) {
                    warn!(candidate_id, %stage, error = %e, "submitted but could not clear buffer entry");
                }
                info!(candidate_id, %stage, "resubmitted buffered answers");
                report.flushed.push(stage);
            }
            Err(e) => {
                warn!(candidate_id, %stage, error = %e, "resubmission failed");
                report.failed.push((stage, e.to_string()));
            }
        }
    }
    Ok(report)
}

async fn load_questions(
    backend: &impl Backend,
    stage: &StageId,
) -> Result<Vec<Question>, SessionError> {
    backend
        .fetch_questions(stage)
        .await
        .map_err(|source| SessionError::QuestionsUnavailable {
            stage: stage.clone(),
            source,
        })
}

/// Drives one candidate through the ordered stages of a test.
///
/// Every answer is written through to the [`ResponseStore`]. Moving on is a
/// single `proceed` intent; whether it advances or finalizes is decided by
/// the stage ordering, and there is no way back to an earlier stage.
pub struct SessionController<B, S> {
    backend: B,
    store: S,
    ctx: SessionContext,
    connectivity: ConnectivityWatch,
    record: ProgressRecord,
    /// Last stage list fetched; routes the session while offline.
    stages: StageList,
    navigation: NavigationState,
    questions: Vec<Question>,
    answers: AnswerSheet,
    prefetched: Option<(StageId, Vec<Question>)>,
    warnings: Vec<Warning>,
}

impl<B: Backend, S: ResponseStore> SessionController<B, S> {
    /// Resolves the entry reference, loads the stage and restores any
    /// buffered answers for it. Requires a connection.
    pub async fn enter(
        backend: B,
        store: S,
        ctx: SessionContext,
        mut connectivity: ConnectivityWatch,
        entry: &StageRef,
    ) -> Result<Self, SessionError> {
        connectivity.take_edge();
        if !connectivity.is_online() {
            return Err(SessionError::Offline);
        }

        let mut warnings = Vec::new();
        let resolution = StageResolver::resolve(&backend, entry, &ctx).await;
        if !resolution.resolved {
            warnings.push(Warning::UnresolvedStage {
                raw: resolution.stage.to_string(),
            });
        }
        let stage = resolution.stage;

        let stages = StageSequencer::fetch(&backend, &ctx).await?;
        let navigation = StageSequencer::compute(&stages, &stage)?;
        let questions = load_questions(&backend, &stage).await?;
        let answers = store.load(&ctx.candidate_id, &stage)?;
        info!(
            candidate_id = ctx.candidate_id.as_str(),
            %stage,
            position = navigation.position(),
            total = navigation.total_stages,
            restored = answers.len(),
            "entered session"
        );

        let mut controller = Self {
            backend,
            store,
            ctx,
            connectivity,
            record: ProgressRecord::new(stage, navigation.current_index),
            stages,
            navigation,
            questions,
            answers,
            prefetched: None,
            warnings,
        };
        controller.prefetch_next().await;
        Ok(controller)
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn phase(&self) -> &Phase {
        &self.record.phase
    }

    pub fn history(&self) -> &[Phase] {
        &self.record.history
    }

    pub fn is_completed(&self) -> bool {
        self.record.is_completed()
    }

    pub fn current_stage(&self) -> &StageId {
        &self.record.current_stage
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Questions of the current stage without a recorded answer.
    pub fn unanswered(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .count()
    }

    /// Drains the warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Records an answer and writes the stage snapshot to the buffer.
    pub fn select_answer(&mut self, question_id: &str, option_id: &str) -> Result<(), SessionError> {
        self.recover_interrupted()?;
        match &self.record.phase {
            Phase::Answering(_) => {}
            Phase::Completed => return Err(SessionError::Completed),
            other => {
                return Err(SessionError::InvalidTransition(format!(
                    "cannot answer while {other}"
                )));
            }
        }

        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        if !question.has_option(option_id) {
            return Err(SessionError::UnknownOption {
                question: question_id.to_string(),
                option: option_id.to_string(),
            });
        }

        self.answers
            .insert(question_id.to_string(), option_id.to_string());
        self.store
            .save(&self.ctx.candidate_id, &self.record.current_stage, &self.answers)?;
        Ok(())
    }

    /// Validates, submits, and then either advances to the next stage or
    /// finalizes the session when the current stage is the last one.
    pub async fn proceed(&mut self) -> Result<Proceeded, SessionError> {
        self.recover_interrupted()?;
        self.apply(Event::ProceedRequested)?;

        let missing = self.unanswered();
        if missing > 0 {
            self.apply(Event::ValidationFailed { missing })?;
            return Err(SessionError::Incomplete { missing });
        }
        self.apply(Event::ValidationPassed)?;

        if let Err(e) = self.submit_current().await {
            self.apply(Event::Blocked)?;
            return Err(e);
        }

        let navigation = match self.route().await {
            Ok(navigation) => navigation,
            Err(e) => {
                warn!(stage = %self.record.current_stage, error = %e, "cannot determine next stage");
                self.apply(Event::Blocked)?;
                return Err(e);
            }
        };
        self.apply(Event::Routed {
            has_next_stage: navigation.has_next_stage,
        })?;

        let result = match navigation.next_stage {
            Some(next) => self.advance(next).await.map(Proceeded::Advanced),
            None => self.finish().await.map(|()| Proceeded::Completed),
        };
        if result.is_err() {
            self.apply(Event::Blocked)?;
        }
        result
    }

    fn apply(&mut self, event: Event) -> Result<(), SessionError> {
        match SessionMachine::next(&mut self.record, event) {
            Transition::Next(phase) => {
                debug!(%phase, "phase transition");
                Ok(())
            }
            Transition::Rejected {
                phase: Phase::Completed,
                ..
            } => Err(SessionError::Completed),
            Transition::Rejected { phase, event } => Err(SessionError::InvalidTransition(
                format!("{event:?} while {phase}"),
            )),
        }
    }

    /// A `proceed` future dropped mid-await leaves the record in an
    /// intermediate phase; fall back to answering the current stage.
    fn recover_interrupted(&mut self) -> Result<(), SessionError> {
        if matches!(
            self.record.phase,
            Phase::Submitting | Phase::Advancing | Phase::Finalizing
        ) {
            warn!(phase = %self.record.phase, "recovering from interrupted proceed");
            self.apply(Event::Blocked)?;
        }
        Ok(())
    }

    /// Consults the connectivity watch; called before every remote call.
    fn check_online(&mut self) -> bool {
        if let Some(edge) = self.connectivity.take_edge() {
            match edge {
                ConnectivityEdge::WentOnline => {
                    info!("connection restored, buffered answers will be resubmitted")
                }
                ConnectivityEdge::WentOffline => {
                    info!("connection lost, answers will be kept locally")
                }
            }
        }
        self.connectivity.is_online()
    }

    async fn submit_current(&mut self) -> Result<(), SessionError> {
        let stage = self.record.current_stage.clone();
        let candidate_id = self.ctx.candidate_id.clone();
        self.store.save(&candidate_id, &stage, &self.answers)?;

        if !self.check_online() {
            info!(%stage, "offline, answers kept in local buffer");
            self.warnings.push(Warning::OfflineBuffered { stage });
            return Ok(());
        }

        let report = flush_buffered(&self.backend, &self.store, &candidate_id, Some(&stage)).await?;
        self.note_failures(report);

        match self
            .backend
            .submit_answers(&candidate_id, &stage, &self.answers)
            .await
        {
            Ok(()) => {
                self.store.clear(&candidate_id, &stage)?;
                info!(%stage, count = self.answers.len(), "stage answers submitted");
            }
            Err(e) => {
                warn!(%stage, error = %e, "submission failed, answers kept in local buffer");
                self.warnings.push(Warning::SubmissionFailed {
                    stage,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn note_failures(&mut self, report: FlushReport) {
        self.warnings.extend(
            report
                .failed
                .into_iter()
                .map(|(stage, reason)| Warning::SubmissionFailed { stage, reason }),
        );
        self.warnings.extend(
            report
                .unreadable
                .into_iter()
                .map(|(stage, reason)| Warning::UnreadableBuffer { stage, reason }),
        );
    }

    /// Recomputes the navigation state of the current stage. Offline, the
    /// cached stage list is used instead of a remote call.
    async fn route(&mut self) -> Result<NavigationState, SessionError> {
        if self.check_online() {
            self.stages = StageSequencer::fetch(&self.backend, &self.ctx).await?;
        } else {
            debug!("offline, routing from cached stage list");
        }
        let navigation = StageSequencer::compute(&self.stages, &self.record.current_stage)?;
        if navigation.current_index < self.record.reached_index {
            return Err(SequencingError::Regression {
                reached: self.record.reached_index,
                offered: navigation.current_index,
            }
            .into());
        }
        self.navigation = navigation.clone();
        Ok(navigation)
    }

    async fn advance(&mut self, next: StageId) -> Result<NavigationState, SessionError> {
        let online = self.check_online();
        let next = if online {
            let resolution =
                StageResolver::resolve(&self.backend, &StageRef::parse(next.as_str()), &self.ctx)
                    .await;
            if !resolution.resolved {
                self.warnings.push(Warning::UnresolvedStage {
                    raw: next.to_string(),
                });
            }
            resolution.stage
        } else {
            next
        };

        let questions = match self.prefetched.take() {
            Some((stage, questions)) if stage == next => questions,
            _ if online => load_questions(&self.backend, &next).await?,
            _ => return Err(SessionError::Offline),
        };

        let navigation = StageSequencer::compute(&self.stages, &next)?;
        if navigation.current_index <= self.record.reached_index {
            return Err(SequencingError::Regression {
                reached: self.record.reached_index,
                offered: navigation.current_index,
            }
            .into());
        }
        let answers = self.store.load(&self.ctx.candidate_id, &next)?;

        self.apply(Event::StageEntered(next.clone()))?;
        self.record.reached_index = navigation.current_index;
        self.navigation = navigation.clone();
        self.questions = questions;
        self.answers = answers;
        info!(
            stage = %next,
            position = navigation.position(),
            total = navigation.total_stages,
            "advanced to stage"
        );

        self.prefetch_next().await;
        Ok(navigation)
    }

    /// Loads the next stage's questions ahead of time so an offline
    /// candidate can still move on.
    async fn prefetch_next(&mut self) {
        let Some(next) = self.navigation.next_stage.clone() else {
            return;
        };
        if !self.check_online() {
            return;
        }
        match self.backend.fetch_questions(&next).await {
            Ok(questions) => self.prefetched = Some((next, questions)),
            Err(e) => debug!(stage = %next, error = %e, "prefetch of next stage failed"),
        }
    }

    async fn finish(&mut self) -> Result<(), SessionError> {
        if !self.check_online() {
            return Err(SessionError::Offline);
        }
        let candidate_id = self.ctx.candidate_id.clone();
        let report = flush_buffered(&self.backend, &self.store, &candidate_id, None).await?;
        // Unreadable entries can never be sent; they are reported, not waited on.
        let unsent = report.failed.len();
        self.note_failures(report);
        if unsent > 0 {
            return Err(SessionError::PendingAnswers { stages: unsent });
        }

        self.backend
            .finalize(&candidate_id)
            .await
            .map_err(SessionError::Finalize)?;
        self.apply(Event::Finalized)?;
        info!(candidate_id = candidate_id.as_str(), "session completed");
        Ok(())
    }
}
