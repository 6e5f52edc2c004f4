use std::fmt;

use serde::Serialize;

use crate::stage::StageId;

/// Phases of the session progression state machine.
///
/// A stage flows: ANSWERING → VALIDATING → SUBMITTING → ADVANCING | FINALIZING
/// → ANSWERING(next) | COMPLETED
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Phase {
    Answering(StageId),
    Validating,
    Submitting,
    Advancing,
    Finalizing,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Answering(stage) => write!(f, "ANSWERING({stage})"),
            Phase::Validating => write!(f, "VALIDATING"),
            Phase::Submitting => write!(f, "SUBMITTING"),
            Phase::Advancing => write!(f, "ADVANCING"),
            Phase::Finalizing => write!(f, "FINALIZING"),
            Phase::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Inputs that drive the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The candidate asked to move on from the current stage.
    ProceedRequested,
    ValidationFailed { missing: usize },
    ValidationPassed,
    /// Submission attempted and the sequencer answered.
    Routed { has_next_stage: bool },
    StageEntered(StageId),
    Finalized,
    /// A blocking failure; control returns to the current stage.
    Blocked,
}

/// The result of evaluating an event against the current phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Next(Phase),
    /// The event is not valid in this phase; nothing changed.
    Rejected { phase: Phase, event: Event },
}

/// Mutable progression record owned by the controller.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressRecord {
    pub phase: Phase,
    pub history: Vec<Phase>,
    pub current_stage: StageId,
    /// Highest stage index entered so far.
    pub reached_index: usize,
}

impl ProgressRecord {
    pub fn new(stage: StageId, index: usize) -> Self {
        Self {
            phase: Phase::Answering(stage.clone()),
            history: Vec::new(),
            current_stage: stage,
            reached_index: index,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }
}

/// Pure transition function over [`ProgressRecord`].
pub struct SessionMachine;

impl SessionMachine {
    /// Evaluates `event` in the record's current phase and applies the
    /// resulting transition, recording the phase that was left.
    ///
    /// There is no event that re-enters an earlier stage, and `Completed`
    /// rejects everything.
    pub fn next(record: &mut ProgressRecord, event: Event) -> Transition {
        let back = || Phase::Answering(record.current_stage.clone());
        let target = match (&record.phase, &event) {
            (Phase::Answering(_), Event::ProceedRequested) => Some(Phase::Validating),
            (Phase::Validating, Event::ValidationFailed { .. }) => Some(back()),
            (Phase::Validating, Event::ValidationPassed) => Some(Phase::Submitting),
            (Phase::Submitting, Event::Routed { has_next_stage: true }) => Some(Phase::Advancing),
            (Phase::Submitting, Event::Routed { has_next_stage: false }) => {
                Some(Phase::Finalizing)
            }
            (Phase::Advancing, Event::StageEntered(next)) => Some(Phase::Answering(next.clone())),
            (Phase::Finalizing, Event::Finalized) => Some(Phase::Completed),
            (Phase::Submitting | Phase::Advancing | Phase::Finalizing, Event::Blocked) => {
                Some(back())
            }
            _ => None,
        };

        let Some(target) = target else {
            return Transition::Rejected {
                phase: record.phase.clone(),
                event,
            };
        };

        if let Event::StageEntered(next) = &event {
            record.current_stage = next.clone();
        }
        let previous = std::mem::replace(&mut record.phase, target.clone());
        record.history.push(previous);
        Transition::Next(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ProgressRecord {
        ProgressRecord::new(StageId::new("s1"), 0)
    }

    fn answering(id: &str) -> Phase {
        Phase::Answering(StageId::new(id))
    }

    #[test]
    fn happy_path_through_two_stages() {
        let mut r = record();
        let steps = [
            (Event::ProceedRequested, Phase::Validating),
            (Event::ValidationPassed, Phase::Submitting),
            (Event::Routed { has_next_stage: true }, Phase::Advancing),
            (Event::StageEntered(StageId::new("s2")), answering("s2")),
            (Event::ProceedRequested, Phase::Validating),
            (Event::ValidationPassed, Phase::Submitting),
            (Event::Routed { has_next_stage: false }, Phase::Finalizing),
            (Event::Finalized, Phase::Completed),
        ];
        for (event, expected) in steps {
            assert_eq!(SessionMachine::next(&mut r, event), Transition::Next(expected.clone()));
            assert_eq!(r.phase, expected);
        }
        assert_eq!(r.current_stage, StageId::new("s2"));
        assert!(r.is_completed());
        assert_eq!(r.history.len(), 8);
        assert_eq!(r.history[0], answering("s1"));
    }

    #[test]
    fn failed_validation_returns_to_same_stage() {
        let mut r = record();
        SessionMachine::next(&mut r, Event::ProceedRequested);
        let t = SessionMachine::next(&mut r, Event::ValidationFailed { missing: 2 });
        assert_eq!(t, Transition::Next(answering("s1")));
    }

    #[test]
    fn blocked_submission_returns_to_same_stage() {
        let mut r = record();
        SessionMachine::next(&mut r, Event::ProceedRequested);
        SessionMachine::next(&mut r, Event::ValidationPassed);
        let t = SessionMachine::next(&mut r, Event::Blocked);
        assert_eq!(t, Transition::Next(answering("s1")));
    }

    #[test]
    fn blocked_advance_keeps_current_stage() {
        let mut r = record();
        SessionMachine::next(&mut r, Event::ProceedRequested);
        SessionMachine::next(&mut r, Event::ValidationPassed);
        SessionMachine::next(&mut r, Event::Routed { has_next_stage: true });
        let t = SessionMachine::next(&mut r, Event::Blocked);
        assert_eq!(t, Transition::Next(answering("s1")));
        assert_eq!(r.current_stage, StageId::new("s1"));
    }

    #[test]
    fn stage_entered_outside_advancing_is_rejected() {
        let mut r = record();
        let t = SessionMachine::next(&mut r, Event::StageEntered(StageId::new("s0")));
        assert!(matches!(t, Transition::Rejected { .. }));
        assert_eq!(r.phase, answering("s1"));
        assert_eq!(r.current_stage, StageId::new("s1"));
        assert!(r.history.is_empty());
    }

    #[test]
    fn finalize_without_routing_is_rejected() {
        let mut r = record();
        SessionMachine::next(&mut r, Event::ProceedRequested);
        let t = SessionMachine::next(&mut r, Event::Finalized);
        assert!(matches!(t, Transition::Rejected { .. }));
        assert_eq!(r.phase, Phase::Validating);
    }

    #[test]
    fn completed_is_terminal() {
        let mut r = record();
        for event in [
            Event::ProceedRequested,
            Event::ValidationPassed,
            Event::Routed { has_next_stage: false },
            Event::Finalized,
        ] {
            SessionMachine::next(&mut r, event);
        }
        for event in [Event::ProceedRequested, Event::Blocked, Event::Finalized] {
            assert!(matches!(
                SessionMachine::next(&mut r, event),
                Transition::Rejected { phase: Phase::Completed, .. }
            ));
        }
    }

    #[test]
    fn phase_display() {
        assert_eq!(answering("abc").to_string(), "ANSWERING(abc)");
        assert_eq!(Phase::Validating.to_string(), "VALIDATING");
        assert_eq!(Phase::Completed.to_string(), "COMPLETED");
    }
}
