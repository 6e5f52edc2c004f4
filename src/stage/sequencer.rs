use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::StageId;
use crate::backend::{Backend, BackendError, StageDescriptor, StageList};
use crate::session::SessionContext;

/// Position of the current stage within the candidate's test.
///
/// Derived on demand from the backend stage list; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    /// 0-based.
    pub current_index: usize,
    pub total_stages: usize,
    pub has_next_stage: bool,
    pub next_stage: Option<StageId>,
}

impl NavigationState {
    /// 1-based position for display.
    pub fn position(&self) -> usize {
        self.current_index + 1
    }

    pub fn is_last(&self) -> bool {
        !self.has_next_stage
    }
}

#[derive(Debug, Error)]
pub enum SequencingError {
    #[error("stage list unavailable: {0}")]
    Unavailable(#[from] BackendError),

    #[error("test has no stages")]
    Empty,

    #[error("stage {0} is not part of the candidate's test")]
    StageNotFound(StageId),

    #[error("two stages share display order {0}")]
    DuplicateOrder(u32),

    #[error("stage index would move backwards from {reached} to {offered}")]
    Regression { reached: usize, offered: usize },
}

/// Computes [`NavigationState`] for a stage of a candidate's test.
pub struct StageSequencer;

impl StageSequencer {
    /// Fetches the candidate's stage list and locates `stage` in it.
    pub async fn navigation(
        backend: &impl Backend,
        stage: &StageId,
        ctx: &SessionContext,
    ) -> Result<NavigationState, SequencingError> {
        let list = Self::fetch(backend, ctx).await?;
        let state = Self::compute(&list, stage)?;
        debug!(
            candidate_id = ctx.candidate_id.as_str(),
            %stage,
            position = state.position(),
            total = state.total_stages,
            has_next = state.has_next_stage,
            "computed navigation state"
        );
        Ok(state)
    }

    /// The candidate's stage list, unordered as received.
    pub async fn fetch(
        backend: &impl Backend,
        ctx: &SessionContext,
    ) -> Result<StageList, SequencingError> {
        Ok(backend.fetch_stages(&ctx.candidate_id).await?)
    }

    /// Orders the stages by `display_order` and finds `stage` by id.
    ///
    /// The successor always comes from the ordering. An upstream
    /// `next_stage_id` that disagrees is logged and ignored.
    pub fn compute(list: &StageList, stage: &StageId) -> Result<NavigationState, SequencingError> {
        let mut stages: Vec<&StageDescriptor> = list.stages.iter().collect();
        if stages.is_empty() {
            return Err(SequencingError::Empty);
        }
        stages.sort_by_key(|s| s.display_order);
        if let Some(pair) = stages
            .windows(2)
            .find(|pair| pair[0].display_order == pair[1].display_order)
        {
            return Err(SequencingError::DuplicateOrder(pair[0].display_order));
        }

        let current_index = stages
            .iter()
            .position(|s| s.id == *stage)
            .ok_or_else(|| SequencingError::StageNotFound(stage.clone()))?;
        let total_stages = stages.len();
        let mut next_stage = stages.get(current_index + 1).map(|s| s.id.clone());

        if list.next_stage_id.is_some() && list.next_stage_id != next_stage {
            warn!(
                %stage,
                hint = ?list.next_stage_id,
                computed = ?next_stage,
                "backend next-stage hint disagrees with stage ordering"
            );
        }

        // Short tests: the first of two stages is never the last one.
        if total_stages == 2 && current_index == 0 {
            next_stage = Some(stages[1].id.clone());
        }

        Ok(NavigationState {
            current_index,
            total_stages,
            has_next_stage: next_stage.is_some(),
            next_stage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;

    fn descriptor(id: &str, order: u32) -> StageDescriptor {
        StageDescriptor {
            id: StageId::new(id),
            display_order: order,
            title: format!("Etapa {order}"),
            description: String::new(),
        }
    }

    fn list(stages: Vec<StageDescriptor>, hint: Option<&str>) -> StageList {
        StageList {
            stages,
            next_stage_id: hint.map(StageId::new),
        }
    }

    #[test]
    fn orders_by_display_order_not_list_order() {
        let l = list(
            vec![descriptor("c", 3), descriptor("a", 1), descriptor("b", 2)],
            None,
        );
        let nav = StageSequencer::compute(&l, &StageId::new("b")).unwrap();
        assert_eq!(nav.current_index, 1);
        assert_eq!(nav.position(), 2);
        assert_eq!(nav.total_stages, 3);
        assert_eq!(nav.next_stage, Some(StageId::new("c")));
        assert!(nav.has_next_stage);
    }

    #[test]
    fn last_stage_has_no_next() {
        let l = list(vec![descriptor("a", 1), descriptor("b", 2), descriptor("c", 3)], None);
        let nav = StageSequencer::compute(&l, &StageId::new("c")).unwrap();
        assert!(nav.is_last());
        assert_eq!(nav.next_stage, None);
    }

    #[test]
    fn single_stage_test_is_immediately_last() {
        let l = list(vec![descriptor("a", 1)], None);
        let nav = StageSequencer::compute(&l, &StageId::new("a")).unwrap();
        assert_eq!(nav.total_stages, 1);
        assert!(nav.is_last());
    }

    #[test]
    fn two_stage_test_first_is_not_last_despite_null_hint() {
        // Upstream claims there is no next stage.
        let l = StageList {
            stages: vec![descriptor("a", 1), descriptor("b", 2)],
            next_stage_id: None,
        };
        let nav = StageSequencer::compute(&l, &StageId::new("a")).unwrap();
        assert_eq!(nav.current_index, 0);
        assert!(nav.has_next_stage);
        assert_eq!(nav.next_stage, Some(StageId::new("b")));
    }

    #[test]
    fn two_stage_test_second_is_last_despite_hint() {
        let l = list(vec![descriptor("a", 1), descriptor("b", 2)], Some("a"));
        let nav = StageSequencer::compute(&l, &StageId::new("b")).unwrap();
        assert_eq!(nav.current_index, 1);
        assert!(!nav.has_next_stage);
    }

    #[test]
    fn disagreeing_hint_is_ignored() {
        let l = list(
            vec![descriptor("a", 1), descriptor("b", 2), descriptor("c", 3)],
            Some("c"),
        );
        let nav = StageSequencer::compute(&l, &StageId::new("a")).unwrap();
        assert_eq!(nav.next_stage, Some(StageId::new("b")));
    }

    #[test]
    fn unknown_stage_is_an_error() {
        let l = list(vec![descriptor("a", 1)], None);
        let err = StageSequencer::compute(&l, &StageId::new("zz")).unwrap_err();
        assert!(matches!(err, SequencingError::StageNotFound(id) if id.as_str() == "zz"));
    }

    #[test]
    fn duplicate_display_order_is_an_error() {
        let l = list(vec![descriptor("a", 1), descriptor("b", 1)], None);
        let err = StageSequencer::compute(&l, &StageId::new("a")).unwrap_err();
        assert!(matches!(err, SequencingError::DuplicateOrder(1)));
    }

    #[test]
    fn empty_test_is_an_error() {
        let l = list(vec![], None);
        assert!(matches!(
            StageSequencer::compute(&l, &StageId::new("a")),
            Err(SequencingError::Empty)
        ));
    }

    #[tokio::test]
    async fn navigation_fetches_stage_list() {
        let backend = FakeBackend::with_stages(&["s1", "s2", "s3"], 1);
        let ctx = SessionContext::new("cand-1", "test-1");
        let nav = StageSequencer::navigation(&backend, &StageId::new("s2"), &ctx)
            .await
            .unwrap();
        assert_eq!(nav.current_index, 1);
        assert_eq!(backend.call_count("stages"), 1);
    }

    #[tokio::test]
    async fn unavailable_stage_list_is_reported() {
        let backend = FakeBackend::with_stages(&["s1", "s2"], 1);
        backend.fail_stages(true);
        let ctx = SessionContext::new("cand-1", "test-1");
        let result = StageSequencer::navigation(&backend, &StageId::new("s1"), &ctx).await;
        assert!(matches!(result, Err(SequencingError::Unavailable(_))));
    }
}
