use tracing::{debug, warn};

use super::{StageId, StageRef};
use crate::backend::Backend;
use crate::session::SessionContext;

/// Outcome of resolving a [`StageRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub stage: StageId,
    /// `false` when the raw value was passed through after a failed lookup.
    pub resolved: bool,
}

/// Maps stage references that arrive in a non-canonical format onto the
/// identifiers used by the backend stage registry.
pub struct StageResolver;

impl StageResolver {
    /// Canonical references are returned as-is without a remote call. Raw
    /// references are looked up for the candidate; when the lookup fails
    /// the raw value is passed through so navigation can still proceed.
    pub async fn resolve(
        backend: &impl Backend,
        stage_ref: &StageRef,
        ctx: &SessionContext,
    ) -> Resolution {
        let raw = match stage_ref {
            StageRef::Canonical(id) => {
                return Resolution {
                    stage: id.clone(),
                    resolved: true,
                };
            }
            StageRef::Raw(raw) => raw,
        };

        match backend.resolve_stage(&ctx.candidate_id, raw).await {
            Ok(Some(stage)) => {
                debug!(raw = raw.as_str(), %stage, "resolved stage reference");
                Resolution {
                    stage,
                    resolved: true,
                }
            }
            Ok(None) => {
                warn!(
                    raw = raw.as_str(),
                    candidate_id = ctx.candidate_id.as_str(),
                    test_id = ctx.test_id.as_str(),
                    "no canonical stage for reference, passing raw value through"
                );
                Self::passthrough(raw)
            }
            Err(e) => {
                warn!(
                    raw = raw.as_str(),
                    candidate_id = ctx.candidate_id.as_str(),
                    error = %e,
                    "stage lookup failed, passing raw value through"
                );
                Self::passthrough(raw)
            }
        }
    }

    fn passthrough(raw: &str) -> Resolution {
        Resolution {
            stage: StageId::new(raw),
            resolved: false,
        }
    }
}
