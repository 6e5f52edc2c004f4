//! Stage identifiers, resolution of non-canonical references, and sequencing.

mod resolver;
mod sequencer;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use resolver::{Resolution, StageResolver};
pub use sequencer::{NavigationState, SequencingError, StageSequencer};

/// Length of a hyphenated canonical stage identifier (8-4-4-4-12).
const CANONICAL_LEN: usize = 36;

/// Identifier of a stage as known to the backend stage registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stage reference as it arrives from routing or user input.
///
/// Classified once with [`StageRef::parse`]; only the `Raw` variant ever
/// needs a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageRef {
    Canonical(StageId),
    Raw(String),
}

impl StageRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if is_canonical(raw) {
            StageRef::Canonical(StageId::new(raw))
        } else {
            StageRef::Raw(raw.to_string())
        }
    }
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageRef::Canonical(id) => write!(f, "{id}"),
            StageRef::Raw(raw) => write!(f, "{raw} (unresolved)"),
        }
    }
}

/// Hyphenated UUID only; `Uuid::try_parse` alone would also accept the
/// simple, braced and URN forms.
fn is_canonical(raw: &str) -> bool {
    raw.len() == CANONICAL_LEN && Uuid::try_parse(raw).is_ok()
}
