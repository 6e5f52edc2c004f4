use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the candidate/test pairing, passed explicitly to every
/// component that scopes a request or a buffer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub candidate_id: String,
    pub test_id: String,
}

impl SessionContext {
    pub fn new(candidate_id: impl Into<String>, test_id: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            test_id: test_id.into(),
        }
    }
}

/// One candidate's attempt at a test, as reported by the backend.
///
/// `started_at` is only ever set by deserialization or [`TestSession::new`];
/// there is no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSession {
    candidate_id: String,
    test_id: String,
    #[serde(default)]
    time_limit_seconds: Option<u64>,
    started_at: DateTime<Utc>,
}

impl TestSession {
    pub fn new(
        candidate_id: impl Into<String>,
        test_id: impl Into<String>,
        time_limit_seconds: Option<u64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            test_id: test_id.into(),
            time_limit_seconds,
            started_at,
        }
    }

    pub fn candidate_id(&self) -> &str {
        &self.candidate_id
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// `None` means the test has no time box.
    pub fn time_limit_seconds(&self) -> Option<u64> {
        self.time_limit_seconds
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn context(&self) -> SessionContext {
        SessionContext::new(&self.candidate_id, &self.test_id)
    }
}
