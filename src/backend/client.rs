use std::time::Duration;

use reqwest::{Client, Response, Url};
use tracing::debug;

use super::Backend;
use super::error::BackendError;
use super::types::{AnswerSubmission, Question, ResolveResponse, StageList};
use crate::buffer::AnswerSheet;
use crate::session::TestSession;
use crate::stage::StageId;

/// HTTP/JSON implementation of [`Backend`].
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let base_url =
            Url::parse(base_url).map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

impl Backend for HttpBackend {
    async fn fetch_session(&self, candidate_id: &str) -> Result<TestSession, BackendError> {
        let url = self.endpoint(&["candidates", candidate_id, "session"])?;
        debug!(%url, "fetching test session");
        let response = ensure_success(self.client.get(url).send().await?).await?;
        Ok(response.json::<TestSession>().await?)
    }

    async fn fetch_stages(&self, candidate_id: &str) -> Result<StageList, BackendError> {
        let url = self.endpoint(&["candidates", candidate_id, "stages"])?;
        debug!(%url, "fetching stage list");
        let response = ensure_success(self.client.get(url).send().await?).await?;
        Ok(response.json::<StageList>().await?)
    }

    async fn resolve_stage(
        &self,
        candidate_id: &str,
        raw: &str,
    ) -> Result<Option<StageId>, BackendError> {
        let url = self.endpoint(&["candidates", candidate_id, "stages", "resolve"])?;
        debug!(%url, raw, "resolving stage reference");
        let response = self.client.get(url).query(&[("ref", raw)]).send().await?;
        match ensure_success(response).await {
            Ok(response) => Ok(Some(response.json::<ResolveResponse>().await?.stage_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_questions(&self, stage: &StageId) -> Result<Vec<Question>, BackendError> {
        let url = self.endpoint(&["stages", stage.as_str(), "questions"])?;
        debug!(%url, "fetching questions");
        let response = ensure_success(self.client.get(url).send().await?).await?;
        Ok(response.json::<Vec<Question>>().await?)
    }

    async fn submit_answers(
        &self,
        candidate_id: &str,
        stage: &StageId,
        answers: &AnswerSheet,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&["candidates", candidate_id, "stages", stage.as_str(), "answers"])?;
        debug!(%url, count = answers.len(), "submitting answers");
        let body = AnswerSubmission::from(answers);
        ensure_success(self.client.post(url).json(&body).send().await?).await?;
        Ok(())
    }

    async fn finalize(&self, candidate_id: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&["candidates", candidate_id, "finalize"])?;
        debug!(%url, "finalizing session");
        ensure_success(self.client.post(url).send().await?).await?;
        Ok(())
    }
}
