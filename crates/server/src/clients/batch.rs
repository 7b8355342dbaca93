//! HTTP client for the batch review pipeline.
//!
//! Long games are forwarded as-is (with `reviewMode` forced to local so the
//! pipeline does not bounce them back) and the pipeline's response is
//! returned unchanged.

use async_trait::async_trait;
use reqwest::Client;

use coach::review::{BatchReviewer, ReviewRequest, ReviewResponse};
use coach::CoachError;

pub struct HttpBatchReviewer {
    client: Client,
    url: String,
}

impl HttpBatchReviewer {
    pub fn new(url: impl Into<String>) -> Result<Self, CoachError> {
        let client = Client::builder()
            .user_agent("ChessCoach/1.0")
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .map_err(|e| CoachError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl BatchReviewer for HttpBatchReviewer {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, CoachError> {
        tracing::info!(url = %self.url, "Sending game to batch review");
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| CoachError::Delegate(format!("Request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CoachError::Delegate(format!("HTTP {status}: {body}")));
        }

        resp.json::<ReviewResponse>()
            .await
            .map_err(|e| CoachError::Delegate(format!("Invalid response: {e}")))
    }
}
