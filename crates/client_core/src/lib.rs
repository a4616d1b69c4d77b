use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::GameId,
    error::ApiError,
    protocol::{DisputeRecord, StatRow},
};
use tracing::{debug, warn};

pub mod disputes;
pub mod endpoints;
pub mod error;

pub use disputes::{
    DisputeEvent, DisputesSnapshot, DisputesState, DisputesWorkflow, Notice, ResolveOutcome,
};
pub use endpoints::{ApiConfig, Endpoint, EndpointDirectory};
pub use error::ClientError;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

const MAX_ERROR_BODY_LEN: usize = 200;

/// Backend operations the disputes workflow depends on.
#[async_trait]
pub trait DisputesApi: Send + Sync {
    async fn fetch_disputes(&self) -> Result<Vec<DisputeRecord>>;
    async fn resolve_dispute(&self, game_id: &GameId) -> Result<()>;
}

/// HTTP client for the stats backend.
#[derive(Clone)]
pub struct StatsClient {
    http: Client,
    endpoints: EndpointDirectory,
}

impl StatsClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self::with_http_client(Client::new(), config)
    }

    pub fn with_http_client(http: Client, config: &ApiConfig) -> Self {
        Self {
            http,
            endpoints: config.directory(),
        }
    }

    pub fn endpoints(&self) -> &EndpointDirectory {
        &self.endpoints
    }

    pub async fn player_stats(&self, game: &str, player: &str) -> Result<Vec<StatRow>> {
        self.get_json(self.endpoints.player_stats(game, player))
            .await
    }

    pub async fn match_stats(&self, game: &str, week: &str) -> Result<Vec<StatRow>> {
        self.get_json(self.endpoints.match_stats(game, week)).await
    }

    pub async fn season_stats(&self, game: &str, week: &str) -> Result<Vec<StatRow>> {
        self.get_json(self.endpoints.season_stats(game, week))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        let response = ensure_success(&url, response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|err| ClientError::Decode {
            url,
            reason: err.to_string(),
        })
    }

    async fn post_without_body(&self, url: String) -> Result<()> {
        debug!(%url, "POST");
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        ensure_success(&url, response).await?;
        Ok(())
    }
}

#[async_trait]
impl DisputesApi for StatsClient {
    async fn fetch_disputes(&self) -> Result<Vec<DisputeRecord>> {
        self.get_json(self.endpoints.all_disputes()).await
    }

    async fn resolve_dispute(&self, game_id: &GameId) -> Result<()> {
        self.post_without_body(self.endpoints.resolve_dispute(game_id))
            .await
    }
}

async fn ensure_success(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            warn!(%url, %status, "failed to read error body: {err}");
            String::new()
        }
    };
    Err(ClientError::Status {
        url: url.to_string(),
        status,
        message: rejection_message(status, &body),
    })
}

fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Some(reason) = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|err| err.reason().map(str::to_string))
    {
        return reason;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= MAX_ERROR_BODY_LEN {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("request rejected")
        .to_string()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
