use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{GameId, ParticipantId},
    error::{ApiError, ApiException},
    protocol::{
        AckResponse, LeaveRequest, SendMessageRequest, SetMutedRequest, WireMessage,
        WireParticipant,
    },
};
use thiserror::Error;
use tracing::warn;
use url::Url;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("invalid server url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("server rejected request: {0}")]
    Api(#[from] ApiException),
    #[error("server reported failure: {0}")]
    Rejected(String),
}

/// The chat slice of the game server's REST surface. The engine only ever
/// talks to this trait, so tests substitute an in-memory implementation.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Full ordered chat log for the game, oldest first.
    async fn fetch_messages(&self, game_id: &GameId) -> Result<Vec<WireMessage>, ApiClientError>;

    async fn fetch_participants(
        &self,
        game_id: &GameId,
    ) -> Result<Vec<WireParticipant>, ApiClientError>;

    /// Text is expected to be trimmed by the caller.
    async fn send_message(&self, game_id: &GameId, text: &str) -> Result<(), ApiClientError>;

    async fn set_muted(
        &self,
        game_id: &GameId,
        participant_id: &ParticipantId,
        muted: bool,
    ) -> Result<(), ApiClientError>;

    /// Leave notification. Callers treat this as best-effort.
    async fn leave(
        &self,
        game_id: &GameId,
        participant_id: &ParticipantId,
    ) -> Result<(), ApiClientError>;
}

pub struct HttpChatApi {
    http: Client,
    base_url: Url,
    bearer_token: String,
}

impl HttpChatApi {
    pub fn new(base_url: &str, bearer_token: impl Into<String>) -> Result<Self, ApiClientError> {
        // Url::join drops the last path segment unless the base ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(&normalized)?,
            bearer_token: bearer_token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        game_id: &GameId,
    ) -> Result<T, ApiClientError> {
        let res = self
            .http
            .get(self.endpoint(path)?)
            .query(&[("game_id", game_id.as_str())])
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    async fn post_acked<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiClientError> {
        let res = self
            .http
            .post(self.endpoint(path)?)
            .bearer_auth(&self.bearer_token)
            .json(body)
            .send()
            .await?;
        let ack: AckResponse = check(res).await?.json().await?;
        if ack.success {
            Ok(())
        } else {
            Err(ApiClientError::Rejected(
                ack.message.unwrap_or_else(|| "no reason given".into()),
            ))
        }
    }
}

/// Decodes the server's error envelope on non-2xx responses; falls back to
/// the bare status when the body is not an envelope.
async fn check(res: Response) -> Result<Response, ApiClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    match res.json::<ApiError>().await {
        Ok(envelope) => Err(ApiClientError::Api(ApiException::from(envelope))),
        Err(err) => {
            warn!(%status, error = %err, "undecodable error body");
            Err(ApiClientError::Status(status))
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_messages(&self, game_id: &GameId) -> Result<Vec<WireMessage>, ApiClientError> {
        self.get_json("chat/messages", game_id).await
    }

    async fn fetch_participants(
        &self,
        game_id: &GameId,
    ) -> Result<Vec<WireParticipant>, ApiClientError> {
        self.get_json("chat/participants", game_id).await
    }

    async fn send_message(&self, game_id: &GameId, text: &str) -> Result<(), ApiClientError> {
        self.post_acked(
            "chat/send",
            &SendMessageRequest {
                game_id: game_id.clone(),
                message: text.to_string(),
            },
        )
        .await
    }

    async fn set_muted(
        &self,
        game_id: &GameId,
        participant_id: &ParticipantId,
        muted: bool,
    ) -> Result<(), ApiClientError> {
        self.post_acked(
            "chat/mute",
            &SetMutedRequest {
                game_id: game_id.clone(),
                participant_id: participant_id.clone(),
                muted,
            },
        )
        .await
    }

    async fn leave(
        &self,
        game_id: &GameId,
        participant_id: &ParticipantId,
    ) -> Result<(), ApiClientError> {
        self.post_acked(
            "chat/leave",
            &LeaveRequest {
                game_id: game_id.clone(),
                participant_id: participant_id.clone(),
            },
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
