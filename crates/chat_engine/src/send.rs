use api_client::ApiClientError;
use thiserror::Error;

use crate::message::{Clock, Message, MessageOrigin, Sender};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("message is empty")]
    Empty,
    #[error("a send is already in flight")]
    AlreadySending,
    #[error("chat session is not active")]
    SessionClosed,
    #[error("send failed: {0}")]
    Api(#[from] ApiClientError),
}

/// Local-echo bookkeeping for outgoing messages. At most one send is in
/// flight; the busy flag backs the disabled send control in the UI.
///
/// The echo is built with the same key derivation the server-confirmed copy
/// will produce (timestamp + truncated text + sender id), so the next poll
/// absorbs it instead of duplicating it. A failed send keeps the echo in the
/// log with no failure marker; there is no retry or status model for it.
pub struct OptimisticSendCoordinator {
    sender: Sender,
    in_flight: bool,
}

impl OptimisticSendCoordinator {
    pub fn new(sender: Sender) -> Self {
        Self {
            sender,
            in_flight: false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Validates the outgoing text and produces the local echo. The caller
    /// must append the echo and issue the network send, then call
    /// [`finish`](Self::finish) regardless of the result.
    pub fn begin(&mut self, text: &str, clock: &dyn Clock) -> Result<(Message, String), SendError> {
        if self.in_flight {
            return Err(SendError::AlreadySending);
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SendError::Empty);
        }
        self.in_flight = true;
        let echo = Message::Chat {
            id: None,
            sender: self.sender.clone(),
            text: trimmed.to_string(),
            timestamp: clock.timestamp(),
            origin: MessageOrigin::LocalPending,
        };
        Ok((echo, trimmed.to_string()))
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}
