use std::{sync::Arc, time::Duration};

use api_client::{ApiClientError, ChatApi};
use async_trait::async_trait;
use shared::domain::{GameId, ParticipantId};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod message;
pub mod participants;
pub mod poller;
pub mod scroll;
pub mod send;
pub mod store;

pub use message::{Clock, Message, MessageOrigin, Sender, SystemClock};
pub use participants::{Participant, MUTED_PLACEHOLDER};
pub use poller::{FetchKind, DEFAULT_POLL_INTERVAL};
pub use scroll::{ScrollState, NEAR_BOTTOM_THRESHOLD_PX};
pub use send::SendError;

use participants::ParticipantRoster;
use poller::{PollTarget, PollingScheduler};
use scroll::{ScrollDecision, ScrollTracker};
use send::OptimisticSendCoordinator;
use store::MessageStore;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Delay before the silent fetch that reconciles an optimistic echo with
/// its server-confirmed copy.
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the best-effort leave notification.
pub const DEFAULT_LEAVE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Active,
    Terminated,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session was already started")]
    AlreadyStarted,
    #[error("session terminated during startup")]
    Terminated,
}

#[derive(Debug, Error)]
pub enum MuteError {
    #[error("unknown participant")]
    UnknownParticipant,
    #[error("chat session is not active")]
    SessionClosed,
    #[error("mute toggle failed: {0}")]
    Api(#[from] ApiClientError),
}

/// What the engine tells the UI layer. `LogUpdated` means `render_log` is
/// stale; the scroll and badge events carry the notification decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    LogUpdated,
    ScrollToEnd,
    NewMessageBadge { count: u32 },
    ParticipantsUpdated,
}

/// One row of the renderable log, with the mute overlay already applied.
/// `sender` is `None` for system rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub sender: Option<Sender>,
    pub text: String,
    pub timestamp: String,
    pub pending: bool,
}

pub struct ChatConfig {
    pub game_id: GameId,
    /// Local identity, resolved by the auth collaborator before the session
    /// is constructed.
    pub local_sender: Sender,
    pub poll_interval: Duration,
    pub reconcile_delay: Duration,
    pub leave_timeout: Duration,
}

impl ChatConfig {
    pub fn new(game_id: GameId, local_sender: Sender) -> Self {
        Self {
            game_id,
            local_sender,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
            leave_timeout: DEFAULT_LEAVE_TIMEOUT,
        }
    }
}

struct SessionState {
    phase: SessionPhase,
    store: MessageStore,
    scroll: ScrollTracker,
    roster: ParticipantRoster,
    outgoing: OptimisticSendCoordinator,
}

impl SessionState {
    fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}

/// One mounted chat screen. Owns the message log, the poll loop, the scroll
/// notification state and the participant roster for the lifetime of the
/// screen; nothing survives [`ChatSession::leave`].
pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    clock: Arc<dyn Clock>,
    config: ChatConfig,
    scheduler: PollingScheduler,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatSession {
    pub fn new(api: Arc<dyn ChatApi>, config: ChatConfig) -> Arc<Self> {
        Self::new_with_clock(api, config, Arc::new(SystemClock))
    }

    pub fn new_with_clock(
        api: Arc<dyn ChatApi>,
        config: ChatConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let outgoing = OptimisticSendCoordinator::new(config.local_sender.clone());
        Arc::new(Self {
            api,
            clock,
            scheduler: PollingScheduler::new(config.poll_interval),
            config,
            inner: Mutex::new(SessionState {
                phase: SessionPhase::Initializing,
                store: MessageStore::new(),
                scroll: ScrollTracker::new(),
                roster: ParticipantRoster::new(),
                outgoing,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Runs the mount sequence: blocking initial fetch, participant fetch,
    /// then the poll loop. Fetch failures are logged and left to the poll
    /// interval to retry; they do not abort the session.
    pub async fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        {
            let inner = self.inner.lock().await;
            if inner.phase != SessionPhase::Initializing {
                return Err(SessionError::AlreadyStarted);
            }
        }
        info!(game_id = %self.config.game_id, "joining game chat");
        self.scheduler.run_now(self.as_ref(), FetchKind::Silent).await;
        self.refresh_participants().await;
        {
            let mut inner = self.inner.lock().await;
            if inner.phase == SessionPhase::Terminated {
                return Err(SessionError::Terminated);
            }
            inner.phase = SessionPhase::Active;
        }
        self.scheduler
            .start(Arc::clone(self) as Arc<dyn PollTarget>)
            .await;
        Ok(())
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    /// Pull-to-refresh: out-of-band fetch plus the only participant refresh
    /// that happens after mount.
    pub async fn manual_refresh(&self) {
        self.scheduler.run_now(self, FetchKind::Manual).await;
        self.refresh_participants().await;
    }

    pub async fn on_scroll(&self, state: ScrollState) {
        let mut inner = self.inner.lock().await;
        if inner.phase == SessionPhase::Terminated {
            return;
        }
        inner.scroll.on_scroll(state);
    }

    /// The floating badge affordance: jump to the end and clear the count.
    pub async fn scroll_to_bottom(&self) {
        let mut inner = self.inner.lock().await;
        if inner.phase == SessionPhase::Terminated {
            return;
        }
        inner.scroll.reset();
        let _ = self.events.send(ChatEvent::ScrollToEnd);
        let _ = self.events.send(ChatEvent::NewMessageBadge { count: 0 });
    }

    pub async fn new_message_count(&self) -> u32 {
        self.inner.lock().await.scroll.new_message_count()
    }

    pub async fn participants(&self) -> Vec<Participant> {
        self.inner.lock().await.roster.participants().to_vec()
    }

    pub async fn is_muted(&self, participant_id: &ParticipantId) -> bool {
        self.inner.lock().await.roster.is_muted(participant_id)
    }

    /// The ordered log as the UI should draw it. Muted senders' rows carry
    /// [`MUTED_PLACEHOLDER`] while the store keeps their original text.
    pub async fn render_log(&self) -> Vec<RenderedMessage> {
        let inner = self.inner.lock().await;
        inner
            .store
            .messages()
            .iter()
            .map(|message| {
                let muted = message
                    .sender()
                    .map(|sender| inner.roster.is_muted(&sender.id))
                    .unwrap_or(false);
                RenderedMessage {
                    sender: message.sender().cloned(),
                    text: if muted {
                        MUTED_PLACEHOLDER.to_string()
                    } else {
                        message.text().to_string()
                    },
                    timestamp: message.timestamp().to_string(),
                    pending: message.is_pending(),
                }
            })
            .collect()
    }

    /// Optimistic send: the echo lands in the log before the network call
    /// is issued. On success the input is considered cleared, the view is
    /// forced to the bottom and a delayed silent fetch reconciles the echo.
    /// On failure the echo stays put and the caller keeps the text.
    pub async fn send(self: &Arc<Self>, text: &str) -> Result<(), SendError> {
        let trimmed = {
            let mut inner = self.inner.lock().await;
            if !inner.is_active() {
                return Err(SendError::SessionClosed);
            }
            let (echo, trimmed) = inner.outgoing.begin(text, self.clock.as_ref())?;
            if inner.store.append_local(echo) {
                let _ = self.events.send(ChatEvent::LogUpdated);
            }
            trimmed
        };

        let result = self.api.send_message(&self.config.game_id, &trimmed).await;

        let mut inner = self.inner.lock().await;
        inner.outgoing.finish();
        if inner.phase == SessionPhase::Terminated {
            return result.map_err(SendError::Api);
        }
        match result {
            Ok(()) => {
                inner.scroll.reset();
                let _ = self.events.send(ChatEvent::ScrollToEnd);
                let _ = self.events.send(ChatEvent::NewMessageBadge { count: 0 });
                drop(inner);

                let session = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(session.config.reconcile_delay).await;
                    session
                        .scheduler
                        .run_now(session.as_ref(), FetchKind::Silent)
                        .await;
                });
                Ok(())
            }
            Err(err) => Err(SendError::Api(err)),
        }
    }

    /// Flips the target's mute state on the server, refetches the roster and
    /// drops a local system notice into the log. No optimistic flip: on
    /// failure the roster stays consistent with server truth.
    pub async fn toggle_mute(&self, participant_id: &ParticipantId) -> Result<(), MuteError> {
        let (name, mute) = {
            let inner = self.inner.lock().await;
            if !inner.is_active() {
                return Err(MuteError::SessionClosed);
            }
            let participant = inner
                .roster
                .get(participant_id)
                .ok_or(MuteError::UnknownParticipant)?;
            (participant.name.clone(), !participant.is_muted)
        };

        self.api
            .set_muted(&self.config.game_id, participant_id, mute)
            .await?;

        self.refresh_participants().await;

        let mut inner = self.inner.lock().await;
        if inner.phase == SessionPhase::Terminated {
            return Ok(());
        }
        let text = if mute {
            format!("{name} was muted by the host")
        } else {
            format!("{name} was unmuted by the host")
        };
        let note = Message::System {
            id: None,
            text,
            timestamp: self.clock.timestamp(),
            origin: MessageOrigin::LocalPending,
        };
        if inner.store.append_local(note) {
            let _ = self.events.send(ChatEvent::LogUpdated);
        }
        Ok(())
    }

    /// Teardown: stops the poll loop and fires a bounded, detached leave
    /// notification. Navigation away never waits on the server.
    pub async fn leave(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.phase == SessionPhase::Terminated {
                return;
            }
            inner.phase = SessionPhase::Terminated;
        }
        self.scheduler.stop().await;
        info!(game_id = %self.config.game_id, "left game chat");

        let api = Arc::clone(&self.api);
        let game_id = self.config.game_id.clone();
        let local_id = self.config.local_sender.id.clone();
        let timeout = self.config.leave_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, api.leave(&game_id, &local_id)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "leave notification failed"),
                Err(_) => warn!("leave notification timed out"),
            }
        });
    }

    async fn refresh_participants(&self) {
        let fetched = self.api.fetch_participants(&self.config.game_id).await;
        let mut inner = self.inner.lock().await;
        if inner.phase == SessionPhase::Terminated {
            return;
        }
        match fetched {
            Ok(list) => {
                inner
                    .roster
                    .replace(list.into_iter().map(Participant::from).collect());
                let _ = self.events.send(ChatEvent::ParticipantsUpdated);
            }
            Err(err) => warn!(error = %err, "participant fetch failed"),
        }
    }

    async fn fetch_and_merge(&self, kind: FetchKind) {
        let fetched = self.api.fetch_messages(&self.config.game_id).await;
        let mut inner = self.inner.lock().await;
        if inner.phase == SessionPhase::Terminated {
            // The fetch was not cancellable; its completion must not write
            // into a dead session.
            return;
        }
        match fetched {
            Ok(batch) => {
                let outcome = inner
                    .store
                    .merge(batch.into_iter().map(Message::from_wire).collect());
                if outcome.changed {
                    let _ = self.events.send(ChatEvent::LogUpdated);
                }
                if kind == FetchKind::Silent {
                    match inner.scroll.on_merge(outcome.added) {
                        Some(ScrollDecision::ScrollToEnd) => {
                            let _ = self.events.send(ChatEvent::ScrollToEnd);
                        }
                        Some(ScrollDecision::Badge(count)) => {
                            let _ = self.events.send(ChatEvent::NewMessageBadge { count });
                        }
                        None => {}
                    }
                }
            }
            Err(err) => warn!(error = %err, ?kind, "message fetch failed"),
        }
        if kind == FetchKind::Manual {
            inner.scroll.reset();
            let _ = self.events.send(ChatEvent::ScrollToEnd);
            let _ = self.events.send(ChatEvent::NewMessageBadge { count: 0 });
        }
    }
}

#[async_trait]
impl PollTarget for ChatSession {
    async fn poll(&self, kind: FetchKind) {
        self.fetch_and_merge(kind).await;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
