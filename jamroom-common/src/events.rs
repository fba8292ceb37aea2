//! Event types for the jamroom event system
//!
//! Two directions of traffic cross the controller boundary:
//! - [`EngineEvent`]: notifications the audio engine sends into the controller
//! - [`OutcomeNotification`]: structured results the controller sends out to
//!   the rendering collaborator, distributed through the [`EventBus`]

use crate::model::{GuildId, PlayerId, Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why the engine stopped a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackEndReason {
    /// Track played to its end
    Finished,
    /// Track could not be loaded or broke mid-stream
    LoadFailed,
    /// Track was stopped by an explicit stop request
    Stopped,
    /// Another track was started on the same player
    Replaced,
    /// Player was destroyed
    Cleanup,
}

impl TrackEndReason {
    /// Whether the controller should advance the queue for this reason
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Notification emitted by the audio engine
///
/// Events carry the engine's player handle, not a guild id; the controller
/// resolves the owning guild through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Engine began emitting audio for a track
    TrackStart { player: PlayerId, track: Track },

    /// Engine stopped a track
    TrackEnd {
        player: PlayerId,
        track: Track,
        reason: TrackEndReason,
    },

    /// Engine has nothing left to play on this player
    QueueDrained { player: PlayerId },
}

impl EngineEvent {
    pub fn player(&self) -> PlayerId {
        match self {
            EngineEvent::TrackStart { player, .. }
            | EngineEvent::TrackEnd { player, .. }
            | EngineEvent::QueueDrained { player } => *player,
        }
    }

    /// Short event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::TrackStart { .. } => "track_start",
            EngineEvent::TrackEnd { .. } => "track_end",
            EngineEvent::QueueDrained { .. } => "queue_drained",
        }
    }
}

/// Result class of an action or engine-driven transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    /// Requested state already held; nothing changed
    NoOp,
    Error,
}

/// Failure taxonomy tag attached to error outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoActiveSession,
    NoOpRequested,
    EmptyHistory,
    EmptyQueue,
    ContinuationFailed,
    UnsupportedSource,
    EngineUnavailable,
    SessionEnding,
    UnknownAction,
    NoResults,
    MissingArgument,
    Config,
}

/// Structured outcome consumed by the rendering collaborator
///
/// The controller never builds presentation payloads; it hands over the
/// message and whatever data a renderer needs (current track, queue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeNotification {
    pub guild_id: GuildId,
    pub kind: OutcomeKind,
    /// Set for `Error` and `NoOp` outcomes that came from a failure tag
    pub error: Option<ErrorKind>,
    /// Human-readable summary
    pub message: String,
    /// Track the outcome is about (usually the now-current track)
    pub track: Option<Track>,
    /// Pending queue snapshot, in play order
    pub queue: Option<Vec<Track>>,
    pub timestamp: DateTime<Utc>,
}

impl OutcomeNotification {
    fn build(guild_id: GuildId, kind: OutcomeKind, message: impl Into<String>) -> Self {
        Self {
            guild_id,
            kind,
            error: None,
            message: message.into(),
            track: None,
            queue: None,
            timestamp: Utc::now(),
        }
    }

    pub fn success(guild_id: GuildId, message: impl Into<String>) -> Self {
        Self::build(guild_id, OutcomeKind::Success, message)
    }

    pub fn no_op(guild_id: GuildId, message: impl Into<String>) -> Self {
        Self::build(guild_id, OutcomeKind::NoOp, message)
    }

    /// Failure outcome; `NoOpRequested` is reported as a no-op, not an error
    pub fn failure(guild_id: GuildId, error: ErrorKind, message: impl Into<String>) -> Self {
        let kind = match error {
            ErrorKind::NoOpRequested => OutcomeKind::NoOp,
            _ => OutcomeKind::Error,
        };
        let mut outcome = Self::build(guild_id, kind, message);
        outcome.error = Some(error);
        outcome
    }

    pub fn with_track(mut self, track: Option<Track>) -> Self {
        self.track = track;
        self
    }

    pub fn with_queue(mut self, queue: Vec<Track>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

/// Outcome distribution bus for the rendering side
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the controller)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OutcomeNotification>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future notifications
    pub fn subscribe(&self) -> broadcast::Receiver<OutcomeNotification> {
        self.tx.subscribe()
    }

    /// Emit a notification, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, notification: OutcomeNotification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("No outcome subscribers; notification dropped");
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
