//! Session transport and control state

use jamroom_common::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No current track, no engine player held
    Idle,
    Playing,
    Paused,
    /// Teardown in flight; the registry removes the session next
    Stopping,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Playing => write!(f, "playing"),
            SessionPhase::Paused => write!(f, "paused"),
            SessionPhase::Stopping => write!(f, "stopping"),
        }
    }
}

/// Repeat behaviour when a track finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    None,
    /// Replay the same track; checked before autoplay
    Track,
    /// Re-append finished tracks to the end of the queue
    Queue,
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMode::None => write!(f, "none"),
            LoopMode::Track => write!(f, "track"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" | "disable" => Ok(LoopMode::None),
            "track" | "song" | "current" => Ok(LoopMode::Track),
            "queue" | "all" => Ok(LoopMode::Queue),
            other => Err(format!("unknown loop mode `{}`", other)),
        }
    }
}

/// Autoplay configuration
///
/// An enabled autoplay always carries its seed track and requester.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Autoplay {
    #[default]
    Disabled,
    Enabled {
        /// Identifier the related-tracks query is derived from
        seed_track_id: String,
        /// User who switched autoplay on; continuation tracks are requested as them
        requester: UserId,
    },
}

impl Autoplay {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Autoplay::Enabled { .. })
    }

    pub fn seed_track_id(&self) -> Option<&str> {
        match self {
            Autoplay::Enabled { seed_track_id, .. } => Some(seed_track_id),
            Autoplay::Disabled => None,
        }
    }

    pub fn requester(&self) -> Option<UserId> {
        match self {
            Autoplay::Enabled { requester, .. } => Some(*requester),
            Autoplay::Disabled => None,
        }
    }
}

/// Transport/control flags for one guild
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub loop_mode: LoopMode,
    pub autoplay: Autoplay,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            loop_mode: LoopMode::None,
            autoplay: Autoplay::Disabled,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.phase == SessionPhase::Paused
    }

    /// Playing or paused
    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Playing | SessionPhase::Paused)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
