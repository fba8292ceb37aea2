//! Core data model shared between the controller and its collaborators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat-platform guild (server) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub u64);

/// Chat-platform user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Engine-side player handle
///
/// Issued by the audio engine when playback starts for a guild. The engine
/// maps it back to a guild when it reports events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// A resolved, playable track
///
/// Immutable once enqueued; the queue moves tracks between its slots but
/// never edits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Provider-specific identifier (e.g. a YouTube video id)
    pub identifier: String,

    pub title: String,

    pub uri: String,

    pub thumbnail: Option<String>,

    /// Track length in milliseconds (0 for streams)
    pub duration_ms: u64,

    /// Provider the track was resolved from (`youtube`, `soundcloud`, ...)
    pub source: String,

    /// User who caused the track to be queued
    pub requester: UserId,
}

impl Track {
    /// Create a YouTube-sourced track with no thumbnail and unknown length
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, requester: UserId) -> Self {
        let identifier = identifier.into();
        Self {
            uri: format!("https://www.youtube.com/watch?v={}", identifier),
            identifier,
            title: title.into(),
            thumbnail: None,
            duration_ms: 0,
            source: "youtube".to_string(),
            requester,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>, uri: impl Into<String>) -> Self {
        self.source = source.into();
        self.uri = uri.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Same track as `other` (identity is the provider identifier)
    pub fn same_as(&self, other: &Track) -> bool {
        self.identifier == other.identifier
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.identifier)
    }
}

/// Options passed to the engine's search capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Attached to every returned track as its requester
    pub requester: UserId,

    /// Search source for plain-text queries; URLs ignore it
    pub source: Option<String>,
}

impl SearchOptions {
    pub fn new(requester: UserId) -> Self {
        Self {
            requester,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
