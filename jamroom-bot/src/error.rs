//! Error types for jamroom-bot
//!
//! Every variant maps to an [`ErrorKind`] tag and a user-facing message. The
//! dispatcher and the engine bridge convert errors into outcome
//! notifications; nothing here is surfaced to callers as a fault.

use jamroom_common::events::{ErrorKind, OutcomeNotification};
use jamroom_common::GuildId;
use thiserror::Error;

/// Main error type for jamroom-bot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Action needs a session (or a current track) that doesn't exist
    #[error("No music is currently playing!")]
    NoActiveSession,

    /// State already matches the requested transition
    #[error("{0}")]
    NoOpRequested(String),

    #[error("No previous track found!")]
    EmptyHistory,

    #[error("There are no tracks in the queue!")]
    EmptyQueue,

    /// Autoplay search came back empty after the retry; autoplay is now off
    #[error("Autoplay could not find a related track and has been disabled.")]
    ContinuationFailed,

    /// No related-tracks query exists for the track's provider
    #[error("Autoplay is not supported for this track source!")]
    UnsupportedSource,

    /// Audio engine call failed or timed out
    #[error("The audio engine is unavailable: {0}")]
    EngineUnavailable(String),

    /// Session is being torn down
    #[error("This player is shutting down, try again in a moment.")]
    SessionEnding,

    /// Unrecognized button id
    #[error("Unknown action!")]
    UnknownAction(String),

    #[error("No results found for `{0}`!")]
    NoResults(String),

    /// Command was given without its required argument
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Taxonomy tag for outcome notifications
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoActiveSession => ErrorKind::NoActiveSession,
            Error::NoOpRequested(_) => ErrorKind::NoOpRequested,
            Error::EmptyHistory => ErrorKind::EmptyHistory,
            Error::EmptyQueue => ErrorKind::EmptyQueue,
            Error::ContinuationFailed => ErrorKind::ContinuationFailed,
            Error::UnsupportedSource => ErrorKind::UnsupportedSource,
            Error::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Error::SessionEnding => ErrorKind::SessionEnding,
            Error::UnknownAction(_) => ErrorKind::UnknownAction,
            Error::NoResults(_) => ErrorKind::NoResults,
            Error::MissingArgument(_) => ErrorKind::MissingArgument,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Transport state can no longer be trusted after this error
    pub fn requires_teardown(&self) -> bool {
        matches!(self, Error::EngineUnavailable(_))
    }

    pub fn into_outcome(self, guild_id: GuildId) -> OutcomeNotification {
        OutcomeNotification::failure(guild_id, self.kind(), self.to_string())
    }
}

impl From<jamroom_common::Error> for Error {
    fn from(err: jamroom_common::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type using jamroom-bot Error
pub type Result<T> = std::result::Result<T, Error>;
