//! Audio engine capability set
//!
//! The controller never talks to the voice transport or search providers
//! directly. It consumes this trait, and receives the engine's notifications
//! as [`EngineEvent`](jamroom_common::events::EngineEvent) values on a
//! channel handed out by the engine implementation.

use async_trait::async_trait;
use jamroom_common::{GuildId, PlayerId, SearchOptions, Track};
use thiserror::Error;

pub mod loopback;

pub use loopback::{EngineCall, LoopbackEngine};

/// Failure reported by an engine implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Node unreachable, request rejected, or transport failure
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Engine holds no player for the guild
    #[error("no player for guild {0}")]
    NoPlayer(GuildId),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Capabilities the controller consumes from the audio layer
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Start `track` on the guild's player, creating the player if needed.
    ///
    /// Returns the player handle; the engine confirms later with a
    /// `TrackStart` event carrying the same handle.
    async fn request_play(&self, guild_id: GuildId, track: &Track) -> EngineResult<PlayerId>;

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> EngineResult<()>;

    /// Request release of the guild's player. Idempotent.
    async fn teardown(&self, guild_id: GuildId) -> EngineResult<()>;

    /// Resolve a query (plain text or URL) into playable candidates
    async fn search(&self, query: &str, options: &SearchOptions) -> EngineResult<Vec<Track>>;

    /// Map a player handle back to its guild
    fn resolve_guild(&self, player: PlayerId) -> Option<GuildId>;
}
