//! Loopback engine with per-call latency
//!
//! Each call sleeps before reaching the loopback engine, so an operation
//! holding a session lock stays suspended long enough for other tasks and
//! engine events to queue up behind it.

use async_trait::async_trait;
use jamroom_bot::engine::{AudioEngine, EngineResult, LoopbackEngine};
use jamroom_common::{GuildId, PlayerId, SearchOptions, Track};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct Delays {
    pub play: Duration,
    pub pause: Duration,
    pub teardown: Duration,
    pub search: Duration,
}

pub struct SlowEngine {
    inner: Arc<LoopbackEngine>,
    delays: Delays,
}

impl SlowEngine {
    pub fn new(inner: Arc<LoopbackEngine>, delays: Delays) -> Self {
        Self { inner, delays }
    }
}

#[async_trait]
impl AudioEngine for SlowEngine {
    async fn request_play(&self, guild_id: GuildId, track: &Track) -> EngineResult<PlayerId> {
        tokio::time::sleep(self.delays.play).await;
        self.inner.request_play(guild_id, track).await
    }

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> EngineResult<()> {
        tokio::time::sleep(self.delays.pause).await;
        self.inner.set_paused(guild_id, paused).await
    }

    async fn teardown(&self, guild_id: GuildId) -> EngineResult<()> {
        tokio::time::sleep(self.delays.teardown).await;
        self.inner.teardown(guild_id).await
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> EngineResult<Vec<Track>> {
        tokio::time::sleep(self.delays.search).await;
        self.inner.search(query, options).await
    }

    fn resolve_guild(&self, player: PlayerId) -> Option<GuildId> {
        self.inner.resolve_guild(player)
    }
}
