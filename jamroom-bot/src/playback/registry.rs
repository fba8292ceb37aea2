//! Session registry
//!
//! Process-wide guild -> session map. The map lock is only held for the
//! lookup or insert itself, never across a session lock or an engine call.

use crate::engine::AudioEngine;
use crate::playback::session::{PlaybackSession, SessionConfig};
use jamroom_common::GuildId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Shared handle to one guild's session
///
/// The tokio mutex is fair: waiters are served in arrival order, so a
/// session processes one action at a time and later actions queue behind it.
pub type SessionHandle = Arc<Mutex<PlaybackSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<GuildId, SessionHandle>>,
    engine: Arc<dyn AudioEngine>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(engine: Arc<dyn AudioEngine>, config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engine,
            config,
        }
    }

    pub async fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&guild_id).cloned()
    }

    /// Existing session for the guild, or a fresh idle one
    pub async fn get_or_create(&self, guild_id: GuildId) -> SessionHandle {
        if let Some(handle) = self.get(guild_id).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!("Creating session for guild {}", guild_id);
                Arc::new(Mutex::new(PlaybackSession::new(guild_id, self.config.clone())))
            })
            .clone()
    }

    /// Remove the guild's session and release its engine player
    ///
    /// Callers must not hold the session lock.
    pub async fn remove(&self, guild_id: GuildId) -> bool {
        let removed = self.sessions.write().await.remove(&guild_id);
        match removed {
            Some(handle) => {
                self.retire(guild_id, &handle).await;
                true
            }
            None => {
                debug!("No session to remove for guild {}", guild_id);
                false
            }
        }
    }

    /// Like [`remove`](Self::remove), but only if `handle` is still the
    /// guild's registered session
    ///
    /// A session that was already replaced by a newer one is left alone.
    pub async fn remove_handle(&self, guild_id: GuildId, handle: &SessionHandle) -> bool {
        {
            let mut sessions = self.sessions.write().await;
            match sessions.get(&guild_id) {
                Some(registered) if Arc::ptr_eq(registered, handle) => {
                    sessions.remove(&guild_id);
                }
                _ => return false,
            }
        }
        self.retire(guild_id, handle).await;
        true
    }

    async fn retire(&self, guild_id: GuildId, handle: &SessionHandle) {
        let mut session = handle.lock().await;
        session.mark_stopping();
        session.release(self.engine.as_ref()).await;
        info!("Removed session for guild {}", guild_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn guilds(&self) -> Vec<GuildId> {
        let mut guilds: Vec<GuildId> = self.sessions.read().await.keys().copied().collect();
        guilds.sort();
        guilds
    }
}
