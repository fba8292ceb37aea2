//! Shared controller state
//!
//! Injected into the dispatcher and the engine bridge. Holds the session
//! registry, the engine handle, resolved settings and the outcome broadcast,
//! and applies the post-operation policy both of them share: failure
//! teardown, alert delivery, session removal and idle eviction.

use crate::engine::AudioEngine;
use crate::error::Result;
use crate::playback::registry::{SessionHandle, SessionRegistry};
use crate::playback::session::{PlaybackSession, SessionConfig};
use crate::playback::state::SessionPhase;
use jamroom_common::config::BotSettings;
use jamroom_common::events::{EventBus, OutcomeNotification};
use jamroom_common::GuildId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, MutexGuard};
use tracing::{debug, error, info};

/// Outcome broadcast buffer size
const EVENT_CAPACITY: usize = 256;

pub struct SharedState {
    pub registry: SessionRegistry,
    pub engine: Arc<dyn AudioEngine>,
    pub settings: BotSettings,
    events: EventBus,

    /// Sessions torn down because the engine failed or timed out
    engine_failures_total: AtomicU64,
}

impl SharedState {
    pub fn new(engine: Arc<dyn AudioEngine>, settings: BotSettings) -> Self {
        let registry = SessionRegistry::new(engine.clone(), SessionConfig::from(&settings));
        Self {
            registry,
            engine,
            settings,
            events: EventBus::new(EVENT_CAPACITY),
            engine_failures_total: AtomicU64::new(0),
        }
    }

    /// Send an outcome to every renderer
    pub fn broadcast(&self, outcome: OutcomeNotification) {
        self.events.emit_lossy(outcome);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutcomeNotification> {
        self.events.subscribe()
    }

    pub fn engine_failures(&self) -> u64 {
        self.engine_failures_total.load(Ordering::Relaxed)
    }

    /// Finish an operation on a locked session
    ///
    /// Converts an error into an outcome (tearing the session down if the
    /// engine can no longer be trusted), broadcasts queued alerts, releases
    /// the lock, then removes a stopping session or schedules eviction of an
    /// idle one.
    pub async fn conclude(
        self: &Arc<Self>,
        handle: &SessionHandle,
        mut session: MutexGuard<'_, PlaybackSession>,
        result: Result<Option<OutcomeNotification>>,
    ) -> Option<OutcomeNotification> {
        let guild_id = session.guild_id();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.requires_teardown() {
                    self.engine_failures_total.fetch_add(1, Ordering::Relaxed);
                    error!("Guild {}: {}; tearing session down", guild_id, e);
                    session.mark_stopping();
                } else {
                    debug!("Guild {}: {}", guild_id, e);
                }
                Some(e.into_outcome(guild_id))
            }
        };

        for alert in session.take_alerts() {
            self.broadcast(alert);
        }

        let phase = session.phase();
        drop(session);

        match phase {
            SessionPhase::Stopping => {
                self.registry.remove_handle(guild_id, handle).await;
            }
            SessionPhase::Idle => self.schedule_eviction(guild_id),
            SessionPhase::Playing | SessionPhase::Paused => {}
        }
        outcome
    }

    /// Re-check the session after the idle grace period
    fn schedule_eviction(self: &Arc<Self>, guild_id: GuildId) {
        let state = Arc::clone(self);
        let grace = self.settings.idle_grace;
        debug!("Guild {}: eviction check in {:?}", guild_id, grace);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            state.evict_if_idle(guild_id).await;
        });
    }

    /// Remove the guild's session if it is still idle and empty
    pub async fn evict_if_idle(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.registry.get(guild_id).await else {
            return false;
        };
        {
            let mut session = handle.lock().await;
            if !session.is_evictable() {
                return false;
            }
            session.mark_stopping();
        }
        info!("Guild {}: evicting idle session", guild_id);
        self.registry.remove_handle(guild_id, &handle).await
    }
}
