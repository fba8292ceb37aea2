//! Engine event bridge
//!
//! Feeds audio engine notifications into the owning session, one event at a
//! time in emission order.

use crate::state::SharedState;
use jamroom_common::events::EngineEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct EngineEventBridge {
    state: Arc<SharedState>,
}

impl EngineEventBridge {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    /// Consume events until the engine drops its sender
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        info!("Engine event bridge started");
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!("Engine event channel closed, bridge stopping");
    }

    pub async fn handle(&self, event: EngineEvent) {
        let player = event.player();
        let Some(guild_id) = self.state.engine.resolve_guild(player) else {
            warn!("Dropping {} for unknown {}", event.name(), player);
            return;
        };
        debug!("Guild {}: {} from {}", guild_id, event.name(), player);

        let handle = match &event {
            EngineEvent::TrackStart { .. } => Some(self.state.registry.get_or_create(guild_id).await),
            EngineEvent::TrackEnd { .. } | EngineEvent::QueueDrained { .. } => {
                self.state.registry.get(guild_id).await
            }
        };
        let Some(handle) = handle else {
            debug!("Guild {}: no session for {}, dropped", guild_id, event.name());
            return;
        };

        let engine = self.state.engine.as_ref();
        let mut session = handle.lock().await;

        // The session may have released the player while we waited for the lock
        if engine.resolve_guild(player) != Some(guild_id) {
            debug!("Guild {}: {} released before {}, dropped", guild_id, player, event.name());
            self.state.conclude(&handle, session, Ok(None)).await;
            return;
        }

        let result = match &event {
            EngineEvent::TrackStart { player, track } => Ok(session.on_track_start(*player, track)),
            EngineEvent::TrackEnd { track, reason, .. } => {
                session.on_track_end(engine, track, *reason).await
            }
            EngineEvent::QueueDrained { .. } => session.on_queue_drained(engine).await,
        };

        if let Some(outcome) = self.state.conclude(&handle, session, result).await {
            self.state.broadcast(outcome);
        }
    }
}
