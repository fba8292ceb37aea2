//! Action dispatcher
//!
//! Routes each user action to its guild's session under that session's
//! lock. Actions for one guild run one at a time in arrival order; other
//! guilds proceed concurrently.

use super::action::{Action, ActionKind};
use crate::error::{Error, Result};
use crate::playback::session::PlaybackSession;
use crate::state::SharedState;
use jamroom_common::events::OutcomeNotification;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ActionDispatcher {
    state: Arc<SharedState>,
}

impl ActionDispatcher {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    /// Apply an action and return its outcome
    ///
    /// Never fails: errors become error outcomes. The outcome is also
    /// broadcast to renderers.
    pub async fn dispatch(&self, action: Action) -> OutcomeNotification {
        let outcome = self.apply(&action).await;
        info!(
            "Action {} ({}) for guild {} by {}: {:?}",
            action.id,
            action.kind.name(),
            action.guild_id,
            action.user_id,
            outcome.kind
        );
        self.state.broadcast(outcome.clone());
        outcome
    }

    async fn apply(&self, action: &Action) -> OutcomeNotification {
        let guild_id = action.guild_id;
        let handle = if action.kind.requires_session() {
            match self.state.registry.get(guild_id).await {
                Some(handle) => handle,
                None => return Error::NoActiveSession.into_outcome(guild_id),
            }
        } else {
            self.state.registry.get_or_create(guild_id).await
        };

        debug!("Action {} waiting for guild {}", action.id, guild_id);
        let mut session = handle.lock().await;
        if session.is_stopping() {
            return Error::SessionEnding.into_outcome(guild_id);
        }

        let result = self.run(&mut session, action).await.map(Some);
        self.state
            .conclude(&handle, session, result)
            .await
            .unwrap_or_else(|| OutcomeNotification::no_op(guild_id, "Nothing to do."))
    }

    async fn run(
        &self,
        session: &mut PlaybackSession,
        action: &Action,
    ) -> Result<OutcomeNotification> {
        let engine = self.state.engine.as_ref();
        match &action.kind {
            ActionKind::Play { query } => session.play(engine, query, action.user_id).await,
            ActionKind::Pause => session.pause(engine, true).await,
            ActionKind::Resume => session.pause(engine, false).await,
            ActionKind::Skip => session.skip(engine).await,
            ActionKind::Previous => session.previous(engine).await,
            ActionKind::ToggleAutoplay => session.toggle_autoplay(engine, action.user_id).await,
            ActionKind::ToggleLoop => Ok(session.toggle_loop()),
            ActionKind::SetLoop { mode } => session.set_loop(*mode),
            ActionKind::Shuffle => session.shuffle(),
            ActionKind::ShowQueue => Ok(session.show_queue()),
            ActionKind::NowPlaying => session.now_playing(),
            ActionKind::Stop => Ok(session.stop()),
            ActionKind::Unknown { id } => Err(Error::UnknownAction(id.clone())),
        }
    }
}
