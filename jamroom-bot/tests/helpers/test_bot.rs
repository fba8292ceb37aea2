//! In-process bot harness
//!
//! Wires a [`SharedState`] to a [`LoopbackEngine`] and exposes the engine's
//! event channel so tests decide exactly when engine notifications are
//! delivered.

use super::slow_engine::{Delays, SlowEngine};
use jamroom_bot::dispatch::{Action, ActionDispatcher, ActionKind, ActionOrigin};
use jamroom_bot::engine::{AudioEngine, LoopbackEngine};
use jamroom_bot::playback::{PlaybackSession, SessionHandle};
use jamroom_bot::{EngineEventBridge, SharedState};
use jamroom_common::config::BotSettings;
use jamroom_common::events::{EngineEvent, OutcomeNotification};
use jamroom_common::{GuildId, Track, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, MutexGuard};

pub const GUILD: GuildId = GuildId(100);
pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);

pub struct TestBot {
    pub engine: Arc<LoopbackEngine>,
    pub state: Arc<SharedState>,
    pub dispatcher: ActionDispatcher,
    bridge: EngineEventBridge,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    pub outcomes: broadcast::Receiver<OutcomeNotification>,
}

impl TestBot {
    /// Bot with a catalogue-only engine and no idle eviction during the test
    pub fn new() -> Self {
        Self::with_settings(BotSettings {
            idle_grace: Duration::from_secs(3600),
            ..BotSettings::default()
        })
    }

    pub fn with_settings(settings: BotSettings) -> Self {
        Self::build(settings, None)
    }

    /// Bot whose engine calls each take the given time
    ///
    /// `engine` still exposes the loopback engine underneath for inspection.
    pub fn with_delays(settings: BotSettings, delays: Delays) -> Self {
        Self::build(settings, Some(delays))
    }

    fn build(settings: BotSettings, delays: Option<Delays>) -> Self {
        let (engine, events) = LoopbackEngine::new();
        let engine = Arc::new(engine);
        let driver: Arc<dyn AudioEngine> = match delays {
            Some(delays) => Arc::new(SlowEngine::new(engine.clone(), delays)),
            None => engine.clone(),
        };
        let state = Arc::new(SharedState::new(driver, settings));
        let outcomes = state.subscribe();
        Self {
            dispatcher: ActionDispatcher::new(state.clone()),
            bridge: EngineEventBridge::new(state.clone()),
            engine,
            state,
            events,
            outcomes,
        }
    }

    /// Register a single-result search for `query`
    pub fn catalogue(&self, query: &str, track: &Track) {
        self.engine.add_results(query, vec![track.clone()]);
    }

    /// Register the related-tracks search for `seed`
    pub fn related(&self, seed: &str, tracks: Vec<Track>) {
        let query = format!("https://www.youtube.com/watch?v={}&list=RD{}", seed, seed);
        self.engine.add_results(query, tracks);
    }

    /// Dispatch, then deliver every engine event the action caused
    pub async fn act(&mut self, user: UserId, kind: ActionKind) -> OutcomeNotification {
        let action = Action::new(GUILD, user, kind, ActionOrigin::Command);
        let outcome = self.dispatcher.dispatch(action).await;
        self.pump().await;
        outcome
    }

    pub async fn play(&mut self, query: &str) -> OutcomeNotification {
        self.act(
            ALICE,
            ActionKind::Play {
                query: query.to_string(),
            },
        )
        .await
    }

    /// Take the next engine event without delivering it
    pub fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.try_recv().ok()
    }

    /// Deliver one engine event held back with [`TestBot::next_event`]
    pub async fn deliver(&self, event: EngineEvent) {
        self.bridge.handle(event).await;
    }

    /// Deliver queued engine events in order, including any they cause
    pub async fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.bridge.handle(event).await;
        }
    }

    /// Let the engine finish the current track
    pub async fn finish(&mut self) {
        assert!(self.engine.finish(GUILD), "nothing playing to finish");
        self.pump().await;
    }

    pub async fn handle(&self) -> Option<SessionHandle> {
        self.state.registry.get(GUILD).await
    }

    /// Lock the test guild's session; panics if it has none
    pub async fn with_session<R>(&self, inspect: impl FnOnce(&MutexGuard<'_, PlaybackSession>) -> R) -> R {
        let handle = self.handle().await.expect("session exists");
        let session = handle.lock().await;
        inspect(&session)
    }

    pub async fn current_id(&self) -> Option<String> {
        self.with_session(|s| s.queue().current().map(|t| t.identifier.clone()))
            .await
    }

    pub async fn pending_ids(&self) -> Vec<String> {
        self.with_session(|s| {
            s.queue()
                .snapshot()
                .into_iter()
                .map(|t| t.identifier)
                .collect()
        })
        .await
    }

    /// Outcomes broadcast since the last call
    pub fn drain_outcomes(&mut self) -> Vec<OutcomeNotification> {
        let mut seen = Vec::new();
        while let Ok(outcome) = self.outcomes.try_recv() {
            seen.push(outcome);
        }
        seen
    }
}

pub fn track(id: &str) -> Track {
    Track::new(id, format!("Track {}", id), ALICE)
}
