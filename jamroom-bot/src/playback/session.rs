//! Playback session state machine
//!
//! One session per guild. Owns the queue and the transport flags, and holds
//! a borrowed handle to the engine's player. All mutation of a guild's
//! playback goes through the methods here; callers serialize access with the
//! per-session lock held by the registry.
//!
//! Engine calls are made before the in-memory change they justify, so a
//! failed or timed-out call leaves the queue as it was.

use crate::engine::{AudioEngine, EngineResult};
use crate::error::{Error, Result};
use crate::playback::autoplay::{pick_candidate, related_query, related_query_for_id};
use crate::playback::queue::TrackQueue;
use crate::playback::state::{Autoplay, LoopMode, SessionPhase, SessionState};
use jamroom_common::config::BotSettings;
use jamroom_common::events::{OutcomeNotification, TrackEndReason};
use jamroom_common::{GuildId, PlayerId, SearchOptions, Track, UserId};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-session tunables, derived from [`BotSettings`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub history_limit: usize,
    pub engine_timeout: Duration,
    pub autoplay_retries: u32,
    pub default_search_source: String,
}

impl From<&BotSettings> for SessionConfig {
    fn from(settings: &BotSettings) -> Self {
        Self {
            history_limit: settings.history_limit,
            engine_timeout: settings.engine_timeout,
            autoplay_retries: settings.autoplay_retries,
            default_search_source: settings.default_search_source.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&BotSettings::default())
    }
}

/// Where the session ended up after trying to move past the current track
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Playing(Track),
    Idle,
}

/// Run an engine call with the session's time limit
async fn bounded<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = EngineResult<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::EngineUnavailable(format!("{} failed: {}", what, e))),
        Err(_) => Err(Error::EngineUnavailable(format!(
            "{} timed out after {:?}",
            what, limit
        ))),
    }
}

/// Per-guild playback session
pub struct PlaybackSession {
    guild_id: GuildId,
    queue: TrackQueue,
    state: SessionState,

    /// Engine player handle; borrowed, released through `teardown`
    player: Option<PlayerId>,

    /// Track asked of the engine and not yet confirmed by `TrackStart`
    requested: Option<String>,

    /// Track the engine confirmed and has not ended yet
    in_flight: Option<String>,

    /// Secondary notifications raised while handling an operation
    alerts: Vec<OutcomeNotification>,

    /// Whether an unrequested `TrackStart` may become the current track;
    /// only until the session first asks the engine to play
    adoptable: bool,

    config: SessionConfig,
}

impl PlaybackSession {
    pub fn new(guild_id: GuildId, config: SessionConfig) -> Self {
        Self {
            guild_id,
            queue: TrackQueue::new(config.history_limit),
            state: SessionState::new(),
            player: None,
            requested: None,
            in_flight: None,
            alerts: Vec::new(),
            adoptable: true,
            config,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn is_stopping(&self) -> bool {
        self.state.phase == SessionPhase::Stopping
    }

    /// Idle, empty and without autoplay: safe to drop from the registry
    pub fn is_evictable(&self) -> bool {
        self.state.phase == SessionPhase::Idle
            && self.queue.current().is_none()
            && self.queue.is_empty()
            && !self.state.autoplay.is_enabled()
    }

    /// Drain notifications raised since the last call
    pub fn take_alerts(&mut self) -> Vec<OutcomeNotification> {
        std::mem::take(&mut self.alerts)
    }

    fn alert(&mut self, error: Error) {
        warn!("Guild {}: {}", self.guild_id, error);
        self.alerts.push(error.into_outcome(self.guild_id));
    }

    /// Success outcome carrying the current track and the pending queue
    fn success(&self, message: impl Into<String>) -> OutcomeNotification {
        OutcomeNotification::success(self.guild_id, message)
            .with_track(self.queue.current().cloned())
            .with_queue(self.queue.snapshot())
    }

    fn no_op(&self, message: impl Into<String>) -> OutcomeNotification {
        OutcomeNotification::no_op(self.guild_id, message)
            .with_track(self.queue.current().cloned())
            .with_queue(self.queue.snapshot())
    }

    // ========================================
    // Engine plumbing
    // ========================================

    /// Ask the engine to play `track`; does not touch the queue
    async fn start(&mut self, engine: &dyn AudioEngine, track: &Track) -> Result<()> {
        let player = bounded(
            self.config.engine_timeout,
            "play",
            engine.request_play(self.guild_id, track),
        )
        .await?;

        if self.state.phase == SessionPhase::Paused {
            bounded(
                self.config.engine_timeout,
                "resume",
                engine.set_paused(self.guild_id, false),
            )
            .await?;
        }

        self.player = Some(player);
        self.requested = Some(track.identifier.clone());
        self.in_flight = None;
        self.adoptable = false;
        self.state.phase = SessionPhase::Playing;
        debug!("Guild {}: requested {}", self.guild_id, track);
        Ok(())
    }

    async fn search(
        &self,
        engine: &dyn AudioEngine,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Track>> {
        bounded(self.config.engine_timeout, "search", engine.search(query, options)).await
    }

    /// Release the engine player, if this session still holds one
    pub async fn release(&mut self, engine: &dyn AudioEngine) {
        self.requested = None;
        self.in_flight = None;
        if self.player.take().is_some() {
            let result = bounded(
                self.config.engine_timeout,
                "teardown",
                engine.teardown(self.guild_id),
            )
            .await;
            if let Err(e) = result {
                warn!("Guild {}: teardown not confirmed: {}", self.guild_id, e);
            }
        }
    }

    /// Reject further actions; the registry removes the session next
    pub fn mark_stopping(&mut self) {
        if self.state.phase != SessionPhase::Stopping {
            info!("Guild {}: session stopping", self.guild_id);
        }
        self.state.phase = SessionPhase::Stopping;
    }

    async fn go_idle(&mut self, engine: &dyn AudioEngine) {
        self.queue.take_current();
        self.release(engine).await;
        self.state.phase = SessionPhase::Idle;
        info!("Guild {}: queue exhausted, session idle", self.guild_id);
    }

    // ========================================
    // Queue progression
    // ========================================

    /// Move past the current track
    ///
    /// Plays the next pending track if there is one, otherwise runs the
    /// empty-queue continuation. `allow_loop` is false when the previous
    /// track failed to load.
    pub async fn advance(
        &mut self,
        engine: &dyn AudioEngine,
        just_played: Option<Track>,
        allow_loop: bool,
    ) -> Result<Advance> {
        if let Some(next) = self.queue.peek_next().cloned() {
            self.start(engine, &next).await?;
            self.queue.dequeue_next();
            let exclude = just_played.map(|t| t.identifier);
            self.top_up_autoplay(engine, exclude.as_deref()).await?;
            return Ok(Advance::Playing(next));
        }
        self.continue_empty(engine, just_played, allow_loop).await
    }

    /// Empty-queue continuation: loop track, then autoplay, then idle
    async fn continue_empty(
        &mut self,
        engine: &dyn AudioEngine,
        last: Option<Track>,
        allow_loop: bool,
    ) -> Result<Advance> {
        if allow_loop && self.state.loop_mode == LoopMode::Track {
            if let Some(track) = last.clone() {
                self.start(engine, &track).await?;
                self.queue.replace_current(track.clone());
                debug!("Guild {}: looping {}", self.guild_id, track);
                return Ok(Advance::Playing(track));
            }
        }

        if self.state.autoplay.is_enabled() {
            match self.autoplay_continue(engine, last.as_ref()).await {
                Ok(track) => {
                    let exclude = last.map(|t| t.identifier);
                    self.top_up_autoplay(engine, exclude.as_deref()).await?;
                    return Ok(Advance::Playing(track));
                }
                Err(e @ (Error::ContinuationFailed | Error::UnsupportedSource)) => {
                    self.state.autoplay = Autoplay::Disabled;
                    self.alert(e);
                }
                Err(e) => return Err(e),
            }
        }

        self.go_idle(engine).await;
        Ok(Advance::Idle)
    }

    /// Queries for an autoplay search: the just-played track first, then
    /// the original seed for each allowed retry
    fn autoplay_queries(&self, last: Option<&Track>) -> Vec<String> {
        let mut queries: Vec<String> = last.and_then(related_query).into_iter().collect();
        if let Some(seed_query) = self.state.autoplay.seed_track_id().and_then(related_query_for_id) {
            let retries = self.config.autoplay_retries as usize;
            if queries.is_empty() {
                queries.push(seed_query.clone());
            }
            queries.extend(std::iter::repeat(seed_query).take(retries));
        }
        queries
    }

    /// Find, start and enqueue an autoplay track after `last`
    async fn autoplay_continue(
        &mut self,
        engine: &dyn AudioEngine,
        last: Option<&Track>,
    ) -> Result<Track> {
        let queries = self.autoplay_queries(last);
        if queries.is_empty() {
            return Err(Error::UnsupportedSource);
        }

        let Some(requester) = self.state.autoplay.requester() else {
            return Err(Error::ContinuationFailed);
        };
        let options = SearchOptions::new(requester);
        let exclude: Vec<&str> = last.map(|t| t.identifier.as_str()).into_iter().collect();

        for query in &queries {
            let candidates = self.search(engine, query, &options).await?;
            if let Some(candidate) = pick_candidate(candidates, &exclude) {
                self.start(engine, &candidate).await?;
                self.queue.enqueue(candidate.clone());
                self.queue.dequeue_next();
                info!("Guild {}: autoplay continued with {}", self.guild_id, candidate);
                return Ok(candidate);
            }
            debug!("Guild {}: autoplay query {} had no candidate", self.guild_id, query);
        }
        Err(Error::ContinuationFailed)
    }

    /// Keep one autoplay candidate queued behind the current track
    ///
    /// A top-up that finds nothing switches autoplay off with an alert; the
    /// current track keeps playing.
    async fn top_up_autoplay(
        &mut self,
        engine: &dyn AudioEngine,
        also_exclude: Option<&str>,
    ) -> Result<()> {
        if !self.state.autoplay.is_enabled() || !self.queue.is_empty() {
            return Ok(());
        }
        let Some(current) = self.queue.current().cloned() else {
            return Ok(());
        };

        let queries = self.autoplay_queries(Some(&current));
        let requester = self.state.autoplay.requester().unwrap_or(current.requester);
        let options = SearchOptions::new(requester);
        let mut exclude = vec![current.identifier.as_str()];
        exclude.extend(also_exclude);

        for query in &queries {
            let candidates = self.search(engine, query, &options).await?;
            if let Some(candidate) = pick_candidate(candidates, &exclude) {
                debug!("Guild {}: autoplay queued {}", self.guild_id, candidate);
                self.queue.enqueue(candidate);
                return Ok(());
            }
        }

        self.state.autoplay = Autoplay::Disabled;
        self.alert(Error::ContinuationFailed);
        Ok(())
    }

    // ========================================
    // User actions
    // ========================================

    /// Search `query` and queue the first result, starting playback if idle
    pub async fn play(
        &mut self,
        engine: &dyn AudioEngine,
        query: &str,
        requester: UserId,
    ) -> Result<OutcomeNotification> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::MissingArgument("a song name or link"));
        }

        let options =
            SearchOptions::new(requester).with_source(self.config.default_search_source.clone());
        let track = self
            .search(engine, query, &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoResults(query.to_string()))?;

        if self.state.phase == SessionPhase::Idle {
            self.start(engine, &track).await?;
            self.queue.enqueue(track.clone());
            self.queue.dequeue_next();
            info!("Guild {}: now playing {}", self.guild_id, track);
            return Ok(self.success(format!("Now playing: {}", track.title)));
        }

        let title = track.title.clone();
        self.queue.enqueue(track);
        let position = self.queue.pending_count();
        Ok(self.success(format!("Added to queue: {} (position {})", title, position)))
    }

    /// Pause (`true`) or resume (`false`)
    pub async fn pause(
        &mut self,
        engine: &dyn AudioEngine,
        paused: bool,
    ) -> Result<OutcomeNotification> {
        if !self.state.is_active() {
            return Err(Error::NoActiveSession);
        }
        if self.state.is_paused() == paused {
            let message = if paused {
                "The player is already paused!"
            } else {
                "The player is already playing!"
            };
            return Err(Error::NoOpRequested(message.to_string()));
        }

        bounded(
            self.config.engine_timeout,
            if paused { "pause" } else { "resume" },
            engine.set_paused(self.guild_id, paused),
        )
        .await?;

        self.state.phase = if paused {
            SessionPhase::Paused
        } else {
            SessionPhase::Playing
        };
        info!("Guild {}: {}", self.guild_id, self.state.phase);
        Ok(self.success(if paused {
            "Paused the music!"
        } else {
            "Resumed the music!"
        }))
    }

    pub async fn skip(&mut self, engine: &dyn AudioEngine) -> Result<OutcomeNotification> {
        let current = self.queue.current().cloned().ok_or(Error::NoActiveSession)?;
        match self.advance(engine, Some(current), true).await? {
            Advance::Playing(_) => Ok(self.success("Skipped the current track!")),
            Advance::Idle => Ok(self.no_op("No more tracks in the queue to skip!")),
        }
    }

    /// Toggle between no looping and looping the current track
    pub fn toggle_loop(&mut self) -> OutcomeNotification {
        if self.state.loop_mode == LoopMode::None {
            self.state.loop_mode = LoopMode::Track;
            self.success("Looping is now enabled for the current track.")
        } else {
            self.state.loop_mode = LoopMode::None;
            self.success("Looping is now disabled.")
        }
    }

    pub fn set_loop(&mut self, mode: LoopMode) -> Result<OutcomeNotification> {
        if self.state.loop_mode == mode {
            return Err(Error::NoOpRequested(format!("Loop mode is already {}.", mode)));
        }
        self.state.loop_mode = mode;
        Ok(self.success(format!("Loop mode set to {}.", mode)))
    }

    /// Go back to the most recently played track
    ///
    /// The interrupted current track goes back to the head of the queue.
    pub async fn previous(&mut self, engine: &dyn AudioEngine) -> Result<OutcomeNotification> {
        let target = self.queue.previous(true).ok_or(Error::EmptyHistory)?;
        self.start(engine, &target).await?;

        self.queue.previous(false);
        if let Some(interrupted) = self.queue.replace_current(target.clone()) {
            self.queue.enqueue_next(interrupted);
        }
        info!("Guild {}: back to {}", self.guild_id, target);
        Ok(self.success("Playing the previous track!"))
    }

    pub fn shuffle(&mut self) -> Result<OutcomeNotification> {
        if self.queue.is_empty() {
            return Err(Error::EmptyQueue);
        }
        self.queue.shuffle();
        Ok(self.success("Shuffled the queue!"))
    }

    pub fn show_queue(&self) -> OutcomeNotification {
        if self.queue.is_empty() {
            self.success("No tracks in queue.")
        } else {
            self.success(format!("{} track(s) in queue.", self.queue.pending_count()))
        }
    }

    pub fn now_playing(&self) -> Result<OutcomeNotification> {
        let current = self.queue.current().ok_or(Error::NoActiveSession)?;
        Ok(self.success(format!("Now playing: {}", current.title)))
    }

    /// Switch autoplay on or off
    ///
    /// On: seeds from the current track and queues one related candidate.
    /// Off: clears the seed and every pending track; the current track keeps
    /// playing.
    pub async fn toggle_autoplay(
        &mut self,
        engine: &dyn AudioEngine,
        user: UserId,
    ) -> Result<OutcomeNotification> {
        if self.state.autoplay.is_enabled() {
            self.state.autoplay = Autoplay::Disabled;
            self.queue.clear();
            info!("Guild {}: autoplay disabled by {}", self.guild_id, user);
            return Ok(self.success(
                "Autoplay has been disabled. The queue has been cleared, and no more random songs will be played.",
            ));
        }

        let current = self.queue.current().cloned().ok_or(Error::NoActiveSession)?;
        let query = related_query(&current).ok_or(Error::UnsupportedSource)?;
        let candidates = self.search(engine, &query, &SearchOptions::new(user)).await?;
        let candidate =
            pick_candidate(candidates, &[current.identifier.as_str()]).ok_or(Error::UnsupportedSource)?;

        self.state.autoplay = Autoplay::Enabled {
            seed_track_id: current.identifier.clone(),
            requester: user,
        };
        self.queue.enqueue(candidate);
        info!("Guild {}: autoplay enabled by {} from {}", self.guild_id, user, current);
        Ok(self.success(
            "Autoplay has been enabled. Random songs will now continue to play after the current queue.",
        ))
    }

    /// Stop playback; the registry removes the session afterwards
    pub fn stop(&mut self) -> OutcomeNotification {
        self.queue.clear();
        self.state.autoplay = Autoplay::Disabled;
        self.mark_stopping();
        self.success("Stopped the music and cleared the queue.")
    }

    // ========================================
    // Engine notifications
    // ========================================

    /// Engine confirmed a track started
    ///
    /// For a session created by this event the track is adopted as current.
    /// Once the session has driven the engine itself, a start it did not ask
    /// for is only accepted from the player it still holds.
    pub fn on_track_start(&mut self, player: PlayerId, track: &Track) -> Option<OutcomeNotification> {
        if self.is_stopping() {
            return None;
        }

        match self.requested.as_deref() {
            Some(id) if id == track.identifier => self.requested = None,
            Some(id) => {
                debug!("Guild {}: ignoring start of {}, waiting for {}", self.guild_id, track, id);
                return None;
            }
            None if self.player.is_some_and(|held| held != player) => {
                debug!("Guild {}: ignoring start of {} on foreign {}", self.guild_id, track, player);
                return None;
            }
            None if self.player.is_none() && !self.adoptable => {
                debug!("Guild {}: ignoring late start of {}, player released", self.guild_id, track);
                return None;
            }
            None => {
                let adopted = self.queue.current().map_or(true, |c| !c.same_as(track));
                if adopted {
                    self.queue.take_current();
                    self.queue.replace_current(track.clone());
                    debug!("Guild {}: adopted engine track {}", self.guild_id, track);
                }
            }
        }

        self.player = Some(player);
        self.in_flight = Some(track.identifier.clone());
        if self.state.phase == SessionPhase::Idle {
            self.state.phase = SessionPhase::Playing;
        }
        Some(self.success(format!("Now playing: {}", track.title)))
    }

    /// Engine stopped a track
    pub async fn on_track_end(
        &mut self,
        engine: &dyn AudioEngine,
        track: &Track,
        reason: TrackEndReason,
    ) -> Result<Option<OutcomeNotification>> {
        if !self.state.is_active() {
            return Ok(None);
        }
        if self.in_flight.as_deref() == Some(track.identifier.as_str()) {
            self.in_flight = None;
        }
        if !reason.may_start_next() {
            return Ok(None);
        }
        let is_current = self.queue.current().is_some_and(|c| c.same_as(track));
        if !is_current || self.requested.is_some() {
            debug!("Guild {}: stale end of {}", self.guild_id, track);
            return Ok(None);
        }

        let finished = track.clone();
        let allow_loop = reason == TrackEndReason::Finished;
        match self.state.loop_mode {
            LoopMode::Track if allow_loop => {
                self.start(engine, &finished).await?;
                debug!("Guild {}: looping {}", self.guild_id, finished);
                return Ok(None);
            }
            LoopMode::Queue if allow_loop => self.queue.enqueue(finished.clone()),
            _ => {}
        }

        match self.advance(engine, Some(finished), allow_loop).await? {
            Advance::Playing(_) => Ok(None),
            Advance::Idle => Ok(Some(self.no_op("Queue finished, nothing left to play."))),
        }
    }

    /// Engine reported it has nothing left to play
    pub async fn on_queue_drained(
        &mut self,
        engine: &dyn AudioEngine,
    ) -> Result<Option<OutcomeNotification>> {
        if !self.state.is_active() || self.requested.is_some() || self.in_flight.is_some() {
            return Ok(None);
        }
        let last = self.queue.current().cloned();
        match self.advance(engine, last, true).await? {
            Advance::Playing(_) => Ok(None),
            Advance::Idle => Ok(Some(self.no_op("Queue finished, nothing left to play."))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LoopbackEngine;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Track {}", id), UserId(1))
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result = bounded(
            Duration::from_millis(10),
            "play",
            std::future::pending::<EngineResult<()>>(),
        )
        .await;

        match result {
            Err(Error::EngineUnavailable(message)) => assert!(message.starts_with("play timed out")),
            other => panic!("Expected a timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_fresh_session_adopts_engine_track() {
        let mut session = PlaybackSession::new(GuildId(1), SessionConfig::default());

        let outcome = session.on_track_start(PlayerId(7), &track("x"));

        assert!(outcome.is_some());
        assert_eq!(session.phase(), SessionPhase::Playing);
        assert_eq!(session.player(), Some(PlayerId(7)));
        assert_eq!(session.queue().current().map(|t| t.identifier.as_str()), Some("x"));
    }

    #[tokio::test]
    async fn test_late_start_after_release_is_ignored() {
        let (engine, _rx) = LoopbackEngine::new();
        engine.add_results("one", vec![track("t1")]);
        let mut session = PlaybackSession::new(GuildId(1), SessionConfig::default());
        session.play(&engine, "one", UserId(1)).await.unwrap();
        let player = session.player().unwrap();

        // Skipping the only track releases the player before its start arrives
        session.skip(&engine).await.unwrap();
        assert!(session.on_track_start(player, &track("t1")).is_none());

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.player().is_none());
        assert!(session.queue().current().is_none());
        assert!(session.is_evictable());
    }

    #[tokio::test]
    async fn test_start_from_other_player_is_ignored() {
        let (engine, _rx) = LoopbackEngine::new();
        engine.add_results("one", vec![track("t1")]);
        let mut session = PlaybackSession::new(GuildId(1), SessionConfig::default());
        session.play(&engine, "one", UserId(1)).await.unwrap();
        let player = session.player().unwrap();
        assert!(session.on_track_start(player, &track("t1")).is_some());

        assert!(session.on_track_start(PlayerId(player.0 + 1), &track("t9")).is_none());
        assert_eq!(session.player(), Some(player));
        assert_eq!(session.queue().current().map(|t| t.identifier.as_str()), Some("t1"));
    }
}
