//! In-process audio engine
//!
//! Plays nothing. It keeps per-guild player bookkeeping, answers searches
//! from a catalogue, and emits the same event sequence a real node would
//! (`TrackEnd(replaced)` then `TrackStart` when a new track is requested).
//! Used by the console binary and by the tests; transport events such as a
//! track finishing are triggered explicitly with [`LoopbackEngine::finish`]
//! and [`LoopbackEngine::drain`].

use super::{AudioEngine, EngineError, EngineResult};
use crate::playback::autoplay::parse_related_query;
use async_trait::async_trait;
use jamroom_common::events::{EngineEvent, TrackEndReason};
use jamroom_common::{GuildId, PlayerId, SearchOptions, Track};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Number of tracks a synthetic related-tracks search returns
const SYNTHETIC_MIX_LEN: usize = 3;

/// Most recent engine calls kept for inspection
const CALL_LOG_LIMIT: usize = 512;

/// Engine call recorded for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Play { guild_id: GuildId, identifier: String },
    SetPaused { guild_id: GuildId, paused: bool },
    Teardown { guild_id: GuildId },
    Search { query: String },
}

#[derive(Default)]
struct LoopbackInner {
    catalogue: HashMap<String, Vec<Track>>,
    players: HashMap<GuildId, PlayerId>,
    now_playing: HashMap<GuildId, Track>,
    next_player: u64,
    calls: VecDeque<EngineCall>,
    failing: bool,
}

impl LoopbackInner {
    fn record(&mut self, call: EngineCall) {
        if self.calls.len() == CALL_LOG_LIMIT {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }
}

/// Loopback [`AudioEngine`] implementation
pub struct LoopbackEngine {
    events: mpsc::UnboundedSender<EngineEvent>,
    inner: Mutex<LoopbackInner>,
    synthetic_search: bool,
}

impl LoopbackEngine {
    /// Create an engine and the receiving end of its event channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            events,
            inner: Mutex::new(LoopbackInner::default()),
            synthetic_search: false,
        };
        (engine, rx)
    }

    /// Answer queries missing from the catalogue with generated tracks
    pub fn with_synthetic_search(mut self) -> Self {
        self.synthetic_search = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            warn!("Engine event receiver dropped");
        }
    }

    /// Register the results returned for an exact query string
    pub fn add_results(&self, query: impl Into<String>, tracks: Vec<Track>) {
        self.lock().catalogue.insert(query.into(), tracks);
    }

    /// Make every subsequent call fail until cleared
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Recorded calls, oldest first; only the latest `CALL_LOG_LIMIT` are kept
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.iter().cloned().collect()
    }

    pub fn search_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::Search { .. }))
            .count()
    }

    pub fn teardown_count(&self, guild_id: GuildId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::Teardown { guild_id: g } if *g == guild_id))
            .count()
    }

    pub fn player_for(&self, guild_id: GuildId) -> Option<PlayerId> {
        self.lock().players.get(&guild_id).copied()
    }

    pub fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        self.lock().now_playing.get(&guild_id).cloned()
    }

    /// Simulate the guild's track playing to its end
    ///
    /// Returns false if nothing was playing.
    pub fn finish(&self, guild_id: GuildId) -> bool {
        self.end_current(guild_id, TrackEndReason::Finished)
    }

    /// Simulate the guild's track failing mid-stream
    pub fn fail_current(&self, guild_id: GuildId) -> bool {
        self.end_current(guild_id, TrackEndReason::LoadFailed)
    }

    fn end_current(&self, guild_id: GuildId, reason: TrackEndReason) -> bool {
        let ended = {
            let mut inner = self.lock();
            let player = inner.players.get(&guild_id).copied();
            player.zip(inner.now_playing.remove(&guild_id))
        };
        match ended {
            Some((player, track)) => {
                self.emit(EngineEvent::TrackEnd {
                    player,
                    track,
                    reason,
                });
                true
            }
            None => false,
        }
    }

    /// Simulate the node reporting that the player has nothing left to play
    pub fn drain(&self, guild_id: GuildId) -> bool {
        let player = self.lock().players.get(&guild_id).copied();
        match player {
            Some(player) => {
                self.emit(EngineEvent::QueueDrained { player });
                true
            }
            None => false,
        }
    }

    fn synthesize(query: &str, options: &SearchOptions) -> Vec<Track> {
        if let Some(seed) = parse_related_query(query) {
            // The mix starts with the seed itself, like a real radio playlist
            let mut tracks = vec![Track::new(seed, format!("{} (mix seed)", seed), options.requester)];
            tracks.extend((1..=SYNTHETIC_MIX_LEN).map(|n| {
                let identifier = format!("{}~{}", seed, n);
                Track::new(identifier.clone(), format!("Related to {} #{}", seed, n), options.requester)
            }));
            return tracks;
        }

        let identifier: String = query
            .split_whitespace()
            .map(|word| word.to_lowercase())
            .collect::<Vec<_>>()
            .join("-");
        if identifier.is_empty() {
            return Vec::new();
        }
        vec![Track::new(identifier, query.trim(), options.requester).with_duration_ms(180_000)]
    }
}

#[async_trait]
impl AudioEngine for LoopbackEngine {
    async fn request_play(&self, guild_id: GuildId, track: &Track) -> EngineResult<PlayerId> {
        let (player, replaced) = {
            let mut inner = self.lock();
            inner.record(EngineCall::Play {
                guild_id,
                identifier: track.identifier.clone(),
            });
            if inner.failing {
                return Err(EngineError::Unavailable("loopback engine failing".to_string()));
            }

            let player = match inner.players.get(&guild_id) {
                Some(player) => *player,
                None => {
                    inner.next_player += 1;
                    let player = PlayerId(inner.next_player);
                    inner.players.insert(guild_id, player);
                    player
                }
            };
            let replaced = inner.now_playing.insert(guild_id, track.clone());
            (player, replaced)
        };

        if let Some(old) = replaced {
            self.emit(EngineEvent::TrackEnd {
                player,
                track: old,
                reason: TrackEndReason::Replaced,
            });
        }
        self.emit(EngineEvent::TrackStart {
            player,
            track: track.clone(),
        });
        debug!("Loopback playing {} on {}", track, player);
        Ok(player)
    }

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> EngineResult<()> {
        let mut inner = self.lock();
        inner.record(EngineCall::SetPaused { guild_id, paused });
        if inner.failing {
            return Err(EngineError::Unavailable("loopback engine failing".to_string()));
        }
        if !inner.players.contains_key(&guild_id) {
            return Err(EngineError::NoPlayer(guild_id));
        }
        Ok(())
    }

    async fn teardown(&self, guild_id: GuildId) -> EngineResult<()> {
        let mut inner = self.lock();
        inner.record(EngineCall::Teardown { guild_id });
        inner.players.remove(&guild_id);
        inner.now_playing.remove(&guild_id);
        if inner.failing {
            return Err(EngineError::Unavailable("loopback engine failing".to_string()));
        }
        Ok(())
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> EngineResult<Vec<Track>> {
        let found = {
            let mut inner = self.lock();
            inner.record(EngineCall::Search {
                query: query.to_string(),
            });
            if inner.failing {
                return Err(EngineError::Unavailable("loopback engine failing".to_string()));
            }
            inner.catalogue.get(query).cloned()
        };

        let tracks = match found {
            Some(tracks) => tracks
                .into_iter()
                .map(|mut track| {
                    track.requester = options.requester;
                    track
                })
                .collect(),
            None if self.synthetic_search => Self::synthesize(query, options),
            None => Vec::new(),
        };
        debug!("Loopback search {:?} -> {} results", query, tracks.len());
        Ok(tracks)
    }

    fn resolve_guild(&self, player: PlayerId) -> Option<GuildId> {
        self.lock()
            .players
            .iter()
            .find(|(_, p)| **p == player)
            .map(|(guild_id, _)| *guild_id)
    }
}
