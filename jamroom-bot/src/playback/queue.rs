//! Per-guild track queue
//!
//! Tracks which track is where:
//! - Current: the track the session is playing (or last asked the engine to play)
//! - Pending: tracks waiting to play, in play order
//! - History: previously played tracks, most recent first, bounded
//!
//! Tracks are moved between these slots, never copied, so the current track
//! is never also waiting in the pending sequence.

use jamroom_common::Track;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

/// Track queue owned by one playback session
#[derive(Debug, Clone)]
pub struct TrackQueue {
    /// Currently playing track
    current: Option<Track>,

    /// Waiting tracks; front plays next
    pending: VecDeque<Track>,

    /// Played tracks; front is the most recent
    history: VecDeque<Track>,

    /// Oldest history entries are dropped beyond this
    history_limit: usize,
}

impl TrackQueue {
    /// Create new empty queue keeping at most `history_limit` played tracks
    pub fn new(history_limit: usize) -> Self {
        Self {
            current: None,
            pending: VecDeque::new(),
            history: VecDeque::with_capacity(history_limit),
            history_limit,
        }
    }

    /// Append to the end of the pending sequence
    pub fn enqueue(&mut self, track: Track) {
        self.pending.push_back(track);
    }

    /// Insert at the head of the pending sequence
    pub fn enqueue_next(&mut self, track: Track) {
        self.pending.push_front(track);
    }

    /// Advance to the next pending track
    ///
    /// - history <- old current
    /// - current <- pending[0]
    ///
    /// Returns the new current track, or None (queue untouched) if nothing
    /// is pending.
    pub fn dequeue_next(&mut self) -> Option<Track> {
        let next = self.pending.pop_front()?;
        if let Some(previous) = self.current.replace(next.clone()) {
            self.push_history(previous);
        }
        Some(next)
    }

    /// Track that `dequeue_next` would return
    pub fn peek_next(&self) -> Option<&Track> {
        self.pending.front()
    }

    /// Randomize pending order; current and history are untouched
    pub fn shuffle(&mut self) {
        self.pending.make_contiguous().shuffle(&mut rand::thread_rng());
    }

    /// Drop every pending track; current and history are kept
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Set current without recording the old current in history
    ///
    /// Returns the replaced track so the caller decides where it goes.
    pub fn replace_current(&mut self, track: Track) -> Option<Track> {
        self.current.replace(track)
    }

    /// Retire the current track into history
    pub fn take_current(&mut self) -> Option<Track> {
        let current = self.current.take()?;
        self.push_history(current.clone());
        Some(current)
    }

    /// Most recently played track
    ///
    /// With `peek` the history is left as is. Without it the entry is popped
    /// and the caller is responsible for re-queuing it as the new current.
    pub fn previous(&mut self, peek: bool) -> Option<Track> {
        if peek {
            self.history.front().cloned()
        } else {
            self.history.pop_front()
        }
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Pending tracks in play order
    pub fn snapshot(&self) -> Vec<Track> {
        self.pending.iter().cloned().collect()
    }

    fn push_history(&mut self, track: Track) {
        self.history.push_front(track);
        self.history.truncate(self.history_limit);
    }
}
