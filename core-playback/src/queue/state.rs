//! Queue state machine.
//!
//! Pure, synchronous transitions over the track list, cursor, history and
//! shuffle snapshot. Locking, notifications and persistence live in
//! [`QueueManager`](crate::queue::QueueManager).

use crate::config::QueueConfig;
use crate::models::{InsertPosition, NextTrack, RepeatMode, Track};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Where the cursor sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "lowercase")]
pub enum PlaybackPosition {
    /// No tracks queued.
    Empty,
    /// `index` is the current track.
    Playing(usize),
    /// `next` ran past the end with repeat off; `index` is still the last
    /// track played. Only a new `set_queue` leaves this state.
    Exhausted(usize),
}

impl PlaybackPosition {
    pub fn index(&self) -> Option<usize> {
        match self {
            PlaybackPosition::Empty => None,
            PlaybackPosition::Playing(i) | PlaybackPosition::Exhausted(i) => Some(*i),
        }
    }

    /// Numeric cursor, `-1` when empty.
    pub fn as_legacy_index(&self) -> i64 {
        self.index().map(|i| i as i64).unwrap_or(-1)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, PlaybackPosition::Exhausted(_))
    }

    /// Same tag, new index.
    fn repoint(self, index: usize) -> Self {
        match self {
            PlaybackPosition::Exhausted(_) => PlaybackPosition::Exhausted(index),
            _ => PlaybackPosition::Playing(index),
        }
    }
}

/// Owned, immutable view of the queue handed to listeners and callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub tracks: Vec<Track>,
    pub current_index: i64,
    pub position: PlaybackPosition,
    pub history: Vec<Track>,
    /// Up to the configured window of tracks after the current one.
    pub upcoming: Vec<Track>,
    pub original_order: Vec<Track>,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
}

impl QueueSnapshot {
    pub fn current_track(&self) -> Option<&Track> {
        self.position.index().and_then(|i| self.tracks.get(i))
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// What `next_track` did, so the manager knows what to announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    /// Empty or already exhausted: nothing changed.
    Unchanged,
    /// Repeat-one replayed the current track.
    Repeated,
    /// The cursor moved.
    Moved,
    /// Ran off the end with repeat off.
    Exhausted,
}

pub(crate) struct QueueState {
    tracks: Vec<Track>,
    position: PlaybackPosition,
    history: Vec<Track>,
    original_order: Vec<Track>,
    shuffle_enabled: bool,
    repeat_mode: RepeatMode,
    max_history: usize,
    history_trim_to: usize,
    upcoming_window: usize,
    rng: StdRng,
}

impl QueueState {
    pub(crate) fn new(config: &QueueConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            tracks: Vec::new(),
            position: PlaybackPosition::Empty,
            history: Vec::new(),
            original_order: Vec::new(),
            shuffle_enabled: false,
            repeat_mode: RepeatMode::None,
            max_history: config.max_history,
            history_trim_to: config.history_trim_to,
            upcoming_window: config.upcoming_window,
            rng,
        }
    }

    pub(crate) fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub(crate) fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub(crate) fn position(&self) -> PlaybackPosition {
        self.position
    }

    pub(crate) fn original_order(&self) -> &[Track] {
        &self.original_order
    }

    pub(crate) fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub(crate) fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub(crate) fn current_track(&self) -> Option<&Track> {
        self.position.index().and_then(|i| self.tracks.get(i))
    }

    pub(crate) fn upcoming(&self) -> Vec<Track> {
        let PlaybackPosition::Playing(index) = self.position else {
            return Vec::new();
        };

        let window = self.upcoming_window;
        let mut upcoming: Vec<Track> = self
            .tracks
            .iter()
            .skip(index + 1)
            .take(window)
            .cloned()
            .collect();

        if self.repeat_mode == RepeatMode::All && upcoming.len() < window {
            let remaining = window - upcoming.len();
            upcoming.extend(self.tracks[..index].iter().take(remaining).cloned());
        }

        upcoming
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.tracks.clone(),
            current_index: self.position.as_legacy_index(),
            position: self.position,
            history: self.history.clone(),
            upcoming: self.upcoming(),
            original_order: self.original_order.clone(),
            shuffle_enabled: self.shuffle_enabled,
            repeat_mode: self.repeat_mode,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    pub(crate) fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) {
        self.history.clear();

        if tracks.is_empty() {
            self.tracks.clear();
            self.original_order.clear();
            self.position = PlaybackPosition::Empty;
            return;
        }

        let index = start_index.min(tracks.len() - 1);
        self.tracks = tracks;
        self.original_order = self.tracks.clone();
        self.position = PlaybackPosition::Playing(index);

        if self.shuffle_enabled {
            self.shuffle_keeping_current();
        }
    }

    pub(crate) fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;

        if self.shuffle_enabled {
            self.shuffle_keeping_current();
        } else {
            let current_id = self.current_track().map(|t| t.id.clone());
            self.tracks = std::mem::take(&mut self.original_order);
            self.original_order = self.tracks.clone();

            if self.tracks.is_empty() {
                self.position = PlaybackPosition::Empty;
            } else {
                let index = current_id
                    .and_then(|id| self.tracks.iter().position(|t| t.id == id))
                    .unwrap_or(0);
                self.position = self.position.repoint(index);
            }
        }

        self.shuffle_enabled
    }

    pub(crate) fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    pub(crate) fn next_track(&mut self) -> (NextTrack, Advance) {
        let PlaybackPosition::Playing(index) = self.position else {
            return (NextTrack::none(), Advance::Unchanged);
        };
        let outgoing = self.tracks[index].clone();

        if self.repeat_mode == RepeatMode::One {
            let next = NextTrack {
                track: Some(outgoing),
                should_crossfade: false,
            };
            return (next, Advance::Repeated);
        }

        self.push_history(outgoing.clone());

        let next_index = if index + 1 < self.tracks.len() {
            index + 1
        } else if self.repeat_mode == RepeatMode::All {
            0
        } else {
            self.position = PlaybackPosition::Exhausted(index);
            return (NextTrack::none(), Advance::Exhausted);
        };

        self.position = PlaybackPosition::Playing(next_index);
        let incoming = self.tracks[next_index].clone();
        let should_crossfade = !outgoing.is_video && !incoming.is_video;

        let next = NextTrack {
            track: Some(incoming),
            should_crossfade,
        };
        (next, Advance::Moved)
    }

    pub(crate) fn previous_track(&mut self) -> Option<Track> {
        let PlaybackPosition::Playing(index) = self.position else {
            return None;
        };

        if let Some(previous) = self.history.pop() {
            // A track removed since it was played keeps the cursor where it is.
            if let Some(found) = self.tracks.iter().position(|t| t.id == previous.id) {
                self.position = PlaybackPosition::Playing(found);
            }
            return Some(previous);
        }

        let target = if index > 0 {
            index - 1
        } else if self.repeat_mode == RepeatMode::All {
            self.tracks.len() - 1
        } else {
            return None;
        };

        self.position = PlaybackPosition::Playing(target);
        Some(self.tracks[target].clone())
    }

    pub(crate) fn insert_track(&mut self, track: Track, at: InsertPosition) {
        let Some(index) = self.position.index() else {
            self.tracks = vec![track];
            self.original_order = self.tracks.clone();
            self.position = PlaybackPosition::Playing(0);
            return;
        };

        let len = self.tracks.len();
        let insert_at = match at {
            InsertPosition::Next => index + 1,
            InsertPosition::End => len,
            InsertPosition::At(i) => i.min(len),
        };

        if self.shuffle_enabled {
            let anchor = match at {
                InsertPosition::Next => self
                    .current_track()
                    .and_then(|c| self.original_order.iter().position(|t| t.id == c.id))
                    .map(|i| i + 1),
                _ => None,
            };
            let original_at = anchor.unwrap_or(self.original_order.len());
            self.original_order.insert(original_at, track.clone());
        }

        self.tracks.insert(insert_at, track);
        if insert_at <= index {
            self.position = self.position.repoint(index + 1);
        }

        self.sync_original_order();
    }

    pub(crate) fn remove_track(&mut self, track_id: &str) -> bool {
        let Some(removed_at) = self.tracks.iter().position(|t| t.id == track_id) else {
            return false;
        };
        self.tracks.remove(removed_at);

        if self.shuffle_enabled {
            if let Some(i) = self.original_order.iter().position(|t| t.id == track_id) {
                self.original_order.remove(i);
            }
        }

        if self.tracks.is_empty() {
            self.position = PlaybackPosition::Empty;
            self.original_order.clear();
            return true;
        }

        if let Some(index) = self.position.index() {
            if removed_at < index {
                self.position = self.position.repoint(index - 1);
            } else if removed_at == index {
                self.position = self.position.repoint(index.min(self.tracks.len() - 1));
            }
        }

        self.sync_original_order();
        true
    }

    pub(crate) fn move_track(&mut self, from: usize, to: usize) -> bool {
        let len = self.tracks.len();
        if from >= len || to >= len || from == to {
            return false;
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(index) = self.position.index() {
            let new_index = if index == from {
                to
            } else if from < index && to >= index {
                index - 1
            } else if from > index && to <= index {
                index + 1
            } else {
                index
            };
            self.position = self.position.repoint(new_index);
        }

        self.sync_original_order();
        true
    }

    pub(crate) fn clear(&mut self) {
        self.tracks.clear();
        self.history.clear();
        self.original_order.clear();
        self.position = PlaybackPosition::Empty;
    }

    /// Load persisted state. History is not persisted and starts empty.
    pub(crate) fn restore(
        &mut self,
        tracks: Vec<Track>,
        current_index: i64,
        shuffle_enabled: bool,
        repeat_mode: RepeatMode,
        original_order: Vec<Track>,
    ) {
        self.history.clear();
        self.shuffle_enabled = shuffle_enabled;
        self.repeat_mode = repeat_mode;

        if tracks.is_empty() {
            self.clear();
            return;
        }

        let index = current_index.clamp(0, tracks.len() as i64 - 1) as usize;
        self.tracks = tracks;
        self.position = PlaybackPosition::Playing(index);
        self.original_order = if shuffle_enabled && !original_order.is_empty() {
            original_order
        } else {
            self.tracks.clone()
        };
    }

    fn shuffle_keeping_current(&mut self) {
        self.original_order = self.tracks.clone();

        let Some(index) = self.position.index() else {
            return;
        };

        let current = self.tracks.remove(index);
        self.tracks.shuffle(&mut self.rng);
        self.tracks.insert(0, current);
        self.position = self.position.repoint(0);
    }

    fn push_history(&mut self, track: Track) {
        self.history.push(track);
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.history_trim_to;
            self.history.drain(..excess);
        }
    }

    fn sync_original_order(&mut self) {
        if !self.shuffle_enabled {
            self.original_order = self.tracks.clone();
        }
    }
}
