//! Domain types shared by the queue, the cache and the session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A playable unit.
///
/// Identity is `id`. Tracks are immutable once enqueued: callers replace a
/// track rather than editing it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub is_video: bool,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail: String::new(),
            duration: 0,
            is_video: false,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = thumbnail.into();
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_video(mut self, is_video: bool) -> Self {
        self.is_video = is_video;
        self
    }
}

/// Repeat behavior at the end of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::None => "none",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where [`insert_track`](crate::QueueManager::insert_track) places a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Right after the current track.
    Next,
    /// Append to the end of the queue.
    End,
    /// Absolute position, clamped to `[0, len]`.
    At(usize),
}

/// Result of advancing the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTrack {
    /// The new current track, `None` when the queue is exhausted or empty.
    pub track: Option<Track>,
    /// Crossfade hint: `false` when either side of the transition is a video.
    pub should_crossfade: bool,
}

impl NextTrack {
    pub(crate) fn none() -> Self {
        Self {
            track: None,
            should_crossfade: false,
        }
    }
}

/// One available encoding of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuality {
    /// Bitrate in kbps.
    pub bitrate: u32,
    /// Container/codec label, e.g. `"webm"`, `"mp4"` or a full MIME type.
    pub format: String,
    pub url: String,
    /// Size in bytes when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl StreamQuality {
    pub fn new(bitrate: u32, format: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            bitrate,
            format: format.into(),
            url: url.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// MIME type used when exposing cached bytes through a blob URL.
    pub fn mime_type(&self) -> String {
        if self.format.contains('/') {
            return self.format.clone();
        }
        match self.format.to_ascii_lowercase().as_str() {
            "webm" | "opus" => "audio/webm".to_string(),
            "mp4" | "m4a" | "aac" => "audio/mp4".to_string(),
            "mp3" => "audio/mpeg".to_string(),
            "ogg" => "audio/ogg".to_string(),
            _ => "application/octet-stream".to_string(),
        }
    }
}
