//! # Playback Queue
//!
//! Ordered list of tracks with a cursor, bounded history, shuffle (with a
//! restorable original order), repeat modes and persistence.
//!
//! ## State machine
//!
//! ```text
//! Empty ──set_queue──▶ Playing(i) ──next past end, repeat off──▶ Exhausted(i)
//!   ▲                      │  ▲                                      │
//!   └────clear / remove────┘  └──────────────set_queue───────────────┘
//! ```
//!
//! In `Exhausted`, `next_track` and `previous_track` return nothing. Edits
//! (insert, remove, move, shuffle) keep the tag and re-point the index at
//! the same logical track.

mod manager;
mod persistence;
mod state;

pub use manager::{QueueManager, Subscription};
pub use persistence::PersistedQueue;
pub use state::{PlaybackPosition, QueueSnapshot};
