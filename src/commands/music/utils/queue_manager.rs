//! The Guild Queue Store: one FIFO track queue per guild.
//!
//! All mutation goes through the store's operations; the underlying map is never handed out.

use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::commands::music::audio_sources::Track;

/// A single guild's pending tracks.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct GuildQueue {
    tracks: Arc<Mutex<VecDeque<Track>>>,
}

impl GuildQueue {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Track>> {
        // The critical sections below cannot panic halfway through a mutation
        self.tracks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a track, returning the new number of pending tracks.
    pub fn push_back(&self, track: Track) -> usize {
        let mut tracks = self.lock();
        tracks.push_back(track);
        tracks.len()
    }

    /// Remove and return the track at the front.
    pub fn pop_front(&self) -> Option<Track> {
        self.lock().pop_front()
    }

    /// Drop every pending track, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut tracks = self.lock();
        let removed = tracks.len();
        tracks.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the pending tracks, front first.
    pub fn snapshot(&self) -> Vec<Track> {
        self.lock().iter().cloned().collect()
    }

    /// Whether both handles point at the same queue instance.
    pub fn same_queue(&self, other: &GuildQueue) -> bool {
        Arc::ptr_eq(&self.tracks, &other.tracks)
    }
}

/// Process-wide mapping from guild to its queue.
///
/// Queues are created lazily on first use and only ever emptied, never removed.
#[derive(Debug, Default)]
pub struct GuildQueueStore {
    queues: DashMap<GuildId, GuildQueue>,
}

impl GuildQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the queue for a guild, atomically creating an empty one if none exists.
    pub fn get_or_create(&self, guild_id: GuildId) -> GuildQueue {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creating queue for guild {}", guild_id);
                GuildQueue::default()
            })
            .clone()
    }

    /// Add a track to the tail of the guild's queue, returning its position (1-based).
    pub fn enqueue(&self, guild_id: GuildId, track: Track) -> usize {
        self.get_or_create(guild_id).push_back(track)
    }

    /// Pop the head of the guild's queue. Never blocks waiting for tracks.
    pub fn dequeue_front(&self, guild_id: GuildId) -> Option<Track> {
        self.queues.get(&guild_id)?.pop_front()
    }

    /// Remove all pending tracks for a guild, returning how many were removed.
    pub fn clear(&self, guild_id: GuildId) -> usize {
        self.queues
            .get(&guild_id)
            .map(|queue| queue.clear())
            .unwrap_or(0)
    }

    /// Snapshot of the guild's pending tracks.
    pub fn pending(&self, guild_id: GuildId) -> Vec<Track> {
        self.queues
            .get(&guild_id)
            .map(|queue| queue.snapshot())
            .unwrap_or_default()
    }

    pub fn len(&self, guild_id: GuildId) -> usize {
        self.queues
            .get(&guild_id)
            .map(|queue| queue.len())
            .unwrap_or(0)
    }

    /// Whether a queue entry has ever been created for this guild.
    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.queues.contains_key(&guild_id)
    }
}
