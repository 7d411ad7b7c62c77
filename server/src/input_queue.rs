//! Per-player latest-wins input mailbox.
//!
//! The network side writes whenever a message arrives; the tick takes the
//! pending inputs once per fixed step. There is never a backlog: a newer
//! input simply overwrites the older one.

use shared::{PlayerId, PlayerInput};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct InputQueue {
    pending: BTreeMap<PlayerId, PlayerInput>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `input` as the only pending input for `player_id`.
    /// Returns true if an unconsumed input was overwritten.
    pub fn submit(&mut self, player_id: PlayerId, input: PlayerInput) -> bool {
        self.pending.insert(player_id, input).is_some()
    }

    /// Takes every pending input in player id order, leaving the queue empty.
    pub fn take_all(&mut self) -> Vec<(PlayerId, PlayerInput)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    pub fn peek(&self, player_id: PlayerId) -> Option<&PlayerInput> {
        self.pending.get(&player_id)
    }

    pub fn remove(&mut self, player_id: PlayerId) {
        self.pending.remove(&player_id);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
