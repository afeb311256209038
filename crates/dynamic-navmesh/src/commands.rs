//! Pending collider changes
//!
//! Public calls on the navmesh only record what should happen; tiles are
//! touched when the queue is drained at the start of the next build or
//! update. Each command carries the tiles it was resolved to when enqueued.

use crate::colliders::Collider;
use crate::dynamic_tile::DynamicTile;
use crate::TileCoord;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

pub enum ColliderCommand {
    Add {
        collider_id: u64,
        collider: Arc<dyn Collider>,
        affected_tiles: BTreeSet<TileCoord>,
    },
    Remove {
        collider_id: u64,
        affected_tiles: BTreeSet<TileCoord>,
    },
}

impl ColliderCommand {
    pub fn collider_id(&self) -> u64 {
        match self {
            ColliderCommand::Add { collider_id, .. } | ColliderCommand::Remove { collider_id, .. } => {
                *collider_id
            }
        }
    }

    pub fn affected_tiles(&self) -> &BTreeSet<TileCoord> {
        match self {
            ColliderCommand::Add { affected_tiles, .. }
            | ColliderCommand::Remove { affected_tiles, .. } => affected_tiles,
        }
    }

    /// Applies the command to one of its affected tiles
    pub fn apply(&self, tile: &mut DynamicTile) {
        match self {
            ColliderCommand::Add {
                collider_id,
                collider,
                ..
            } => tile.add_collider(*collider_id, Arc::clone(collider)),
            ColliderCommand::Remove { collider_id, .. } => {
                tile.remove_collider(*collider_id);
            }
        }
    }
}

impl fmt::Debug for ColliderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColliderCommand::Add {
                collider_id,
                collider,
                affected_tiles,
            } => f
                .debug_struct("Add")
                .field("collider_id", collider_id)
                .field("collider_type", &collider.collider_type())
                .field("affected_tiles", affected_tiles)
                .finish(),
            ColliderCommand::Remove {
                collider_id,
                affected_tiles,
            } => f
                .debug_struct("Remove")
                .field("collider_id", collider_id)
                .field("affected_tiles", affected_tiles)
                .finish(),
        }
    }
}

/// FIFO of commands waiting for the next drain
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: VecDeque<ColliderCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: ColliderCommand) {
        self.commands.push_back(command);
    }

    /// Takes every queued command, leaving the queue empty
    pub fn drain(&mut self) -> VecDeque<ColliderCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Tiles targeted by queued additions of `collider_id`
    pub fn pending_additions(&self, collider_id: u64) -> BTreeSet<TileCoord> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                ColliderCommand::Add {
                    collider_id: id,
                    affected_tiles,
                    ..
                } if *id == collider_id => Some(affected_tiles),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }
}
