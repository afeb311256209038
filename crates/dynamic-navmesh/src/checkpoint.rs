use crate::heightfield::Heightfield;
use std::collections::BTreeSet;

/// Snapshot of a tile heightfield taken right after collider rasterization.
///
/// A rebuild can start from the snapshot instead of the pristine voxel data,
/// skipping every collider whose id is already baked in. The snapshot is only
/// usable while all of those colliders are still live on the tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub heightfield: Heightfield,
    /// Ids of the colliders rasterized into `heightfield`
    pub colliders: BTreeSet<u64>,
}

impl Checkpoint {
    pub fn new(heightfield: Heightfield, colliders: BTreeSet<u64>) -> Self {
        Self {
            heightfield,
            colliders,
        }
    }

    /// Checks if this checkpoint can seed a rebuild for the given live colliders.
    ///
    /// Every baked collider must still be live; colliders added since the
    /// snapshot are rasterized on top of it.
    pub fn is_valid_for(&self, live_colliders: &BTreeSet<u64>) -> bool {
        self.colliders.is_subset(live_colliders)
    }

    pub fn contains(&self, collider_id: u64) -> bool {
        self.colliders.contains(&collider_id)
    }

    /// Gets the memory footprint of this checkpoint in bytes
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<BTreeSet<u64>>()
            + self.heightfield.memory_usage()
            + self.colliders.len() * std::mem::size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn create_test_heightfield() -> Heightfield {
        let mut hf = Heightfield::new(
            2,
            2,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 2.0),
            1.0,
            0.1,
        );
        hf.add_span(0, 0, 0, 10, 1, 1).unwrap();
        hf.add_span(1, 1, 0, 10, 1, 1).unwrap();
        hf
    }

    #[test]
    fn test_checkpoint_creation() {
        let hf = create_test_heightfield();
        let checkpoint = Checkpoint::new(hf.clone(), BTreeSet::from([1, 2, 3]));

        assert_eq!(checkpoint.heightfield, hf);
        assert_eq!(checkpoint.colliders.len(), 3);
        assert!(checkpoint.contains(2));
        assert!(!checkpoint.contains(4));
        assert!(checkpoint.memory_usage() > hf.memory_usage());
    }

    #[test]
    fn test_checkpoint_validity() {
        let checkpoint = Checkpoint::new(create_test_heightfield(), BTreeSet::from([1, 2]));

        // Same colliders
        assert!(checkpoint.is_valid_for(&BTreeSet::from([1, 2])));
        // New colliders added on top
        assert!(checkpoint.is_valid_for(&BTreeSet::from([1, 2, 5])));
        // A baked collider was removed
        assert!(!checkpoint.is_valid_for(&BTreeSet::from([1])));
        assert!(!checkpoint.is_valid_for(&BTreeSet::new()));

        let empty = Checkpoint::new(create_test_heightfield(), BTreeSet::new());
        assert!(empty.is_valid_for(&BTreeSet::new()));
    }
}
