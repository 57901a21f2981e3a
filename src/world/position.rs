use serde::{Deserialize, Serialize};

/// Edge length of a chunk cell in blocks
pub const CELL_SIZE: i32 = 16;

/// Position of a block in a named world (block coordinates)
///
/// Orientation is carried along when the host supplies it but never takes
/// part in identity: two locations are the same block when world and
/// coordinates match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockLocation {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
}

impl BlockLocation {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: None,
            pitch: None,
        }
    }

    /// Attach the facing the host reported for the placed block
    pub fn with_orientation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = Some(yaw);
        self.pitch = Some(pitch);
        self
    }

    /// Get the cell this block belongs to
    pub fn to_cell(&self) -> CellKey {
        CellKey {
            world: self.world.clone(),
            x: self.x.div_euclid(CELL_SIZE),
            z: self.z.div_euclid(CELL_SIZE),
        }
    }

    fn key(&self) -> (&str, i32, i32, i32) {
        (&self.world, self.x, self.y, self.z)
    }
}

impl PartialEq for BlockLocation {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for BlockLocation {}

impl std::hash::Hash for BlockLocation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({},{},{})", self.world, self.x, self.y, self.z)
    }
}

/// Coarse spatial grouping used for density limits (16x16 column of blocks)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl CellKey {
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// Block coordinates of the cell's north-west corner
    pub fn origin(&self) -> (i32, i32) {
        (self.x * CELL_SIZE, self.z * CELL_SIZE)
    }

    /// Check whether a block lies inside this cell
    pub fn contains(&self, location: &BlockLocation) -> bool {
        location.world == self.world && location.to_cell() == *self
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{},{}]", self.world, self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_uses_euclidean_division() {
        assert_eq!(BlockLocation::new("world", 0, 64, 0).to_cell(), CellKey::new("world", 0, 0));
        assert_eq!(BlockLocation::new("world", 15, 64, 15).to_cell(), CellKey::new("world", 0, 0));
        assert_eq!(BlockLocation::new("world", 16, 64, -1).to_cell(), CellKey::new("world", 1, -1));
        assert_eq!(BlockLocation::new("world", -16, 0, -17).to_cell(), CellKey::new("world", -1, -2));
    }

    #[test]
    fn test_orientation_is_not_part_of_identity() {
        let plain = BlockLocation::new("world", 4, 70, -3);
        let facing = plain.clone().with_orientation(90.0, 0.0);
        assert_eq!(plain, facing);

        let mut set = std::collections::HashSet::new();
        set.insert(plain);
        assert!(set.contains(&facing));
    }

    #[test]
    fn test_cells_are_per_world() {
        let cell = CellKey::new("world", 0, 0);
        assert!(cell.contains(&BlockLocation::new("world", 3, 10, 3)));
        assert!(!cell.contains(&BlockLocation::new("world_nether", 3, 10, 3)));
        assert_eq!(cell.origin(), (0, 0));
    }
}
