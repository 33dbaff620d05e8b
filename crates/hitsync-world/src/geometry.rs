//! Block coordinates and the six axis-aligned faces.

use std::fmt;

use glam::{DVec3, IVec3};

/// Number of block layers; valid `y` is `0..WORLD_HEIGHT`.
pub const WORLD_HEIGHT: i32 = 256;

/// Largest absolute `x`/`z` a block may have (the world border).
pub const MAX_HORIZONTAL: i32 = 30_000_000;

/// Integer block coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockPos {
    /// X (east is positive).
    pub x: i32,
    /// Y (up is positive).
    pub y: i32,
    /// Z (south is positive).
    pub z: i32,
}

impl BlockPos {
    /// Creates a block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns `true` if the position lies inside the buildable world.
    pub fn is_valid(self) -> bool {
        (0..WORLD_HEIGHT).contains(&self.y)
            && self.x.unsigned_abs() <= MAX_HORIZONTAL as u32
            && self.z.unsigned_abs() <= MAX_HORIZONTAL as u32
    }

    /// The neighbouring block across `face`. Saturates at the `i32` limits.
    pub fn offset(self, face: Direction) -> Self {
        let d = face.normal();
        Self {
            x: self.x.saturating_add(d.x),
            y: self.y.saturating_add(d.y),
            z: self.z.saturating_add(d.z),
        }
    }

    /// Minimum corner of the block in world space.
    pub fn min_corner(self) -> DVec3 {
        DVec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Centre of the block in world space.
    pub fn center(self) -> DVec3 {
        self.min_corner() + DVec3::splat(0.5)
    }

    /// The block containing a world-space point.
    pub fn containing(point: DVec3) -> Self {
        let f = point.floor();
        Self::new(f.x as i32, f.y as i32, f.z as i32)
    }

    /// As a glam integer vector.
    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl From<IVec3> for BlockPos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six axis-aligned block faces.
///
/// Discriminants match the face ids used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// -Y.
    Down = 0,
    /// +Y.
    Up = 1,
    /// -Z.
    North = 2,
    /// +Z.
    South = 3,
    /// -X.
    West = 4,
    /// +X.
    East = 5,
}

impl Direction {
    /// All faces in id order.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Face for a wire id, `None` for anything outside `0..6` (including the
    /// use-item sentinel).
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Wire id of the face.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Unit offset pointing out of the face.
    pub fn normal(self) -> IVec3 {
        match self {
            Direction::Down => IVec3::NEG_Y,
            Direction::Up => IVec3::Y,
            Direction::North => IVec3::NEG_Z,
            Direction::South => IVec3::Z,
            Direction::West => IVec3::NEG_X,
            Direction::East => IVec3::X,
        }
    }

    /// The face whose outward normal equals `normal`, if it is a unit axis.
    pub fn from_normal(normal: IVec3) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.normal() == normal)
    }

    /// The opposite face.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}
