//! Block states, material properties, and the per-fluid constant table.

use crate::item::BucketKind;

/// Fluid level of a full source block.
pub const SOURCE_LEVEL: u8 = 0;

/// A block state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Block {
    /// Empty space.
    #[default]
    Air,
    /// Solid stone.
    Stone,
    /// Solid dirt.
    Dirt,
    /// Replaceable plant.
    TallGrass,
    /// Water; level 0 is a source, 1..=7 flowing.
    Water {
        /// Fluid level.
        level: u8,
    },
    /// Lava; level 0 is a source, 1..=7 flowing.
    Lava {
        /// Fluid level.
        level: u8,
    },
}

impl Block {
    /// Water source block.
    pub const WATER_SOURCE: Block = Block::Water {
        level: SOURCE_LEVEL,
    };
    /// Lava source block.
    pub const LAVA_SOURCE: Block = Block::Lava {
        level: SOURCE_LEVEL,
    };

    /// Returns `true` for [`Block::Air`].
    pub fn is_air(self) -> bool {
        matches!(self, Block::Air)
    }

    /// Returns `true` for water and lava at any level.
    pub fn is_liquid(self) -> bool {
        self.fluid().is_some()
    }

    /// Solid blocks cannot be replaced by placing into them.
    pub fn is_solid(self) -> bool {
        matches!(self, Block::Stone | Block::Dirt)
    }

    /// Non-solid materials (air, plants, fluids) may be overwritten.
    pub fn is_replaceable(self) -> bool {
        !self.is_solid()
    }

    /// The fluid and its level, for fluid blocks.
    pub fn fluid(self) -> Option<(Fluid, u8)> {
        match self {
            Block::Water { level } => Some((Fluid::Water, level)),
            Block::Lava { level } => Some((Fluid::Lava, level)),
            _ => None,
        }
    }

    /// Returns `true` if this is a full source of any fluid.
    pub fn is_fluid_source(self) -> bool {
        matches!(self.fluid(), Some((_, SOURCE_LEVEL)))
    }
}

/// Particle kinds emitted by ambient effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    /// Large grey smoke puff.
    LargeSmoke,
}

/// Sound and particles played instead of placing a fluid that evaporates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VaporizeEffect {
    /// Sound event name.
    pub sound: &'static str,
    /// Sound volume.
    pub volume: f32,
    /// Pitch before jitter.
    pub base_pitch: f32,
    /// Pitch jitter scale; actual pitch is `base + (r1 - r2) * jitter`.
    pub pitch_jitter: f32,
    /// Particle emitted.
    pub particle: ParticleKind,
    /// Number of particles.
    pub particle_count: u32,
}

/// The fizz played when water is emptied where it cannot exist.
pub const FIZZ: VaporizeEffect = VaporizeEffect {
    sound: "random.fizz",
    volume: 0.5,
    base_pitch: 2.6,
    pitch_jitter: 0.8,
    particle: ParticleKind::LargeSmoke,
    particle_count: 8,
};

/// The two fluids a bucket can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fluid {
    /// Water.
    Water,
    /// Lava.
    Lava,
}

/// Constants describing one fluid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluidProps {
    /// Lowercase name for logs.
    pub name: &'static str,
    /// Full source block that a bucket can collect.
    pub source: Block,
    /// Block written when the bucket is emptied.
    pub placed: Block,
    /// Bucket that holds this fluid.
    pub bucket: BucketKind,
    /// Effect played instead of placing, in worlds where the fluid evaporates.
    pub vaporize: Option<VaporizeEffect>,
}

const FLUIDS: [FluidProps; 2] = [
    FluidProps {
        name: "water",
        source: Block::WATER_SOURCE,
        placed: Block::WATER_SOURCE,
        bucket: BucketKind::Water,
        vaporize: Some(FIZZ),
    },
    FluidProps {
        name: "lava",
        source: Block::LAVA_SOURCE,
        placed: Block::LAVA_SOURCE,
        bucket: BucketKind::Lava,
        vaporize: None,
    },
];

impl Fluid {
    /// Constant table entry for this fluid.
    pub fn props(self) -> &'static FluidProps {
        &FLUIDS[self as usize]
    }

    /// Returns `true` if `block` is a full source of this fluid.
    pub fn is_source(self, block: Block) -> bool {
        matches!(block.fluid(), Some((f, SOURCE_LEVEL)) if f == self)
    }
}
