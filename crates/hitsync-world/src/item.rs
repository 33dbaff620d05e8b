//! Items and the closed bucket table.

use crate::block::Fluid;

/// Bucket variants. The set is closed, so per-kind behaviour lives in a
/// constant table instead of behind a trait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketKind {
    /// Empty container; collects fluid sources.
    Empty,
    /// Holds water.
    Water,
    /// Holds lava.
    Lava,
}

struct BucketProps {
    name: &'static str,
    fluid: Option<Fluid>,
    max_stack: u8,
}

const BUCKETS: [BucketProps; 3] = [
    BucketProps {
        name: "bucket",
        fluid: None,
        max_stack: 16,
    },
    BucketProps {
        name: "water_bucket",
        fluid: Some(Fluid::Water),
        max_stack: 1,
    },
    BucketProps {
        name: "lava_bucket",
        fluid: Some(Fluid::Lava),
        max_stack: 1,
    },
];

impl BucketKind {
    fn props(self) -> &'static BucketProps {
        &BUCKETS[self as usize]
    }

    /// Registry name.
    pub fn name(self) -> &'static str {
        self.props().name
    }

    /// The fluid carried, `None` for the empty bucket.
    pub fn fluid(self) -> Option<Fluid> {
        self.props().fluid
    }

    /// Returns `true` for the empty bucket.
    pub fn is_empty(self) -> bool {
        self.fluid().is_none()
    }

    /// Stack limit.
    pub fn max_stack(self) -> u8 {
        self.props().max_stack
    }
}

/// Item kinds known to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// A bucket of some kind.
    Bucket(BucketKind),
    /// Stone block item.
    Stone,
    /// Dirt block item.
    Dirt,
}

impl ItemKind {
    /// The bucket variant, if this is a bucket.
    pub fn bucket(self) -> Option<BucketKind> {
        match self {
            ItemKind::Bucket(kind) => Some(kind),
            _ => None,
        }
    }

    /// Stack limit.
    pub fn max_stack(self) -> u8 {
        match self {
            ItemKind::Bucket(kind) => kind.max_stack(),
            ItemKind::Stone | ItemKind::Dirt => 64,
        }
    }
}

impl From<BucketKind> for ItemKind {
    fn from(kind: BucketKind) -> Self {
        ItemKind::Bucket(kind)
    }
}

/// A stack of items. `count` is always at least 1 for a stack that exists;
/// an empty hand is `Option::None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemStack {
    /// What the stack holds.
    pub kind: ItemKind,
    /// How many.
    pub count: u8,
}

impl ItemStack {
    /// A stack of `count` items.
    pub fn new(kind: impl Into<ItemKind>, count: u8) -> Self {
        Self {
            kind: kind.into(),
            count,
        }
    }

    /// A single item.
    pub fn one(kind: impl Into<ItemKind>) -> Self {
        Self::new(kind, 1)
    }

    /// The stack with one item removed, or `None` if it was the last one.
    pub fn decremented(self) -> Option<Self> {
        (self.count > 1).then(|| Self {
            count: self.count - 1,
            ..self
        })
    }
}
