// Core types for the sync engine.
//
// Defines host entity handles, sprite references, facing directions, and the
// discrete movement vocabulary (`MoveStep`, `RouteCommand`, `MoveRoute`) that
// the reconciliation engine hands to the host. Wire-level types (`Identity`,
// `TilePos`, `ActorId`) are re-exported from `wayfarer_protocol`.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use wayfarer_protocol::types::{ActorId, Identity, TilePos};

// ---------------------------------------------------------------------------
// Host-side handles
// ---------------------------------------------------------------------------

/// Opaque reference to an entity created by the host through `EntityGateway`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// A character sheet plus the cell index within it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteRef {
    pub name: String,
    pub index: u32,
}

impl SpriteRef {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

// ---------------------------------------------------------------------------
// Movement vocabulary
// ---------------------------------------------------------------------------

/// Facing direction, using the numpad codes the host engine expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down = 2,
    Left = 4,
    Right = 6,
    Up = 8,
}

/// One axis-aligned unit step. Diagonals are never used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveStep {
    Up,
    Down,
    Left,
    Right,
}

impl MoveStep {
    pub fn direction(self) -> Direction {
        match self {
            MoveStep::Up => Direction::Up,
            MoveStep::Down => Direction::Down,
            MoveStep::Left => Direction::Left,
            MoveStep::Right => Direction::Right,
        }
    }

    /// The cell reached by taking this step from `from`.
    pub fn apply(self, from: TilePos) -> TilePos {
        match self {
            MoveStep::Up => TilePos::new(from.x, from.y - 1),
            MoveStep::Down => TilePos::new(from.x, from.y + 1),
            MoveStep::Left => TilePos::new(from.x - 1, from.y),
            MoveStep::Right => TilePos::new(from.x + 1, from.y),
        }
    }
}

/// A single entry of a host move route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteCommand {
    Step(MoveStep),
    End,
}

/// A finite route the host plays back autonomously over several frames.
///
/// Always terminated by exactly one `RouteCommand::End`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRoute {
    commands: Vec<RouteCommand>,
    pub repeat: bool,
    pub skippable: bool,
}

impl MoveRoute {
    /// A non-repeating, non-skippable route through `steps`.
    pub fn forced(steps: &[MoveStep]) -> Self {
        let mut commands: Vec<RouteCommand> = steps.iter().copied().map(RouteCommand::Step).collect();
        commands.push(RouteCommand::End);
        Self {
            commands,
            repeat: false,
            skippable: false,
        }
    }

    pub fn commands(&self) -> &[RouteCommand] {
        &self.commands
    }

    /// The steps, without the end marker.
    pub fn steps(&self) -> impl Iterator<Item = MoveStep> + '_ {
        self.commands.iter().filter_map(|c| match c {
            RouteCommand::Step(step) => Some(*step),
            RouteCommand::End => None,
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where an unobstructed walk of this route from `from` ends up.
    pub fn destination(&self, from: TilePos) -> TilePos {
        self.steps().fold(from, |pos, step| step.apply(pos))
    }
}
