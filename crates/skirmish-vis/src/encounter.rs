//! Encounter events and the replayable battlefield snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skirmish_replay::Snapshot;

/// Interpolation frames a move takes to settle on screen.
pub const MOTION_FRAMES: u32 = 3;

/// A unique unit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Attackers,
    Defenders,
}

impl Faction {
    pub fn opponent(self) -> Self {
        match self {
            Faction::Attackers => Faction::Defenders,
            Faction::Defenders => Faction::Attackers,
        }
    }
}

/// Grid position on the battlefield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// One grid step toward `other`, horizontal first.
    pub fn step_toward(&self, other: &Position) -> Position {
        if self.x != other.x {
            Position::new(self.x + (other.x - self.x).signum(), self.y)
        } else {
            Position::new(self.x, self.y + (other.y - self.y).signum())
        }
    }
}

/// State of a living unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub id: UnitId,
    pub faction: Faction,
    pub position: Position,
    pub health: u32,
}

/// Events recorded during an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EncounterEvent {
    /// A unit entered the battlefield
    UnitSpawned {
        unit: UnitId,
        faction: Faction,
        position: Position,
        health: u32,
    },

    /// A unit moved one step
    UnitMoved { unit: UnitId, to: Position },

    /// A unit struck another
    UnitAttacked {
        attacker: UnitId,
        target: UnitId,
        damage: u32,
    },

    /// A unit was destroyed
    UnitKilled { unit: UnitId },
}

/// Everything that happened during one simulated instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub time: u64,
    pub events: Vec<EncounterEvent>,
}

/// The battlefield at a point in time.
///
/// Equality compares the battlefield only; pending interpolation frames
/// are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Encounter {
    pub time: u64,
    pub units: BTreeMap<UnitId, UnitState>,
    /// Interpolation frames left before the last moves settle.
    #[serde(skip)]
    motion: u32,
}

impl PartialEq for Encounter {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.units == other.units
    }
}

impl Eq for Encounter {}

impl Encounter {
    /// Apply a single event.
    pub fn apply(&mut self, event: &EncounterEvent) {
        match event {
            EncounterEvent::UnitSpawned {
                unit,
                faction,
                position,
                health,
            } => {
                self.units.insert(
                    *unit,
                    UnitState {
                        id: *unit,
                        faction: *faction,
                        position: *position,
                        health: *health,
                    },
                );
            }
            EncounterEvent::UnitMoved { unit, to } => {
                if let Some(state) = self.units.get_mut(unit) {
                    state.position = *to;
                    self.motion = MOTION_FRAMES;
                }
            }
            EncounterEvent::UnitAttacked { target, damage, .. } => {
                if let Some(state) = self.units.get_mut(target) {
                    state.health = state.health.saturating_sub(*damage);
                }
            }
            EncounterEvent::UnitKilled { unit } => {
                self.units.remove(unit);
            }
        }
    }

    pub fn unit(&self, id: UnitId) -> Option<&UnitState> {
        self.units.get(&id)
    }

    /// Living units of one faction.
    pub fn strength(&self, faction: Faction) -> usize {
        self.units.values().filter(|u| u.faction == faction).count()
    }

    /// Whether one side has been wiped out.
    pub fn is_decided(&self) -> bool {
        self.strength(Faction::Attackers) == 0 || self.strength(Faction::Defenders) == 0
    }

    /// Whether a move is still being interpolated.
    pub fn in_motion(&self) -> bool {
        self.motion > 0
    }
}

impl Snapshot for Encounter {
    type Batch = EventBatch;

    fn replay(&mut self, batch: EventBatch) {
        for event in &batch.events {
            self.apply(event);
        }
        self.time = self.time.max(batch.time);
    }

    fn animate(&mut self) -> bool {
        if self.motion == 0 {
            return false;
        }
        self.motion -= 1;
        true
    }

    fn time(&self) -> u64 {
        self.time
    }

    fn has_entities(&self) -> bool {
        !self.units.is_empty()
    }
}
