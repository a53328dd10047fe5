//! Encounter simulation with event recording.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skirmish_replay::Snapshot;

use crate::encounter::{Encounter, EncounterEvent, EventBatch, Faction, Position, UnitId};

/// Configuration for the recorder.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Seed for deterministic simulation
    pub seed: u64,
    /// Units fielded by each faction
    pub units_per_side: u32,
    /// Simulated instants to record at most
    pub duration: u64,
    /// Starting health of every unit
    pub health: u32,
    /// Gap between the two deployment lines
    pub front_distance: i32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            units_per_side: 6,
            duration: 300,
            health: 100,
            front_distance: 20,
        }
    }
}

/// Simulates an encounter and records one batch per simulated instant.
pub struct EncounterRecorder {
    config: RecorderConfig,
    rng: StdRng,
    world: Encounter,
    batches: Vec<EventBatch>,
}

impl EncounterRecorder {
    /// Create a recorder with the given configuration.
    pub fn new(config: RecorderConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            world: Encounter::default(),
            batches: Vec::new(),
        }
    }

    /// Record the deployment batch at time 0.
    fn deploy(&mut self) {
        let mut events = Vec::new();
        for i in 0..self.config.units_per_side {
            let row = i as i32 * 2;
            events.push(EncounterEvent::UnitSpawned {
                unit: UnitId(i),
                faction: Faction::Attackers,
                position: Position::new(0, row),
                health: self.config.health,
            });
            events.push(EncounterEvent::UnitSpawned {
                unit: UnitId(self.config.units_per_side + i),
                faction: Faction::Defenders,
                position: Position::new(self.config.front_distance, row),
                health: self.config.health,
            });
        }
        self.commit(EventBatch { time: 0, events });
    }

    /// Simulate one instant. Returns `false` once the encounter is decided.
    pub fn advance(&mut self) -> bool {
        if self.batches.is_empty() {
            self.deploy();
            return true;
        }
        if self.world.is_decided() {
            return false;
        }

        let time = self.world.time() + 1;
        let mut events = Vec::new();
        let ids: Vec<UnitId> = self.world.units.keys().copied().collect();

        for id in ids {
            // Units killed earlier in this instant do not act.
            let Some(unit) = self.world.unit(id).cloned() else {
                continue;
            };
            let Some(enemy) = self
                .world
                .units
                .values()
                .filter(|other| other.faction == unit.faction.opponent())
                .min_by_key(|other| (other.position.distance(&unit.position), other.id))
                .cloned()
            else {
                break;
            };

            let event = if enemy.position.distance(&unit.position) <= 1 {
                let damage = self.rng.gen_range(5..=25);
                EncounterEvent::UnitAttacked {
                    attacker: id,
                    target: enemy.id,
                    damage,
                }
            } else {
                EncounterEvent::UnitMoved {
                    unit: id,
                    to: unit.position.step_toward(&enemy.position),
                }
            };
            self.world.apply(&event);
            events.push(event);

            if self.world.unit(enemy.id).is_some_and(|e| e.health == 0) {
                let killed = EncounterEvent::UnitKilled { unit: enemy.id };
                self.world.apply(&killed);
                events.push(killed);
            }
        }

        let batch = EventBatch { time, events };
        self.world.time = time;
        self.batches.push(batch);
        !self.world.is_decided()
    }

    fn commit(&mut self, batch: EventBatch) {
        self.world.replay(batch.clone());
        self.batches.push(batch);
    }

    /// Record until the encounter is decided or the duration runs out.
    pub fn run(&mut self) {
        if self.batches.is_empty() {
            self.advance();
        }
        while self.world.time() < self.config.duration && self.advance() {}
    }

    /// Get all recorded batches.
    pub fn batches(&self) -> &[EventBatch] {
        &self.batches
    }

    /// Get the number of batches recorded.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// The battlefield after the last recorded batch.
    pub fn snapshot(&self) -> &Encounter {
        &self.world
    }

    pub fn into_batches(self) -> Vec<EventBatch> {
        self.batches
    }
}
