//! Decision layer: blackboard, behavior tree, and the services its leaves
//! lean on (target memory and pathfinding).

pub mod blackboard;
pub mod brawler;
pub mod nodes;
pub mod tree;

use hashbrown::HashMap;

use crate::clock::{tick_diff, Tick};
use crate::game::input::InputState;
use crate::game::player::{PlayerId, SHIP_SPECTATOR};
use crate::game::Game;
use crate::map::Map;
use crate::render::DebugRenderer;
use crate::util::vec2::Vec2;

use self::blackboard::Blackboard;

/// A sequence of waypoints with a cursor, as produced by pathfinding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub points: Vec<Vec2>,
    pub index: usize,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn current(&self) -> Option<Vec2> {
        self.points.get(self.index).copied()
    }

    pub fn advance(&mut self) {
        if self.index < self.points.len() {
            self.index += 1;
        }
    }

    pub fn remaining(&self) -> usize {
        self.points.len().saturating_sub(self.index)
    }
}

/// Route planning seam. Real pathfinding is an external collaborator; the
/// bot only needs something that yields waypoints to steer along.
pub trait Pathfinder {
    fn find_path(&mut self, map: &Map, from: Vec2, to: Vec2, radius: f32, frequency: u16) -> Path;
}

/// Straight-line fallback planner: splits the segment into short waypoints.
/// Good enough in open space; a tile-aware planner plugs in via the trait.
#[derive(Debug, Default)]
pub struct LinePathfinder;

impl Pathfinder for LinePathfinder {
    fn find_path(
        &mut self,
        _map: &Map,
        from: Vec2,
        to: Vec2,
        _radius: f32,
        _frequency: u16,
    ) -> Path {
        const SEGMENT: f32 = 8.0;

        let delta = to - from;
        let distance = delta.length();
        if distance < f32::EPSILON {
            return Path {
                points: vec![to],
                index: 0,
            };
        }

        let steps = (distance / SEGMENT).ceil().max(1.0) as usize;
        let points = (1..=steps)
            .map(|i| from + delta * (i as f32 / steps as f32))
            .collect();

        Path { points, index: 0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct TargetSighting {
    position: Vec2,
    tick: Tick,
}

/// Memory-smoothed enemy tracking. Enemies drop out of the running only
/// after they have been unseen for a while, which keeps the bot from
/// flip-flopping targets when cloakers blink.
#[derive(Debug)]
pub struct TargetMemory {
    sightings: HashMap<PlayerId, TargetSighting>,
    /// How long a sighting stays credible, ticks.
    pub memory_ticks: i32,
}

impl Default for TargetMemory {
    fn default() -> Self {
        Self {
            sightings: HashMap::new(),
            memory_ticks: 500,
        }
    }
}

impl TargetMemory {
    /// Records every currently visible enemy and expires stale sightings.
    pub fn observe(&mut self, game: &Game) {
        let Some(self_player) = game.players.get_self() else { return };
        let tick = game.connection.current_tick;

        for player in game.players.players() {
            if player.id == self_player.id {
                continue;
            }
            if player.ship >= SHIP_SPECTATOR {
                continue;
            }
            if player.frequency == self_player.frequency {
                continue;
            }
            if !player.is_synchronized() || player.enter_delay > 0.0 {
                continue;
            }
            if !crate::game::player_manager::is_player_visible(self_player, player) {
                continue;
            }

            self.sightings.insert(
                player.id,
                TargetSighting {
                    position: player.position,
                    tick,
                },
            );
        }

        let memory = self.memory_ticks;
        self.sightings
            .retain(|_, sighting| tick_diff(tick, sighting.tick) <= memory);
    }

    /// Nearest remembered enemy that still exists in the arena.
    pub fn nearest(&self, game: &Game) -> Option<PlayerId> {
        let self_player = game.players.get_self()?;

        self.sightings
            .iter()
            .filter(|(id, _)| game.players.get_player_by_id(**id).is_some())
            .map(|(id, sighting)| {
                let position = game
                    .players
                    .get_player_by_id(*id)
                    .filter(|p| p.is_synchronized())
                    .map(|p| p.position)
                    .unwrap_or(sighting.position);
                (*id, self_player.position.distance_sq_to(position))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _)| id)
    }

    pub fn forget(&mut self, id: PlayerId) {
        self.sightings.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sightings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
    }
}

/// Everything a leaf can reach while executing. Rebuilt each frame from the
/// bot's owned parts; all of it is exclusive access for the duration of the
/// tick.
pub struct ExecuteContext<'a> {
    pub game: &'a mut Game,
    pub blackboard: &'a mut Blackboard,
    pub input: &'a mut InputState,
    pub renderer: &'a mut DebugRenderer,
    pub pathfinder: &'a mut dyn Pathfinder,
    pub targets: &'a mut TargetMemory,
    pub dt: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_pathfinder_spacing() {
        let mut pathfinder = LinePathfinder;
        let map = Map::new();
        let path = pathfinder.find_path(
            &map,
            Vec2::new(0.0, 0.0),
            Vec2::new(20.0, 0.0),
            0.875,
            0,
        );

        assert_eq!(path.points.len(), 3);
        assert_eq!(*path.points.last().unwrap(), Vec2::new(20.0, 0.0));
    }

    #[test]
    fn test_line_pathfinder_degenerate() {
        let mut pathfinder = LinePathfinder;
        let map = Map::new();
        let p = Vec2::new(5.0, 5.0);
        let path = pathfinder.find_path(&map, p, p, 0.875, 0);
        assert_eq!(path.points, vec![p]);
    }

    #[test]
    fn test_path_cursor() {
        let mut path = Path {
            points: vec![Vec2::ZERO, Vec2::ONE],
            index: 0,
        };
        assert_eq!(path.current(), Some(Vec2::ZERO));
        path.advance();
        assert_eq!(path.current(), Some(Vec2::ONE));
        path.advance();
        assert_eq!(path.current(), None);
        assert_eq!(path.remaining(), 0);
    }
}
