//! Read-only tile map oracle.
//!
//! Loading a map file is somebody else's job; the simulation only ever asks
//! four questions of it: what tile is here, is this tile solid for a given
//! frequency, does a ship-sized box collide here, and can a ship-sized box
//! fit here. Positions are in world tiles on a 1024x1024 grid.

use hashbrown::HashMap;

use crate::util::vec2::Vec2;

/// Tiles per map side.
pub const MAP_SIZE: u16 = 1024;

pub type TileId = u8;

pub const TILE_ID_EMPTY: TileId = 0;
/// Arena-defined safety tile: no damage, entry/exit is evented.
pub const TILE_ID_SAFE: TileId = 171;
/// Stepping on one teleports the ship and drains most of its energy.
pub const TILE_ID_WORMHOLE: TileId = 220;

const FIRST_DOOR: TileId = 162;
const LAST_DOOR: TileId = 169;
const TILE_ID_FLAG: TileId = 170;
const TILE_ID_GOAL: TileId = 172;
const FIRST_FLYOVER: TileId = 176;
const LAST_FLYOVER: TileId = 191;

#[derive(Debug, Clone, Default)]
pub struct Map {
    tiles: Vec<TileId>,
    /// Team bricks laid over the static grid; passable for the owning frequency.
    bricks: HashMap<(u16, u16), u16>,
}

impl Map {
    /// An empty (all-flyable) map.
    pub fn new() -> Self {
        Self {
            tiles: vec![TILE_ID_EMPTY; MAP_SIZE as usize * MAP_SIZE as usize],
            bricks: HashMap::new(),
        }
    }

    /// Builds the oracle from externally loaded tile data. Short input is
    /// zero-padded, oversized input truncated.
    pub fn from_tiles(tiles: &[TileId]) -> Self {
        let mut map = Self::new();
        let n = tiles.len().min(map.tiles.len());
        map.tiles[..n].copy_from_slice(&tiles[..n]);
        map
    }

    pub fn set_tile(&mut self, x: u16, y: u16, id: TileId) {
        if x < MAP_SIZE && y < MAP_SIZE {
            self.tiles[y as usize * MAP_SIZE as usize + x as usize] = id;
        }
    }

    pub fn tile_at(&self, x: u16, y: u16) -> TileId {
        if x >= MAP_SIZE || y >= MAP_SIZE {
            return TILE_ID_EMPTY;
        }
        self.tiles[y as usize * MAP_SIZE as usize + x as usize]
    }

    /// Tile under a world position.
    pub fn tile_id(&self, position: Vec2) -> TileId {
        if position.x < 0.0 || position.y < 0.0 {
            return TILE_ID_EMPTY;
        }
        self.tile_at(position.x as u16, position.y as u16)
    }

    pub fn set_brick(&mut self, x: u16, y: u16, frequency: u16) {
        self.bricks.insert((x, y), frequency);
    }

    pub fn clear_brick(&mut self, x: u16, y: u16) {
        self.bricks.remove(&(x, y));
    }

    /// Whether the tile blocks a ship on `frequency`. Team bricks pass their
    /// own frequency; everything else is frequency-independent.
    pub fn is_solid(&self, x: u16, y: u16, frequency: u16) -> bool {
        if x >= MAP_SIZE || y >= MAP_SIZE {
            return true;
        }

        if let Some(&owner) = self.bricks.get(&(x, y)) {
            if owner != frequency {
                return true;
            }
        }

        tile_is_solid(self.tile_at(x, y))
    }

    /// AABB of `radius` half-extent around `position` against solid tiles.
    pub fn is_colliding(&self, position: Vec2, radius: f32, frequency: u16) -> bool {
        let min_x = (position.x - radius).floor() as i32;
        let min_y = (position.y - radius).floor() as i32;
        let max_x = (position.x + radius).floor() as i32;
        let max_y = (position.y + radius).floor() as i32;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if x < 0 || y < 0 || x >= MAP_SIZE as i32 || y >= MAP_SIZE as i32 {
                    return true;
                }
                if self.is_solid(x as u16, y as u16, frequency) {
                    return true;
                }
            }
        }

        false
    }

    /// Whether a ship of `radius` fits at `position` without touching a wall.
    pub fn can_fit(&self, position: Vec2, radius: f32, frequency: u16) -> bool {
        position.x >= radius
            && position.y >= radius
            && position.x <= MAP_SIZE as f32 - radius
            && position.y <= MAP_SIZE as f32 - radius
            && !self.is_colliding(position, radius, frequency)
    }

    /// DDA march from `from` to `to`; false if any solid tile is crossed.
    pub fn line_of_sight(&self, from: Vec2, to: Vec2, frequency: u16) -> bool {
        let delta = to - from;
        let distance = delta.length();

        if distance < f32::EPSILON {
            return true;
        }

        let step = delta * (1.0 / distance) * 0.5;
        let steps = (distance * 2.0).ceil() as u32;
        let mut current = from;

        for _ in 0..=steps {
            if current.x < 0.0 || current.y < 0.0 {
                return false;
            }
            if self.is_solid(current.x as u16, current.y as u16, frequency) {
                return false;
            }
            current += step;
        }

        true
    }
}

/// Static solidity of a tile id: walls and doors block, flags/goals/safe
/// tiles/fly-overs/wormholes do not.
fn tile_is_solid(id: TileId) -> bool {
    match id {
        TILE_ID_EMPTY => false,
        TILE_ID_SAFE | TILE_ID_FLAG | TILE_ID_GOAL | TILE_ID_WORMHOLE => false,
        FIRST_FLYOVER..=LAST_FLYOVER => false,
        FIRST_DOOR..=LAST_DOOR => true,
        1..=161 => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walled_map() -> Map {
        let mut map = Map::new();
        // Vertical wall at x = 10 from y = 0..20.
        for y in 0..20 {
            map.set_tile(10, y, 1);
        }
        map
    }

    #[test]
    fn test_tile_lookup() {
        let mut map = Map::new();
        map.set_tile(5, 7, TILE_ID_SAFE);
        assert_eq!(map.tile_id(Vec2::new(5.5, 7.5)), TILE_ID_SAFE);
        assert_eq!(map.tile_id(Vec2::new(5.5, 8.5)), TILE_ID_EMPTY);
    }

    #[test]
    fn test_out_of_bounds_is_solid() {
        let map = Map::new();
        assert!(map.is_solid(MAP_SIZE, 0, 0));
        assert!(map.is_solid(0, MAP_SIZE, 0));
    }

    #[test]
    fn test_safe_and_wormhole_not_solid() {
        let mut map = Map::new();
        map.set_tile(3, 3, TILE_ID_SAFE);
        map.set_tile(4, 4, TILE_ID_WORMHOLE);
        assert!(!map.is_solid(3, 3, 0));
        assert!(!map.is_solid(4, 4, 0));
    }

    #[test]
    fn test_brick_blocks_other_frequency() {
        let mut map = Map::new();
        map.set_brick(8, 8, 2);
        assert!(map.is_solid(8, 8, 0));
        assert!(!map.is_solid(8, 8, 2));
        map.clear_brick(8, 8);
        assert!(!map.is_solid(8, 8, 0));
    }

    #[test]
    fn test_is_colliding_near_wall() {
        let map = walled_map();
        assert!(map.is_colliding(Vec2::new(10.5, 5.0), 0.875, 0));
        assert!(!map.is_colliding(Vec2::new(5.0, 5.0), 0.875, 0));
    }

    #[test]
    fn test_can_fit_respects_bounds() {
        let map = Map::new();
        assert!(!map.can_fit(Vec2::new(0.1, 0.1), 0.875, 0));
        assert!(map.can_fit(Vec2::new(500.0, 500.0), 0.875, 0));
    }

    #[test]
    fn test_line_of_sight_blocked_by_wall() {
        let map = walled_map();
        assert!(!map.line_of_sight(Vec2::new(5.0, 5.0), Vec2::new(15.0, 5.0), 0));
        assert!(map.line_of_sight(Vec2::new(5.0, 25.0), Vec2::new(15.0, 25.0), 0));
    }

    #[test]
    fn test_line_of_sight_degenerate() {
        let map = walled_map();
        let p = Vec2::new(5.0, 5.0);
        assert!(map.line_of_sight(p, p, 0));
    }
}
