//! Player records and the turret attachment arena.

use crate::clock::{Tick, INVALID_SMALL_TICK};
use crate::game::weapons::WeaponData;
use crate::util::vec2::Vec2;

/// Wire-assigned 16-bit player identity.
pub type PlayerId = u16;

pub const INVALID_PLAYER_ID: PlayerId = 0xFFFF;

/// Ship index 8 means spectator; 0..=7 are flyable hulls.
pub const SHIP_SPECTATOR: u8 = 8;

/// Per-player status bits carried in the position packets. The top two bits
/// are client-local and are never echoed by batched packets.
pub mod status {
    pub const STEALTH: u8 = 1 << 0;
    pub const CLOAK: u8 = 1 << 1;
    pub const XRADAR: u8 = 1 << 2;
    pub const ANTIWARP: u8 = 1 << 3;
    /// "Just warped": triggers the warp animation and snap-on-next-position.
    pub const FLASH: u8 = 1 << 4;
    pub const SAFETY: u8 = 1 << 5;
    pub const UFO: u8 = 1 << 6;

    /// Bits batched position records do not carry.
    pub const LOCAL_MASK: u8 = 0xC0;
}

/// Everything the bot mirrors about one player in the arena.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub squad: String,
    pub frequency: u16,
    pub ship: u8,

    /// World tiles.
    pub position: Vec2,
    /// Tiles per second.
    pub velocity: Vec2,
    /// Blend velocity applied while `lerp_time` remains.
    pub lerp_velocity: Vec2,
    /// Seconds left to blend toward the extrapolated position.
    pub lerp_time: f32,
    /// Normalized facing, 0..1 over 40 discrete steps.
    pub orientation: f32,

    pub bounty: u16,
    pub energy: f32,
    pub flags: u16,
    pub flag_timer: u16,
    /// Latency the server stamped on this player's packets, ticks.
    pub ping: u32,
    pub s2c_latency: u16,
    pub togglables: u8,
    /// Small tick of the freshest position packet; sentinel means never.
    pub timestamp: u16,

    pub attach_parent: PlayerId,
    /// Head of this player's turret list in the attach arena.
    pub children: AttachLink,

    /// Seconds until respawn; positive means dead.
    pub enter_delay: f32,
    pub warp_anim_t: f32,
    pub explode_anim_t: f32,
    pub bombflash_anim_t: f32,

    pub ball_carrier: bool,
    pub weapon: WeaponData,
    /// Packed ammo block from extended position data.
    pub items: u32,
    pub koth: u8,
    pub kill_points: u32,
    pub flag_points: u32,
    pub wins: u16,
    pub losses: u16,

    pub last_bounce_tick: Tick,
    /// When extended data (energy etc.) was last seen for this player.
    pub last_extra_timestamp: Tick,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            id: INVALID_PLAYER_ID,
            name: String::new(),
            squad: String::new(),
            frequency: 0,
            ship: SHIP_SPECTATOR,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            lerp_velocity: Vec2::ZERO,
            lerp_time: 0.0,
            orientation: 0.0,
            bounty: 0,
            energy: 0.0,
            flags: 0,
            flag_timer: 0,
            ping: 0,
            s2c_latency: 0,
            togglables: 0,
            timestamp: INVALID_SMALL_TICK,
            attach_parent: INVALID_PLAYER_ID,
            children: ATTACH_NIL,
            enter_delay: 0.0,
            warp_anim_t: 0.0,
            explode_anim_t: 0.0,
            bombflash_anim_t: 0.0,
            ball_carrier: false,
            weapon: WeaponData::default(),
            items: 0,
            koth: 0,
            kill_points: 0,
            flag_points: 0,
            wins: 0,
            losses: 0,
            last_bounce_tick: 0,
            last_extra_timestamp: 0,
        }
    }
}

impl Player {
    /// A player is synchronized once a position packet has been accepted.
    /// Unsynchronized players are invisible, immobile, and unattachable.
    pub fn is_synchronized(&self) -> bool {
        self.timestamp != INVALID_SMALL_TICK
    }

    pub fn in_ship(&self) -> bool {
        self.ship < SHIP_SPECTATOR
    }
}

/// Index into the attach arena; `ATTACH_NIL` terminates lists.
pub type AttachLink = u32;

pub const ATTACH_NIL: AttachLink = u32::MAX;

/// Intrusive list node tying one turret to its carrier's child list.
#[derive(Debug, Clone, Copy)]
pub struct AttachNode {
    pub player_id: PlayerId,
    pub next: AttachLink,
}

/// Arena of attach nodes with a LIFO free list. Nodes are allocated on
/// demand and recycled on detach, never freed individually; handles stay
/// stable across player-table mutations.
#[derive(Debug, Default)]
pub struct AttachArena {
    nodes: Vec<AttachNode>,
    free: AttachLink,
}

impl AttachArena {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: ATTACH_NIL,
        }
    }

    /// Takes a node off the free list (or grows the arena) and links it in
    /// front of `next`.
    pub fn acquire(&mut self, player_id: PlayerId, next: AttachLink) -> AttachLink {
        if self.free == ATTACH_NIL {
            self.nodes.push(AttachNode {
                player_id,
                next,
            });
            return (self.nodes.len() - 1) as AttachLink;
        }

        let link = self.free;
        let node = &mut self.nodes[link as usize];
        self.free = node.next;
        node.player_id = player_id;
        node.next = next;
        link
    }

    /// Returns a node to the free list.
    pub fn release(&mut self, link: AttachLink) {
        let node = &mut self.nodes[link as usize];
        node.player_id = INVALID_PLAYER_ID;
        node.next = self.free;
        self.free = link;
    }

    pub fn get(&self, link: AttachLink) -> &AttachNode {
        &self.nodes[link as usize]
    }

    pub fn get_mut(&mut self, link: AttachLink) -> &mut AttachNode {
        &mut self.nodes[link as usize]
    }

    /// Walks a child list from its head link.
    pub fn iter(&self, head: AttachLink) -> AttachIter<'_> {
        AttachIter {
            arena: self,
            current: head,
        }
    }

    /// Number of nodes ever allocated (live + free).
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }
}

pub struct AttachIter<'a> {
    arena: &'a AttachArena,
    current: AttachLink,
}

impl Iterator for AttachIter<'_> {
    type Item = (AttachLink, PlayerId);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == ATTACH_NIL {
            return None;
        }
        let link = self.current;
        let node = self.arena.get(link);
        self.current = node.next;
        Some((link, node.player_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_player_unsynchronized() {
        let player = Player::default();
        assert!(!player.is_synchronized());
        assert!(!player.in_ship());
        assert_eq!(player.attach_parent, INVALID_PLAYER_ID);
        assert_eq!(player.children, ATTACH_NIL);
    }

    #[test]
    fn test_synchronized_after_timestamp() {
        let mut player = Player::default();
        player.timestamp = 500;
        assert!(player.is_synchronized());
    }

    #[test]
    fn test_arena_acquire_links_front() {
        let mut arena = AttachArena::new();
        let first = arena.acquire(10, ATTACH_NIL);
        let second = arena.acquire(20, first);

        let children: Vec<PlayerId> = arena.iter(second).map(|(_, pid)| pid).collect();
        assert_eq!(children, vec![20, 10]);
    }

    #[test]
    fn test_arena_recycles_released_nodes() {
        let mut arena = AttachArena::new();
        let a = arena.acquire(1, ATTACH_NIL);
        let b = arena.acquire(2, ATTACH_NIL);
        assert_eq!(arena.capacity(), 2);

        arena.release(a);
        arena.release(b);

        // LIFO: the most recently released node comes back first.
        let c = arena.acquire(3, ATTACH_NIL);
        assert_eq!(c, b);
        let d = arena.acquire(4, ATTACH_NIL);
        assert_eq!(d, a);
        assert_eq!(arena.capacity(), 2);
    }

    #[test]
    fn test_arena_iter_empty() {
        let arena = AttachArena::new();
        assert_eq!(arena.iter(ATTACH_NIL).count(), 0);
    }
}
