//! The player table and everything that feeds it.
//!
//! Owns the flat array of player records with O(1) id lookup, the turret
//! attachment graph, inbound position reconciliation, spawn selection, the
//! outbound position cadence, and the damage-report ring. Packet handlers
//! drop malformed or stale input silently; nothing in here aborts.

use rand::Rng;
use smallvec::SmallVec;

use crate::clock::{make_tick, small_tick_gte, tick_diff, Tick, INVALID_SMALL_TICK};
use crate::game::events::{EventBus, GameEvent};
use crate::game::physics;
use crate::game::player::{
    status, AttachArena, Player, PlayerId, ATTACH_NIL, INVALID_PLAYER_ID, SHIP_SPECTATOR,
};
use crate::game::services::{ChatController, ChatKind, Radar, Soccer};
use crate::game::ship::ShipController;
use crate::game::weapons::{Damage, WeaponData, WeaponKind, WeaponManager};
use crate::map::{TILE_ID_SAFE, TILE_ID_WORMHOLE};
use crate::net::codec::PacketReader;
use crate::net::connection::{Connection, LoginState};
use crate::net::protocol::{
    BatchedLargeRecord, BatchedSmallRecord, ItemCounts, OutboundPosition, PositionExtra,
};
use crate::util::vec2::Vec2;

pub const ANIM_DURATION_SHIP_WARP: f32 = 0.5;
pub const ANIM_DURATION_SHIP_EXPLODE: f32 = 0.8;
pub const ANIM_DURATION_BOMB_FLASH: f32 = 0.12;

const MAX_DAMAGE_ENTRIES: usize = 32;

/// Outcome of a locally initiated attach request. Failures are ordinary
/// control flow here, not errors; the caller decides whether to surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachRequestResponse {
    Success,
    NoDestination,
    CarryingBall,
    DetachFromParent,
    DetachChildren,
    NotEnoughEnergy,
    BountyTooLow,
    SelfTarget,
    Frequency,
    Spectator,
    TargetShipNotAttachable,
    TooManyTurrets,
    Antiwarped,
    UnrecoverableError,
}

/// Visibility rule: teammates always, enemies unless cloaked (XRadar sees
/// through cloak).
pub fn is_player_visible(self_player: &Player, player: &Player) -> bool {
    if self_player.frequency == player.frequency {
        return true;
    }
    player.togglables & status::CLOAK == 0 || self_player.togglables & status::XRADAR != 0
}

/// Ticks to extrapolate for a tagged server timestamp. Out-of-window values
/// fall back to half the one-way latency, capped at 15 ticks.
pub fn timestamp_diff(conn: &Connection, tagged_timestamp: Tick) -> i32 {
    let mut diff = tick_diff(conn.server_tick(), tagged_timestamp);

    if !(0..=4000).contains(&diff) {
        diff = (conn.ping_ms as i32 / 10) / 2;
        if diff > 14 {
            diff = 15;
        }
    }

    diff
}

fn is_newer_position_packet(player: &Player, timestamp: u16) -> bool {
    if player.timestamp == INVALID_SMALL_TICK {
        return true;
    }
    if small_tick_gte(timestamp, player.timestamp) {
        return true;
    }
    // Wrap tolerance: a huge backwards jump is really a wrap forward.
    (timestamp as i32 - player.timestamp as i32).abs() > 999
}

pub struct PlayerManager {
    pub player_id: PlayerId,
    players: Vec<Player>,
    /// id -> index; INVALID_PLAYER_ID marks an empty slot.
    player_lookup: Vec<u16>,
    pub received_initial_list: bool,
    attach: AttachArena,
    pub requesting_attach: bool,
    /// Server-time tick of the last outbound position packet.
    last_position_tick: Tick,
    damages: SmallVec<[Damage; MAX_DAMAGE_ENTRIES]>,
    last_send_damage_tick: Tick,
    pub events: EventBus,
}

impl Default for PlayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerManager {
    pub fn new() -> Self {
        Self {
            player_id: INVALID_PLAYER_ID,
            players: Vec::new(),
            player_lookup: vec![INVALID_PLAYER_ID; 0x10000],
            received_initial_list: false,
            attach: AttachArena::new(),
            requesting_attach: false,
            last_position_tick: 0,
            damages: SmallVec::new(),
            last_send_damage_tick: 0,
            events: EventBus::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn index_of(&self, id: PlayerId) -> Option<usize> {
        let idx = self.player_lookup[id as usize];
        (idx != INVALID_PLAYER_ID).then_some(idx as usize)
    }

    pub fn get_player_by_id(&self, id: PlayerId) -> Option<&Player> {
        self.index_of(id).map(|idx| &self.players[idx])
    }

    pub fn get_player_by_id_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        let idx = self.index_of(id)?;
        Some(&mut self.players[idx])
    }

    pub fn get_self(&self) -> Option<&Player> {
        self.get_player_by_id(self.player_id)
    }

    pub fn get_self_mut(&mut self) -> Option<&mut Player> {
        self.get_player_by_id_mut(self.player_id)
    }

    pub fn get_player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn turret_count(&self, id: PlayerId) -> usize {
        match self.get_player_by_id(id) {
            Some(player) => self.attach.iter(player.children).count(),
            None => 0,
        }
    }

    /// Child player ids attached to `id`, front of list first.
    pub fn children_of(&self, id: PlayerId) -> Vec<PlayerId> {
        match self.get_player_by_id(id) {
            Some(player) => self.attach.iter(player.children).map(|(_, pid)| pid).collect(),
            None => Vec::new(),
        }
    }

    // ---- lifecycle handlers ----

    /// The one hard reset: a new self id invalidates the entire table.
    pub fn on_player_id_change(&mut self, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(id) = r.read_u16() else { return };

        self.player_id = id;
        tracing::debug!("player id: {id}");

        self.players.clear();
        self.received_initial_list = false;
        self.player_lookup.fill(INVALID_PLAYER_ID);
    }

    pub fn on_player_enter(
        &mut self,
        conn: &mut Connection,
        weapons: &mut WeaponManager,
        chat: &mut ChatController,
        pkt: &[u8],
    ) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte

        let Some(ship) = r.read_u8() else { return };
        let Some(_audio) = r.read_u8() else { return };
        let Some(name) = r.read_padded_str(20) else { return };
        let Some(squad) = r.read_padded_str(20) else { return };
        let Some(kill_points) = r.read_u32() else { return };
        let Some(flag_points) = r.read_u32() else { return };
        let Some(id) = r.read_u16() else { return };
        let Some(frequency) = r.read_u16() else { return };
        let Some(wins) = r.read_u16() else { return };
        let Some(losses) = r.read_u16() else { return };
        let Some(attach_parent) = r.read_u16() else { return };
        let Some(flags) = r.read_u16() else { return };
        let Some(koth) = r.read_u8() else { return };

        // Some servers send an enter for a player already in the initial
        // list; the stale record goes first.
        if let Some(existing) = self.get_player_by_name(&name) {
            let existing_id = existing.id;
            self.remove_player(conn, weapons, chat, existing_id);
        }

        let mut player = Player {
            id,
            ship,
            frequency,
            squad,
            kill_points,
            flag_points,
            wins,
            losses,
            attach_parent,
            flags,
            koth,
            timestamp: INVALID_SMALL_TICK,
            // Completed clock values so nothing animates on appearance.
            warp_anim_t: ANIM_DURATION_SHIP_WARP,
            explode_anim_t: ANIM_DURATION_SHIP_EXPLODE,
            bombflash_anim_t: ANIM_DURATION_BOMB_FLASH,
            ..Default::default()
        };
        player.name = name;

        let index = self.players.len();
        self.player_lookup[id as usize] = index as u16;
        tracing::info!("{} [{}] entered arena", player.name, id);
        let announce = self.received_initial_list;
        let name_copy = player.name.clone();
        self.players.push(player);

        if attach_parent != INVALID_PLAYER_ID && self.index_of(attach_parent).is_some() {
            self.attach_player(id, attach_parent);
        }

        if announce {
            chat.add_message(ChatKind::Arena, format!("{name_copy} entered arena"));
        }

        self.events.dispatch(GameEvent::PlayerEnter { id, name: name_copy });
    }

    pub fn on_player_leave(
        &mut self,
        conn: &mut Connection,
        weapons: &mut WeaponManager,
        chat: &mut ChatController,
        pkt: &[u8],
    ) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(pid) = r.read_u16() else { return };

        self.remove_player(conn, weapons, chat, pid);
    }

    pub fn remove_player(
        &mut self,
        conn: &mut Connection,
        weapons: &mut WeaponManager,
        chat: &mut ChatController,
        id: PlayerId,
    ) {
        let Some(idx) = self.index_of(id) else { return };

        weapons.clear_weapons(&mut self.players[idx]);
        let name = self.players[idx].name.clone();
        tracing::info!("{name} left arena");

        self.detach_player(conn, id);
        self.detach_all_children(conn, id);

        chat.add_message(ChatKind::Arena, format!("{name} left arena"));
        self.events.dispatch(GameEvent::PlayerLeave { id, name });

        self.swap_remove(id);
    }

    /// Swap-pop `id` out of the dense array and patch both lookup entries.
    fn swap_remove(&mut self, id: PlayerId) {
        let Some(idx) = self.index_of(id) else { return };

        let removed = self.players.swap_remove(idx);
        if idx < self.players.len() {
            self.player_lookup[self.players[idx].id as usize] = idx as u16;
        }
        self.player_lookup[removed.id as usize] = INVALID_PLAYER_ID;
    }

    pub fn on_player_death(&mut self, conn: &mut Connection, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte

        let Some(_green_id) = r.read_u8() else { return };
        let Some(killer_id) = r.read_u16() else { return };
        let Some(killed_id) = r.read_u16() else { return };
        let Some(bounty) = r.read_u16() else { return };
        let Some(flag_transfer) = r.read_u16() else { return };

        let killed_bounty = self.get_player_by_id(killed_id).map(|p| p.bounty);

        if let Some(killed) = self.get_player_by_id_mut(killed_id) {
            // Hidden until a fresh position packet arrives.
            killed.enter_delay =
                conn.settings.enter_delay as f32 / 100.0 + ANIM_DURATION_SHIP_EXPLODE;
            killed.explode_anim_t = 0.0;
            killed.flags = 0;
            killed.flag_timer = 0;
            killed.ball_carrier = false;
            killed.energy = 0.0;
        }

        if killed_bounty.is_some() {
            self.detach_player(conn, killed_id);
            self.detach_all_children(conn, killed_id);
        }

        let self_id = self.player_id;
        if killer_id != killed_id {
            let settings_bounty = conn.settings.bounty_increase_for_kill;
            let flag_drop_delay = conn.settings.flag_drop_delay;
            if let Some(killer) = self.get_player_by_id_mut(killer_id) {
                killer.flags += flag_transfer;
                if flag_transfer > 0 {
                    killer.flag_timer = flag_drop_delay;
                }
                if killer.id == self_id && killed_bounty.is_some_and(|b| b > 0) {
                    killer.bounty += settings_bounty;
                }
            }
        }

        if killed_bounty.is_some() && self.index_of(killer_id).is_some() {
            self.events.dispatch(GameEvent::PlayerDeath {
                killed: killed_id,
                killer: killer_id,
                bounty,
                flag_transfer,
            });
        }
    }

    pub fn on_flag_drop(&mut self, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(pid) = r.read_u16() else { return };

        if let Some(player) = self.get_player_by_id_mut(pid) {
            player.flags = 0;
            player.flag_timer = 0;
        }
    }

    pub fn on_player_frequency_change(
        &mut self,
        conn: &mut Connection,
        weapons: &mut WeaponManager,
        ship_controller: &mut ShipController,
        pkt: &[u8],
    ) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(pid) = r.read_u16() else { return };
        let Some(frequency) = r.read_u16() else { return };

        if self.index_of(pid).is_none() {
            return;
        }

        let ship = self.get_player_by_id(pid).map(|p| p.ship).unwrap_or(SHIP_SPECTATOR);
        let old_freq = self.apply_freq_ship_change(conn, weapons, pid, frequency, ship);

        self.events.dispatch(GameEvent::PlayerFreqAndShipChange {
            id: pid,
            old_frequency: old_freq,
            new_frequency: frequency,
            old_ship: ship,
            new_ship: ship,
        });

        if pid == self.player_id {
            ship_controller.reset_ship(&conn.settings.ship_settings[(ship as usize).min(7)]);
            self.spawn(conn, true);
        }
    }

    pub fn on_player_freq_and_ship_change(
        &mut self,
        conn: &mut Connection,
        weapons: &mut WeaponManager,
        ship_controller: &mut ShipController,
        pkt: &[u8],
    ) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(ship) = r.read_u8() else { return };
        let Some(pid) = r.read_u16() else { return };
        let Some(frequency) = r.read_u16() else { return };

        if self.index_of(pid).is_none() {
            return;
        }

        let old_ship = self.get_player_by_id(pid).map(|p| p.ship).unwrap_or(SHIP_SPECTATOR);
        let old_freq = self.apply_freq_ship_change(conn, weapons, pid, frequency, ship);

        // Respawn before dispatch so listeners see the post-spawn position
        // and the next outbound packet broadcasts the new ship from it.
        if pid == self.player_id {
            ship_controller.reset_ship(&conn.settings.ship_settings[(ship as usize).min(7)]);
            self.spawn(conn, true);
        }

        self.events.dispatch(GameEvent::PlayerFreqAndShipChange {
            id: pid,
            old_frequency: old_freq,
            new_frequency: frequency,
            old_ship,
            new_ship: ship,
        });
    }

    /// Shared core of both change handlers: cascade detach, zero motion and
    /// combat state, clear weapons. Returns the old frequency.
    fn apply_freq_ship_change(
        &mut self,
        conn: &mut Connection,
        weapons: &mut WeaponManager,
        pid: PlayerId,
        frequency: u16,
        ship: u8,
    ) -> u16 {
        self.detach_player(conn, pid);
        self.detach_all_children(conn, pid);

        let Some(player) = self.get_player_by_id_mut(pid) else { return frequency };

        let old_freq = player.frequency;

        player.ship = ship;
        player.frequency = frequency;
        player.velocity = Vec2::ZERO;
        player.lerp_time = 0.0;
        player.warp_anim_t = 0.0;
        player.enter_delay = 0.0;
        player.flags = 0;
        player.ball_carrier = false;
        player.energy = 0.0;

        weapons.clear_weapons(player);

        old_freq
    }

    // ---- position packets ----

    pub fn on_large_position(&mut self, conn: &mut Connection, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte

        let Some(direction) = r.read_u8() else { return };
        let Some(timestamp) = r.read_u16() else { return };
        let Some(x) = r.read_u16() else { return };
        let Some(vel_y_raw) = r.read_i16() else { return };
        let Some(pid) = r.read_u16() else { return };

        // Splice the 16-bit stamp against the server tick's high bits.
        let server_timestamp = (conn.server_tick() & 0x7FFF_0000) | timestamp as u32;
        let local_timestamp = server_timestamp.wrapping_sub(conn.time_diff as u32);

        // Throw away bad timestamps so the player doesn't get desynchronized.
        if tick_diff(local_timestamp, conn.current_tick) >= 300 {
            return;
        }

        let Some(idx) = self.index_of(pid) else { return };
        if !is_newer_position_packet(&self.players[idx], timestamp) {
            return;
        }

        let Some(vel_x_raw) = r.read_i16() else { return };
        let Some(_checksum) = r.read_u8() else { return };
        let Some(togglables) = r.read_u8() else { return };
        let Some(ping) = r.read_u8() else { return };
        let Some(y) = r.read_u16() else { return };
        let Some(bounty) = r.read_u16() else { return };
        let Some(weapon) = r.read_u16() else { return };

        let size = r.total_len();
        let is_self = pid == self.player_id;
        let current_tick = conn.current_tick;

        if weapon != 0 {
            conn.weapons_received += 1;
        }

        let player = &mut self.players[idx];
        player.orientation = direction as f32 / 40.0;
        player.togglables = togglables;
        player.ping = ping as u32;
        player.bounty = bounty;
        player.weapon = WeaponData(weapon);

        if togglables & status::FLASH != 0 {
            player.warp_anim_t = 0.0;
        }

        // Never force-set our own energy or latency from an echo.
        if !is_self {
            if size >= 23 {
                player.last_extra_timestamp = current_tick;
                player.energy = r.read_u16().unwrap_or(0) as f32;
            }
            if size >= 25 {
                player.s2c_latency = r.read_u16().unwrap_or(0);
            }
            if size >= 27 {
                player.flag_timer = r.read_u16().unwrap_or(0);
            }
            if size >= 31 {
                player.items = r.read_u32().unwrap_or(0);
            }
        }

        let diff = timestamp_diff(conn, server_timestamp);
        player.timestamp = timestamp;
        player.ping += diff as u32;
        let sim_ticks = player.ping as i32;

        let velocity = Vec2::new(
            vel_x_raw as f32 / 16.0 / 10.0,
            vel_y_raw as f32 / 16.0 / 10.0,
        );
        let position = Vec2::new(x as f32 / 16.0, y as f32 / 16.0);

        self.on_position_packet(conn, idx, position, velocity, sim_ticks);
    }

    pub fn on_small_position(&mut self, conn: &mut Connection, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte

        let Some(direction) = r.read_u8() else { return };
        let Some(timestamp) = r.read_u16() else { return };
        let Some(x) = r.read_u16() else { return };
        let Some(ping) = r.read_u8() else { return };
        let Some(bounty) = r.read_u8() else { return };
        // A single byte on the wire; ids above 255 cannot appear here.
        let Some(pid_byte) = r.read_u8() else { return };
        let pid = pid_byte as PlayerId;
        tracing::trace!("small position for pid {pid}");

        let server_timestamp = (conn.server_tick() & 0x7FFF_0000) | timestamp as u32;
        let local_timestamp = server_timestamp.wrapping_sub(conn.time_diff as u32);

        if tick_diff(local_timestamp, conn.current_tick) >= 300 {
            return;
        }

        let Some(idx) = self.index_of(pid) else { return };
        if !is_newer_position_packet(&self.players[idx], timestamp) {
            return;
        }

        let Some(togglables) = r.read_u8() else { return };
        let Some(vel_y_raw) = r.read_i16() else { return };
        let Some(y) = r.read_u16() else { return };
        let Some(vel_x_raw) = r.read_i16() else { return };

        let size = r.total_len();
        let is_self = pid == self.player_id;
        let current_tick = conn.current_tick;

        let player = &mut self.players[idx];
        player.orientation = direction as f32 / 40.0;
        player.ping = ping as u32;
        player.bounty = bounty as u16;
        player.togglables = togglables;

        if togglables & status::FLASH != 0 {
            player.warp_anim_t = 0.0;
        }

        if !is_self {
            if size >= 18 {
                player.last_extra_timestamp = current_tick;
                player.energy = r.read_u16().unwrap_or(0) as f32;
            }
            if size >= 20 {
                player.s2c_latency = r.read_u16().unwrap_or(0);
            }
            if size >= 22 {
                player.flag_timer = r.read_u16().unwrap_or(0);
            }
            if size >= 26 {
                player.items = r.read_u32().unwrap_or(0);
            }
        }

        let diff = timestamp_diff(conn, server_timestamp);
        player.timestamp = timestamp;
        player.ping += diff as u32;
        let sim_ticks = player.ping as i32;

        let velocity = Vec2::new(
            vel_x_raw as f32 / 16.0 / 10.0,
            vel_y_raw as f32 / 16.0 / 10.0,
        );
        let position = Vec2::new(x as f32 / 16.0, y as f32 / 16.0);

        self.on_position_packet(conn, idx, position, velocity, sim_ticks);
    }

    pub fn on_batched_large_position(&mut self, conn: &mut Connection, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte

        while r.remaining() >= BatchedLargeRecord::SIZE {
            let Some(record) = BatchedLargeRecord::decode(&mut r) else { return };
            self.apply_batched(conn, record.pid, Some(record.togglables), record.motion);
        }
    }

    pub fn on_batched_small_position(&mut self, conn: &mut Connection, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte

        while r.remaining() >= BatchedSmallRecord::SIZE {
            let Some(record) = BatchedSmallRecord::decode(&mut r) else { return };
            self.apply_batched(conn, record.pid as PlayerId, None, record.motion);
        }
    }

    /// Shared tail of both batched handlers: splice the 10-bit stamp, gate,
    /// apply, reconcile. Each record is independently timestamp-gated.
    fn apply_batched(
        &mut self,
        conn: &Connection,
        pid: PlayerId,
        togglables: Option<u8>,
        motion: crate::net::protocol::BatchedMotion,
    ) {
        let server_timestamp = (conn.server_tick() & 0x7FFF_FC00) | motion.timestamp as u32;
        let local_timestamp = server_timestamp.wrapping_sub(conn.time_diff as u32);
        let timestamp = (server_timestamp & 0xFFFF) as u16;

        if tick_diff(local_timestamp, conn.current_tick) >= 300 {
            return;
        }

        let Some(idx) = self.index_of(pid) else { return };
        if !is_newer_position_packet(&self.players[idx], timestamp) {
            return;
        }

        let sim_ticks = timestamp_diff(conn, server_timestamp);

        let player = &mut self.players[idx];
        player.timestamp = timestamp;
        player.orientation = motion.direction as f32 / 40.0;
        if let Some(bits) = togglables {
            // Keep the top two bits; batched records never carry them.
            player.togglables = bits | (player.togglables & status::LOCAL_MASK);
        }

        let position = Vec2::new(motion.x as f32 / 16.0, motion.y as f32 / 16.0);
        let velocity = Vec2::new(
            motion.vel_x as f32 / 16.0 / 10.0,
            motion.vel_y as f32 / 16.0 / 10.0,
        );

        self.on_position_packet(conn, idx, position, velocity, sim_ticks);
    }

    /// Reconciles one accepted position report: hard-set to the reported
    /// state, extrapolate `sim_ticks` forward one tick at a time, then either
    /// snap (large error or fresh warp) or schedule a 200ms blend.
    pub fn on_position_packet(
        &mut self,
        conn: &Connection,
        idx: usize,
        position: Vec2,
        velocity: Vec2,
        sim_ticks: i32,
    ) {
        let is_self = self.players[idx].id == self.player_id;

        // Dead self gets teleported around by some servers; ignore it.
        if is_self && self.players[idx].enter_delay > 0.0 {
            return;
        }

        let previous_pos = self.players[idx].position;

        {
            let player = &mut self.players[idx];
            player.position = position;
            player.velocity = velocity;
            player.lerp_time = 0.0;
        }

        // Per-tick steps keep the integrator stable over ping-sized windows.
        for _ in 0..sim_ticks {
            self.simulate(conn, idx, 1.0 / 100.0, true);
        }

        let player = &mut self.players[idx];
        let projected_pos = player.position;
        player.position = previous_pos;

        let abs_dx = (projected_pos.x - player.position.x).abs();
        let abs_dy = (projected_pos.y - player.position.y).abs();

        if abs_dx >= 4.0 || abs_dy >= 4.0 || player.togglables & status::FLASH != 0 {
            player.position = projected_pos;
            player.lerp_time = 0.0;

            if player.togglables & status::FLASH != 0 && previous_pos != Vec2::ZERO {
                player.togglables &= !status::FLASH;
            }
        } else {
            player.lerp_time = 0.2;
            player.lerp_velocity = (projected_pos - player.position) * (1.0 / 0.2);
        }

        if is_self {
            let ship = (self.players[idx].ship as usize).min(7);
            let radius = conn.settings.ship_settings[ship].radius();
            physics::unstuck(&mut self.players[idx], &conn.map, radius);

            let id = self.players[idx].id;
            let position = self.players[idx].position;
            self.events.dispatch(GameEvent::Teleport { id, position });
        }
    }

    pub fn on_set_coordinates(
        &mut self,
        conn: &mut Connection,
        ship_controller: &ShipController,
        pkt: &[u8],
    ) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(x) = r.read_u16() else { return };
        let Some(y) = r.read_u16() else { return };

        let Some(idx) = self.index_of(self.player_id) else { return };

        {
            let player = &mut self.players[idx];
            player.position = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            player.velocity = Vec2::ZERO;
            player.togglables |= status::FLASH;
            player.warp_anim_t = 0.0;

            let ship = (player.ship as usize).min(7);
            let radius = conn.settings.ship_settings[ship].radius();
            physics::unstuck(player, &conn.map, radius);
        }

        let id = self.players[idx].id;
        let position = self.players[idx].position;
        self.events.dispatch(GameEvent::Teleport { id, position });

        // Safety-tile bookkeeping is driven by where we actually landed.
        let on_safe = conn.map.tile_id(position) == TILE_ID_SAFE;
        let was_safe = self.players[idx].togglables & status::SAFETY != 0;
        if on_safe {
            if !was_safe {
                self.events.dispatch(GameEvent::SafeEnter { position });
            }
            self.players[idx].togglables |= status::SAFETY;
        } else {
            if was_safe {
                self.events.dispatch(GameEvent::SafeLeave { position });
            }
            self.players[idx].togglables &= !status::SAFETY;
        }

        self.send_position_packet(conn, ship_controller);
    }

    // ---- attachment ----

    /// Locally links `requester` under `destination`: pushes a node onto the
    /// parent's child list and records the parent on the child.
    pub fn attach_player(&mut self, requester: PlayerId, destination: PlayerId) {
        let Some(req_idx) = self.index_of(requester) else { return };
        let Some(dest_idx) = self.index_of(destination) else { return };

        self.players[req_idx].attach_parent = destination;

        let head = self.players[dest_idx].children;
        let link = self.attach.acquire(requester, head);
        self.players[dest_idx].children = link;
    }

    pub fn on_create_turret_link(&mut self, conn: &mut Connection, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(request_id) = r.read_u16() else { return };

        // Short form is a release notice for self.
        if pkt.len() < 5 {
            let self_id = self.player_id;
            if self.index_of(self_id).is_some() {
                self.detach_player(conn, self_id);
            }
            return;
        }

        let Some(destination_id) = r.read_u16() else { return };

        if self.index_of(request_id).is_some() && destination_id == INVALID_PLAYER_ID {
            self.detach_player(conn, request_id);
            return;
        }

        if self.index_of(request_id).is_none() || self.index_of(destination_id).is_none() {
            return;
        }

        if request_id == self.player_id {
            let already_linked = self
                .get_self()
                .is_some_and(|s| s.attach_parent == destination_id);

            // Confirmation of our own pending request: just take the energy
            // cost, the link already exists locally.
            if already_linked {
                if self.requesting_attach {
                    if let Some(self_player) = self.get_self_mut() {
                        self_player.energy *= 0.333;
                    }
                    self.requesting_attach = false;
                    self.events.dispatch(GameEvent::PlayerAttach {
                        child: request_id,
                        parent: destination_id,
                    });
                }
                return;
            }
        }

        self.attach_player(request_id, destination_id);
        self.events.dispatch(GameEvent::PlayerAttach {
            child: request_id,
            parent: destination_id,
        });

        // A newly linked remote turret inherits its carrier's motion so it
        // doesn't visually jump to the old position.
        if request_id != self.player_id {
            let dest_idx = self.index_of(destination_id).unwrap_or(0);
            let (position, velocity, lerp_velocity, lerp_time) = {
                let dest = &self.players[dest_idx];
                (dest.position, dest.velocity, dest.lerp_velocity, dest.lerp_time)
            };
            if let Some(requester) = self.get_player_by_id_mut(request_id) {
                requester.position = position;
                requester.velocity = velocity;
                requester.lerp_velocity = lerp_velocity;
                requester.lerp_time = lerp_time;
            }
        }
    }

    pub fn on_destroy_turret_link(&mut self, conn: &mut Connection, pkt: &[u8]) {
        let mut r = PacketReader::new(pkt);
        let _ = r.read_u8(); // type byte
        let Some(pid) = r.read_u16() else { return };

        if self.index_of(pid).is_none() {
            return;
        }

        let detach_self = self
            .get_self()
            .is_some_and(|s| s.attach_parent == pid && s.enter_delay <= 0.0);
        if detach_self {
            self.requesting_attach = false;
            conn.send_attach_request(INVALID_PLAYER_ID);
        }

        self.detach_all_children(conn, pid);
    }

    /// Unlinks `id` from its parent, recycling the node and resetting the
    /// child's sync so it stays hidden until the next position packet.
    pub fn detach_player(&mut self, conn: &mut Connection, id: PlayerId) {
        let Some(idx) = self.index_of(id) else { return };
        let parent_id = self.players[idx].attach_parent;
        if parent_id == INVALID_PLAYER_ID {
            return;
        }

        if id == self.player_id {
            self.requesting_attach = false;
            conn.send_attach_request(INVALID_PLAYER_ID);
        }

        if let Some(parent_idx) = self.index_of(parent_id) {
            let mut current = self.players[parent_idx].children;
            let mut prev = ATTACH_NIL;

            while current != ATTACH_NIL {
                let node = *self.attach.get(current);
                if node.player_id == id {
                    if prev == ATTACH_NIL {
                        self.players[parent_idx].children = node.next;
                    } else {
                        self.attach.get_mut(prev).next = node.next;
                    }
                    self.attach.release(current);
                    break;
                }
                prev = current;
                current = node.next;
            }

            self.events.dispatch(GameEvent::PlayerDetach {
                child: id,
                parent: parent_id,
            });
        }

        let player = &mut self.players[idx];
        player.attach_parent = INVALID_PLAYER_ID;
        player.timestamp = INVALID_SMALL_TICK;
    }

    /// Unlinks every turret riding `id`. Children drop their sync; if self
    /// was among them, the pending request is cancelled on the wire.
    pub fn detach_all_children(&mut self, conn: &mut Connection, id: PlayerId) {
        let Some(idx) = self.index_of(id) else { return };

        let self_id = self.player_id;
        let links: Vec<(u32, PlayerId)> = self.attach.iter(self.players[idx].children).collect();

        for (link, child_id) in links {
            let mut cancel_own_request = false;

            if let Some(child) = self.get_player_by_id_mut(child_id) {
                if child.attach_parent == id {
                    child.attach_parent = INVALID_PLAYER_ID;
                    child.timestamp = INVALID_SMALL_TICK;
                    cancel_own_request = child_id == self_id;
                }
            }

            if cancel_own_request {
                self.requesting_attach = false;
                conn.send_attach_request(INVALID_PLAYER_ID);
            }

            self.attach.release(link);
        }

        self.players[idx].children = ATTACH_NIL;
    }

    /// Tries to attach self to `destination`, enforcing every precondition
    /// in protocol order. On success the request is on the wire, the local
    /// link exists, and a brief self-antiwarp settles the ship.
    pub fn attach_self(
        &mut self,
        conn: &mut Connection,
        ship_controller: &mut ShipController,
        soccer: &Soccer,
        radar: &Radar,
        destination: PlayerId,
    ) -> AttachRequestResponse {
        let Some(dest_idx) = self.index_of(destination) else {
            return AttachRequestResponse::NoDestination;
        };

        if soccer.is_carrying_ball() {
            return AttachRequestResponse::CarryingBall;
        }

        let Some(self_player) = self.get_self() else {
            return AttachRequestResponse::UnrecoverableError;
        };
        let self_id = self_player.id;
        let self_parent = self_player.attach_parent;
        let self_children = self_player.children;
        let self_energy = self_player.energy;
        let self_bounty = self_player.bounty;
        let self_ship = self_player.ship;
        let self_frequency = self_player.frequency;

        if self_parent != INVALID_PLAYER_ID {
            conn.send_attach_request(INVALID_PLAYER_ID);
            self.detach_player(conn, self_id);
            return AttachRequestResponse::DetachFromParent;
        }

        if self_children != ATTACH_NIL {
            conn.send_attach_drop();
            return AttachRequestResponse::DetachChildren;
        }

        if self_energy < ship_controller.ship.energy as f32 {
            return AttachRequestResponse::NotEnoughEnergy;
        }

        let src_settings = &conn.settings.ship_settings[(self_ship as usize).min(7)];
        if self_bounty < src_settings.attach_bounty {
            return AttachRequestResponse::BountyTooLow;
        }

        if self_id == destination {
            return AttachRequestResponse::SelfTarget;
        }

        let dest = &self.players[dest_idx];
        if self_frequency != dest.frequency {
            return AttachRequestResponse::Frequency;
        }

        if dest.ship >= SHIP_SPECTATOR {
            return AttachRequestResponse::Spectator;
        }

        let dest_settings = &conn.settings.ship_settings[dest.ship as usize];
        if dest_settings.turret_limit == 0 {
            return AttachRequestResponse::TargetShipNotAttachable;
        }

        if self.turret_count(destination) >= dest_settings.turret_limit as usize {
            return AttachRequestResponse::TooManyTurrets;
        }

        if self.is_antiwarped(conn, ship_controller, radar) {
            return AttachRequestResponse::Antiwarped;
        }

        conn.send_attach_request(destination);
        ship_controller.ship.fake_antiwarp_end_tick =
            make_tick(conn.current_tick.wrapping_add(conn.settings.antiwarp_settle_delay));

        self.attach_player(self_id, destination);
        self.requesting_attach = true;

        AttachRequestResponse::Success
    }

    /// Whether self sits inside any live enemy antiwarp field (or the
    /// self-imposed one that follows an attach request).
    pub fn is_antiwarped(
        &self,
        conn: &Connection,
        ship_controller: &ShipController,
        radar: &Radar,
    ) -> bool {
        let Some(self_player) = self.get_self() else { return false };

        if ship_controller.is_fake_antiwarped(conn.current_tick) {
            return true;
        }

        let antiwarp_tiles = conn.settings.antiwarp_pixels as f32 / 16.0;
        let range_sq = antiwarp_tiles * antiwarp_tiles;

        for player in &self.players {
            if player.ship >= SHIP_SPECTATOR {
                continue;
            }
            if player.enter_delay > 0.0 {
                continue;
            }
            if player.frequency == self_player.frequency {
                continue;
            }
            if player.togglables & status::ANTIWARP == 0 {
                continue;
            }
            if !radar.in_radar_view(player.position) {
                continue;
            }

            if player.position.distance_sq_to(self_player.position) <= range_sq {
                return true;
            }
        }

        false
    }

    // ---- spawn ----

    /// Picks a spawn position per the arena's spawn tables (or the radar-mode
    /// distribution when none exist), then flags the warp. Callers that want
    /// a full ship reset do it through the ship controller first.
    pub fn spawn(&mut self, conn: &Connection, _reset: bool) {
        let Some(idx) = self.index_of(self.player_id) else { return };

        let ship = (self.players[idx].ship as usize).min(7);
        let ship_radius = conn.settings.ship_settings[ship].radius();
        let frequency = self.players[idx].frequency;
        let player_count = self.players.len() as u32;

        let spawn_count = conn
            .settings
            .spawn_settings
            .iter()
            .filter(|s| !s.is_empty())
            .count() as u32;

        // Name-salted seed keeps co-started bots from stacking.
        let hash = crate::util::rng::hash_name(&self.players[idx].name);
        let mut thread_rng = rand::thread_rng();
        let rand_seed = thread_rng.gen::<u32>().wrapping_add(hash);

        let mut position;

        if spawn_count == 0 {
            // Default to the map center if nothing below fits.
            position = Vec2::new(512.0, 512.0);

            for _ in 0..100 {
                let candidate = match conn.settings.radar_mode {
                    1 | 3 => {
                        let mut rng = crate::util::rng::VieRng::new(rand_seed as i32);
                        let rng_x = (rng.next() & 0xFF) as i32;
                        let rng_y = (rng.next() & 0xFF) as i32;

                        let x = (frequency & 1) as i32 * 0x300 + rng_x;
                        let y = rng_y + 0x100;
                        Vec2::new(x as f32, y as f32)
                    }
                    2 | 4 => {
                        let mut rng = crate::util::rng::VieRng::new(rand_seed as i32);
                        let rng_x = (rng.next() & 0xFF) as i32;
                        let rng_y = (rng.next() & 0xFF) as i32;

                        let x = (frequency & 1) as i32 * 0x300 + rng_x;
                        let y = ((frequency as i32 / 2) & 1) * 0x300 + rng_y;
                        Vec2::new(x as f32, y as f32)
                    }
                    _ => {
                        let mut spawn_radius = ((player_count / 8) * 0x2000 + 0x400) / 0x60 + 0x100;

                        if spawn_radius > conn.settings.warp_radius_limit as u32 {
                            spawn_radius = conn.settings.warp_radius_limit as u32;
                        }
                        if spawn_radius < 3 {
                            spawn_radius = 3;
                        }

                        let mut rng = crate::util::rng::VieRng::new(rand_seed as i32);
                        let span = (spawn_radius - 2).max(1) as i32;
                        let base = ((0x400 - spawn_radius as i32) / 2) - 9;
                        let x = rng.next() % span + base + (thread_rng.gen::<u32>() % 0x14) as i32;
                        let y = rng.next() % span + base + (thread_rng.gen::<u32>() % 0x14) as i32;
                        Vec2::new(x as f32, y as f32)
                    }
                };

                if !(0.0..1024.0).contains(&candidate.x) || !(0.0..1024.0).contains(&candidate.y) {
                    continue;
                }

                if conn.map.can_fit(candidate, ship_radius, frequency) {
                    position = candidate;
                    break;
                }
            }
        } else {
            let spawn_index = (frequency as u32 % spawn_count) as usize;
            let entry = conn.settings.spawn_settings[spawn_index];

            let mut x_center = entry.x as f32;
            let mut y_center = entry.y as f32;
            let radius = entry.radius as i32;

            if x_center == 0.0 {
                x_center = 512.0;
            } else if x_center < 0.0 {
                x_center += 1024.0;
            }
            if y_center == 0.0 {
                y_center = 512.0;
            } else if y_center < 0.0 {
                y_center += 1024.0;
            }

            // Exact center when no sampled offset fits.
            position = Vec2::new(x_center, y_center);

            if radius > 0 {
                for _ in 0..100 {
                    let xrand = thread_rng.gen::<u32>().wrapping_add(hash);
                    let yrand = thread_rng.gen::<u32>().wrapping_add(hash);

                    let x_offset = (xrand % (radius as u32 * 2)) as i32 - radius;
                    let y_offset = (yrand % (radius as u32 * 2)) as i32 - radius;

                    let candidate =
                        Vec2::new(x_center + x_offset as f32, y_center + y_offset as f32);

                    if conn.map.can_fit(candidate, ship_radius, frequency) {
                        position = candidate;
                        break;
                    }
                }
            }
        }

        let player = &mut self.players[idx];
        player.position = position;
        player.togglables |= status::FLASH;
        player.warp_anim_t = 0.0;
        player.velocity = Vec2::ZERO;

        let id = player.id;
        self.events.dispatch(GameEvent::Spawn { id, position });
    }

    // ---- per-frame update ----

    /// One simulation step for player `idx`, including the self-only wormhole
    /// transit. Also used per-tick by the reconciler with `extrapolating`.
    fn simulate(&mut self, conn: &Connection, idx: usize, dt: f32, extrapolating: bool) {
        let current_tick = conn.current_tick;
        physics::simulate_player(
            &mut self.players[idx],
            dt,
            extrapolating,
            &conn.map,
            &conn.settings,
            current_tick,
        );

        let player = &self.players[idx];
        if player.id == self.player_id
            && conn.map.tile_id(player.position) == TILE_ID_WORMHOLE
        {
            let energy = self.players[idx].energy;
            let energy_cost = energy * 0.8;

            if conn.report_damage {
                self.push_damage(
                    conn,
                    self.player_id,
                    WeaponData::from_kind(WeaponKind::Wormhole),
                    energy as i32,
                    energy_cost as i32,
                );
            }

            self.spawn(conn, false);

            let player = &mut self.players[idx];
            player.velocity = Vec2::ZERO;
            if player.energy > energy_cost {
                player.energy -= energy_cost;
            } else {
                player.energy = 1.0;
            }
        }
    }

    /// Frame update: simulate every shipped player, advance animation and
    /// respawn clocks, keep the outbound position cadence, and flush damage.
    pub fn update(
        &mut self,
        conn: &mut Connection,
        ship_controller: &mut ShipController,
        dt: f32,
    ) {
        let current_tick = conn.current_tick;
        if self.index_of(self.player_id).is_none() {
            return;
        }

        for idx in 0..self.players.len() {
            if self.players[idx].ship >= SHIP_SPECTATOR {
                continue;
            }

            self.simulate(conn, idx, dt, false);

            let is_self = self.players[idx].id == self.player_id;
            let mut respawn_self = false;

            {
                let player = &mut self.players[idx];
                player.explode_anim_t += dt;
                player.warp_anim_t += dt;
                player.bombflash_anim_t += dt;

                if player.enter_delay > 0.0 {
                    player.enter_delay -= dt;

                    if player.explode_anim_t >= ANIM_DURATION_SHIP_EXPLODE {
                        if !is_self {
                            // Park the wreck off-map until it respawns.
                            player.position = Vec2::ZERO;
                            player.lerp_time = 0.0;
                        }
                        player.velocity = Vec2::ZERO;
                    }

                    if is_self && player.enter_delay <= 0.0 {
                        if conn.settings.enter_delay > 0 {
                            respawn_self = true;
                        } else {
                            player.energy = 1.0;
                        }
                    }
                }
            }

            if respawn_self {
                let ship = (self.players[idx].ship as usize).min(7);
                ship_controller.reset_ship(&conn.settings.ship_settings[ship]);
                self.spawn(conn, true);
                self.players[idx].warp_anim_t = 0.0;
            }
        }

        let mut position_delay: i32 = 100;
        if let Some(self_player) = self.get_self() {
            if self_player.ship != SHIP_SPECTATOR {
                position_delay = conn.settings.send_position_delay.max(5);
                if self_player.enter_delay > 0.0 {
                    position_delay = 50;
                }
            }
        }

        let server_timestamp = conn.server_tick();
        if conn.login_state == LoginState::Complete
            && conn.joined_arena
            && tick_diff(server_timestamp, self.last_position_tick).abs() >= position_delay
        {
            self.send_position_packet(conn, ship_controller);
        }

        if !self.damages.is_empty() && tick_diff(current_tick, self.last_send_damage_tick) >= 10 {
            conn.send_damage(&self.damages);
            self.damages.clear();
            self.last_send_damage_tick = current_tick;
        }
    }

    /// Records damage for the next flush. Silently drops when the ring is full.
    pub fn push_damage(
        &mut self,
        conn: &Connection,
        shooter_id: PlayerId,
        weapon: WeaponData,
        energy: i32,
        damage: i32,
    ) {
        if self.damages.len() >= MAX_DAMAGE_ENTRIES {
            return;
        }

        self.damages.push(Damage {
            timestamp: conn.server_tick(),
            shooter_id,
            weapon,
            energy: energy as i16,
            damage: damage as i16,
        });
    }

    pub fn damage_queue_len(&self) -> usize {
        self.damages.len()
    }

    /// Builds and queues the outgoing position packet; keeps the outbound
    /// timestamp strictly monotonic and handles the attached special cases.
    pub fn send_position_packet(
        &mut self,
        conn: &mut Connection,
        ship_controller: &ShipController,
    ) {
        let Some(idx) = self.index_of(self.player_id) else { return };

        let (mut packet, attach_parent, flag_timer) = {
            let player = &self.players[idx];
            let packet = OutboundPosition {
                direction: (player.orientation * 40.0) as u8,
                timestamp: 0,
                vel_x: (player.velocity.x * 16.0 * 10.0) as i16 as u16,
                vel_y: (player.velocity.y * 16.0 * 10.0) as i16 as u16,
                x: (player.position.x * 16.0) as u16,
                y: (player.position.y * 16.0) as u16,
                togglables: player.togglables,
                bounty: player.bounty,
                energy: player.energy as u16,
                weapon: player.weapon.0,
                extra: None,
            };
            (packet, player.attach_parent, player.flag_timer)
        };

        // Dead in a ship: the sentinel packet hides us server-side.
        {
            let player = &self.players[idx];
            if player.ship != SHIP_SPECTATOR && player.enter_delay > 0.0 {
                packet.x = 0xFFFF;
                packet.y = 0xFFFF;
                packet.vel_x = 0;
                packet.vel_y = 0;
                packet.direction = 0;
                packet.togglables = 0x80;
                packet.energy = 0;
                packet.bounty = 0;
                packet.weapon = 0;
            }
        }

        let mut server_timestamp = conn.server_tick();

        if attach_parent != INVALID_PLAYER_ID {
            packet.vel_x = 0;
            packet.vel_y = 0;

            match self.index_of(attach_parent) {
                Some(parent_idx) => {
                    // Hold position traffic until the attach request lands.
                    if !self.players[parent_idx].is_synchronized() {
                        self.last_position_tick = server_timestamp;
                        return;
                    }

                    // First packet after the parent synced: the attach went
                    // through, pay the energy cost. The packet keeps the
                    // energy snapshot taken at entry; the reduced value
                    // first goes out with the next frame.
                    if self.requesting_attach {
                        self.players[idx].energy *= 0.333;
                        self.requesting_attach = false;
                        self.events.dispatch(GameEvent::PlayerAttach {
                            child: self.player_id,
                            parent: attach_parent,
                        });
                    }

                    let parent = &self.players[parent_idx];
                    packet.vel_x = (parent.velocity.x * 16.0 * 10.0) as i16 as u16;
                    packet.vel_y = (parent.velocity.y * 16.0 * 10.0) as i16 as u16;
                }
                None => {
                    self.players[idx].attach_parent = INVALID_PLAYER_ID;
                    self.requesting_attach = false;
                }
            }
        }

        // Bump past the last send: the server drops non-increasing stamps.
        if tick_diff(server_timestamp, self.last_position_tick) <= 0 {
            server_timestamp = make_tick(self.last_position_tick.wrapping_add(1));
        }
        packet.timestamp = server_timestamp;

        if conn.extra_position_info || conn.settings.extra_position_data {
            let ship = &ship_controller.ship;
            packet.extra = Some(PositionExtra {
                energy: packet.energy,
                ping: (conn.ping_ms / 10) as u16,
                flag_timer: flag_timer / 100,
                items: ItemCounts {
                    shields: false,
                    super_power: false,
                    bursts: ship.bursts,
                    repels: ship.repels,
                    thors: ship.thors,
                    bricks: ship.bricks,
                    decoys: ship.decoys,
                    rockets: ship.rockets,
                    portals: ship.portals,
                },
            });
        }

        conn.send(packet.encode());
        self.last_position_tick = server_timestamp;
        self.players[idx].togglables &= !status::FLASH;
    }

    pub fn last_position_tick(&self) -> Tick {
        self.last_position_tick
    }
}
