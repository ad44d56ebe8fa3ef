//! Server link state and the outbound packet surface.
//!
//! The socket, encryption, and login handshake live behind this struct; the
//! simulation only sees tick offsets, latency, the arena settings the server
//! pushed, and a queue of datagrams waiting to be flushed by the transport.

use std::collections::VecDeque;

use crate::clock::{make_tick, Tick};
use crate::config::ServerSettings;
use crate::game::player::PlayerId;
use crate::game::weapons::Damage;
use crate::map::Map;
use crate::net::codec::PacketWriter;
use crate::net::protocol::c2s;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Disconnected,
    Connecting,
    Complete,
}

#[derive(Debug)]
pub struct Connection {
    /// Local tick, advanced once per frame by the bot loop.
    pub current_tick: Tick,
    /// Server tick minus local tick.
    pub time_diff: i32,
    /// Round-trip latency, milliseconds.
    pub ping_ms: u32,
    pub login_state: LoginState,
    pub joined_arena: bool,
    /// Client opted into extended position data.
    pub extra_position_info: bool,
    /// Whether taken damage is reported back to the server.
    pub report_damage: bool,
    /// Count of position packets that carried a live weapon word.
    pub weapons_received: u32,
    pub settings: ServerSettings,
    pub map: Map,

    outbound: VecDeque<Vec<u8>>,
}

impl Connection {
    pub fn new(settings: ServerSettings, map: Map) -> Self {
        Self {
            current_tick: 0,
            time_diff: 0,
            ping_ms: 0,
            login_state: LoginState::Disconnected,
            joined_arena: false,
            extra_position_info: false,
            report_damage: false,
            weapons_received: 0,
            settings,
            map,
            outbound: VecDeque::new(),
        }
    }

    /// Current tick translated into server time.
    pub fn server_tick(&self) -> Tick {
        make_tick(self.current_tick.wrapping_add(self.time_diff as u32))
    }

    /// Queues a datagram for the transport to flush.
    pub fn send(&mut self, data: Vec<u8>) {
        self.outbound.push_back(data);
    }

    /// Drains everything queued since the last flush.
    pub fn take_outbound(&mut self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.outbound.drain(..)
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Asks the server to attach to `target`; `INVALID_PLAYER_ID` cancels.
    pub fn send_attach_request(&mut self, target: PlayerId) {
        let mut w = PacketWriter::new();
        w.write_u8(c2s::ATTACH_REQUEST).write_u16(target);
        self.send(w.into_vec());
    }

    /// Tells the server to shed every turret riding us.
    pub fn send_attach_drop(&mut self) {
        let mut w = PacketWriter::new();
        w.write_u8(c2s::ATTACH_DROP);
        self.send(w.into_vec());
    }

    pub fn send_ship_request(&mut self, ship: u8) {
        let mut w = PacketWriter::new();
        w.write_u8(c2s::SET_SHIP).write_u8(ship);
        self.send(w.into_vec());
    }

    /// Flushes a batch of damage entries.
    pub fn send_damage(&mut self, damages: &[Damage]) {
        if damages.is_empty() {
            return;
        }

        let mut w = PacketWriter::new();
        w.write_u8(c2s::DAMAGE).write_u8(damages.len() as u8);
        for damage in damages {
            damage.encode(&mut w);
        }
        self.send(w.into_vec());
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(ServerSettings::default(), Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::weapons::{WeaponData, WeaponKind};

    #[test]
    fn test_server_tick_applies_offset() {
        let mut conn = Connection::default();
        conn.current_tick = 1000;
        conn.time_diff = 250;
        assert_eq!(conn.server_tick(), 1250);

        conn.time_diff = -500;
        assert_eq!(conn.server_tick(), 500);
    }

    #[test]
    fn test_outbound_queue_drains_in_order() {
        let mut conn = Connection::default();
        conn.send(vec![1]);
        conn.send(vec![2]);
        let sent: Vec<Vec<u8>> = conn.take_outbound().collect();
        assert_eq!(sent, vec![vec![1], vec![2]]);
        assert_eq!(conn.outbound_len(), 0);
    }

    #[test]
    fn test_attach_request_wire_format() {
        let mut conn = Connection::default();
        conn.send_attach_request(0x0105);
        let sent: Vec<Vec<u8>> = conn.take_outbound().collect();
        assert_eq!(sent, vec![vec![c2s::ATTACH_REQUEST, 0x05, 0x01]]);
    }

    #[test]
    fn test_attach_drop_wire_format() {
        let mut conn = Connection::default();
        conn.send_attach_drop();
        let sent: Vec<Vec<u8>> = conn.take_outbound().collect();
        assert_eq!(sent, vec![vec![c2s::ATTACH_DROP]]);
    }

    #[test]
    fn test_send_damage_batches_entries() {
        let mut conn = Connection::default();
        let damage = Damage {
            timestamp: 100,
            shooter_id: 9,
            weapon: WeaponData::from_kind(WeaponKind::Wormhole),
            energy: 800,
            damage: 640,
        };
        conn.send_damage(&[damage, damage]);

        let sent: Vec<Vec<u8>> = conn.take_outbound().collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0], c2s::DAMAGE);
        assert_eq!(sent[0][1], 2);
        assert_eq!(sent[0].len(), 2 + 2 * Damage::WIRE_SIZE);
    }

    #[test]
    fn test_send_damage_empty_is_noop() {
        let mut conn = Connection::default();
        conn.send_damage(&[]);
        assert_eq!(conn.outbound_len(), 0);
    }
}
