//! Game state: the mirrored arena and its collaborators.

pub mod events;
pub mod input;
pub mod physics;
pub mod player;
pub mod player_manager;
pub mod services;
pub mod ship;
pub mod weapons;

use crate::net::connection::Connection;
use crate::net::dispatcher::PacketDispatcher;
use crate::net::protocol::ProtocolS2C;

use self::player_manager::PlayerManager;
use self::services::{ChatController, Radar, Soccer};
use self::ship::ShipController;
use self::weapons::WeaponManager;

/// Everything one bot knows about the world. Single-threaded by design:
/// packet handlers and the behavior tree mutate it in turn from one loop.
#[derive(Default)]
pub struct Game {
    pub connection: Connection,
    pub players: PlayerManager,
    pub ship: ShipController,
    pub weapons: WeaponManager,
    pub soccer: Soccer,
    pub radar: Radar,
    pub chat: ChatController,
}

impl Game {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            ..Default::default()
        }
    }

    /// Frame update: advance simulation, keep the radar view centered, and
    /// let the player manager run its outbound cadence.
    pub fn update(&mut self, dt: f32) {
        if let Some(self_player) = self.players.get_self() {
            self.radar.center = self_player.position;
        }

        self.players.update(&mut self.connection, &mut self.ship, dt);
    }
}

/// Wires every packet handler into the dispatcher. Handlers are free
/// functions over `Game` so the dispatch table stays plain data.
pub fn register_handlers(dispatcher: &mut PacketDispatcher) {
    dispatcher.register(ProtocolS2C::PlayerId, |game, pkt| {
        game.players.on_player_id_change(pkt);
    });
    dispatcher.register(ProtocolS2C::JoinGame, |game, _pkt| {
        game.players.received_initial_list = true;
    });
    dispatcher.register(ProtocolS2C::PlayerEntering, |game, pkt| {
        let Game { connection, players, weapons, chat, .. } = game;
        players.on_player_enter(connection, weapons, chat, pkt);
    });
    dispatcher.register(ProtocolS2C::PlayerLeaving, |game, pkt| {
        let Game { connection, players, weapons, chat, .. } = game;
        players.on_player_leave(connection, weapons, chat, pkt);
    });
    dispatcher.register(ProtocolS2C::TeamAndShipChange, |game, pkt| {
        let Game { connection, players, weapons, ship, .. } = game;
        players.on_player_freq_and_ship_change(connection, weapons, ship, pkt);
    });
    dispatcher.register(ProtocolS2C::FrequencyChange, |game, pkt| {
        let Game { connection, players, weapons, ship, .. } = game;
        players.on_player_frequency_change(connection, weapons, ship, pkt);
    });
    dispatcher.register(ProtocolS2C::LargePosition, |game, pkt| {
        game.players.on_large_position(&mut game.connection, pkt);
    });
    dispatcher.register(ProtocolS2C::SmallPosition, |game, pkt| {
        game.players.on_small_position(&mut game.connection, pkt);
    });
    dispatcher.register(ProtocolS2C::BatchedSmallPosition, |game, pkt| {
        game.players.on_batched_small_position(&mut game.connection, pkt);
    });
    dispatcher.register(ProtocolS2C::BatchedLargePosition, |game, pkt| {
        game.players.on_batched_large_position(&mut game.connection, pkt);
    });
    dispatcher.register(ProtocolS2C::PlayerDeath, |game, pkt| {
        game.players.on_player_death(&mut game.connection, pkt);
    });
    dispatcher.register(ProtocolS2C::DropFlag, |game, pkt| {
        game.players.on_flag_drop(pkt);
    });
    dispatcher.register(ProtocolS2C::SetCoordinates, |game, pkt| {
        let Game { connection, players, ship, .. } = game;
        players.on_set_coordinates(connection, ship, pkt);
    });
    dispatcher.register(ProtocolS2C::CreateTurret, |game, pkt| {
        game.players.on_create_turret_link(&mut game.connection, pkt);
    });
    dispatcher.register(ProtocolS2C::DestroyTurret, |game, pkt| {
        game.players.on_destroy_turret_link(&mut game.connection, pkt);
    });
}
