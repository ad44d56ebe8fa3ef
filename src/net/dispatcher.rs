//! Inbound packet dispatch.
//!
//! Handlers are plain functions keyed by the first byte of the datagram.
//! Subsystems register during startup; multiple handlers per type are legal
//! and run in registration order, matching intra-frame arrival ordering.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::game::Game;
use crate::net::protocol::ProtocolS2C;

pub type PacketHandler = fn(&mut Game, &[u8]);

#[derive(Default)]
pub struct PacketDispatcher {
    handlers: HashMap<u8, SmallVec<[PacketHandler; 2]>>,
}

impl PacketDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ProtocolS2C, handler: PacketHandler) {
        self.handlers.entry(kind as u8).or_default().push(handler);
    }

    /// Routes one datagram. Empty or unknown packets are dropped without
    /// touching game state.
    pub fn dispatch(&self, game: &mut Game, pkt: &[u8]) {
        let Some(&type_byte) = pkt.first() else {
            return;
        };

        match self.handlers.get(&type_byte) {
            Some(handlers) => {
                for handler in handlers {
                    handler(game, pkt);
                }
            }
            None => {
                tracing::trace!("unhandled packet type {type_byte:#04x}, {} bytes", pkt.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump_tick(game: &mut Game, _pkt: &[u8]) {
        game.connection.current_tick += 1;
    }

    fn bump_tick_by_len(game: &mut Game, pkt: &[u8]) {
        game.connection.current_tick += pkt.len() as u32;
    }

    #[test]
    fn test_dispatch_routes_by_type_byte() {
        let mut dispatcher = PacketDispatcher::new();
        dispatcher.register(ProtocolS2C::JoinGame, bump_tick);

        let mut game = Game::default();
        dispatcher.dispatch(&mut game, &[ProtocolS2C::JoinGame as u8]);
        dispatcher.dispatch(&mut game, &[0x7F]);
        assert_eq!(game.connection.current_tick, 1);
    }

    #[test]
    fn test_dispatch_fans_out_in_order() {
        let mut dispatcher = PacketDispatcher::new();
        dispatcher.register(ProtocolS2C::JoinGame, bump_tick);
        dispatcher.register(ProtocolS2C::JoinGame, bump_tick_by_len);

        let mut game = Game::default();
        dispatcher.dispatch(&mut game, &[ProtocolS2C::JoinGame as u8, 0, 0]);
        assert_eq!(game.connection.current_tick, 1 + 3);
    }

    #[test]
    fn test_dispatch_ignores_empty_packet() {
        let dispatcher = PacketDispatcher::new();
        let mut game = Game::default();
        dispatcher.dispatch(&mut game, &[]);
        assert_eq!(game.connection.current_tick, 0);
    }
}
