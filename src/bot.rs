//! Frame orchestration.
//!
//! One `Bot` owns the mirrored game state, the packet dispatch table, and
//! the decision layer. Each frame: inbound packets first (the caller feeds
//! them in), then simulation time, then one synchronous behavior-tree pass
//! whose input intent is applied to the self ship.

use crate::behavior::blackboard::Blackboard;
use crate::behavior::brawler::BrawlerBehavior;
use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::{ExecuteContext, LinePathfinder, TargetMemory};
use crate::clock::Tick;
use crate::config::BotConfig;
use crate::game::input::InputState;
use crate::game::{self, Game};
use crate::net::connection::LoginState;
use crate::net::dispatcher::PacketDispatcher;
use crate::render::DebugRenderer;

pub struct Bot {
    pub game: Game,
    dispatcher: PacketDispatcher,
    tree: Box<dyn BehaviorNode>,
    pub blackboard: Blackboard,
    input: InputState,
    pub renderer: DebugRenderer,
    pathfinder: LinePathfinder,
    targets: TargetMemory,
    last_result: ExecuteResult,
}

impl Bot {
    pub fn new(config: &BotConfig) -> Self {
        let mut dispatcher = PacketDispatcher::new();
        game::register_handlers(&mut dispatcher);

        let mut blackboard = Blackboard::new();
        BrawlerBehavior::init_blackboard(&mut blackboard, config);

        Self {
            game: Game::default(),
            dispatcher,
            tree: BrawlerBehavior::create_tree(),
            blackboard,
            input: InputState::default(),
            renderer: DebugRenderer::new(config.debug_overlays),
            pathfinder: LinePathfinder,
            targets: TargetMemory::default(),
            last_result: ExecuteResult::Failure,
        }
    }

    /// Routes one inbound datagram through the dispatch table.
    pub fn handle_packet(&mut self, pkt: &[u8]) {
        self.dispatcher.dispatch(&mut self.game, pkt);
    }

    /// One frame: apply time, run the tree, actuate its intent. The tree
    /// only runs once login has completed and an arena has been joined.
    pub fn update(&mut self, current_tick: Tick, dt: f32) {
        self.game.connection.current_tick = current_tick;
        self.game.update(dt);

        self.input.clear();

        let in_game = self.game.connection.login_state == LoginState::Complete
            && self.game.connection.joined_arena;
        if !in_game {
            return;
        }

        let result = {
            let mut ctx = ExecuteContext {
                game: &mut self.game,
                blackboard: &mut self.blackboard,
                input: &mut self.input,
                renderer: &mut self.renderer,
                pathfinder: &mut self.pathfinder,
                targets: &mut self.targets,
                dt,
            };
            self.tree.execute(&mut ctx)
        };

        if result != self.last_result {
            tracing::debug!("behavior root: {:?} -> {:?}", self.last_result, result);
            self.last_result = result;
        }

        let Game {
            connection,
            players,
            ship,
            ..
        } = &mut self.game;

        if let Some(self_player) = players.get_self_mut() {
            if self_player.in_ship() && self_player.enter_delay <= 0.0 {
                let settings = &connection.settings.ship_settings[self_player.ship as usize];
                ship.control(self_player, &self.input, settings, current_tick, dt);
            }
        }
    }

    /// The intent the last tree pass produced, for inspection.
    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn last_result(&self) -> ExecuteResult {
        self.last_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_advances_tick() {
        let config = BotConfig::default();
        let mut bot = Bot::new(&config);

        bot.update(100, 0.01);
        assert_eq!(bot.game.connection.current_tick, 100);
        bot.update(101, 0.01);
        assert_eq!(bot.game.connection.current_tick, 101);
    }

    #[test]
    fn test_handle_packet_before_update() {
        let config = BotConfig::default();
        let mut bot = Bot::new(&config);
        bot.game.connection.login_state = LoginState::Complete;

        // PlayerId packet assigns self.
        bot.handle_packet(&[0x01, 0x2A, 0x00]);
        assert_eq!(bot.game.players.player_id, 0x2A);
    }

    #[test]
    fn test_update_without_self_is_safe() {
        let config = BotConfig::default();
        let mut bot = Bot::new(&config);
        // No players at all: the frame must not panic and produce no traffic.
        bot.update(10, 0.01);
        assert_eq!(bot.game.connection.outbound_len(), 0);
    }
}
