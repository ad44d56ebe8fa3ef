mod behavior;
mod bot;
mod clock;
mod config;
mod game;
mod map;
mod net;
mod render;
mod util;

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, Level};

use crate::bot::Bot;
use crate::clock::Clock;
use crate::config::BotConfig;
use crate::net::transport::UdpTransport;

/// Frame period: 100 Hz, one centisecond tick per frame.
const FRAME_DT: f32 = 0.01;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("driftbot v{}", env!("CARGO_PKG_VERSION"));

    let config = BotConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "name={} ship={} server={}",
        config.name, config.requested_ship, config.server_addr
    );

    let transport = UdpTransport::connect(&config.server_addr).await?;
    let mut bot = Bot::new(&config);

    let game_clock = Clock::new();
    let mut interval = tokio::time::interval(Duration::from_millis(10));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut buf = [0u8; 2048];

    loop {
        interval.tick().await;

        // Packet handlers run before frame time is applied.
        while let Some(n) = transport.poll_recv(&mut buf) {
            bot.handle_packet(&buf[..n]);
        }

        bot.update(game_clock.now(), FRAME_DT);
        transport.flush(&mut bot.game.connection);
    }
}
