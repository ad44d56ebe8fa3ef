//! Bot configuration and arena settings.
//!
//! `BotConfig` is operator-side and loads from the environment. The
//! `ServerSettings` block mirrors the tuning values the server pushes down
//! after arena login; the bot only ever reads them.

use crate::net::protocol::ItemCounts;

/// Operator configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Server address, host:port.
    pub server_addr: String,
    /// Player name presented to the server (max 20 bytes on the wire).
    pub name: String,
    /// Squad name (max 20 bytes on the wire).
    pub squad: String,
    /// Ship the behavior tree will request, 0..=7.
    pub requested_ship: u8,
    /// Keep debug draw commands instead of discarding them each frame.
    pub debug_overlays: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5000".to_string(),
            name: "driftbot".to_string(),
            squad: String::new(),
            requested_ship: 0,
            debug_overlays: false,
        }
    }
}

impl BotConfig {
    /// Load config from environment or use defaults.
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BOT_SERVER") {
            config.server_addr = addr;
        }

        if let Ok(name) = std::env::var("BOT_NAME") {
            if name.is_empty() || name.len() > 20 {
                tracing::warn!("BOT_NAME must be 1-20 bytes, using default");
            } else {
                config.name = name;
            }
        }

        if let Ok(squad) = std::env::var("BOT_SQUAD") {
            if squad.len() > 20 {
                tracing::warn!("BOT_SQUAD must be at most 20 bytes, using default");
            } else {
                config.squad = squad;
            }
        }

        if let Ok(ship) = std::env::var("BOT_SHIP") {
            match ship.parse::<u8>() {
                Ok(parsed) if parsed < 8 => config.requested_ship = parsed,
                _ => tracing::warn!("Invalid BOT_SHIP '{}', using default", ship),
            }
        }

        if let Ok(overlays) = std::env::var("BOT_DEBUG_OVERLAYS") {
            config.debug_overlays = overlays == "1" || overlays.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        if self.server_addr.is_empty() {
            return Err("server address cannot be empty".to_string());
        }
        if self.name.is_empty() || self.name.len() > 20 {
            return Err("name must be 1-20 bytes".to_string());
        }
        if self.squad.len() > 20 {
            return Err("squad must be at most 20 bytes".to_string());
        }
        if self.requested_ship >= 8 {
            return Err("requested ship must be 0-7".to_string());
        }
        Ok(())
    }
}

/// Per-ship tuning pushed by the server.
#[derive(Debug, Clone, Copy)]
pub struct ShipSettings {
    /// Collision half-extent in pixels; zero means the stock 14.
    pub radius_pixels: u16,
    /// Full energy for this hull.
    pub initial_energy: u32,
    /// Bounty required before this ship may attach to a teammate.
    pub attach_bounty: u16,
    /// How many turrets may ride this ship; zero disables attaching to it.
    pub turret_limit: u8,
    /// Seconds*10 a carried ball may be held; zero means no limit display.
    pub soccer_ball_throw_timer: u16,
    /// Weapon cooldowns in ticks.
    pub bullet_delay: u16,
    pub bomb_delay: u16,
    /// Muzzle speeds in tiles per second.
    pub bullet_speed: f32,
    pub bomb_speed: f32,
    /// Flight model, in tiles and seconds.
    pub max_speed: f32,
    pub thrust: f32,
    /// Full rotations per second.
    pub rotation_rate: f32,
    pub has_multifire: bool,
    /// Repel effect radius in tiles.
    pub repel_distance: f32,
    /// Ammo loadout restored on ship reset.
    pub initial_items: ItemCounts,
}

impl ShipSettings {
    /// Collision half-extent in tiles.
    pub fn radius(&self) -> f32 {
        let pixels = if self.radius_pixels == 0 { 14 } else { self.radius_pixels };
        pixels as f32 / 16.0
    }
}

impl Default for ShipSettings {
    fn default() -> Self {
        Self {
            radius_pixels: 14,
            initial_energy: 1500,
            attach_bounty: 20,
            turret_limit: 2,
            soccer_ball_throw_timer: 0,
            bullet_delay: 20,
            bomb_delay: 80,
            bullet_speed: 62.5,
            bomb_speed: 46.875,
            max_speed: 25.0,
            thrust: 30.0,
            rotation_rate: 0.8,
            has_multifire: true,
            repel_distance: 16.0,
            initial_items: ItemCounts::default(),
        }
    }
}

/// One arena spawn ring. All-zero entries are unused.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnSettings {
    pub x: i16,
    pub y: i16,
    pub radius: u16,
}

impl SpawnSettings {
    pub fn is_empty(&self) -> bool {
        self.x == 0 && self.y == 0 && self.radius == 0
    }
}

/// Arena tuning the server pushes after login.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub ship_settings: [ShipSettings; 8],
    pub spawn_settings: [SpawnSettings; 4],
    /// Wall restitution; the simulation scales bounces by 16/BounceFactor.
    pub bounce_factor: u16,
    /// Requested gap between outgoing position packets, ticks.
    pub send_position_delay: i32,
    /// Respawn delay in ticks; zero means instant respawn at 1 energy.
    pub enter_delay: u16,
    /// Spawn distribution selector; hemispheres, quadrants, or a disk.
    pub radar_mode: u8,
    /// Cap on the default spawn disk radius, tiles.
    pub warp_radius_limit: u16,
    /// Antiwarp field radius, pixels.
    pub antiwarp_pixels: u32,
    /// Self-imposed antiwarp after requesting an attach, ticks.
    pub antiwarp_settle_delay: u32,
    /// Arena demands the extended position block on every packet.
    pub extra_position_data: bool,
    pub bounty_increase_for_kill: u16,
    /// Flag timer granted on flag transfer, centiseconds.
    pub flag_drop_delay: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ship_settings: [ShipSettings::default(); 8],
            spawn_settings: [SpawnSettings::default(); 4],
            bounce_factor: 16,
            send_position_delay: 10,
            enter_delay: 300,
            radar_mode: 0,
            warp_radius_limit: 1024,
            antiwarp_pixels: 8192,
            antiwarp_settle_delay: 60,
            extra_position_data: false,
            bounty_increase_for_kill: 3,
            flag_drop_delay: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_long_name() {
        let config = BotConfig {
            name: "x".repeat(21),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_spectator_ship() {
        let config = BotConfig {
            requested_ship: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ship_radius_default_when_zero() {
        let settings = ShipSettings {
            radius_pixels: 0,
            ..Default::default()
        };
        assert!((settings.radius() - 14.0 / 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_spawn_settings_empty() {
        assert!(SpawnSettings::default().is_empty());
        assert!(!SpawnSettings { x: 100, y: 0, radius: 0 }.is_empty());
    }
}
