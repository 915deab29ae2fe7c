//! Server configuration document (SPEC_FULL §6), grounded on the teacher's
//! `crates/server/src/config.rs` struct-with-`Default` shape. Loaded from a
//! TOML file (enrichment pick — `toml`/`serde`, as used by the
//! `andrewgazelka-hyperion` and `manuelgdlvh-thunders` example repos) layered
//! over literal defaults from `original_source/src/server/game/match.hpp`
//! and `matchmaker.hpp`.

use std::path::Path;

use serde::Deserialize;
use t2d::MatchConfig;

fn default_auth_mode() -> String {
    "disabled".to_string()
}

fn default_auth_stub_prefix() -> String {
    "user_".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_players_per_match: u32,
    pub max_parallel_matches: u32,
    pub queue_soft_limit: u32,
    pub fill_timeout_seconds: u64,
    pub tick_rate: u32,
    pub snapshot_interval_ticks: u64,
    pub full_snapshot_interval_ticks: u64,
    pub listen_port: u16,
    pub heartbeat_timeout_seconds: u64,
    pub matchmaker_poll_ms: u64,
    pub log_level: String,
    pub log_json: bool,
    pub metrics_port: u16,
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,
    #[serde(default = "default_auth_stub_prefix")]
    pub auth_stub_prefix: String,
    pub bot_fire_interval_ticks: u64,
    pub movement_speed: f32,
    pub projectile_damage: u16,
    pub reload_interval_sec: f32,
    pub projectile_speed: f32,
    pub projectile_density: f32,
    pub fire_cooldown_sec: f32,
    pub hull_density: f32,
    pub turret_density: f32,
    pub disable_bot_fire: bool,
    pub test_mode: bool,
    pub map_width: f32,
    pub map_height: f32,
    pub quantize_snapshots: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_players_per_match: 4,
            max_parallel_matches: 64,
            queue_soft_limit: 256,
            fill_timeout_seconds: 180,
            tick_rate: 30,
            snapshot_interval_ticks: 5,
            full_snapshot_interval_ticks: 30,
            listen_port: 40000,
            heartbeat_timeout_seconds: 15,
            matchmaker_poll_ms: 200,
            log_level: "info".to_string(),
            log_json: false,
            metrics_port: 9100,
            auth_mode: default_auth_mode(),
            auth_stub_prefix: default_auth_stub_prefix(),
            bot_fire_interval_ticks: 15,
            movement_speed: 2.0,
            projectile_damage: 40,
            reload_interval_sec: 3.0,
            projectile_speed: 5.0,
            projectile_density: 0.01,
            fire_cooldown_sec: 1.0,
            hull_density: 1.0,
            turret_density: 0.5,
            disable_bot_fire: false,
            test_mode: false,
            map_width: 100.0,
            map_height: 100.0,
            quantize_snapshots: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            max_players_per_match: self.max_players_per_match,
            tick_rate: self.tick_rate,
            snapshot_interval_ticks: self.snapshot_interval_ticks,
            full_snapshot_interval_ticks: self.full_snapshot_interval_ticks,
            bot_fire_interval_ticks: self.bot_fire_interval_ticks,
            disable_bot_fire: self.disable_bot_fire,
            movement_speed: self.movement_speed,
            projectile_damage: self.projectile_damage,
            reload_interval_sec: self.reload_interval_sec,
            projectile_speed: self.projectile_speed,
            projectile_density: self.projectile_density,
            fire_cooldown_sec: self.fire_cooldown_sec,
            hull_density: self.hull_density,
            turret_density: self.turret_density,
            max_ammo: 10,
            map_width: self.map_width,
            map_height: self.map_height,
            quantize_snapshots: self.quantize_snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_literal_spec_values() {
        let config = Config::default();
        assert_eq!(config.listen_port, 40000);
        assert_eq!(config.max_players_per_match, 4);
        assert_eq!(config.bot_fire_interval_ticks, 15);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: Config = toml::from_str("listen_port = 41000\n").unwrap();
        assert_eq!(parsed.listen_port, 41000);
        assert_eq!(parsed.max_players_per_match, 4);
    }
}
