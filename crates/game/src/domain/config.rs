//! Match-simulation tunables. Defaults mirror
//! `original_source/src/server/game/match.hpp`/`matchmaker.hpp` literally,
//! regeneralized from the teacher's FPS `PlayerConfig`
//! (`crates/game/src/player/config.rs`) Config-struct-with-`Default` idiom.

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MatchConfig {
    pub max_players_per_match: u32,
    pub tick_rate: u32,
    pub snapshot_interval_ticks: u64,
    pub full_snapshot_interval_ticks: u64,
    pub bot_fire_interval_ticks: u64,
    pub disable_bot_fire: bool,
    pub movement_speed: f32,
    pub projectile_damage: u16,
    pub reload_interval_sec: f32,
    pub projectile_speed: f32,
    pub projectile_density: f32,
    pub fire_cooldown_sec: f32,
    pub hull_density: f32,
    pub turret_density: f32,
    pub max_ammo: u16,
    pub map_width: f32,
    pub map_height: f32,
    pub quantize_snapshots: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_players_per_match: 4,
            tick_rate: 30,
            snapshot_interval_ticks: 5,
            full_snapshot_interval_ticks: 30,
            bot_fire_interval_ticks: 15,
            disable_bot_fire: false,
            movement_speed: 2.0,
            projectile_damage: 40,
            reload_interval_sec: 3.0,
            projectile_speed: 5.0,
            projectile_density: 0.01,
            fire_cooldown_sec: 1.0,
            hull_density: 1.0,
            turret_density: 0.5,
            max_ammo: 10,
            map_width: 100.0,
            map_height: 100.0,
            quantize_snapshots: false,
        }
    }
}
