//! Bot AI (§4.8.1), grounded on the targeting/turn/fire heuristics in
//! `original_source/src/server/game/match.cpp`.

use glam::Vec2;
use t2d::net::session::InputSnapshot;

/// Squares distance to non-bot candidates by 0.25× to bias target selection
/// away from other bots (§9 Open Question (c): preserved exactly).
const NON_BOT_TARGET_BIAS: f32 = 0.25;

#[derive(Clone)]
pub struct Candidate {
    pub tank_index: usize,
    pub position: Vec2,
    pub is_bot: bool,
}

/// Returns the index of the nearest-weighted live candidate, if any.
pub fn pick_target(self_position: Vec2, candidates: &[Candidate]) -> Option<usize> {
    candidates
        .iter()
        .map(|c| {
            let mut d2 = (c.position - self_position).length_squared();
            if !c.is_bot {
                d2 *= NON_BOT_TARGET_BIAS;
            }
            (c.tank_index, d2)
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(idx, _)| idx)
}

/// Computes the bot's next input given its own pose and a target position,
/// or an idle sweep when no target is live.
pub fn compute_input(
    self_position: Vec2,
    hull_heading_rad: f32,
    turret_heading_rad: f32,
    target: Option<Vec2>,
    server_tick: u64,
    bot_fire_interval_ticks: u64,
    disable_bot_fire: bool,
) -> InputSnapshot {
    let Some(target_pos) = target else {
        return InputSnapshot {
            client_tick: server_tick,
            move_dir: 0.0,
            turn_dir: 0.1,
            turret_turn: 0.1,
            fire: false,
            brake: false,
        };
    };

    let to_target = target_pos - self_position;
    let desired_heading = to_target.y.atan2(to_target.x);
    let hull_error = normalize_angle(desired_heading - hull_heading_rad);
    let turn_dir = (hull_error.to_degrees() / 90.0).clamp(-1.0, 1.0);

    let d2 = to_target.length_squared();
    let move_dir = if d2 > 25.0 {
        1.0
    } else if d2 < 9.0 {
        -0.4
    } else {
        0.2
    };

    let turret_error = normalize_angle(desired_heading - turret_heading_rad);
    let turret_turn = if turret_error.abs().to_degrees() < 2.0 {
        0.0
    } else {
        (turret_error.to_degrees() / 30.0).clamp(-1.0, 1.0)
    };

    let aligned_enough = turret_error.abs().to_degrees() < 20.0;
    let fire_tick = bot_fire_interval_ticks > 0 && server_tick % bot_fire_interval_ticks == 0;
    let fire = !disable_bot_fire && fire_tick && aligned_enough;

    InputSnapshot {
        client_tick: server_tick,
        move_dir,
        turn_dir,
        turret_turn,
        fire,
        brake: false,
    }
}

fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % std::f32::consts::TAU;
    if a > std::f32::consts::PI {
        a -= std::f32::consts::TAU;
    } else if a < -std::f32::consts::PI {
        a += std::f32::consts::TAU;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_bot_targets_over_equidistant_players() {
        let candidates = vec![
            Candidate {
                tank_index: 0,
                position: Vec2::new(10.0, 0.0),
                is_bot: false,
            },
            Candidate {
                tank_index: 1,
                position: Vec2::new(10.0, 0.0),
                is_bot: true,
            },
        ];
        // equal raw distance, but the non-bot gets a 0.25x penalty making it
        // "closer" — bots are deprioritized as targets relative to players.
        let picked = pick_target(Vec2::ZERO, &candidates).unwrap();
        assert_eq!(picked, 0);
    }

    #[test]
    fn idle_sweep_without_target() {
        let input = compute_input(Vec2::ZERO, 0.0, 0.0, None, 10, 15, false);
        assert!(!input.fire);
        assert_eq!(input.move_dir, 0.0);
    }

    #[test]
    fn fires_only_on_interval_ticks_when_aligned() {
        let input = compute_input(Vec2::ZERO, 0.0, 0.0, Some(Vec2::new(10.0, 0.0)), 15, 15, false);
        assert!(input.fire);
        let input_off_tick = compute_input(Vec2::ZERO, 0.0, 0.0, Some(Vec2::new(10.0, 0.0)), 16, 15, false);
        assert!(!input_off_tick.fire);
    }
}
