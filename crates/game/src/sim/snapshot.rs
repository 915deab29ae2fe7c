//! Full/delta snapshot encoder (C9). The change-detection algorithm —
//! cache the last emitted state per entity, diff against it, collect
//! removed ids — is carried over verbatim from the teacher's
//! `crates/game/src/snapshot/world.rs` (`World::delta_from_baseline`,
//! `states_equal`), retargeted from a generic `Entity` to concrete
//! `TankWire`/`ProjectileWire` types.

use std::collections::HashMap;

use crate::net::protocol::{ProjectileWire, ServerMessage, TankWire};

const POSITION_EPSILON: f32 = 1e-4;
const ANGLE_EPSILON: f32 = 1e-2;

pub struct SnapshotEncoder {
    last_sent_tanks: HashMap<u32, TankWire>,
    last_full_snapshot_tick: u64,
    removed_tanks_since_full: Vec<u32>,
    removed_projectiles_since_full: Vec<u32>,
    quantize: bool,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEncoder {
    pub fn new() -> Self {
        Self {
            last_sent_tanks: HashMap::new(),
            last_full_snapshot_tick: 0,
            removed_tanks_since_full: Vec::new(),
            removed_projectiles_since_full: Vec::new(),
            quantize: false,
        }
    }

    /// Enables the optional position/angle quantization (SPEC_FULL §4.9):
    /// positions round to 0.01, angles to 0.1° before emission.
    pub fn with_quantization(quantize: bool) -> Self {
        Self {
            quantize,
            ..Self::new()
        }
    }

    pub fn record_removed_tank(&mut self, id: u32) {
        self.removed_tanks_since_full.push(id);
    }

    pub fn record_removed_projectile(&mut self, id: u32) {
        self.removed_projectiles_since_full.push(id);
    }

    pub fn should_emit_full(&self, server_tick: u64, full_interval_ticks: u64) -> bool {
        server_tick.saturating_sub(self.last_full_snapshot_tick) >= full_interval_ticks
    }

    pub fn full_snapshot(
        &mut self,
        server_tick: u64,
        tanks: &[TankWire],
        projectiles: &[ProjectileWire],
    ) -> ServerMessage {
        let tanks: Vec<TankWire> = tanks.iter().cloned().map(|t| self.quantize_tank(t)).collect();
        let projectiles: Vec<ProjectileWire> = projectiles
            .iter()
            .cloned()
            .map(|p| self.quantize_projectile(p))
            .collect();

        self.last_sent_tanks = tanks.iter().cloned().map(|t| (t.id, t)).collect();
        self.last_full_snapshot_tick = server_tick;
        self.removed_tanks_since_full.clear();
        self.removed_projectiles_since_full.clear();

        ServerMessage::StateSnapshot {
            server_tick,
            tanks,
            projectiles,
            crates: Vec::new(),
            ammo_boxes: Vec::new(),
        }
    }

    pub fn delta_snapshot(
        &mut self,
        server_tick: u64,
        tanks: &[TankWire],
        projectiles: &[ProjectileWire],
    ) -> ServerMessage {
        let mut changed = Vec::new();
        for tank in tanks {
            let tank = self.quantize_tank(tank.clone());
            let is_new_or_changed = match self.last_sent_tanks.get(&tank.id) {
                Some(prev) => !tank_states_equal(prev, &tank),
                None => true,
            };
            if is_new_or_changed {
                self.last_sent_tanks.insert(tank.id, tank.clone());
                changed.push(tank);
            }
        }
        let projectiles: Vec<ProjectileWire> = projectiles
            .iter()
            .cloned()
            .map(|p| self.quantize_projectile(p))
            .collect();

        ServerMessage::DeltaSnapshot {
            server_tick,
            base_tick: self.last_full_snapshot_tick,
            tanks: changed,
            projectiles,
            removed_tanks: std::mem::take(&mut self.removed_tanks_since_full),
            removed_projectiles: std::mem::take(&mut self.removed_projectiles_since_full),
            removed_crates: Vec::new(),
        }
    }

    fn quantize_tank(&self, mut tank: TankWire) -> TankWire {
        if self.quantize {
            tank.x = quantize(tank.x, 0.01);
            tank.y = quantize(tank.y, 0.01);
            tank.hull_angle_deg = quantize(tank.hull_angle_deg, 0.1);
            tank.turret_angle_deg = quantize(tank.turret_angle_deg, 0.1);
        }
        tank
    }

    fn quantize_projectile(&self, mut projectile: ProjectileWire) -> ProjectileWire {
        if self.quantize {
            projectile.x = quantize(projectile.x, 0.01);
            projectile.y = quantize(projectile.y, 0.01);
        }
        projectile
    }
}

fn quantize(value: f32, step: f32) -> f32 {
    (value / step).round() * step
}

fn tank_states_equal(a: &TankWire, b: &TankWire) -> bool {
    (a.x - b.x).abs() < POSITION_EPSILON
        && (a.y - b.y).abs() < POSITION_EPSILON
        && (a.hull_angle_deg - b.hull_angle_deg).abs() < ANGLE_EPSILON
        && (a.turret_angle_deg - b.turret_angle_deg).abs() < ANGLE_EPSILON
        && a.hp == b.hp
        && a.ammo == b.ammo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tank(id: u32, x: f32) -> TankWire {
        TankWire {
            id,
            x,
            y: 0.0,
            hull_angle_deg: 0.0,
            turret_angle_deg: 0.0,
            hp: 100,
            ammo: 10,
        }
    }

    #[test]
    fn full_snapshot_contains_everything() {
        let mut enc = SnapshotEncoder::new();
        let msg = enc.full_snapshot(0, &[tank(1, 0.0), tank(2, 5.0)], &[]);
        match msg {
            ServerMessage::StateSnapshot { tanks, .. } => assert_eq!(tanks.len(), 2),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn delta_only_includes_changed() {
        let mut enc = SnapshotEncoder::new();
        enc.full_snapshot(0, &[tank(1, 0.0), tank(2, 5.0)], &[]);

        let msg = enc.delta_snapshot(1, &[tank(1, 1.0), tank(2, 5.0)], &[]);
        match msg {
            ServerMessage::DeltaSnapshot { tanks, base_tick, .. } => {
                assert_eq!(base_tick, 0);
                assert_eq!(tanks.len(), 1);
                assert_eq!(tanks[0].id, 1);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn delta_reports_removed_tanks() {
        let mut enc = SnapshotEncoder::new();
        enc.full_snapshot(0, &[tank(1, 0.0)], &[]);
        enc.record_removed_tank(1);
        let msg = enc.delta_snapshot(1, &[], &[]);
        match msg {
            ServerMessage::DeltaSnapshot { removed_tanks, .. } => {
                assert_eq!(removed_tanks, vec![1]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn full_cadence_respects_interval() {
        let enc = SnapshotEncoder::new();
        assert!(!enc.should_emit_full(5, 30));
        assert!(enc.should_emit_full(30, 30));
    }

    #[test]
    fn quantization_rounds_positions_and_angles() {
        let mut enc = SnapshotEncoder::with_quantization(true);
        let mut t = tank(1, 1.2345);
        t.hull_angle_deg = 12.37;
        let msg = enc.full_snapshot(0, &[t], &[]);
        match msg {
            ServerMessage::StateSnapshot { tanks, .. } => {
                assert!((tanks[0].x - 1.23).abs() < 1e-4);
                assert!((tanks[0].hull_angle_deg - 12.4).abs() < 1e-3);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn quantization_off_by_default() {
        let mut enc = SnapshotEncoder::new();
        let msg = enc.full_snapshot(0, &[tank(1, 1.2345)], &[]);
        match msg {
            ServerMessage::StateSnapshot { tanks, .. } => assert_eq!(tanks[0].x, 1.2345),
            _ => panic!("wrong variant"),
        }
    }
}
