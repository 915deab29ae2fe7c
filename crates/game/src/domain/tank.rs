//! Tank domain type. Regeneralized from the teacher's FPS `PlayerState`
//! (`crates/game/src/player/state.rs`) Config/State split, retargeted at
//! hp/ammo/reload instead of strafe/crouch/coyote-time.

use rapier3d::dynamics::{ImpulseJointHandle, RigidBodyHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TankId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct Tank {
    pub id: TankId,
    pub hull: RigidBodyHandle,
    pub turret: RigidBodyHandle,
    pub turret_joint: ImpulseJointHandle,
    pub hp: u16,
    pub ammo: u16,
    pub max_ammo: u16,
    pub reload_timer_sec: f32,
    pub fire_cooldown_cur_sec: f32,
    pub fire_cooldown_max_sec: f32,
    pub turret_target_angle_rad: f32,
    pub alive: bool,
}

impl Tank {
    pub fn new(
        id: TankId,
        hull: RigidBodyHandle,
        turret: RigidBodyHandle,
        turret_joint: ImpulseJointHandle,
        max_ammo: u16,
        fire_cooldown_max_sec: f32,
    ) -> Self {
        Self {
            id,
            hull,
            turret,
            turret_joint,
            hp: 100,
            ammo: max_ammo,
            max_ammo,
            reload_timer_sec: 0.0,
            fire_cooldown_cur_sec: 0.0,
            fire_cooldown_max_sec,
            turret_target_angle_rad: 0.0,
            alive: true,
        }
    }

    pub fn apply_damage(&mut self, amount: u16) -> u16 {
        self.hp = self.hp.saturating_sub(amount);
        if self.hp == 0 {
            self.alive = false;
        }
        self.hp
    }

    pub fn tick_reload(&mut self, dt: f32, reload_interval_sec: f32) {
        if self.ammo < self.max_ammo {
            self.reload_timer_sec += dt;
            if self.reload_timer_sec >= reload_interval_sec {
                self.ammo += 1;
                self.reload_timer_sec = 0.0;
            }
        } else {
            self.reload_timer_sec = 0.0;
        }
    }

    pub fn tick_cooldown(&mut self, dt: f32) {
        self.fire_cooldown_cur_sec = (self.fire_cooldown_cur_sec - dt).max(0.0);
    }

    pub fn can_fire(&self) -> bool {
        self.alive && self.ammo > 0 && self.fire_cooldown_cur_sec <= 0.0
    }

    pub fn consume_ammo_for_shot(&mut self) {
        self.ammo = self.ammo.saturating_sub(1);
        self.fire_cooldown_cur_sec = self.fire_cooldown_max_sec;
    }
}
