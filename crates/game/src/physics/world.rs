//! Physics substrate for match simulation (C8's rigid-body backend).
//!
//! Kept from the teacher (`crates/game/src/physics/world.rs`): the pipeline
//! wiring (`PhysicsPipeline`/`IslandManager`/`DefaultBroadPhase`/...), the
//! body/collider builder methods, and the position/velocity accessor shape.
//! Added: a [`ContactCollector`] event handler (the teacher passes `&(), &()`
//! and drops every collision event), tank/turret/projectile body builders,
//! a revolute turret joint with a motor, and the tracked-drive force model
//! (`drive_tank`) and turret aim motor driver (`aim_turret`) from
//! `original_source/src/server/game/physics.cpp`.
//!
//! The whole world is confined to the XY plane: bodies translate in X/Y only
//! and rotate about Z only, gravity is zero (top-down, not side-view).

use std::cell::RefCell;

use glam::Vec2;
use rapier3d::prelude::*;

/// Collision filter groups, mirroring `original_source`'s `{BODY, HEAD,
/// PROJECTILE, CRATE}` categories. Turret colliders never collide with any
/// hull (including their own).
mod groups {
    use rapier3d::geometry::Group;

    pub const BODY: Group = Group::GROUP_1;
    pub const HEAD: Group = Group::GROUP_2;
    pub const PROJECTILE: Group = Group::GROUP_3;
    pub const CRATE: Group = Group::GROUP_4;
}

fn hull_collision_groups() -> InteractionGroups {
    InteractionGroups::new(
        groups::BODY,
        groups::BODY | groups::PROJECTILE | groups::CRATE,
    )
}

fn turret_collision_groups() -> InteractionGroups {
    InteractionGroups::new(
        groups::HEAD,
        groups::HEAD | groups::PROJECTILE | groups::CRATE,
    )
}

fn projectile_collision_groups() -> InteractionGroups {
    InteractionGroups::new(
        groups::PROJECTILE,
        groups::BODY | groups::HEAD | groups::CRATE,
    )
}

/// Tracked-vehicle drive constants from `original_source/src/server/game/physics.cpp`.
const GRAVITY_ANALOG: Real = 9.8;
const K_SIDE: Real = 0.9;
const K_DRIVE: Real = 0.7;
const K_NEUTRAL: Real = 0.2;
const TRACK_OFFSET: Real = 2.4;

/// Hull/turret collision half-extents and joint torque cap, also from
/// `physics.cpp`.
pub const HULL_HALF_EXTENTS: (Real, Real) = (2.79, 2.12);
pub const TURRET_HALF_EXTENTS: (Real, Real) = (1.25, 1.0);
pub const REVOLUTE_MAX_MOTOR_TORQUE: Real = 50.0;

#[derive(Debug, Clone, Copy)]
pub struct TankBodies {
    pub hull: RigidBodyHandle,
    pub turret: RigidBodyHandle,
    pub turret_joint: ImpulseJointHandle,
}

#[derive(Debug, Clone, Copy)]
pub struct ContactPair {
    pub collider_a: ColliderHandle,
    pub collider_b: ColliderHandle,
}

/// Collects begin-touch contact events for one physics step. Interior
/// mutability is required because `rapier3d::pipeline::EventHandler`'s
/// methods take `&self`.
#[derive(Default)]
struct ContactCollector {
    started: RefCell<Vec<ContactPair>>,
}

impl rapier3d::pipeline::EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair_>,
    ) {
        if let CollisionEvent::Started(a, b, _flags) = event {
            self.started.borrow_mut().push(ContactPair {
                collider_a: a,
                collider_b: b,
            });
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair_,
        _total_force_magnitude: Real,
    ) {
    }
}

// rapier3d's own contact-pair type, aliased to avoid clashing with our
// wire-facing `ContactPair`.
use rapier3d::geometry::ContactPair as ContactPair_;

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    contacts: ContactCollector,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(1.0 / 30.0)
    }
}

impl PhysicsWorld {
    pub fn new(dt: Real) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = dt;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::zeros(),
            contacts: ContactCollector::default(),
        }
    }

    /// Advances the simulation by one step and returns every begin-touch
    /// contact pair observed during it (SPEC_FULL §6: "iterate begin-touch
    /// contact events after each step").
    pub fn step(&mut self) -> Vec<ContactPair> {
        self.contacts.started.borrow_mut().clear();
        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &self.contacts,
        );
        self.contacts.started.borrow().clone()
    }

    /// Creates a tank's hull body, turret body, and the motorized revolute
    /// joint connecting them, at `position` with hull facing `heading_rad`.
    pub fn add_tank(&mut self, position: Vec2, heading_rad: Real, density: Real, turret_density: Real) -> TankBodies {
        let hull_rotation = Rotation::from_axis_angle(&Vector::z_axis(), heading_rad);
        let hull_body = RigidBodyBuilder::dynamic()
            .position(Pose::from_parts(
                Vector::new(position.x, position.y, 0.0),
                hull_rotation,
            ))
            .enabled_translations(true, true, false)
            .enabled_rotations(false, false, true)
            .linear_damping(0.5)
            .angular_damping(2.0)
            .build();
        let hull = self.bodies.insert(hull_body);

        let hull_collider = ColliderBuilder::cuboid(HULL_HALF_EXTENTS.0, HULL_HALF_EXTENTS.1, 0.5)
            .density(density)
            .collision_groups(hull_collision_groups())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(hull_collider, hull, &mut self.bodies);

        let turret_body = RigidBodyBuilder::dynamic()
            .position(Pose::from_parts(
                Vector::new(position.x, position.y, 0.0),
                hull_rotation,
            ))
            .enabled_translations(true, true, false)
            .enabled_rotations(false, false, true)
            .angular_damping(4.0)
            .build();
        let turret = self.bodies.insert(turret_body);

        let turret_collider = ColliderBuilder::cuboid(TURRET_HALF_EXTENTS.0, TURRET_HALF_EXTENTS.1, 0.5)
            .density(turret_density)
            .collision_groups(turret_collision_groups())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(turret_collider, turret, &mut self.bodies);

        let joint = RevoluteJointBuilder::new(UnitVector::new_normalize(Vector::z_axis().into_inner()))
            .local_anchor1(point![0.0, 0.0, 0.0])
            .local_anchor2(point![0.0, 0.0, 0.0])
            .motor_max_force(REVOLUTE_MAX_MOTOR_TORQUE)
            .build();
        let turret_joint = self.impulse_joints.insert(hull, turret, joint, true);

        TankBodies {
            hull,
            turret,
            turret_joint,
        }
    }

    pub fn add_projectile(&mut self, position: Vec2, velocity: Vec2, density: Real) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .position(Pose::from_parts(
                Vector::new(position.x, position.y, 0.0),
                Rotation::identity(),
            ))
            .enabled_translations(true, true, false)
            .enabled_rotations(false, false, false)
            .linvel(Vector::new(velocity.x, velocity.y, 0.0))
            .ccd_enabled(true)
            .gravity_scale(0.0)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::ball(0.2)
            .density(density)
            .collision_groups(projectile_collision_groups())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .sensor(false)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn body_position_2d(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|b| {
            let t = b.translation();
            Vec2::new(t.x, t.y)
        })
    }

    pub fn body_velocity_2d(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|b| {
            let v = b.linvel();
            Vec2::new(v.x, v.y)
        })
    }

    pub fn body_heading_rad(&self, handle: RigidBodyHandle) -> Option<Real> {
        self.bodies.get(handle).map(|b| b.rotation().scaled_axis().z)
    }

    pub fn angular_velocity(&self, handle: RigidBodyHandle) -> Real {
        self.bodies
            .get(handle)
            .map(|b| b.angvel().z)
            .unwrap_or(0.0)
    }

    pub fn mass(&self, handle: RigidBodyHandle) -> Real {
        self.bodies.get(handle).map(|b| b.mass()).unwrap_or(1.0)
    }

    pub fn apply_force_at_point(&mut self, handle: RigidBodyHandle, force: Vec2, point_world: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_force_at_point(
                Vector::new(force.x, force.y, 0.0),
                point![point_world.x, point_world.y, 0.0],
                true,
            );
        }
    }

    pub fn apply_force(&mut self, handle: RigidBodyHandle, force: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_force(Vector::new(force.x, force.y, 0.0), true);
        }
    }

    pub fn apply_torque(&mut self, handle: RigidBodyHandle, torque: Real) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_torque(Vector::new(0.0, 0.0, torque), true);
        }
    }

    /// Tracked-vehicle drive model (SPEC_FULL §4.8.2).
    pub fn drive_tank(&mut self, hull: RigidBodyHandle, move_dir: Real, turn_dir: Real, brake: bool) {
        let Some(heading) = self.body_heading_rad(hull) else {
            return;
        };
        let mass = self.mass(hull);
        let forward = Vec2::new(heading.cos(), heading.sin());
        let right = Vec2::new(-heading.sin(), heading.cos());
        let position = self.body_position_2d(hull).unwrap_or(Vec2::ZERO);
        let velocity = self.body_velocity_2d(hull).unwrap_or(Vec2::ZERO);

        let dy = move_dir.clamp(-1.0, 1.0);
        let dx = turn_dir.clamp(-1.0, 1.0);

        let left_point = position + right * (-TRACK_OFFSET);
        let right_point = position + right * TRACK_OFFSET;

        if !brake {
            let e1 = (dy + dx).clamp(-1.0, 1.0);
            let e2 = (dy - dx).clamp(-1.0, 1.0);

            let f1 = forward * (e1 * mass * GRAVITY_ANALOG * K_DRIVE);
            let f2 = forward * (e2 * mass * GRAVITY_ANALOG * K_DRIVE);
            self.apply_force_at_point(hull, f1, left_point);
            self.apply_force_at_point(hull, f2, right_point);
        } else {
            let b1 = (-dy - dx).clamp(-1.0, 1.0);
            let b2 = (-dy + dx).clamp(-1.0, 1.0);
            let f1 = forward * (b1 * mass * GRAVITY_ANALOG * K_DRIVE);
            let f2 = forward * (b2 * mass * GRAVITY_ANALOG * K_DRIVE);
            self.apply_force_at_point(hull, f1, left_point);
            self.apply_force_at_point(hull, f2, right_point);
        }

        let forward_speed = velocity.dot(forward);
        if dy.abs() < 1e-3 && dx.abs() < 1e-3 && forward_speed.abs() > 0.01 {
            let k = if brake { K_DRIVE } else { K_NEUTRAL };
            self.apply_force(hull, -forward * (forward_speed.signum() * mass * GRAVITY_ANALOG * k));
        }

        let lateral_speed = velocity.dot(right);
        let speed = velocity.length();
        if speed > 1e-4 {
            self.apply_force(hull, -right * ((lateral_speed / speed) * mass * GRAVITY_ANALOG * K_SIDE));
        }

        if dx.abs() < 1e-3 {
            let av = self.angular_velocity(hull);
            if av.abs() > 0.01 {
                let k = if brake { K_DRIVE } else { K_NEUTRAL };
                self.apply_torque(hull, -av.signum() * mass * GRAVITY_ANALOG * k * TRACK_OFFSET);
            }
        }
    }

    /// Turret aim motor driver (SPEC_FULL §4.8.3). `target_world_angle_rad`
    /// is the desired absolute turret heading; returns nothing, just sets
    /// the joint's motor velocity for this tick.
    pub fn aim_turret(&mut self, joint: ImpulseJointHandle, turret: RigidBodyHandle, target_world_angle_rad: Real) {
        let Some(current) = self.body_heading_rad(turret) else {
            return;
        };

        let mut diff = target_world_angle_rad - current;
        while diff > std::f32::consts::PI {
            diff -= std::f32::consts::TAU;
        }
        while diff < -std::f32::consts::PI {
            diff += std::f32::consts::TAU;
        }

        let fast_threshold = 5.0_f32.to_radians();
        let precise_threshold = 0.01_f32.to_radians();

        let speed = if diff.abs() > fast_threshold {
            diff.signum() * 90.0_f32.to_radians()
        } else if diff.abs() > precise_threshold {
            diff.signum() * 20.0_f32.to_radians() * (diff.abs() / fast_threshold)
        } else {
            0.0
        };

        if let Some(j) = self.impulse_joints.get_mut(joint, true) {
            if let Some(revolute) = j.data.as_revolute_mut() {
                revolute.set_motor_velocity(speed, 1.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tank_spawns_with_hull_and_turret() {
        let mut world = PhysicsWorld::new(1.0 / 30.0);
        let tank = world.add_tank(Vec2::ZERO, 0.0, 1.0, 0.5);
        assert!(world.bodies.get(tank.hull).is_some());
        assert!(world.bodies.get(tank.turret).is_some());
    }

    #[test]
    fn step_returns_no_contacts_when_nothing_touches() {
        let mut world = PhysicsWorld::new(1.0 / 30.0);
        world.add_tank(Vec2::new(0.0, 0.0), 0.0, 1.0, 0.5);
        world.add_tank(Vec2::new(50.0, 50.0), 0.0, 1.0, 0.5);
        let contacts = world.step();
        assert!(contacts.is_empty());
    }
}
