//! Match runtime (C8): the per-match tick loop. Grounded on
//! `original_source/src/server/game/match.cpp` for the loop body ordering
//! and `physics.cpp` for the drive/turret/contact math (see
//! `t2d::physics::world` for the force model itself). The deadline-based
//! scheduler (`next_tick_deadline += tick_interval`, drift absorbed into the
//! next wait) replaces the teacher's delta-accumulator
//! (`crates/game/src/simulation/tick.rs`'s `FixedTimestep`), per SPEC_FULL
//! §4.8 step 1.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use t2d::domain::{MatchConfig, Projectile, ProjectileId, Tank, TankId};
use t2d::net::protocol::{KillFeedEntry, ProjectileWire, ServerMessage, TankWire};
use t2d::net::session::{SessionHandle, SharedRegistry};
use t2d::physics::PhysicsWorld;
use t2d::sim::snapshot::SnapshotEncoder;
use t2d::Metrics;

use crate::matchmaking::bot_ai;
use crate::shutdown::Shutdown;

pub struct Participant {
    pub session: SessionHandle,
    pub is_bot: bool,
}

pub struct MatchRuntime {
    match_id: u64,
    config: MatchConfig,
    physics: PhysicsWorld,
    participants: Vec<Participant>,
    tanks: Vec<Tank>,
    projectiles: Vec<Projectile>,
    next_projectile_id: u32,
    encoder: SnapshotEncoder,
    server_tick: u64,
    initial_player_count: u32,
    kill_feed_buffer: Vec<KillFeedEntry>,
}

const MUZZLE_OFFSET: f32 = 2.5;
const OUT_OF_BOUNDS: f32 = 100.0;
const GRACE_TICKS_MULT: u64 = 2;

impl MatchRuntime {
    pub fn new(match_id: u64, config: MatchConfig, participants: Vec<Participant>) -> Self {
        let dt = 1.0 / config.tick_rate as f32;
        let mut physics = PhysicsWorld::new(dt);

        let mut tanks = Vec::with_capacity(participants.len());
        let mut bot_index = 0u32;
        for (i, p) in participants.iter().enumerate() {
            let position = if p.is_bot {
                bot_index += 1;
                Vec2::new(-7.0 * bot_index as f32, 0.0)
            } else {
                Vec2::ZERO
            };
            let bodies = physics.add_tank(position, 0.0, config.hull_density, config.turret_density);
            let tank = Tank::new(
                TankId(i as u32 + 1),
                bodies.hull,
                bodies.turret,
                bodies.turret_joint,
                config.max_ammo,
                config.fire_cooldown_sec,
            );
            tanks.push(tank);
        }

        let initial_player_count = participants.len() as u32;
        let encoder = SnapshotEncoder::with_quantization(config.quantize_snapshots);

        Self {
            match_id,
            config,
            physics,
            participants,
            tanks,
            projectiles: Vec::new(),
            next_projectile_id: 1,
            encoder,
            server_tick: 0,
            initial_player_count,
            kill_feed_buffer: Vec::new(),
        }
    }

    pub fn baseline_snapshot(&mut self) -> ServerMessage {
        let tanks = self.wire_tanks();
        self.encoder.full_snapshot(0, &tanks, &[])
    }

    fn wire_tanks(&self) -> Vec<TankWire> {
        self.tanks
            .iter()
            .filter(|t| t.alive)
            .map(|t| {
                let pos = self.physics.body_position_2d(t.hull).unwrap_or(Vec2::ZERO);
                let hull_deg = self
                    .physics
                    .body_heading_rad(t.hull)
                    .unwrap_or(0.0)
                    .to_degrees();
                let turret_deg = self
                    .physics
                    .body_heading_rad(t.turret)
                    .unwrap_or(0.0)
                    .to_degrees();
                TankWire {
                    id: t.id.0,
                    x: pos.x,
                    y: pos.y,
                    hull_angle_deg: hull_deg,
                    turret_angle_deg: turret_deg,
                    hp: t.hp,
                    ammo: t.ammo,
                }
            })
            .collect()
    }

    fn wire_projectiles(&self) -> Vec<ProjectileWire> {
        self.projectiles
            .iter()
            .map(|p| ProjectileWire {
                id: p.id.0,
                x: p.position.x,
                y: p.position.y,
                vx: p.velocity.x,
                vy: p.velocity.y,
            })
            .collect()
    }

    pub async fn run(
        mut self,
        registry: SharedRegistry,
        metrics: Arc<Metrics>,
        shutdown: Shutdown,
    ) {
        let tick_interval = Duration::from_secs_f64(1.0 / self.config.tick_rate as f64);
        let hard_cap = if self.initial_player_count <= 1 {
            Duration::from_secs(120)
        } else if self.config.disable_bot_fire {
            Duration::from_secs(300)
        } else {
            Duration::from_secs(60)
        };

        let bot_count = self.participants.iter().filter(|p| p.is_bot).count() as u64;
        metrics
            .active_matches
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        metrics
            .bots_in_match
            .fetch_add(bot_count, std::sync::atomic::Ordering::Relaxed);

        let started = tokio::time::Instant::now();
        let mut next_deadline = tokio::time::Instant::now();

        loop {
            if shutdown.is_set() {
                break;
            }
            tokio::time::sleep_until(next_deadline).await;
            next_deadline += tick_interval;

            let tick_started = std::time::Instant::now();
            self.server_tick += 1;

            self.disconnect_sweep(&registry);
            self.apply_inputs(&registry);
            self.tick_cooldowns_and_reload(tick_interval.as_secs_f32());
            let contacts = self.physics.step();
            self.resolve_contacts(contacts, &registry);
            self.sync_projectiles(tick_interval.as_secs_f32());
            self.cull_out_of_bounds();
            self.emit_snapshot(&registry, &metrics);
            self.flush_kill_feed(&registry);

            metrics.record_tick_duration(tick_started.elapsed());
            metrics.projectiles_active.store(
                self.projectiles.len() as u64,
                std::sync::atomic::Ordering::Relaxed,
            );

            if self.server_tick > GRACE_TICKS_MULT * self.config.tick_rate as u64 {
                let alive = self.tanks.iter().filter(|t| t.alive).count();
                if alive <= 1 && self.initial_player_count > 1 {
                    let winner = self
                        .tanks
                        .iter()
                        .find(|t| t.alive)
                        .map(|t| t.id.0)
                        .unwrap_or(0);
                    self.end_match(&registry, winner);
                    break;
                }
            }

            if started.elapsed() >= hard_cap {
                self.end_match(&registry, 0);
                break;
            }
        }

        for tank in &self.tanks {
            self.physics.remove_body(tank.hull);
            self.physics.remove_body(tank.turret);
        }
        metrics
            .active_matches
            .fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
        metrics
            .bots_in_match
            .fetch_sub(bot_count, std::sync::atomic::Ordering::Relaxed);
    }

    fn disconnect_sweep(&mut self, registry: &SharedRegistry) {
        let mut disconnected = Vec::new();
        {
            let reg = registry.lock().unwrap();
            for (i, p) in self.participants.iter().enumerate() {
                if p.is_bot {
                    continue;
                }
                let tank = &mut self.tanks[i];
                if tank.alive && reg.get(p.session).is_none() {
                    tank.hp = 0;
                    tank.alive = false;
                    self.encoder.record_removed_tank(tank.id.0);
                    self.kill_feed_buffer.push(KillFeedEntry {
                        victim_id: tank.id.0,
                        attacker_id: 0,
                    });
                    disconnected.push(tank.id.0);
                }
            }
        }
        for victim_id in disconnected {
            self.broadcast(
                registry,
                ServerMessage::TankDestroyed {
                    victim_id,
                    attacker_id: 0,
                },
            );
        }
    }

    fn apply_inputs(&mut self, registry: &SharedRegistry) {
        let tick = self.server_tick;
        let bot_fire_interval = self.config.bot_fire_interval_ticks;
        let disable_bot_fire = self.config.disable_bot_fire;

        let candidates: Vec<bot_ai::Candidate> = self
            .tanks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(i, t)| bot_ai::Candidate {
                tank_index: i,
                position: self.physics.body_position_2d(t.hull).unwrap_or(Vec2::ZERO),
                is_bot: self.participants[i].is_bot,
            })
            .collect();

        for i in 0..self.tanks.len() {
            if !self.tanks[i].alive {
                continue;
            }

            let input = if self.participants[i].is_bot {
                let self_pos = self.physics.body_position_2d(self.tanks[i].hull).unwrap_or(Vec2::ZERO);
                let hull_heading = self.physics.body_heading_rad(self.tanks[i].hull).unwrap_or(0.0);
                let turret_heading = self.physics.body_heading_rad(self.tanks[i].turret).unwrap_or(0.0);
                let others: Vec<bot_ai::Candidate> =
                    candidates.iter().filter(|c| c.tank_index != i).cloned().collect();
                let target_tank_index = bot_ai::pick_target(self_pos, &others);
                let target_pos = target_tank_index.map(|idx| {
                    self.physics
                        .body_position_2d(self.tanks[idx].hull)
                        .unwrap_or(Vec2::ZERO)
                });
                let input = bot_ai::compute_input(
                    self_pos,
                    hull_heading,
                    turret_heading,
                    target_pos,
                    tick,
                    bot_fire_interval,
                    disable_bot_fire,
                );
                let mut reg = registry.lock().unwrap();
                reg.set_bot_input(self.participants[i].session, input.clone());
                input
            } else {
                let reg = registry.lock().unwrap();
                let snapshot = reg.get_input(self.participants[i].session);
                t2d::net::session::InputSnapshot {
                    client_tick: snapshot.client_tick,
                    move_dir: snapshot.move_dir,
                    turn_dir: snapshot.turn_dir,
                    turret_turn: snapshot.turret_turn,
                    fire: snapshot.fire,
                    brake: snapshot.brake,
                }
            };

            self.drive_and_fire(i, &input, registry);
        }
    }

    fn drive_and_fire(
        &mut self,
        i: usize,
        input: &t2d::net::session::InputSnapshot,
        registry: &SharedRegistry,
    ) {
        let hull = self.tanks[i].hull;
        let turret = self.tanks[i].turret;
        let joint = self.tanks[i].turret_joint;

        self.physics.drive_tank(hull, input.move_dir, input.turn_dir, input.brake);

        if input.turret_turn.abs() > 1e-4 {
            let dt = 1.0 / self.config.tick_rate as f32;
            let current = self.physics.body_heading_rad(turret).unwrap_or(0.0);
            let target = current + input.turret_turn * 120f32.to_radians() * dt;
            self.tanks[i].turret_target_angle_rad = target;
        }
        self.physics
            .aim_turret(joint, turret, self.tanks[i].turret_target_angle_rad);

        if input.fire && self.tanks[i].can_fire() {
            self.spawn_projectile(i);
            self.tanks[i].consume_ammo_for_shot();
            if self.participants[i].is_bot {
                registry
                    .lock()
                    .unwrap()
                    .clear_bot_fire(self.participants[i].session);
            }
        }
    }

    fn spawn_projectile(&mut self, owner_index: usize) {
        let tank = &self.tanks[owner_index];
        let turret_angle = self.physics.body_heading_rad(tank.turret).unwrap_or(0.0);
        let turret_pos = self.physics.body_position_2d(tank.turret).unwrap_or(Vec2::ZERO);
        let forward = Vec2::new(turret_angle.cos(), turret_angle.sin());
        let muzzle = turret_pos + forward * MUZZLE_OFFSET;
        let velocity = forward * self.config.projectile_speed;

        let body = self
            .physics
            .add_projectile(muzzle, velocity, self.config.projectile_density);
        let id = ProjectileId(self.next_projectile_id);
        self.next_projectile_id += 1;
        self.projectiles
            .push(Projectile::new(id, tank.id, body, muzzle, velocity));
    }

    fn tick_cooldowns_and_reload(&mut self, dt: f32) {
        for tank in &mut self.tanks {
            if !tank.alive {
                continue;
            }
            tank.tick_cooldown(dt);
            tank.tick_reload(dt, self.config.reload_interval_sec);
        }
    }

    fn resolve_contacts(&mut self, contacts: Vec<t2d::physics::ContactPair>, registry: &SharedRegistry) {
        for pair in contacts {
            let hit = self.match_projectile_and_tank(pair.collider_a, pair.collider_b)
                .or_else(|| self.match_projectile_and_tank(pair.collider_b, pair.collider_a));

            let Some((projectile_idx, tank_idx)) = hit else {
                continue;
            };

            let owner = self.projectiles[projectile_idx].owner;
            if owner.0 == self.tanks[tank_idx].id.0 {
                continue; // friendly fire / self-hit skipped
            }

            if self.tanks[tank_idx].alive {
                let remaining = self.tanks[tank_idx].apply_damage(self.config.projectile_damage);
                let victim_id = self.tanks[tank_idx].id.0;
                self.broadcast(
                    registry,
                    ServerMessage::DamageEvent {
                        victim_id,
                        attacker_id: owner.0,
                        amount: self.config.projectile_damage,
                        remaining_hp: remaining,
                    },
                );
                if !self.tanks[tank_idx].alive {
                    self.encoder.record_removed_tank(victim_id);
                    self.kill_feed_buffer.push(KillFeedEntry {
                        victim_id,
                        attacker_id: owner.0,
                    });
                    self.broadcast(
                        registry,
                        ServerMessage::TankDestroyed {
                            victim_id,
                            attacker_id: owner.0,
                        },
                    );
                }
            }

            if let Some(body) = self.projectiles[projectile_idx].body.take() {
                self.physics.remove_body(body);
            }
            self.encoder
                .record_removed_projectile(self.projectiles[projectile_idx].id.0);
            self.projectiles.remove(projectile_idx);
        }
    }

    fn match_projectile_and_tank(
        &self,
        maybe_projectile: rapier3d::geometry::ColliderHandle,
        maybe_tank: rapier3d::geometry::ColliderHandle,
    ) -> Option<(usize, usize)> {
        let projectile_idx = self.projectiles.iter().position(|p| {
            p.body
                .and_then(|b| self.physics.colliders.iter().find_map(|(h, c)| {
                    (c.parent() == Some(b) && h == maybe_projectile).then_some(())
                }))
                .is_some()
        })?;
        let tank_idx = self.tanks.iter().position(|t| {
            self.physics.colliders.iter().any(|(h, c)| {
                h == maybe_tank && (c.parent() == Some(t.hull) || c.parent() == Some(t.turret))
            })
        })?;
        Some((projectile_idx, tank_idx))
    }

    fn sync_projectiles(&mut self, dt: f32) {
        for p in &mut self.projectiles {
            if let Some(body) = p.body {
                if let Some(pos) = self.physics.body_position_2d(body) {
                    p.position = pos;
                }
                if let Some(vel) = self.physics.body_velocity_2d(body) {
                    p.velocity = vel;
                }
            } else {
                p.integrate_ballistic(dt);
            }
        }
    }

    fn cull_out_of_bounds(&mut self) {
        let mut i = 0;
        while i < self.projectiles.len() {
            let p = &self.projectiles[i];
            if p.position.x.abs() > OUT_OF_BOUNDS || p.position.y.abs() > OUT_OF_BOUNDS {
                if let Some(body) = p.body {
                    self.physics.remove_body(body);
                }
                self.encoder.record_removed_projectile(p.id.0);
                self.projectiles.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn emit_snapshot(&mut self, registry: &SharedRegistry, metrics: &Arc<Metrics>) {
        if self.server_tick % self.config.snapshot_interval_ticks != 0 {
            return;
        }

        let tanks = self.wire_tanks();
        let projectiles = self.wire_projectiles();

        let msg = if self
            .encoder
            .should_emit_full(self.server_tick, self.config.full_snapshot_interval_ticks)
        {
            let msg = self.encoder.full_snapshot(self.server_tick, &tanks, &projectiles);
            if let Ok(bytes) = match &msg {
                ServerMessage::StateSnapshot { .. } => msg.encode(),
                _ => unreachable!(),
            } {
                metrics.record_full_snapshot(bytes.len());
            }
            msg
        } else {
            let msg = self.encoder.delta_snapshot(self.server_tick, &tanks, &projectiles);
            if let Ok(bytes) = msg.encode() {
                metrics.record_delta_snapshot(bytes.len());
            }
            msg
        };

        self.broadcast(registry, msg);
    }

    fn flush_kill_feed(&mut self, registry: &SharedRegistry) {
        if self.kill_feed_buffer.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.kill_feed_buffer);
        self.broadcast(registry, ServerMessage::KillFeedUpdate { events });
    }

    fn end_match(&mut self, registry: &SharedRegistry, winner_entity_id: u32) {
        for projectile in self.projectiles.drain(..) {
            if let Some(body) = projectile.body {
                self.physics.remove_body(body);
            }
        }
        self.broadcast(
            registry,
            ServerMessage::MatchEnd {
                match_id: self.match_id,
                winner_entity_id,
                server_tick: self.server_tick,
            },
        );
    }

    fn broadcast(&self, registry: &SharedRegistry, msg: ServerMessage) {
        let mut reg = registry.lock().unwrap();
        for p in &self.participants {
            reg.push_message(p.session, msg.clone());
        }
    }
}
