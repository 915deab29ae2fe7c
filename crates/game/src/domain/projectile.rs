use rapier3d::dynamics::RigidBodyHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectileId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct Projectile {
    pub id: ProjectileId,
    pub owner: super::TankId,
    pub body: Option<RigidBodyHandle>,
    pub position: glam::Vec2,
    pub velocity: glam::Vec2,
}

impl Projectile {
    pub fn new(id: ProjectileId, owner: super::TankId, body: RigidBodyHandle, position: glam::Vec2, velocity: glam::Vec2) -> Self {
        Self {
            id,
            owner,
            body: Some(body),
            position,
            velocity,
        }
    }

    /// Fallback ballistic integration used when the backing physics body is
    /// missing (SPEC_FULL §4.8 step 9).
    pub fn integrate_ballistic(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }
}
