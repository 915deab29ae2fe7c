mod config;
mod projectile;
mod tank;

pub use config::MatchConfig;
pub use projectile::{Projectile, ProjectileId};
pub use tank::{Tank, TankId};
