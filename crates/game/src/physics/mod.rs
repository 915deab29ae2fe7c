mod world;

pub use world::{ContactPair, PhysicsWorld, TankBodies};
