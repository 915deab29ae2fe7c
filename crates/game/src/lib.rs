pub mod domain;
pub mod metrics;
pub mod net;
pub mod physics;
pub mod sim;

pub use domain::{MatchConfig, Projectile, ProjectileId, Tank, TankId};
pub use metrics::Metrics;
pub use net::auth::{AuthDecision, AuthProvider, DisabledAuth, StubAuth};
pub use net::framing::{FrameParseState, build_frame, try_extract};
pub use net::protocol::{ClientMessage, KillFeedEntry, ServerMessage, TankWire, ProjectileWire};
pub use net::session::{InputSnapshot, Session, SessionHandle, SessionRegistry};
pub use physics::PhysicsWorld;
pub use sim::snapshot::SnapshotEncoder;
