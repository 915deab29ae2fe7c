//! Wire message schema (C2). Tagged enums encoded with `rkyv`, carried as a
//! single frame payload each (see [`crate::net::framing`]).

use rkyv::{Archive, Deserialize, Serialize, rancor};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("truncated message")]
    Truncated,
    #[error("corrupt message: {0}")]
    Corrupt(rancor::Error),
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct TankWire {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub hull_angle_deg: f32,
    pub turret_angle_deg: f32,
    pub hp: u16,
    pub ammo: u16,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ProjectileWire {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct KillFeedEntry {
    pub victim_id: u32,
    pub attacker_id: u32,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ClientMessage {
    AuthRequest {
        oauth_token: String,
        client_version: String,
    },
    QueueJoin,
    Heartbeat {
        session_id: String,
        time_ms: u64,
    },
    InputCommand {
        session_id: String,
        client_tick: u64,
        move_dir: f32,
        turn_dir: f32,
        turret_turn: f32,
        fire: bool,
        brake: bool,
    },
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ServerMessage {
    AuthResponse {
        success: bool,
        session_id: String,
        reason: String,
    },
    QueueStatusUpdate {
        position: u32,
        players_in_queue: u32,
        needed_for_match: u32,
        timeout_seconds_left: u32,
        lobby_state: String,
        lobby_countdown: u32,
        projected_bot_fill: u32,
    },
    MatchStart {
        match_id: u64,
        tick_rate: u32,
        seed: u64,
    },
    StateSnapshot {
        server_tick: u64,
        tanks: Vec<TankWire>,
        projectiles: Vec<ProjectileWire>,
        crates: Vec<u32>,
        ammo_boxes: Vec<u32>,
    },
    DeltaSnapshot {
        server_tick: u64,
        base_tick: u64,
        tanks: Vec<TankWire>,
        projectiles: Vec<ProjectileWire>,
        removed_tanks: Vec<u32>,
        removed_projectiles: Vec<u32>,
        removed_crates: Vec<u32>,
    },
    DamageEvent {
        victim_id: u32,
        attacker_id: u32,
        amount: u16,
        remaining_hp: u16,
    },
    TankDestroyed {
        victim_id: u32,
        attacker_id: u32,
    },
    KillFeedUpdate {
        events: Vec<KillFeedEntry>,
    },
    HeartbeatResponse {
        session_id: String,
        client_time_ms: u64,
        server_time_ms: u64,
        delta_ms: u64,
    },
    MatchEnd {
        match_id: u64,
        winner_entity_id: u32,
        server_tick: u64,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(ProtocolError::Corrupt)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.is_empty() {
            return Err(ProtocolError::Truncated);
        }
        rkyv::from_bytes::<Self, rancor::Error>(bytes).map_err(ProtocolError::Corrupt)
    }
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(ProtocolError::Corrupt)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.is_empty() {
            return Err(ProtocolError::Truncated);
        }
        rkyv::from_bytes::<Self, rancor::Error>(bytes).map_err(ProtocolError::Corrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_round_trip() {
        let msg = ClientMessage::InputCommand {
            session_id: "s1".into(),
            client_tick: 7,
            move_dir: 1.0,
            turn_dir: -0.5,
            turret_turn: 0.0,
            fire: true,
            brake: false,
        };
        let bytes = msg.encode().unwrap();
        let decoded = ClientMessage::decode(&bytes).unwrap();
        match decoded {
            ClientMessage::InputCommand { client_tick, fire, .. } => {
                assert_eq!(client_tick, 7);
                assert!(fire);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn server_message_round_trip() {
        let msg = ServerMessage::MatchStart {
            match_id: 1,
            tick_rate: 30,
            seed: 42,
        };
        let bytes = msg.encode().unwrap();
        let decoded = ServerMessage::decode(&bytes).unwrap();
        match decoded {
            ServerMessage::MatchStart { match_id, tick_rate, seed } => {
                assert_eq!(match_id, 1);
                assert_eq!(tick_rate, 30);
                assert_eq!(seed, 42);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_empty_is_truncated() {
        assert!(matches!(
            ClientMessage::decode(&[]),
            Err(ProtocolError::Truncated)
        ));
    }
}
