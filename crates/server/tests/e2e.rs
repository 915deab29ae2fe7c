//! End-to-end scenarios, driving the real `tokio::net::TcpListener` server
//! against a raw `TcpStream` client speaking the wire protocol directly —
//! the same black-box style as the reference workspace's
//! `crates/game/tests/connection.rs`.

use std::time::Duration;

use t2d::net::framing::{build_frame, FrameParseState};
use t2d::net::protocol::{ClientMessage, ServerMessage};
use t2d_server::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn send(stream: &mut TcpStream, msg: &ClientMessage) {
    let bytes = msg.encode().unwrap();
    stream.write_all(&build_frame(&bytes)).await.unwrap();
}

/// Reads frames off `stream` until `predicate` returns true for one of them,
/// or `deadline` elapses. Returns every decoded message observed along the
/// way, including the matching one.
async fn wait_for(
    stream: &mut TcpStream,
    deadline: Duration,
    mut predicate: impl FnMut(&ServerMessage) -> bool,
) -> Vec<ServerMessage> {
    let mut parser = FrameParseState::new();
    let mut buf = [0u8; 8192];
    let mut seen = Vec::new();

    let result = timeout(deadline, async {
        loop {
            let n = stream.read(&mut buf).await.expect("read error");
            assert!(n > 0, "connection closed before expected message");
            parser.feed(&buf[..n]);
            while let Ok(Some(payload)) = parser.try_extract() {
                let msg = ServerMessage::decode(&payload).expect("undecodable message");
                let hit = predicate(&msg);
                seen.push(msg);
                if hit {
                    return;
                }
            }
        }
    })
    .await;

    result.unwrap_or_else(|_| panic!("timed out waiting for message, saw: {seen:?}"));
    seen
}

#[tokio::test]
async fn scenario_match_start_single_player() {
    let config = Config {
        max_players_per_match: 1,
        fill_timeout_seconds: 180,
        tick_rate: 30,
        listen_port: 0,
        metrics_port: 0,
        matchmaker_poll_ms: 20,
        ..Config::default()
    };
    let server = t2d_server::spawn(config).await.unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send(
        &mut client,
        &ClientMessage::AuthRequest {
            oauth_token: "x".into(),
            client_version: "t".into(),
        },
    )
    .await;
    send(&mut client, &ClientMessage::QueueJoin).await;

    let seen = wait_for(&mut client, Duration::from_secs(8), |msg| {
        matches!(msg, ServerMessage::StateSnapshot { server_tick: 0, .. })
    })
    .await;

    assert!(seen
        .iter()
        .any(|m| matches!(m, ServerMessage::AuthResponse { success: true, .. })));
    assert!(seen
        .iter()
        .any(|m| matches!(m, ServerMessage::QueueStatusUpdate { .. })));
    assert!(seen.iter().any(|m| matches!(m, ServerMessage::MatchStart { .. })));

    server.shutdown.trigger();
}

#[tokio::test]
async fn scenario_bot_fill() {
    let config = Config {
        max_players_per_match: 4,
        fill_timeout_seconds: 1,
        tick_rate: 60,
        listen_port: 0,
        metrics_port: 0,
        matchmaker_poll_ms: 20,
        ..Config::default()
    };
    let server = t2d_server::spawn(config).await.unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send(
        &mut client,
        &ClientMessage::AuthRequest {
            oauth_token: "x".into(),
            client_version: "t".into(),
        },
    )
    .await;
    send(&mut client, &ClientMessage::QueueJoin).await;

    let seen = wait_for(&mut client, Duration::from_secs(6), |msg| {
        matches!(msg, ServerMessage::StateSnapshot { .. })
    })
    .await;
    assert!(seen.iter().any(|m| matches!(m, ServerMessage::MatchStart { .. })));

    server.shutdown.trigger();
}

#[tokio::test]
async fn scenario_movement_is_observable() {
    let config = Config {
        max_players_per_match: 1,
        fill_timeout_seconds: 180,
        tick_rate: 30,
        listen_port: 0,
        metrics_port: 0,
        matchmaker_poll_ms: 20,
        ..Config::default()
    };
    let server = t2d_server::spawn(config).await.unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send(
        &mut client,
        &ClientMessage::AuthRequest {
            oauth_token: "x".into(),
            client_version: "t".into(),
        },
    )
    .await;
    send(&mut client, &ClientMessage::QueueJoin).await;

    let seen = wait_for(&mut client, Duration::from_secs(8), |msg| {
        matches!(msg, ServerMessage::StateSnapshot { server_tick: 0, .. })
    })
    .await;
    let baseline = seen
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::StateSnapshot { tanks, .. } => Some(tanks),
            _ => None,
        })
        .unwrap();
    let baseline_xy = (baseline[0].x, baseline[0].y);

    send(
        &mut client,
        &ClientMessage::InputCommand {
            session_id: String::new(),
            client_tick: 1,
            move_dir: 1.0,
            turn_dir: 0.0,
            turret_turn: 0.0,
            fire: false,
            brake: false,
        },
    )
    .await;

    let seen = wait_for(&mut client, Duration::from_secs(6), |msg| match msg {
        ServerMessage::StateSnapshot { tanks, .. } | ServerMessage::DeltaSnapshot { tanks, .. } => {
            tanks
                .iter()
                .any(|t| (t.x, t.y) != baseline_xy)
        }
        _ => false,
    })
    .await;
    assert!(!seen.is_empty());

    server.shutdown.trigger();
}

#[tokio::test]
async fn scenario_heartbeat_round_trip() {
    let config = Config {
        listen_port: 0,
        metrics_port: 0,
        ..Config::default()
    };
    let server = t2d_server::spawn(config).await.unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send(
        &mut client,
        &ClientMessage::AuthRequest {
            oauth_token: "x".into(),
            client_version: "t".into(),
        },
    )
    .await;

    let seen = wait_for(&mut client, Duration::from_secs(3), |msg| {
        matches!(msg, ServerMessage::AuthResponse { .. })
    })
    .await;
    let session_id = seen
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::AuthResponse { session_id, .. } => Some(session_id),
            _ => None,
        })
        .unwrap();

    send(
        &mut client,
        &ClientMessage::Heartbeat {
            session_id,
            time_ms: 5_000,
        },
    )
    .await;

    let seen = wait_for(&mut client, Duration::from_secs(3), |msg| {
        matches!(msg, ServerMessage::HeartbeatResponse { .. })
    })
    .await;
    let (client_time_ms, server_time_ms, delta_ms) = seen
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::HeartbeatResponse {
                client_time_ms,
                server_time_ms,
                delta_ms,
                ..
            } => Some((client_time_ms, server_time_ms, delta_ms)),
            _ => None,
        })
        .unwrap();
    assert_eq!(client_time_ms, 5_000);
    assert!(server_time_ms >= client_time_ms);
    assert_eq!(delta_ms, server_time_ms - client_time_ms);

    server.shutdown.trigger();
}

#[tokio::test]
async fn scenario_damage_and_kill() {
    let config = Config {
        max_players_per_match: 2,
        fill_timeout_seconds: 1,
        tick_rate: 30,
        projectile_damage: 200,
        listen_port: 0,
        metrics_port: 0,
        matchmaker_poll_ms: 20,
        ..Config::default()
    };
    let server = t2d_server::spawn(config).await.unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send(
        &mut client,
        &ClientMessage::AuthRequest {
            oauth_token: "x".into(),
            client_version: "t".into(),
        },
    )
    .await;
    send(&mut client, &ClientMessage::QueueJoin).await;

    wait_for(&mut client, Duration::from_secs(8), |msg| {
        matches!(msg, ServerMessage::MatchStart { .. })
    })
    .await;

    send(
        &mut client,
        &ClientMessage::InputCommand {
            session_id: String::new(),
            client_tick: 1,
            move_dir: 0.0,
            turn_dir: 0.0,
            turret_turn: 0.0,
            fire: true,
            brake: false,
        },
    )
    .await;

    let seen = wait_for(&mut client, Duration::from_secs(15), |msg| {
        matches!(
            msg,
            ServerMessage::DamageEvent { .. } | ServerMessage::TankDestroyed { .. }
        )
    })
    .await;

    assert!(seen.iter().any(|m| matches!(
        m,
        ServerMessage::DamageEvent { .. } | ServerMessage::TankDestroyed { .. }
    )));

    server.shutdown.trigger();
}

#[tokio::test]
async fn scenario_delta_snapshot_cycle() {
    let config = Config {
        max_players_per_match: 1,
        fill_timeout_seconds: 180,
        tick_rate: 30,
        snapshot_interval_ticks: 1,
        full_snapshot_interval_ticks: 5,
        listen_port: 0,
        metrics_port: 0,
        matchmaker_poll_ms: 20,
        ..Config::default()
    };
    let server = t2d_server::spawn(config).await.unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send(
        &mut client,
        &ClientMessage::AuthRequest {
            oauth_token: "x".into(),
            client_version: "t".into(),
        },
    )
    .await;
    send(&mut client, &ClientMessage::QueueJoin).await;

    wait_for(&mut client, Duration::from_secs(8), |msg| {
        matches!(msg, ServerMessage::StateSnapshot { server_tick: 0, .. })
    })
    .await;

    let seen = wait_for(&mut client, Duration::from_secs(10), |msg| {
        matches!(msg, ServerMessage::DeltaSnapshot { base_tick: 0, .. })
    })
    .await;
    assert!(seen
        .iter()
        .any(|m| matches!(m, ServerMessage::DeltaSnapshot { base_tick: 0, .. })));

    let seen = wait_for(&mut client, Duration::from_secs(10), |msg| {
        matches!(msg, ServerMessage::StateSnapshot { server_tick, .. } if *server_tick > 0)
    })
    .await;
    assert!(seen
        .iter()
        .any(|m| matches!(m, ServerMessage::StateSnapshot { server_tick, .. } if *server_tick > 0)));

    server.shutdown.trigger();
}
