//! Connection worker (C5), grounded on
//! `original_source/src/server/net/listener.cpp`'s `connection_loop`: drain
//! outbound mailbox, poll-read with a short timeout, dispatch extracted
//! frames. Auth dispatch goes through the real [`AuthProvider`] (§9 Open
//! Question (b)), not the source file's simplified always-accept stub.

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use t2d::net::auth::AuthProvider;
use t2d::net::framing::{FrameParseState, build_frame};
use t2d::net::protocol::{ClientMessage, ServerMessage};
use t2d::net::session::{InputSnapshot, SessionHandle, SharedRegistry};
use t2d::Metrics;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::shutdown::Shutdown;

const READ_POLL: Duration = Duration::from_millis(50);

pub async fn run(
    mut stream: TcpStream,
    registry: SharedRegistry,
    auth: Arc<dyn AuthProvider>,
    metrics: Arc<Metrics>,
    shutdown: Shutdown,
) {
    let handle = { registry.lock().unwrap().add_connection() };
    let mut parser = FrameParseState::new();
    let mut read_buf = [0u8; 4096];

    loop {
        if shutdown.is_set() {
            break;
        }

        if let Err(e) = flush_outbound(&mut stream, &registry, handle).await {
            log::debug!("connection write error: {e}");
            break;
        }

        match tokio::time::timeout(READ_POLL, stream.read(&mut read_buf)).await {
            Ok(Ok(0)) => break, // peer closed
            Ok(Ok(n)) => {
                parser.feed(&read_buf[..n]);
                loop {
                    match parser.try_extract() {
                        Ok(Some(payload)) => {
                            if dispatch(&payload, &registry, handle, &auth, &metrics)
                                .await
                                .is_err()
                            {
                                disconnect(&registry, &metrics, handle);
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(()) => {
                            disconnect(&registry, &metrics, handle);
                            return;
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                log::debug!("connection read error: {e}");
                break;
            }
            Err(_timeout) => continue,
        }
    }

    disconnect(&registry, &metrics, handle);
}

fn disconnect(registry: &SharedRegistry, metrics: &Arc<Metrics>, handle: SessionHandle) {
    let mut reg = registry.lock().unwrap();
    reg.disconnect_session(handle);
    metrics
        .connected_players
        .store(reg.connected_players, std::sync::atomic::Ordering::Relaxed);
}

async fn flush_outbound(
    stream: &mut TcpStream,
    registry: &SharedRegistry,
    handle: SessionHandle,
) -> io::Result<()> {
    let messages = { registry.lock().unwrap().drain_messages(handle) };
    if messages.is_empty() {
        return Ok(());
    }

    let mut batch = Vec::new();
    for msg in &messages {
        if let Ok(bytes) = msg.encode() {
            batch.extend(build_frame(&bytes));
        }
    }
    stream.write_all(&batch).await
}

async fn dispatch(
    payload: &[u8],
    registry: &SharedRegistry,
    handle: SessionHandle,
    auth: &Arc<dyn AuthProvider>,
    metrics: &Arc<Metrics>,
) -> Result<(), ()> {
    let msg = ClientMessage::decode(payload).map_err(|_| ())?;

    match msg {
        ClientMessage::AuthRequest { oauth_token, .. } => {
            let decision = auth.authenticate(&oauth_token);
            if decision.ok {
                let mut reg = registry.lock().unwrap();
                reg.authenticate(handle, decision.user_id.clone());
                metrics
                    .connected_players
                    .store(reg.connected_players, std::sync::atomic::Ordering::Relaxed);
                reg.push_message(
                    handle,
                    ServerMessage::AuthResponse {
                        success: true,
                        session_id: decision.user_id,
                        reason: String::new(),
                    },
                );
            } else {
                metrics
                    .auth_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                registry.lock().unwrap().push_message(
                    handle,
                    ServerMessage::AuthResponse {
                        success: false,
                        session_id: String::new(),
                        reason: decision.reason,
                    },
                );
            }
        }
        ClientMessage::QueueJoin => {
            let mut reg = registry.lock().unwrap();
            if reg.get(handle).map(|s| s.authenticated).unwrap_or(false) {
                reg.enqueue(handle);
            }
        }
        ClientMessage::Heartbeat { session_id, time_ms } => {
            let mut reg = registry.lock().unwrap();
            reg.update_heartbeat(handle);
            let server_time_ms = now_ms();
            let delta_ms = server_time_ms.saturating_sub(time_ms);
            reg.push_message(
                handle,
                ServerMessage::HeartbeatResponse {
                    session_id,
                    client_time_ms: time_ms,
                    server_time_ms,
                    delta_ms,
                },
            );
        }
        ClientMessage::InputCommand {
            client_tick,
            move_dir,
            turn_dir,
            turret_turn,
            fire,
            brake,
            ..
        } => {
            let mut reg = registry.lock().unwrap();
            if reg.get(handle).map(|s| s.authenticated).unwrap_or(false) {
                reg.update_input(
                    handle,
                    InputSnapshot {
                        client_tick,
                        move_dir,
                        turn_dir,
                        turret_turn,
                        fire,
                        brake,
                    },
                );
            }
        }
    }

    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
