//! Session registry (C3), grounded on
//! `original_source/src/server/matchmaking/session_manager.cpp`.
//!
//! A single mutex guards the whole registry; every operation below is a
//! synchronous, non-blocking critical section, so an `std::sync::Mutex`
//! (rather than an async one) is the correct primitive — callers never hold
//! the lock across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::net::protocol::ServerMessage;

/// Opaque internal key for a session, distinct from the wire-visible
/// `connection_id`/`session_id` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(pub u64);

#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    pub client_tick: u64,
    pub move_dir: f32,
    pub turn_dir: f32,
    pub turret_turn: f32,
    pub fire: bool,
    pub brake: bool,
}

pub struct Session {
    pub handle: SessionHandle,
    pub connection_id: String,
    pub session_id: Option<String>,
    pub is_bot: bool,
    pub authenticated: bool,
    pub in_queue: bool,
    pub queue_joined_at: Option<Instant>,
    pub last_heartbeat: Option<Instant>,
    pub match_id: Option<u64>,
    pub tank_id: u32,
    pub input: InputSnapshot,
    mailbox: VecDeque<ServerMessage>,
}

impl Session {
    fn new(handle: SessionHandle, connection_id: String, is_bot: bool) -> Self {
        Self {
            handle,
            connection_id,
            session_id: None,
            is_bot,
            authenticated: false,
            in_queue: false,
            queue_joined_at: None,
            last_heartbeat: None,
            match_id: None,
            tank_id: 0,
            input: InputSnapshot::default(),
            mailbox: VecDeque::new(),
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionHandle, Session>,
    by_connection: HashMap<String, SessionHandle>,
    by_session_id: HashMap<String, SessionHandle>,
    queue: Vec<SessionHandle>,
    next_handle: u64,
    next_connection_id: u64,
    next_bot_id: u64,
    pub connected_players: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&mut self) -> SessionHandle {
        let handle = SessionHandle(self.next_handle);
        self.next_handle += 1;
        self.next_connection_id += 1;
        let connection_id = format!("conn_{}", self.next_connection_id);
        self.by_connection.insert(connection_id.clone(), handle);
        self.sessions
            .insert(handle, Session::new(handle, connection_id, false));
        handle
    }

    pub fn authenticate(&mut self, handle: SessionHandle, session_id: String) {
        let Some(session) = self.sessions.get_mut(&handle) else {
            return;
        };
        session.session_id = Some(session_id.clone());
        session.authenticated = true;
        session.last_heartbeat = Some(Instant::now());
        self.by_session_id.insert(session_id, handle);
        if !session.is_bot {
            self.connected_players += 1;
        }
    }

    pub fn enqueue(&mut self, handle: SessionHandle) {
        let Some(session) = self.sessions.get_mut(&handle) else {
            return;
        };
        if session.in_queue {
            return;
        }
        session.in_queue = true;
        session.queue_joined_at = Some(Instant::now());
        self.queue.push(handle);
    }

    pub fn snapshot_queue(&self) -> Vec<SessionHandle> {
        self.queue.clone()
    }

    pub fn pop_from_queue(&mut self, subset: &[SessionHandle]) {
        let to_remove: std::collections::HashSet<SessionHandle> = subset.iter().copied().collect();
        self.queue.retain(|h| !to_remove.contains(h));
        for handle in subset {
            if let Some(session) = self.sessions.get_mut(handle) {
                session.in_queue = false;
            }
        }
    }

    pub fn push_message(&mut self, handle: SessionHandle, msg: ServerMessage) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            if !session.is_bot {
                session.mailbox.push_back(msg);
            }
        }
    }

    pub fn drain_messages(&mut self, handle: SessionHandle) -> Vec<ServerMessage> {
        self.sessions
            .get_mut(&handle)
            .map(|s| s.mailbox.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn update_heartbeat(&mut self, handle: SessionHandle) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            session.last_heartbeat = Some(Instant::now());
        }
    }

    pub fn update_input(&mut self, handle: SessionHandle, input: InputSnapshot) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            if input.client_tick < session.input.client_tick {
                return;
            }
            session.input = input;
        }
    }

    pub fn get_input(&self, handle: SessionHandle) -> InputSnapshot {
        self.sessions
            .get(&handle)
            .map(|s| s.input.clone())
            .unwrap_or_default()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions
            .values()
            .filter_map(|s| s.session_id.clone())
            .collect()
    }

    pub fn handle_by_session_id(&self, session_id: &str) -> Option<SessionHandle> {
        self.by_session_id.get(session_id).copied()
    }

    pub fn handle_by_connection(&self, connection_id: &str) -> Option<SessionHandle> {
        self.by_connection.get(connection_id).copied()
    }

    pub fn get(&self, handle: SessionHandle) -> Option<&Session> {
        self.sessions.get(&handle)
    }

    pub fn get_mut(&mut self, handle: SessionHandle) -> Option<&mut Session> {
        self.sessions.get_mut(&handle)
    }

    pub fn set_match(&mut self, handle: SessionHandle, match_id: u64, tank_id: u32) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            session.match_id = Some(match_id);
            session.tank_id = tank_id;
        }
    }

    pub fn disconnect_session(&mut self, handle: SessionHandle) {
        let Some(session) = self.sessions.remove(&handle) else {
            return;
        };
        self.queue.retain(|h| *h != handle);
        self.by_connection.remove(&session.connection_id);
        if let Some(session_id) = &session.session_id {
            self.by_session_id.remove(session_id);
        }
        if session.authenticated && !session.is_bot {
            self.connected_players = self.connected_players.saturating_sub(1);
        }
    }

    pub fn create_bots(&mut self, count: u32) -> Vec<SessionHandle> {
        let mut handles = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let handle = SessionHandle(self.next_handle);
            self.next_handle += 1;
            self.next_bot_id += 1;
            let connection_id = format!("bot_conn_{}", self.next_bot_id);
            let session_id = format!("bot_{}", self.next_bot_id);

            let mut session = Session::new(handle, connection_id, true);
            session.session_id = Some(session_id.clone());
            session.authenticated = true;
            session.in_queue = true;
            session.queue_joined_at = Some(Instant::now());

            self.by_session_id.insert(session_id, handle);
            self.sessions.insert(handle, session);
            self.queue.push(handle);
            handles.push(handle);
        }
        handles
    }

    pub fn set_bot_input(&mut self, handle: SessionHandle, input: InputSnapshot) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            if session.is_bot {
                session.input = input;
            }
        }
    }

    pub fn clear_bot_fire(&mut self, handle: SessionHandle) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            if session.is_bot {
                session.input.fire = false;
            }
        }
    }
}

/// Shared handle type every task clones into its own closure/spawn.
pub type SharedRegistry = Arc<Mutex<SessionRegistry>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_indexes_by_session_id() {
        let mut reg = SessionRegistry::new();
        let handle = reg.add_connection();
        reg.authenticate(handle, "s1".into());
        assert_eq!(reg.handle_by_session_id("s1"), Some(handle));
        assert_eq!(reg.connected_players, 1);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut reg = SessionRegistry::new();
        let handle = reg.add_connection();
        reg.authenticate(handle, "s1".into());
        reg.enqueue(handle);
        reg.disconnect_session(handle);
        assert!(reg.get(handle).is_none());
        assert_eq!(reg.connected_players, 0);
        reg.disconnect_session(handle); // no panic, no double-decrement
        assert_eq!(reg.connected_players, 0);
    }

    #[test]
    fn stale_input_is_rejected() {
        let mut reg = SessionRegistry::new();
        let handle = reg.add_connection();
        reg.update_input(
            handle,
            InputSnapshot {
                client_tick: 5,
                move_dir: 1.0,
                ..Default::default()
            },
        );
        reg.update_input(
            handle,
            InputSnapshot {
                client_tick: 3,
                move_dir: -1.0,
                ..Default::default()
            },
        );
        assert_eq!(reg.get_input(handle).client_tick, 5);
        assert_eq!(reg.get_input(handle).move_dir, 1.0);
    }

    #[test]
    fn bots_never_receive_messages() {
        let mut reg = SessionRegistry::new();
        let bots = reg.create_bots(1);
        reg.push_message(
            bots[0],
            ServerMessage::MatchStart {
                match_id: 1,
                tick_rate: 30,
                seed: 0,
            },
        );
        assert!(reg.drain_messages(bots[0]).is_empty());
    }
}
