//! Session bookkeeping for the match server
//!
//! This module tracks every network session the server knows about:
//! - Session lifecycle (join, leave, timeout)
//! - The address each session sends from, used to route replies
//! - Which room a session currently plays in
//! - Capacity enforcement across all rooms
//!
//! Rooms never see addresses; they speak in session ids and the network
//! layer resolves those here when sending.

use log::info;
use shared::SessionId;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected session
///
/// Each session keeps:
/// - Its id and the address packets arrive from
/// - The last time any packet arrived, for timeout detection
/// - The room it joined, once it has joined one
#[derive(Debug)]
pub struct Client {
    /// Unique session identifier assigned by the server
    pub id: SessionId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this session
    pub last_seen: Instant,
    /// Room name, set after a successful join
    pub room: Option<String>,
}

impl Client {
    pub fn new(id: SessionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            room: None,
        }
    }

    /// Checks if the session has exceeded the timeout
    ///
    /// Returns true if no packets have been received within `timeout`,
    /// indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all sessions across all rooms
///
/// The ClientManager hands out session ids, enforces the server-wide
/// session limit and sweeps sessions that went silent. The dispatcher owns
/// it behind an `RwLock` shared with the sender and timeout tasks.
pub struct ClientManager {
    clients: HashMap<SessionId, Client>,
    next_client_id: SessionId,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    /// Creates a new manager with the given capacity and silence timeout
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to register a new session
    ///
    /// Returns Some(session_id) if successful, None if the server is at
    /// capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<SessionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Session {} opened from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a session and returns it, so the caller can tell its room.
    pub fn remove_client(&mut self, client_id: &SessionId) -> Option<Client> {
        let removed = self.clients.remove(client_id);
        if let Some(client) = &removed {
            info!("Session {} closed", client.id);
        }
        removed
    }

    /// Finds a session id by network address
    ///
    /// Used to associate incoming packets with existing sessions. Returns
    /// None if no session is bound to the given address.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<SessionId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the session as alive.
    pub fn touch(&mut self, client_id: SessionId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    pub fn set_room(&mut self, client_id: SessionId, room: Option<String>) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.room = room;
        }
    }

    pub fn room_of(&self, client_id: SessionId) -> Option<&str> {
        self.clients
            .get(&client_id)
            .and_then(|client| client.room.as_deref())
    }

    /// Sessions currently placed in `room`.
    pub fn sessions_in(&self, room: &str) -> Vec<SessionId> {
        self.clients
            .values()
            .filter(|client| client.room.as_deref() == Some(room))
            .map(|client| client.id)
            .collect()
    }

    pub fn addr_of(&self, client_id: SessionId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Checks for and removes timed-out sessions
    ///
    /// Returns the removed sessions so their rooms can drop their squads.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timed_out: Vec<SessionId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(self.timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|id| self.remove_client(id))
            .collect()
    }

    /// Ids of every live session, handed to rooms for stale-player cleanup.
    pub fn live_ids(&self) -> HashSet<SessionId> {
        self.clients.keys().copied().collect()
    }

    /// Returns the number of live sessions
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
