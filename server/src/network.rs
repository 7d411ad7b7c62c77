//! Server network layer: UDP tasks, the session dispatcher and room tasks

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::registry::RoomRegistry;
use crate::room::{Room, RoomError, RoomSettings};
use log::{debug, error, info, warn};
use shared::{InputMessage, Packet, PlayerId, PlayerInput, SessionId, PROTOCOL_VERSION};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Messages sent from network and room tasks to the dispatcher
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: SessionId,
        room: Option<String>,
    },
    RoomClosed {
        name: String,
        instance: u64,
    },
    Shutdown,
}

/// Messages sent to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    SendToSession { packet: Packet, session: SessionId },
}

/// Work items for a room task
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        session: SessionId,
        live_sessions: HashSet<SessionId>,
    },
    Input {
        session: SessionId,
        message: InputMessage,
    },
    LegacyInput {
        session: SessionId,
        player_id: Option<PlayerId>,
        input: PlayerInput,
    },
    SwitchControl {
        session: SessionId,
        player_id: PlayerId,
    },
    EventAck {
        session: SessionId,
        id: u64,
    },
    Leave {
        session: SessionId,
    },
}

impl RoomCommand {
    pub fn session(&self) -> SessionId {
        match self {
            RoomCommand::Join { session, .. }
            | RoomCommand::Input { session, .. }
            | RoomCommand::LegacyInput { session, .. }
            | RoomCommand::SwitchControl { session, .. }
            | RoomCommand::EventAck { session, .. }
            | RoomCommand::Leave { session } => *session,
        }
    }
}

/// Applies one command to a room. Errors are the caller's to report.
pub fn apply_room_command(room: &mut Room, command: RoomCommand) -> Result<(), RoomError> {
    match command {
        RoomCommand::Join {
            session,
            live_sessions,
        } => room.join(session, &live_sessions).map(|_| ()),
        RoomCommand::Input { session, message } => room.submit_inputs(session, message).map(|_| ()),
        RoomCommand::LegacyInput {
            session,
            player_id,
            input,
        } => room.submit_legacy(session, player_id, input).map(|_| ()),
        RoomCommand::SwitchControl { session, player_id } => room.switch_control(session, player_id),
        RoomCommand::EventAck { session, id } => {
            room.ack_event(session, id);
            Ok(())
        }
        RoomCommand::Leave { session } => {
            room.leave(session);
            Ok(())
        }
    }
}

struct RoomHandle {
    instance: u64,
    commands: mpsc::UnboundedSender<RoomCommand>,
}

/// Match server: owns the socket, the session table and the room table
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    rooms: HashMap<String, RoomHandle>,
    registry: RoomRegistry,
    settings: RoomSettings,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> ServerResult<Self> {
        let socket = Arc::new(UdpSocket::bind(config.address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let settings = config.room_settings();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.session_timeout(),
            ))),
            rooms: HashMap::new(),
            registry: RoomRegistry::new(settings.duplicate_grace),
            settings,
            tick_duration: config.tick_duration(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sender half of the dispatcher channel, for external shutdown.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to dispatcher: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                let (packet, addr) = match message {
                    GameMessage::SendPacket { packet, addr } => (packet, addr),
                    GameMessage::SendToSession { packet, session } => {
                        let addr = clients.read().await.addr_of(session);
                        match addr {
                            Some(addr) => (packet, addr),
                            None => {
                                debug!("No address for session {}, dropping packet", session);
                                continue;
                            }
                        }
                    }
                };

                if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns task that sweeps silent sessions
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client in timed_out {
                    info!("Session {} timed out", client.id);
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout {
                        client_id: client.id,
                        room: client.room,
                    }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    /// Starts a room task for `name`.
    fn spawn_room(&self, name: &str) -> RoomHandle {
        let room = Room::new(name, self.settings.clone(), self.registry.clone());
        let instance = room.instance();
        let (commands, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_room(
            room,
            command_rx,
            self.game_tx.clone(),
            self.server_tx.clone(),
            self.tick_duration,
        ));

        RoomHandle { instance, commands }
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn forward(&mut self, room: &str, command: RoomCommand) {
        let Some(handle) = self.rooms.get(room) else {
            debug!("No room '{}' for session {}", room, command.session());
            return;
        };
        if handle.commands.send(command).is_err() {
            debug!("Room '{}' task already stopped", room);
            self.rooms.remove(room);
        }
    }

    /// Hands a join to the room, creating it (or replacing a stopped one).
    fn route_join(&mut self, room: &str, session: SessionId, live_sessions: HashSet<SessionId>) {
        let mut command = RoomCommand::Join {
            session,
            live_sessions,
        };

        if let Some(handle) = self.rooms.get(room) {
            match handle.commands.send(command) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => command = returned,
            }
        }

        let handle = self.spawn_room(room);
        if handle.commands.send(command).is_err() {
            error!("Fresh room '{}' refused its first join", room);
        }
        self.rooms.insert(room.to_string(), handle);
    }

    async fn session_for(&self, addr: SocketAddr) -> Option<(SessionId, Option<String>)> {
        let mut clients = self.clients.write().await;
        let session = clients.find_client_by_addr(addr)?;
        clients.touch(session);
        let room = clients.room_of(session).map(str::to_string);
        Some((session, room))
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let known = self.session_for(addr).await;

        match packet {
            Packet::Join {
                client_version,
                room,
            } => {
                info!(
                    "Join for room '{}' from {} (version: {})",
                    room, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Rejected {
                            reason: format!(
                                "Protocol version mismatch: client {}, server {}",
                                client_version, PROTOCOL_VERSION
                            ),
                        },
                        addr,
                    );
                    return;
                }

                if let Some((existing, existing_room)) = known {
                    if existing_room.as_deref() == Some(room.as_str()) {
                        // Retransmitted join; the room answers idempotently.
                        let live = self.clients.read().await.live_ids();
                        self.route_join(&room, existing, live);
                        return;
                    }

                    info!("Replacing session {} from {}", existing, addr);
                    self.clients.write().await.remove_client(&existing);
                    if let Some(old_room) = existing_room {
                        self.forward(&old_room, RoomCommand::Leave { session: existing });
                    }
                }

                let (session, live) = {
                    let mut clients = self.clients.write().await;
                    let session = clients.add_client(addr);
                    if let Some(session) = session {
                        clients.set_room(session, Some(room.clone()));
                    }
                    (session, clients.live_ids())
                };

                match session {
                    Some(session) => self.route_join(&room, session, live),
                    None => self.send_packet(
                        Packet::Rejected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    ),
                }
            }

            Packet::Ping { sent } => {
                self.send_packet(Packet::Pong { echoed: sent }, addr);
            }

            Packet::StatusRequest => {
                self.send_packet(
                    Packet::Status {
                        alive: true,
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        rooms: self.rooms.len() as u32,
                    },
                    addr,
                );
            }

            Packet::Input(message) => {
                if let Some((session, Some(room))) = known {
                    self.forward(&room, RoomCommand::Input { session, message });
                } else {
                    debug!("Input from {} without a room", addr);
                }
            }

            Packet::LegacyInput {
                player_id,
                movement,
                action,
                action_power,
                timestamp,
            } => {
                if let Some((session, Some(room))) = known {
                    let input = PlayerInput {
                        movement,
                        action,
                        action_power,
                        timestamp,
                    };
                    self.forward(
                        &room,
                        RoomCommand::LegacyInput {
                            session,
                            player_id,
                            input,
                        },
                    );
                }
            }

            Packet::SwitchControl { player_id } => {
                if let Some((session, Some(room))) = known {
                    self.forward(&room, RoomCommand::SwitchControl { session, player_id });
                }
            }

            Packet::EventAck { id } => {
                if let Some((session, Some(room))) = known {
                    self.forward(&room, RoomCommand::EventAck { session, id });
                }
            }

            Packet::Leave => {
                if let Some((session, room)) = known {
                    self.clients.write().await.remove_client(&session);
                    if let Some(room) = room {
                        self.forward(&room, RoomCommand::Leave { session });
                    }
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_room_closed(&mut self, name: String, instance: u64) {
        let current = self.rooms.get(&name).is_some_and(|h| h.instance == instance);
        if !current {
            return;
        }
        self.rooms.remove(&name);

        let mut clients = self.clients.write().await;
        for session in clients.sessions_in(&name) {
            clients.set_room(session, None);
        }
        info!("Room '{}' closed ({} rooms open)", name, self.rooms.len());
    }

    /// Main dispatcher loop
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::ClientTimeout { client_id, room }) => {
                    if let Some(room) = room {
                        self.forward(&room, RoomCommand::Leave { session: client_id });
                    }
                }
                Some(ServerMessage::RoomClosed { name, instance }) => {
                    self.handle_room_closed(name, instance).await;
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn send_packet_impl(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> ServerResult<()> {
    let data = packet.encode()?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Room task: interleaves commands with the tick until the room disposes.
async fn run_room(
    mut room: Room,
    mut commands: mpsc::UnboundedReceiver<RoomCommand>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    tick_duration: Duration,
) {
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                let session = command.session();
                let is_join = matches!(command, RoomCommand::Join { .. });

                if let Err(e) = apply_room_command(&mut room, command) {
                    warn!("Room '{}': session {}: {}", room.name(), session, e);
                    if is_join {
                        let reject = Packet::Rejected { reason: e.to_string() };
                        let _ = game_tx.send(GameMessage::SendToSession { packet: reject, session });
                    }
                }
            },

            _ = tick_interval.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f64();
                last_tick = now;

                room.update(dt);
            },
        }

        for outbound in room.drain_outbound() {
            if game_tx
                .send(GameMessage::SendToSession {
                    packet: outbound.packet,
                    session: outbound.session,
                })
                .is_err()
            {
                error!("Sender task gone, stopping room '{}'", room.name());
                return;
            }
        }

        if room.is_disposed() {
            break;
        }
    }

    let _ = server_tx.send(ServerMessage::RoomClosed {
        name: room.name().to_string(),
        instance: room.instance(),
    });
}
