//! UDP networking for the client.
//!
//! The socket lives on a tokio runtime in a background thread. The macroquad
//! frame loop never touches it; it polls [`ClientEvent`]s and pushes
//! [`OutgoingMessage`]s through a [`NetworkHandle`].

use log::{debug, error, info, warn};
use shared::{
    InputMessage, MatchEvent, Packet, PlayerId, SessionId, StateSnapshot, Team, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, sleep, Instant};

pub type NetResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Silence from the server longer than this counts as a lost connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Ping cadence; doubles as the Join retry while not yet admitted.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Network task -> frame loop.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Ready {
        session_id: SessionId,
        player_id: PlayerId,
        team: Team,
    },
    State(StateSnapshot),
    Event {
        id: u64,
        event: MatchEvent,
    },
    Pong {
        rtt_ms: u64,
    },
    Rejected {
        reason: String,
    },
    ConnectionLost,
}

/// Frame loop -> network task.
#[derive(Debug, Clone)]
pub enum OutgoingMessage {
    Input(InputMessage),
    SwitchControl(PlayerId),
    Leave,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub server: SocketAddr,
    pub room: String,
    pub fake_ping_ms: u64,
    pub connection_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl NetworkConfig {
    pub fn new(server: SocketAddr, room: impl Into<String>, fake_ping_ms: u64) -> Self {
        Self {
            server,
            room: room.into(),
            fake_ping_ms,
            connection_timeout: CONNECTION_TIMEOUT,
            keepalive_interval: KEEPALIVE_INTERVAL,
        }
    }
}

fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

pub struct NetworkTask {
    socket: UdpSocket,
    config: NetworkConfig,
    events: UnboundedSender<ClientEvent>,
    outgoing: UnboundedReceiver<OutgoingMessage>,

    /// Until the server admits or refuses us, Join is retried.
    awaiting_join: bool,
    last_heard: Instant,
    lost: bool,
}

impl NetworkTask {
    pub async fn connect(
        config: NetworkConfig,
        events: UnboundedSender<ClientEvent>,
        outgoing: UnboundedReceiver<OutgoingMessage>,
    ) -> NetResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self::new(socket, config, events, outgoing))
    }

    pub fn new(
        socket: UdpSocket,
        config: NetworkConfig,
        events: UnboundedSender<ClientEvent>,
        outgoing: UnboundedReceiver<OutgoingMessage>,
    ) -> Self {
        Self {
            socket,
            config,
            events,
            outgoing,
            awaiting_join: true,
            last_heard: Instant::now(),
            lost: false,
        }
    }

    async fn send_packet(&self, packet: &Packet) -> NetResult<()> {
        if self.config.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
        }

        let data = packet.encode()?;
        self.socket.send_to(&data, self.config.server).await?;
        Ok(())
    }

    async fn send_join(&self) -> NetResult<()> {
        self.send_packet(&Packet::Join {
            client_version: PROTOCOL_VERSION,
            room: self.config.room.clone(),
        })
        .await
    }

    /// Returns false once the frame loop has hung up.
    fn emit(&self, event: ClientEvent) -> bool {
        self.events.send(event).is_ok()
    }

    async fn handle_packet(&mut self, packet: Packet) -> NetResult<bool> {
        self.last_heard = Instant::now();

        let event = match packet {
            Packet::PlayerReady {
                session_id,
                player_id,
                team,
            } => {
                if self.awaiting_join {
                    info!("Admitted to room '{}' as session {}", self.config.room, session_id);
                }
                self.awaiting_join = false;
                ClientEvent::Ready {
                    session_id,
                    player_id,
                    team,
                }
            }
            Packet::State(snapshot) => ClientEvent::State(snapshot),
            Packet::Event { id, event } => {
                // Ack every copy; the server resends until one gets through.
                self.send_packet(&Packet::EventAck { id }).await?;
                ClientEvent::Event { id, event }
            }
            Packet::Pong { echoed } => ClientEvent::Pong {
                rtt_ms: get_timestamp().saturating_sub(echoed),
            },
            Packet::Rejected { reason } => {
                self.awaiting_join = false;
                ClientEvent::Rejected { reason }
            }
            _ => {
                warn!("Unexpected packet type from server");
                return Ok(true);
            }
        };

        Ok(self.emit(event))
    }

    async fn housekeeping(&mut self) -> NetResult<bool> {
        if self.awaiting_join {
            debug!("Retrying join for room '{}'", self.config.room);
            self.send_join().await?;
        }

        self.send_packet(&Packet::Ping {
            sent: get_timestamp(),
        })
        .await?;

        if !self.lost && self.last_heard.elapsed() >= self.config.connection_timeout {
            warn!(
                "No packets from {} for {:?}, connection lost",
                self.config.server, self.config.connection_timeout
            );
            self.lost = true;
            return Ok(self.emit(ClientEvent::ConnectionLost));
        }
        Ok(true)
    }

    /// Runs until the frame loop asks to leave or drops its handle. `Leave`
    /// is always sent on the way out.
    pub async fn run(mut self) -> NetResult<()> {
        info!("Connecting to {} (room '{}')", self.config.server, self.config.room);
        self.send_join().await?;

        let period = self.config.keepalive_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);
        let mut buffer = vec![0u8; 65536];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, from)) => {
                            if from != self.config.server {
                                debug!("Ignoring datagram from {}", from);
                                continue;
                            }

                            if self.config.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
                            }

                            match Packet::decode(&buffer[..len]) {
                                Ok(packet) => {
                                    if !self.handle_packet(packet).await? {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Dropping malformed packet: {}", e),
                            }
                        }
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                message = self.outgoing.recv() => {
                    match message {
                        Some(OutgoingMessage::Input(inputs)) => {
                            self.send_packet(&Packet::Input(inputs)).await?;
                        }
                        Some(OutgoingMessage::SwitchControl(player_id)) => {
                            self.send_packet(&Packet::SwitchControl { player_id }).await?;
                        }
                        Some(OutgoingMessage::Leave) | None => break,
                    }
                },

                _ = keepalive.tick() => {
                    if !self.housekeeping().await? {
                        break;
                    }
                },
            }
        }

        info!("Leaving room '{}'", self.config.room);
        self.send_packet(&Packet::Leave).await?;
        Ok(())
    }
}

/// Frame-loop side of the network thread.
pub struct NetworkHandle {
    outgoing: UnboundedSender<OutgoingMessage>,
    events: UnboundedReceiver<ClientEvent>,
    thread: Option<JoinHandle<()>>,
}

impl NetworkHandle {
    pub fn spawn(config: NetworkConfig) -> std::io::Result<Self> {
        let (outgoing, outgoing_rx) = unbounded_channel();
        let (events_tx, events) = unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let failure_tx = events_tx.clone();
                let result = runtime.block_on(async move {
                    let task = NetworkTask::connect(config, events_tx, outgoing_rx).await?;
                    task.run().await
                });

                if let Err(e) = result {
                    error!("Network task failed: {}", e);
                    let _ = failure_tx.send(ClientEvent::ConnectionLost);
                }
            })?;

        Ok(Self {
            outgoing,
            events,
            thread: Some(thread),
        })
    }

    /// Everything received since the last frame.
    pub fn poll(&mut self) -> Vec<ClientEvent> {
        let mut received = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            received.push(event);
        }
        received
    }

    pub fn send(&self, message: OutgoingMessage) {
        if self.outgoing.send(message).is_err() {
            debug!("Network task is gone, dropping outgoing message");
        }
    }

    /// Sends `Leave` and waits for the network thread to finish.
    pub fn shutdown(mut self) {
        self.send(OutgoingMessage::Leave);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}
