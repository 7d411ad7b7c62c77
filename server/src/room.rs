//! A named match instance: sessions, their squads, reliable event delivery
//! and the disposal rules.
//!
//! `Room` is synchronous and owns its `MatchSimulation` outright. The network
//! layer runs one task per room, feeds it commands and the tick, and ships
//! whatever `drain_outbound` returns.

use crate::game::MatchSimulation;
use crate::registry::RoomRegistry;
use crate::state::spawn_squad;
use log::{debug, info, warn};
use shared::{
    CloseReason, InputMessage, MatchEvent, MatchPhase, Packet, PlayerId, PlayerInput,
    ProtocolError, SessionId, StateSnapshot, Team,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;
use thiserror::Error;

/// How often unacknowledged events are sent again.
pub const EVENT_RESEND_INTERVAL: Duration = Duration::from_millis(250);

const SQUAD_SIZE: PlayerId = 3;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room '{0}' is full")]
    Full(String),
    #[error("room '{0}' is closed")]
    Closed(String),
    #[error("session {0} is not in this room")]
    UnknownSession(SessionId),
    #[error("player {player} is not owned by session {session}")]
    NotOwner {
        session: SessionId,
        player: PlayerId,
    },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub match_duration: f32,
    pub time_scale: f32,
    /// Humans allowed in one room, split across both teams.
    pub capacity: usize,
    pub end_grace: Duration,
    pub duplicate_grace: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            match_duration: shared::MATCH_DURATION_SECS,
            time_scale: 1.0,
            capacity: 4,
            end_grace: Duration::from_secs(5),
            duplicate_grace: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub session: SessionId,
    pub packet: Packet,
}

#[derive(Debug)]
struct SessionSlot {
    player_id: PlayerId,
    team: Team,
    /// Events sent but not yet acknowledged, by id.
    outbox: BTreeMap<u64, MatchEvent>,
}

pub struct Room {
    name: String,
    instance: u64,
    primary: bool,
    registry: RoomRegistry,
    settings: RoomSettings,
    sim: MatchSimulation,
    sessions: BTreeMap<SessionId, SessionSlot>,
    next_player_id: PlayerId,
    next_event_id: u64,
    outbound: Vec<Outbound>,
    age: f64,
    ever_joined: bool,
    dispose_in: Option<f64>,
    resend_timer: f64,
    disposed: bool,
}

impl Room {
    pub fn new(name: &str, settings: RoomSettings, registry: RoomRegistry) -> Self {
        let instance = rand::random::<u64>();
        let primary = registry.claim(name, instance);
        info!(
            "Room '{}' created (instance {:016x}, primary: {})",
            name, instance, primary
        );

        Self {
            name: name.to_string(),
            instance,
            primary,
            registry,
            sim: MatchSimulation::new(settings.match_duration, settings.time_scale),
            settings,
            sessions: BTreeMap::new(),
            next_player_id: 1,
            next_event_id: 1,
            outbound: Vec::new(),
            age: 0.0,
            ever_joined: false,
            dispose_in: None,
            resend_timer: 0.0,
            disposed: false,
        }
    }

    /// Seats `session` on the team with fewer humans (Blue on a tie) with a
    /// fresh squad. Players left behind by sessions missing from
    /// `live_sessions` are purged first. Joining twice is harmless. A room
    /// counting down to disposal admits nobody.
    pub fn join(
        &mut self,
        session: SessionId,
        live_sessions: &HashSet<SessionId>,
    ) -> Result<PlayerId, RoomError> {
        if self.disposed || self.dispose_in.is_some() || self.sim.phase() == MatchPhase::Ended {
            return Err(RoomError::Closed(self.name.clone()));
        }

        if let Some(slot) = self.sessions.get(&session) {
            let (player_id, team) = (slot.player_id, slot.team);
            self.send(session, Packet::PlayerReady {
                session_id: session,
                player_id,
                team,
            });
            return Ok(player_id);
        }

        self.purge_stale(live_sessions);

        if self.sim.state.human_count() >= self.settings.capacity {
            return Err(RoomError::Full(self.name.clone()));
        }

        let blue = self.sim.state.humans_on(Team::Blue);
        let red = self.sim.state.humans_on(Team::Red);
        let team = if blue <= red { Team::Blue } else { Team::Red };
        let lane = self.sim.state.humans_on(team);

        let player_id = self.next_player_id;
        self.next_player_id += SQUAD_SIZE;
        self.sim.add_squad(spawn_squad(player_id, session, team, lane));

        self.sessions.insert(
            session,
            SessionSlot {
                player_id,
                team,
                outbox: BTreeMap::new(),
            },
        );
        self.ever_joined = true;

        info!(
            "Session {} joined room '{}' as player {} on {:?}",
            session, self.name, player_id, team
        );
        self.send(session, Packet::PlayerReady {
            session_id: session,
            player_id,
            team,
        });

        if self.sim.phase() == MatchPhase::Waiting && self.sim.state.both_teams_present() {
            self.sim.start();
            self.flush_events();
        }

        Ok(player_id)
    }

    fn purge_stale(&mut self, live_sessions: &HashSet<SessionId>) {
        let stale: BTreeSet<SessionId> = self
            .sim
            .state
            .owners()
            .into_iter()
            .chain(self.sessions.keys().copied())
            .filter(|owner| !live_sessions.contains(owner))
            .collect();

        for owner in stale {
            warn!("Purging stale session {} from room '{}'", owner, self.name);
            self.sessions.remove(&owner);
            self.sim.remove_owner(owner);
        }
    }

    /// Removes the session's squad. An empty room disposes at once; a match
    /// left with fewer than two humans is aborted and closes after the grace.
    pub fn leave(&mut self, session: SessionId) {
        if self.sessions.remove(&session).is_none() {
            return;
        }
        self.sim.remove_owner(session);
        info!("Session {} left room '{}'", session, self.name);

        if self.sessions.is_empty() {
            self.dispose();
            return;
        }

        if self.sim.phase() == MatchPhase::Playing && self.sim.state.human_count() < 2 {
            info!("Room '{}' lost its opponent, closing", self.name);
            self.sim.return_to_waiting();
            self.publish(MatchEvent::RoomClosed {
                reason: CloseReason::OpponentLeft,
            });
            self.schedule_dispose(self.settings.end_grace);
        }
    }

    /// Accepts a batch of inputs. Entries for players the session does not
    /// own are dropped individually; returns how many were queued.
    pub fn submit_inputs(
        &mut self,
        session: SessionId,
        message: InputMessage,
    ) -> Result<usize, RoomError> {
        message.validate()?;
        if !self.sessions.contains_key(&session) {
            return Err(RoomError::UnknownSession(session));
        }

        let mut accepted = 0;
        for (player_id, input) in message.inputs {
            match self.sim.state.players.get(&player_id) {
                Some(player) if player.owner == session => {
                    if self.sim.submit_input(player_id, input) {
                        accepted += 1;
                    }
                }
                Some(_) => warn!(
                    "Session {} sent input for player {} it does not own",
                    session, player_id
                ),
                None => debug!(
                    "Session {} sent input for unknown player {}",
                    session, player_id
                ),
            }
        }
        Ok(accepted)
    }

    /// Normalizes the single-input shape; a missing id means the session's
    /// own player.
    pub fn submit_legacy(
        &mut self,
        session: SessionId,
        player_id: Option<PlayerId>,
        input: PlayerInput,
    ) -> Result<usize, RoomError> {
        let own = self.sessions.get(&session).map(|slot| slot.player_id);
        let message = InputMessage::from_legacy(player_id, own, input)?;
        self.submit_inputs(session, message)
    }

    pub fn switch_control(&mut self, session: SessionId, player: PlayerId) -> Result<(), RoomError> {
        if !self.sessions.contains_key(&session) {
            return Err(RoomError::UnknownSession(session));
        }
        if self.sim.switch_control(session, player) {
            debug!("Session {} now controls player {}", session, player);
            Ok(())
        } else {
            Err(RoomError::NotOwner { session, player })
        }
    }

    pub fn ack_event(&mut self, session: SessionId, id: u64) {
        if let Some(slot) = self.sessions.get_mut(&session) {
            slot.outbox.remove(&id);
        }
    }

    /// One room tick: simulation, state broadcast, event resend and the
    /// disposal timers.
    pub fn update(&mut self, real_delta: f64) {
        if self.disposed {
            return;
        }
        self.age += real_delta;

        if let Some(remaining) = self.dispose_in.as_mut() {
            *remaining -= real_delta;
            if *remaining <= 0.0 {
                self.dispose();
                return;
            }
        }

        let was_playing = self.sim.phase() == MatchPhase::Playing;
        self.sim.tick(real_delta);
        self.flush_events();

        if was_playing && self.sim.phase() == MatchPhase::Ended {
            self.schedule_dispose(self.settings.end_grace);
        }

        if !self.sessions.is_empty() {
            let snapshot = self.sim.snapshot();
            for session in self.session_ids() {
                self.send(session, Packet::State(snapshot.clone()));
            }
        }

        self.resend_timer += real_delta;
        if self.resend_timer >= EVENT_RESEND_INTERVAL.as_secs_f64() {
            self.resend_timer = 0.0;
            self.resend_unacked();
        }

        if !self.primary
            && !self.ever_joined
            && self.age >= self.settings.duplicate_grace.as_secs_f64()
        {
            info!("Non-primary room '{}' never used, disposing", self.name);
            self.dispose();
        }
    }

    fn flush_events(&mut self) {
        for event in self.sim.drain_events() {
            self.publish(event);
        }
    }

    /// Sends `event` to every session and keeps it until acknowledged.
    fn publish(&mut self, event: MatchEvent) {
        let id = self.next_event_id;
        self.next_event_id += 1;

        for (session, slot) in self.sessions.iter_mut() {
            slot.outbox.insert(id, event.clone());
            self.outbound.push(Outbound {
                session: *session,
                packet: Packet::Event {
                    id,
                    event: event.clone(),
                },
            });
        }
    }

    fn resend_unacked(&mut self) {
        for (session, slot) in &self.sessions {
            for (id, event) in &slot.outbox {
                self.outbound.push(Outbound {
                    session: *session,
                    packet: Packet::Event {
                        id: *id,
                        event: event.clone(),
                    },
                });
            }
        }
    }

    fn schedule_dispose(&mut self, after: Duration) {
        if self.dispose_in.is_none() {
            self.dispose_in = Some(after.as_secs_f64());
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.registry.release(&self.name, self.instance);
        info!("Room '{}' disposed", self.name);
    }

    fn send(&mut self, session: SessionId, packet: Packet) {
        self.outbound.push(Outbound { session, packet });
    }

    fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn phase(&self) -> MatchPhase {
        self.sim.phase()
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.session_ids()
    }

    pub fn player_of(&self, session: SessionId) -> Option<PlayerId> {
        self.sessions.get(&session).map(|slot| slot.player_id)
    }

    pub fn pending_events(&self, session: SessionId) -> usize {
        self.sessions
            .get(&session)
            .map_or(0, |slot| slot.outbox.len())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.sim.snapshot()
    }
}
