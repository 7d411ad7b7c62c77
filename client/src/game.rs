//! Client-side mirror of the match.
//!
//! The server state is never simulated here except for the one player this
//! client controls. That player is predicted every frame and pulled back
//! toward the server position whenever a new snapshot lands; every other
//! player and the ball simply glide toward their latest server position.

use crate::network::ClientEvent;
use crate::prediction::PredictedBody;
use crate::reconciliation::{interpolate, interpolate_angle, reconcile, INTERPOLATION_FACTOR};
use log::{debug, info, warn};
use shared::{
    BallSnapshot, CloseReason, MatchEvent, MatchPhase, PlayerId, PlayerSnapshot, SessionId,
    StateSnapshot, Team, Vec2, POSSESSION_OFFSET,
};
use std::collections::{BTreeMap, HashSet};

/// Players per human: the human and two AI teammates with consecutive ids.
pub const SQUAD_SIZE: PlayerId = 3;

const GOAL_BANNER_SECS: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct RenderedPlayer {
    pub server: PlayerSnapshot,
    pub x: f32,
    pub y: f32,
    pub direction: f32,
}

impl RenderedPlayer {
    fn from_snapshot(server: PlayerSnapshot) -> Self {
        Self {
            x: server.x,
            y: server.y,
            direction: server.direction,
            server,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedBall {
    pub server: BallSnapshot,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub score_blue: u32,
    pub score_red: u32,
    pub winner: Option<Team>,
}

pub struct ClientGameState {
    pub session_id: Option<SessionId>,
    pub player_id: Option<PlayerId>,
    pub team: Option<Team>,

    controlled: Option<PlayerId>,
    predicted: Option<PredictedBody>,
    pending_reconcile: bool,
    last_tick: Option<u32>,
    seen_events: HashSet<u64>,

    pub players: BTreeMap<PlayerId, RenderedPlayer>,
    pub ball: Option<RenderedBall>,

    pub phase: MatchPhase,
    pub score_blue: u32,
    pub score_red: u32,
    pub time_remaining: f32,
    pub goal_banner: Option<(Team, f32)>,
    pub result: Option<MatchResult>,
    pub closed: Option<CloseReason>,
    pub rejected: Option<String>,
    pub ping_ms: Option<u64>,

    pub prediction_enabled: bool,
    pub reconciliation_enabled: bool,
    pub interpolation_enabled: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            session_id: None,
            player_id: None,
            team: None,
            controlled: None,
            predicted: None,
            pending_reconcile: false,
            last_tick: None,
            seen_events: HashSet::new(),
            players: BTreeMap::new(),
            ball: None,
            phase: MatchPhase::Waiting,
            score_blue: 0,
            score_red: 0,
            time_remaining: 0.0,
            goal_banner: None,
            result: None,
            closed: None,
            rejected: None,
            ping_ms: None,
            prediction_enabled: true,
            reconciliation_enabled: true,
            interpolation_enabled: true,
        }
    }

    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Ready {
                session_id,
                player_id,
                team,
            } => self.on_player_ready(session_id, player_id, team),
            ClientEvent::State(snapshot) => self.apply_server_state(snapshot),
            ClientEvent::Event { id, event } => {
                self.apply_event(id, event);
            }
            ClientEvent::Pong { rtt_ms } => self.ping_ms = Some(rtt_ms),
            ClientEvent::Rejected { reason } => {
                warn!("Server rejected us: {}", reason);
                self.rejected = Some(reason);
            }
            ClientEvent::ConnectionLost => self.connection_lost(),
        }
    }

    pub fn on_player_ready(&mut self, session_id: SessionId, player_id: PlayerId, team: Team) {
        info!(
            "Joined as session {} controlling player {} on {:?}",
            session_id, player_id, team
        );
        self.session_id = Some(session_id);
        self.player_id = Some(player_id);
        self.team = Some(team);
        self.set_controlled(Some(player_id));
    }

    /// Stores an authoritative snapshot. Reordered datagrams older than the
    /// last applied one are dropped.
    pub fn apply_server_state(&mut self, snapshot: StateSnapshot) {
        if let Some(last) = self.last_tick {
            if snapshot.tick < last {
                debug!("Dropping stale snapshot {} (have {})", snapshot.tick, last);
                return;
            }
        }
        self.last_tick = Some(snapshot.tick);

        self.phase = snapshot.phase;
        self.score_blue = snapshot.score_blue;
        self.score_red = snapshot.score_red;
        self.time_remaining = snapshot.time_remaining;

        self.players.retain(|id, _| snapshot.players.contains_key(id));
        for (id, server) in snapshot.players {
            match self.players.get_mut(&id) {
                Some(rendered) => rendered.server = server,
                None => {
                    self.players.insert(id, RenderedPlayer::from_snapshot(server));
                }
            }
        }

        match self.ball.as_mut() {
            Some(ball) => ball.server = snapshot.ball,
            None => {
                self.ball = Some(RenderedBall {
                    x: snapshot.ball.x,
                    y: snapshot.ball.y,
                    server: snapshot.ball,
                })
            }
        }

        // The server decides which squad member we drive.
        let confirmed = self
            .squad_ids()
            .into_iter()
            .find(|id| self.players[id].server.is_controlled);
        if confirmed.is_some() && confirmed != self.controlled {
            self.set_controlled(confirmed);
        } else if self.predicted.is_none() && self.prediction_enabled {
            self.reseed_prediction();
        }

        self.pending_reconcile = true;
    }

    /// Applies a reliable event once. Returns false for a duplicate delivery.
    pub fn apply_event(&mut self, id: u64, event: MatchEvent) -> bool {
        if !self.seen_events.insert(id) {
            debug!("Ignoring duplicate event {}", id);
            return false;
        }
        self.apply_match_event(event);
        true
    }

    /// No word from the server for too long: behave as if the room closed.
    pub fn connection_lost(&mut self) {
        if self.closed.is_none() {
            self.apply_match_event(MatchEvent::RoomClosed {
                reason: CloseReason::ConnectionLost,
            });
        }
    }

    fn apply_match_event(&mut self, event: MatchEvent) {
        match event {
            MatchEvent::MatchStart { duration } => {
                info!("Match started ({} s)", duration);
                self.phase = MatchPhase::Playing;
                self.time_remaining = duration;
                self.score_blue = 0;
                self.score_red = 0;
                self.result = None;
                self.goal_banner = None;
            }
            MatchEvent::GoalScored {
                team,
                score_blue,
                score_red,
            } => {
                info!("{:?} scored: {} - {}", team, score_blue, score_red);
                self.score_blue = score_blue;
                self.score_red = score_red;
                self.goal_banner = Some((team, GOAL_BANNER_SECS));
            }
            MatchEvent::MatchEnd {
                score_blue,
                score_red,
                winner,
            } => {
                info!("Match over: {} - {}, winner {:?}", score_blue, score_red, winner);
                self.phase = MatchPhase::Ended;
                self.score_blue = score_blue;
                self.score_red = score_red;
                self.result = Some(MatchResult {
                    score_blue,
                    score_red,
                    winner,
                });
            }
            MatchEvent::RoomClosed { reason } => {
                warn!("Room closed: {:?}", reason);
                self.closed = Some(reason);
            }
        }
    }

    /// Per-frame update: reconcile against a fresh snapshot, predict the
    /// controlled player, then move everything else toward the server.
    pub fn update(&mut self, dt: f32, movement: Vec2) {
        if let Some((team, remaining)) = self.goal_banner {
            let remaining = remaining - dt;
            self.goal_banner = (remaining > 0.0).then_some((team, remaining));
        }

        let interpolation = self.interpolation_enabled;
        let predicted_id = self.controlled.filter(|_| self.predicted.is_some());

        for (id, player) in self.players.iter_mut() {
            if Some(*id) == predicted_id {
                continue;
            }
            if interpolation {
                (player.x, player.y) = interpolate(
                    (player.x, player.y),
                    (player.server.x, player.server.y),
                    INTERPOLATION_FACTOR,
                );
                player.direction = interpolate_angle(
                    player.direction,
                    player.server.direction,
                    INTERPOLATION_FACTOR,
                );
            } else {
                player.x = player.server.x;
                player.y = player.server.y;
                player.direction = player.server.direction;
            }
        }

        if let (Some(id), Some(body)) = (predicted_id, self.predicted.as_mut()) {
            if let Some(player) = self.players.get_mut(&id) {
                if self.pending_reconcile {
                    if self.reconciliation_enabled {
                        (body.x, body.y) =
                            reconcile((body.x, body.y), (player.server.x, player.server.y));
                    }
                    body.state = player.server.state;
                }

                if self.phase == MatchPhase::Playing && self.closed.is_none() {
                    body.predict(movement, dt);
                }

                player.x = body.x;
                player.y = body.y;
                player.direction = body.direction;
            }
        }
        self.pending_reconcile = false;

        self.update_ball(predicted_id);
    }

    fn update_ball(&mut self, predicted_id: Option<PlayerId>) {
        let Some(ball) = self.ball.as_mut() else {
            return;
        };

        // A ball we dribble follows our predicted sprite, not the lagging server.
        let dribbler = ball
            .server
            .possessed_by
            .filter(|holder| Some(*holder) == predicted_id)
            .and_then(|holder| self.players.get(&holder));

        if let Some(holder) = dribbler {
            let facing = Vec2::from_angle(holder.direction).scale(POSSESSION_OFFSET);
            ball.x = holder.x + facing.x;
            ball.y = holder.y + facing.y;
        } else if self.interpolation_enabled {
            (ball.x, ball.y) = interpolate(
                (ball.x, ball.y),
                (ball.server.x, ball.server.y),
                INTERPOLATION_FACTOR,
            );
        } else {
            ball.x = ball.server.x;
            ball.y = ball.server.y;
        }
    }

    fn set_controlled(&mut self, id: Option<PlayerId>) {
        self.controlled = id;
        self.reseed_prediction();
    }

    /// Starts predicting from wherever the controlled sprite is drawn. Stays
    /// unseeded until that player shows up in a snapshot.
    fn reseed_prediction(&mut self) {
        self.predicted = match (self.prediction_enabled, self.controlled) {
            (true, Some(id)) => self
                .players
                .get(&id)
                .map(|p| PredictedBody::at(p.x, p.y, p.direction)),
            _ => None,
        };
    }

    pub fn toggle_prediction(&mut self) {
        self.prediction_enabled = !self.prediction_enabled;
        self.reseed_prediction();
    }

    pub fn toggle_reconciliation(&mut self) {
        self.reconciliation_enabled = !self.reconciliation_enabled;
    }

    pub fn toggle_interpolation(&mut self) {
        self.interpolation_enabled = !self.interpolation_enabled;
    }

    pub fn controlled_id(&self) -> Option<PlayerId> {
        self.controlled
    }

    pub fn predicted(&self) -> Option<&PredictedBody> {
        self.predicted.as_ref()
    }

    /// Our squad members currently on the field, in id order.
    pub fn squad_ids(&self) -> Vec<PlayerId> {
        match self.player_id {
            Some(first) => (first..first + SQUAD_SIZE)
                .filter(|id| self.players.contains_key(id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Teammate after the controlled one, wrapping around.
    pub fn next_squad_member(&self) -> Option<PlayerId> {
        let squad = self.squad_ids();
        let current = self.controlled?;
        let index = squad.iter().position(|id| *id == current)?;
        let next = squad[(index + 1) % squad.len()];
        (next != current).then_some(next)
    }

    /// Whether inputs are worth sending this frame.
    pub fn accepts_input(&self) -> bool {
        self.controlled.is_some() && self.phase == MatchPhase::Playing && self.closed.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.closed.is_some() || self.rejected.is_some()
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
