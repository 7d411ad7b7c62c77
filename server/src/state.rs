//! Authoritative match data: players, ball, score, phase and timer.
//!
//! Pure data plus mutation helpers. Behaviour lives in `physics`,
//! `possession` and `goal`; the tick in `game` is the only writer.

use shared::{
    field_center, formation_position, BallSnapshot, MatchPhase, PlayerId, PlayerSnapshot,
    SessionId, StateSnapshot, Team, Vec2, VisualState, CAPTURE_LOCKOUT_MS, LOSS_LOCKOUT_MS,
    POSSESSION_OFFSET, SHOT_IMMUNITY_MS,
};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    /// Session that created this player; AI teammates share their human's owner.
    pub owner: SessionId,
    pub team: Team,
    pub is_human: bool,
    pub is_controlled: bool,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub visual_state: VisualState,
    pub direction: f32,
    /// Simulation-clock ms until which the kick animation is locked in.
    pub kicking_until: f64,
    pub home_x: f32,
    pub home_y: f32,
}

impl Player {
    pub fn new(
        id: PlayerId,
        owner: SessionId,
        team: Team,
        is_human: bool,
        home: (f32, f32),
    ) -> Self {
        let mut player = Self {
            id,
            owner,
            team,
            is_human,
            is_controlled: is_human,
            x: home.0,
            y: home.1,
            velocity_x: 0.0,
            velocity_y: 0.0,
            visual_state: VisualState::Idle,
            direction: 0.0,
            kicking_until: 0.0,
            home_x: home.0,
            home_y: home.1,
        };
        player.reset_to_home();
        player
    }

    /// Back to the kickoff slot, facing the opponent's goal.
    pub fn reset_to_home(&mut self) {
        self.x = self.home_x;
        self.y = self.home_y;
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
        self.visual_state = VisualState::Idle;
        self.direction = match self.team {
            Team::Blue => 0.0,
            Team::Red => std::f32::consts::PI,
        };
    }

    pub fn is_kicking(&self, now: f64) -> bool {
        now < self.kicking_until
    }

    /// Where a ball held by this player sits.
    pub fn dribble_point(&self) -> (f32, f32) {
        let facing = Vec2::from_angle(self.direction);
        (
            self.x + POSSESSION_OFFSET * facing.x,
            self.y + POSSESSION_OFFSET * facing.y,
        )
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            team: self.team,
            is_human: self.is_human,
            is_controlled: self.is_controlled,
            x: self.x,
            y: self.y,
            velocity_x: self.velocity_x,
            velocity_y: self.velocity_y,
            state: self.visual_state,
            direction: self.direction,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub possessed_by: Option<PlayerId>,
    pub pressure_level: f32,
    pub last_shot_time: Option<f64>,
    pub last_shooter: Option<PlayerId>,
    /// Physics frozen while the goal pause plays out.
    pub in_goal: bool,
}

impl Ball {
    pub fn new() -> Self {
        let (x, y) = field_center();
        Self {
            x,
            y,
            velocity_x: 0.0,
            velocity_y: 0.0,
            possessed_by: None,
            pressure_level: 0.0,
            last_shot_time: None,
            last_shooter: None,
            in_goal: false,
        }
    }

    pub fn reset_to_center(&mut self) {
        *self = Ball::new();
    }

    pub fn is_free(&self) -> bool {
        self.possessed_by.is_none()
    }

    /// Drops possession. Pressure is meaningless without a possessor.
    pub fn release(&mut self) {
        self.possessed_by = None;
        self.pressure_level = 0.0;
    }

    /// Rigidly attaches the ball in front of `holder`.
    pub fn attach_to(&mut self, holder: &Player) {
        let (x, y) = holder.dribble_point();
        self.x = x;
        self.y = y;
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
        self.possessed_by = Some(holder.id);
    }

    pub fn stop(&mut self) {
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
    }

    pub fn shooter_immune(&self, player_id: PlayerId, now: f64) -> bool {
        match (self.last_shooter, self.last_shot_time) {
            (Some(shooter), Some(shot_at)) => shooter == player_id && now - shot_at < SHOT_IMMUNITY_MS,
            _ => false,
        }
    }

    pub fn snapshot(&self) -> BallSnapshot {
        BallSnapshot {
            x: self.x,
            y: self.y,
            velocity_x: self.velocity_x,
            velocity_y: self.velocity_y,
            possessed_by: self.possessed_by,
            pressure_level: self.pressure_level,
        }
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

/// Gain/loss timestamps backing the capture and loss lockouts.
#[derive(Debug, Clone, Default)]
pub struct PossessionLedger {
    last_gain_time: HashMap<PlayerId, f64>,
    last_loss_time: HashMap<PlayerId, f64>,
}

impl PossessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_gain(&mut self, player_id: PlayerId, now: f64) {
        self.last_gain_time.insert(player_id, now);
    }

    pub fn record_loss(&mut self, player_id: PlayerId, now: f64) {
        self.last_loss_time.insert(player_id, now);
    }

    pub fn in_capture_lockout(&self, player_id: PlayerId, now: f64) -> bool {
        self.last_gain_time
            .get(&player_id)
            .is_some_and(|gained| now - gained < CAPTURE_LOCKOUT_MS)
    }

    pub fn in_loss_lockout(&self, player_id: PlayerId, now: f64) -> bool {
        self.last_loss_time
            .get(&player_id)
            .is_some_and(|lost| now - lost < LOSS_LOCKOUT_MS)
    }

    pub fn forget(&mut self, player_id: PlayerId) {
        self.last_gain_time.remove(&player_id);
        self.last_loss_time.remove(&player_id);
    }

    pub fn clear(&mut self) {
        self.last_gain_time.clear();
        self.last_loss_time.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.last_gain_time.is_empty() && self.last_loss_time.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MatchState {
    pub tick: u32,
    pub players: BTreeMap<PlayerId, Player>,
    pub ball: Ball,
    pub score_blue: u32,
    pub score_red: u32,
    pub phase: MatchPhase,
    pub time_remaining: f32,
}

impl MatchState {
    pub fn new(duration: f32) -> Self {
        Self {
            tick: 0,
            players: BTreeMap::new(),
            ball: Ball::new(),
            score_blue: 0,
            score_red: 0,
            phase: MatchPhase::Waiting,
            time_remaining: duration,
        }
    }

    pub fn add_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Removes every player owned by `owner` and returns their ids.
    pub fn remove_players_owned_by(&mut self, owner: SessionId) -> Vec<PlayerId> {
        let ids: Vec<PlayerId> = self
            .players
            .values()
            .filter(|player| player.owner == owner)
            .map(|player| player.id)
            .collect();

        for id in &ids {
            self.players.remove(id);
        }
        ids
    }

    pub fn owners(&self) -> Vec<SessionId> {
        let mut owners: Vec<SessionId> = self.players.values().map(|p| p.owner).collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    pub fn humans_on(&self, team: Team) -> usize {
        self.players
            .values()
            .filter(|player| player.is_human && player.team == team)
            .count()
    }

    pub fn human_count(&self) -> usize {
        self.players.values().filter(|player| player.is_human).count()
    }

    pub fn both_teams_present(&self) -> bool {
        self.humans_on(Team::Blue) > 0 && self.humans_on(Team::Red) > 0
    }

    pub fn award_goal(&mut self, team: Team) {
        match team {
            Team::Blue => self.score_blue += 1,
            Team::Red => self.score_red += 1,
        }
    }

    pub fn winner(&self) -> Option<Team> {
        match self.score_blue.cmp(&self.score_red) {
            std::cmp::Ordering::Greater => Some(Team::Blue),
            std::cmp::Ordering::Less => Some(Team::Red),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn reset_formation(&mut self) {
        for player in self.players.values_mut() {
            player.reset_to_home();
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            tick: self.tick,
            time_remaining: self.time_remaining,
            score_blue: self.score_blue,
            score_red: self.score_red,
            phase: self.phase,
            players: self
                .players
                .iter()
                .map(|(id, player)| (*id, player.snapshot()))
                .collect(),
            ball: self.ball.snapshot(),
        }
    }
}

/// Human plus two AI teammates in formation, all owned by `owner`.
pub fn spawn_squad(
    first_id: PlayerId,
    owner: SessionId,
    team: Team,
    lane: usize,
) -> Vec<Player> {
    (0..3)
        .map(|slot| {
            Player::new(
                first_id + slot as PlayerId,
                owner,
                team,
                slot == 0,
                formation_position(team, slot, lane),
            )
        })
        .collect()
}
