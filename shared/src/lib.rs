use serde::{Deserialize, Serialize};

pub mod protocol;

pub use protocol::{
    BallSnapshot, CloseReason, InputMessage, MatchEvent, Packet, PlayerSnapshot, ProtocolError,
    StateSnapshot,
};

pub type PlayerId = u32;
pub type SessionId = u32;

pub const FIELD_WIDTH: f32 = 1200.0;
pub const FIELD_HEIGHT: f32 = 800.0;
/// Inset of the goal lines and side walls from the canvas edge.
pub const FIELD_MARGIN: f32 = 50.0;
pub const GOAL_MOUTH_WIDTH: f32 = 200.0;
pub const GOAL_DEPTH: f32 = 40.0;

pub const PLAYER_RADIUS: f32 = 20.0;
pub const PLAYER_MARGIN: f32 = 20.0;
pub const PLAYER_SPEED: f32 = 200.0;
pub const MOVEMENT_DEADZONE: f32 = 0.1;

pub const BALL_RADIUS: f32 = 10.0;
pub const BALL_FRICTION: f32 = 0.98;
pub const BALL_MIN_SPEED: f32 = 1.0;
pub const BALL_RESTITUTION: f32 = 0.8;

pub const SHOOT_SPEED_MIN: f32 = 200.0;
pub const SHOOT_SPEED_MAX: f32 = 800.0;
pub const DEFAULT_SHOOT_POWER: f32 = 0.8;

pub const POSSESSION_RADIUS: f32 = 30.0;
pub const POSSESSION_OFFSET: f32 = 25.0;
pub const RELEASE_HYSTERESIS: f32 = 10.0;
pub const PRESSURE_RADIUS: f32 = 40.0;
pub const PRESSURE_BUILDUP_RATE: f32 = 2.0;
pub const PRESSURE_DECAY_RATE: f32 = 1.5;
pub const PRESSURE_RELEASE_THRESHOLD: f32 = 1.0;

pub const CAPTURE_LOCKOUT_MS: f64 = 300.0;
pub const LOSS_LOCKOUT_MS: f64 = 300.0;
pub const SHOT_IMMUNITY_MS: f64 = 300.0;
pub const KICK_ANIMATION_MS: f64 = 300.0;

pub const MATCH_DURATION_SECS: f32 = 120.0;
pub const GOAL_RESET_DELAY_MS: f64 = 1000.0;

pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;
pub const MAX_STEPS_PER_TICK: u32 = 24;

/// Protocol version carried in `Packet::Join`.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_angle(radians: f32) -> Self {
        Self {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction; zero stays zero.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }
}

pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    Blue,
    Red,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Blue => Team::Red,
            Team::Red => Team::Blue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Waiting,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualState {
    Idle,
    Running,
    Kicking,
}

/// One player's input sample, identical in shape for humans and AI teammates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Unit vector or zero.
    pub movement: Vec2,
    pub action: bool,
    /// Shoot power in `0..=1`; `None` falls back to `DEFAULT_SHOOT_POWER`.
    pub action_power: Option<f32>,
    pub timestamp: u64,
}

impl PlayerInput {
    pub fn idle(timestamp: u64) -> Self {
        Self {
            movement: Vec2::ZERO,
            action: false,
            action_power: None,
            timestamp,
        }
    }

    /// Clamped to `0..=1`; a non-finite power counts as the default.
    pub fn shoot_power(&self) -> f32 {
        match self.action_power {
            Some(power) if power.is_finite() => power.clamp(0.0, 1.0),
            _ => DEFAULT_SHOOT_POWER,
        }
    }
}

/// Result of one application of the movement formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementStep {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub moving: bool,
    /// New facing, or `None` when the movement is inside the deadzone.
    pub direction: Option<f32>,
}

/// Movement formula shared by the server input processor and client prediction.
///
/// Velocity is set directly from the movement vector (no acceleration ramp),
/// the position integrates by `velocity * dt` and clamps to the field minus
/// `PLAYER_MARGIN`.
pub fn integrate_movement(x: f32, y: f32, movement: Vec2, dt: f32) -> MovementStep {
    let movement = if movement.length() > 1.0 {
        movement.normalized()
    } else {
        movement
    };

    let velocity_x = movement.x * PLAYER_SPEED;
    let velocity_y = movement.y * PLAYER_SPEED;

    let x = (x + velocity_x * dt).clamp(PLAYER_MARGIN, FIELD_WIDTH - PLAYER_MARGIN);
    let y = (y + velocity_y * dt).clamp(PLAYER_MARGIN, FIELD_HEIGHT - PLAYER_MARGIN);

    let moving = movement.length() > MOVEMENT_DEADZONE;

    MovementStep {
        x,
        y,
        velocity_x,
        velocity_y,
        moving,
        direction: moving.then(|| movement.angle()),
    }
}

pub fn field_center() -> (f32, f32) {
    (FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0)
}

pub fn goal_mouth_top() -> f32 {
    (FIELD_HEIGHT - GOAL_MOUTH_WIDTH) / 2.0
}

pub fn goal_mouth_bottom() -> f32 {
    (FIELD_HEIGHT + GOAL_MOUTH_WIDTH) / 2.0
}

pub fn within_goal_mouth(y: f32) -> bool {
    y >= goal_mouth_top() && y <= goal_mouth_bottom()
}

/// Kickoff slot for a team. Slot 0 is the human, slots 1 and 2 the AI teammates.
/// `lane` spreads additional humans on the same team vertically.
pub fn formation_position(team: Team, slot: usize, lane: usize) -> (f32, f32) {
    const OFFSETS: [(f32, f32); 3] = [(0.0, 0.0), (-120.0, -150.0), (-120.0, 150.0)];

    let (dx, dy) = OFFSETS[slot % OFFSETS.len()];
    let lane_shift = lane as f32 * 60.0;
    let base_y = FIELD_HEIGHT / 2.0;

    match team {
        Team::Blue => (FIELD_WIDTH * 0.3 + dx - lane_shift, base_y + dy),
        Team::Red => (FIELD_WIDTH * 0.7 - dx + lane_shift, base_y + dy),
    }
}
