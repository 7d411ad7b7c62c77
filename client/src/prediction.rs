//! Local prediction for the player this client controls.
//!
//! The same `integrate_movement` the server runs per fixed step is applied
//! here per rendered frame, so with zero latency both sides agree exactly
//! and any divergence comes from timing alone.

use shared::{integrate_movement, Vec2, VisualState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedBody {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub direction: f32,
    pub state: VisualState,
}

impl PredictedBody {
    pub fn at(x: f32, y: f32, direction: f32) -> Self {
        Self {
            x,
            y,
            velocity_x: 0.0,
            velocity_y: 0.0,
            direction,
            state: VisualState::Idle,
        }
    }

    /// Advances by one frame of `dt` seconds. A server-side kick animation
    /// is left alone so the sprite doesn't flicker back to running.
    pub fn predict(&mut self, movement: Vec2, dt: f32) {
        let step = integrate_movement(self.x, self.y, movement, dt);

        self.x = step.x;
        self.y = step.y;
        self.velocity_x = step.velocity_x;
        self.velocity_y = step.velocity_y;
        if let Some(direction) = step.direction {
            self.direction = direction;
        }

        if self.state != VisualState::Kicking {
            self.state = if step.moving {
                VisualState::Running
            } else {
                VisualState::Idle
            };
        }
    }
}
