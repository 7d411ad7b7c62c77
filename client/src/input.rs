//! Keyboard sampling: movement, charged shots, control switching and the
//! debug toggles.

use macroquad::prelude::*;
use shared::{PlayerInput, Vec2};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds of holding Space for a full-power shot.
pub const FULL_CHARGE_SECS: f64 = 1.0;

/// Edge-triggered debug switches for this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DebugToggles {
    pub prediction: bool,
    pub reconciliation: bool,
    pub interpolation: bool,
    pub graph: bool,
}

#[derive(Debug, Clone)]
pub struct FrameInput {
    pub input: PlayerInput,
    pub toggles: DebugToggles,
    pub switch_control: bool,
    /// Charge so far while Space is held, for the power meter.
    pub charge: Option<f32>,
}

/// Space-bar charge: power grows linearly to 1.0 and fires on release.
#[derive(Debug, Default)]
pub struct PowerCharge {
    started_at: Option<f64>,
}

impl PowerCharge {
    pub fn press(&mut self, now: f64) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn level(&self, now: f64) -> Option<f32> {
        self.started_at
            .map(|start| ((now - start) / FULL_CHARGE_SECS).clamp(0.0, 1.0) as f32)
    }

    /// Ends the charge, returning the shot power if one was building.
    pub fn release(&mut self, now: f64) -> Option<f32> {
        let power = self.level(now);
        self.started_at = None;
        power
    }
}

/// Screen y grows downward, so "up" is negative.
pub fn movement_vector(up: bool, down: bool, left: bool, right: bool) -> Vec2 {
    let axis = |neg: bool, pos: bool| match (neg, pos) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    };
    Vec2::new(axis(left, right), axis(up, down)).normalized()
}

pub struct InputManager {
    charge: PowerCharge,

    // Previous frame key states for edge detection
    prev_space: bool,
    prev_tab: bool,
    prev_key_1: bool,
    prev_key_2: bool,
    prev_key_3: bool,
    prev_key_g: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            charge: PowerCharge::default(),
            prev_space: false,
            prev_tab: false,
            prev_key_1: false,
            prev_key_2: false,
            prev_key_3: false,
            prev_key_g: false,
        }
    }

    /// Samples the keyboard once per frame. `now` is macroquad's `get_time()`.
    pub fn update(&mut self, now: f64) -> FrameInput {
        let movement = movement_vector(
            is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        );

        let space = is_key_down(KeyCode::Space);
        let tab = is_key_down(KeyCode::Tab);
        let key_1 = is_key_down(KeyCode::Key1);
        let key_2 = is_key_down(KeyCode::Key2);
        let key_3 = is_key_down(KeyCode::Key3);
        let key_g = is_key_down(KeyCode::G);

        let mut fired = None;
        if space {
            self.charge.press(now);
        } else if self.prev_space {
            fired = self.charge.release(now);
        }

        let toggles = DebugToggles {
            prediction: key_1 && !self.prev_key_1,
            reconciliation: key_2 && !self.prev_key_2,
            interpolation: key_3 && !self.prev_key_3,
            graph: key_g && !self.prev_key_g,
        };
        let switch_control = tab && !self.prev_tab;

        self.prev_space = space;
        self.prev_tab = tab;
        self.prev_key_1 = key_1;
        self.prev_key_2 = key_2;
        self.prev_key_3 = key_3;
        self.prev_key_g = key_g;

        FrameInput {
            input: PlayerInput {
                movement,
                action: fired.is_some(),
                action_power: fired,
                timestamp: Self::get_timestamp(),
            },
            toggles,
            switch_control,
            charge: self.charge.level(now),
        }
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(!input_manager.prev_space);
        assert_eq!(input_manager.charge.level(0.0), None);
    }

    #[test]
    fn test_get_timestamp() {
        let timestamp1 = InputManager::get_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let timestamp2 = InputManager::get_timestamp();
        assert!(timestamp2 > timestamp1);
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let v = movement_vector(true, false, false, true);
        assert_approx_eq!(v.length(), 1.0, 1e-6);
        assert!(v.x > 0.0 && v.y < 0.0);
    }

    #[test]
    fn test_opposing_keys_cancel() {
        assert_eq!(movement_vector(true, true, false, false), Vec2::ZERO);
        assert_eq!(movement_vector(false, false, true, true), Vec2::ZERO);
    }

    #[test]
    fn test_charge_grows_linearly_and_caps() {
        let mut charge = PowerCharge::default();
        charge.press(10.0);
        charge.press(10.4);
        assert_approx_eq!(charge.level(10.5).unwrap(), 0.5, 1e-6);
        assert_eq!(charge.level(12.0), Some(1.0));
    }

    #[test]
    fn test_release_fires_once() {
        let mut charge = PowerCharge::default();
        assert_eq!(charge.release(1.0), None);

        charge.press(1.0);
        assert_approx_eq!(charge.release(1.25).unwrap(), 0.25, 1e-6);
        assert_eq!(charge.release(1.5), None);
    }
}
