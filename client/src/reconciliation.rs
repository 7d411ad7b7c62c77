//! Error-adaptive correction of the predicted local player, and plain
//! exponential smoothing for everything the client does not predict.

/// Errors below this are treated as noise and blended gently.
pub const SMALL_ERROR_PX: f32 = 10.0;
/// Errors at or above this are pulled in hard.
pub const LARGE_ERROR_PX: f32 = 50.0;
/// Below this the predicted position snaps onto the server's.
pub const SNAP_EPSILON_PX: f32 = 0.5;

pub const SMALL_ERROR_FACTOR: f32 = 0.15;
pub const MEDIUM_ERROR_FACTOR: f32 = 0.4;
pub const LARGE_ERROR_FACTOR: f32 = 0.7;

/// Per-frame pull of remote entities toward their latest server position.
pub const INTERPOLATION_FACTOR: f32 = 0.3;

pub fn blend_factor(error: f32) -> f32 {
    if error < SMALL_ERROR_PX {
        SMALL_ERROR_FACTOR
    } else if error < LARGE_ERROR_PX {
        MEDIUM_ERROR_FACTOR
    } else {
        LARGE_ERROR_FACTOR
    }
}

/// Blends `predicted` toward `server`. Never overshoots: the result always
/// lies on the segment between the two.
pub fn reconcile(predicted: (f32, f32), server: (f32, f32)) -> (f32, f32) {
    let dx = server.0 - predicted.0;
    let dy = server.1 - predicted.1;
    let error = (dx * dx + dy * dy).sqrt();

    if error < SNAP_EPSILON_PX {
        return server;
    }

    let factor = blend_factor(error);
    (predicted.0 + dx * factor, predicted.1 + dy * factor)
}

/// Moves `current` a fixed fraction toward `target`. No extrapolation.
pub fn interpolate(current: (f32, f32), target: (f32, f32), factor: f32) -> (f32, f32) {
    (
        current.0 + (target.0 - current.0) * factor,
        current.1 + (target.1 - current.1) * factor,
    )
}

/// Shortest-arc blend between two headings in radians.
pub fn interpolate_angle(current: f32, target: f32, factor: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let delta = (target - current + PI).rem_euclid(TAU) - PI;
    current + delta * factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn error(a: (f32, f32), b: (f32, f32)) -> f32 {
        ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
    }

    #[test]
    fn test_blend_factor_bands() {
        assert_eq!(blend_factor(0.0), SMALL_ERROR_FACTOR);
        assert_eq!(blend_factor(9.99), SMALL_ERROR_FACTOR);
        assert_eq!(blend_factor(10.0), MEDIUM_ERROR_FACTOR);
        assert_eq!(blend_factor(49.9), MEDIUM_ERROR_FACTOR);
        assert_eq!(blend_factor(50.0), LARGE_ERROR_FACTOR);
        assert_eq!(blend_factor(500.0), LARGE_ERROR_FACTOR);
    }

    #[test]
    fn test_tiny_error_snaps() {
        let server = (100.0, 200.0);
        assert_eq!(reconcile((100.3, 200.2), server), server);
    }

    #[test]
    fn test_fifty_pixel_error_converges_without_overshoot() {
        let server = (300.0, 400.0);
        let mut predicted = (350.0, 400.0);
        let mut last_error = error(predicted, server);

        let mut ticks = 0;
        while predicted != server {
            predicted = reconcile(predicted, server);
            let e = error(predicted, server);

            assert!(e < last_error, "error grew from {} to {}", last_error, e);
            assert!(predicted.0 >= server.0, "overshot to {}", predicted.0);
            last_error = e;

            ticks += 1;
            assert!(ticks <= 30, "did not converge in 30 ticks");
        }
        assert_eq!(predicted, server);
    }

    #[test]
    fn test_large_error_pulls_hard() {
        let corrected = reconcile((0.0, 0.0), (100.0, 0.0));
        assert_approx_eq!(corrected.0, 70.0, 1e-4);
    }

    #[test]
    fn test_interpolation_approaches_target() {
        let mut pos = (0.0, 0.0);
        for _ in 0..50 {
            let next = interpolate(pos, (100.0, -50.0), INTERPOLATION_FACTOR);
            assert!(next.0 <= 100.0 && next.1 >= -50.0);
            pos = next;
        }
        assert_approx_eq!(pos.0, 100.0, 1e-3);
        assert_approx_eq!(pos.1, -50.0, 1e-3);
    }

    #[test]
    fn test_angle_blend_takes_short_way() {
        use std::f32::consts::PI;
        let blended = interpolate_angle(PI - 0.1, -PI + 0.1, 0.5);
        assert!(blended > PI - 0.1);
        assert_approx_eq!(blended, PI, 1e-4);
    }
}
