use crate::state::{Ball, Player};
use shared::{
    goal_mouth_bottom, goal_mouth_top, integrate_movement, within_goal_mouth, PlayerInput,
    VisualState, BALL_FRICTION, BALL_MIN_SPEED, BALL_RADIUS, BALL_RESTITUTION, FIELD_HEIGHT,
    FIELD_MARGIN, FIELD_WIDTH, GOAL_DEPTH, PLAYER_MARGIN, POSSESSION_OFFSET,
};

/// Moves a player from one input sample over one fixed step.
/// Velocity comes straight from the movement vector; a running kick
/// animation keeps the `Kicking` state but the facing still follows input.
pub fn apply_player_input(player: &mut Player, input: &PlayerInput, dt: f32, now: f64) {
    let step = integrate_movement(player.x, player.y, input.movement, dt);

    player.x = step.x;
    player.y = step.y;
    player.velocity_x = step.velocity_x;
    player.velocity_y = step.velocity_y;

    if let Some(direction) = step.direction {
        player.direction = direction;
    }

    player.visual_state = if player.is_kicking(now) {
        VisualState::Kicking
    } else if step.moving {
        VisualState::Running
    } else {
        VisualState::Idle
    };
}

/// Advances a free ball by one fixed step: friction, integration, wall bounces.
/// Held or goal-frozen balls are left untouched.
pub fn integrate_ball(ball: &mut Ball, dt: f32) {
    if !ball.is_free() || ball.in_goal {
        return;
    }

    ball.velocity_x *= BALL_FRICTION;
    ball.velocity_y *= BALL_FRICTION;

    let speed = (ball.velocity_x * ball.velocity_x + ball.velocity_y * ball.velocity_y).sqrt();
    if speed < BALL_MIN_SPEED {
        ball.stop();
        return;
    }

    let (prev_x, prev_y) = (ball.x, ball.y);
    ball.x += ball.velocity_x * dt;
    ball.y += ball.velocity_y * dt;

    bounce_off_walls(ball, prev_x, prev_y);
}

fn bounce_off_walls(ball: &mut Ball, prev_x: f32, prev_y: f32) {
    let top = FIELD_MARGIN + BALL_RADIUS;
    let bottom = FIELD_HEIGHT - FIELD_MARGIN - BALL_RADIUS;

    if ball.y < top {
        ball.y = top;
        ball.velocity_y = -ball.velocity_y * BALL_RESTITUTION;
    } else if ball.y > bottom {
        ball.y = bottom;
        ball.velocity_y = -ball.velocity_y * BALL_RESTITUTION;
    }

    contain_at_end(ball, prev_x, prev_y, false);
    contain_at_end(ball, prev_x, prev_y, true);
}

/// Handles one end of the pitch. `mirror` maps the right end onto the left
/// so both ends share the same bounds.
///
/// From the pitch the ball only passes the line through the mouth. Once
/// behind the line the posts keep the net and the area beside it apart, so
/// a ball can neither slip into the net from the side nor leave it sideways.
fn contain_at_end(ball: &mut Ball, prev_x: f32, prev_y: f32, mirror: bool) {
    let local = |x: f32| if mirror { FIELD_WIDTH - x } else { x };
    let mut x = local(ball.x);
    let mut vx = if mirror { -ball.velocity_x } else { ball.velocity_x };
    let prev = local(prev_x);

    let line = FIELD_MARGIN + BALL_RADIUS;
    if x >= line {
        return;
    }

    let net_back = FIELD_MARGIN - GOAL_DEPTH + BALL_RADIUS;
    // Farthest a dribble can carry the ball; players can always reach it there.
    let outer = PLAYER_MARGIN - POSSESSION_OFFSET;

    if prev >= FIELD_MARGIN {
        if !within_goal_mouth(ball.y) {
            x = line;
            vx = -vx * BALL_RESTITUTION;
        }
    } else if x < FIELD_MARGIN && within_goal_mouth(prev_y) != within_goal_mouth(ball.y) {
        ball.y = match (within_goal_mouth(prev_y), ball.y < FIELD_HEIGHT / 2.0) {
            (true, true) => goal_mouth_top(),
            (true, false) => goal_mouth_bottom(),
            (false, true) => goal_mouth_top() - BALL_RADIUS,
            (false, false) => goal_mouth_bottom() + BALL_RADIUS,
        };
        ball.velocity_y = -ball.velocity_y * BALL_RESTITUTION;
    }

    let back = if within_goal_mouth(ball.y) { net_back } else { outer };
    if x < back {
        x = back;
        vx = -vx * BALL_RESTITUTION;
    }

    ball.x = local(x);
    ball.velocity_x = if mirror { -vx } else { vx };
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Team, Vec2, FIXED_TIMESTEP, PLAYER_SPEED};

    fn moving(x: f32, y: f32) -> PlayerInput {
        PlayerInput {
            movement: Vec2::new(x, y),
            action: false,
            action_power: None,
            timestamp: 0,
        }
    }

    fn test_player() -> Player {
        Player::new(1, 1, Team::Blue, true, (300.0, 400.0))
    }

    #[test]
    fn test_player_moves_at_constant_speed() {
        let mut player = test_player();
        apply_player_input(&mut player, &moving(1.0, 0.0), FIXED_TIMESTEP, 0.0);

        assert_eq!(player.velocity_x, PLAYER_SPEED);
        assert_approx_eq!(player.x, 300.0 + PLAYER_SPEED * FIXED_TIMESTEP, 1e-4);
        assert_eq!(player.visual_state, VisualState::Running);
    }

    #[test]
    fn test_zero_movement_is_a_steady_state() {
        let mut player = test_player();
        for _ in 0..120 {
            apply_player_input(&mut player, &moving(0.0, 0.0), FIXED_TIMESTEP, 0.0);
        }
        assert_eq!(player.x, 300.0);
        assert_eq!(player.y, 400.0);
        assert_eq!(player.visual_state, VisualState::Idle);
    }

    #[test]
    fn test_kicking_state_survives_movement_but_direction_updates() {
        let mut player = test_player();
        player.kicking_until = 500.0;

        apply_player_input(&mut player, &moving(0.0, 1.0), FIXED_TIMESTEP, 100.0);
        assert_eq!(player.visual_state, VisualState::Kicking);
        assert_approx_eq!(player.direction, std::f32::consts::FRAC_PI_2, 1e-6);

        apply_player_input(&mut player, &moving(0.0, 1.0), FIXED_TIMESTEP, 500.0);
        assert_eq!(player.visual_state, VisualState::Running);
    }

    #[test]
    fn test_ball_friction_and_rest() {
        let mut ball = Ball::new();
        ball.velocity_x = 300.0;

        integrate_ball(&mut ball, FIXED_TIMESTEP);
        assert_approx_eq!(ball.velocity_x, 300.0 * BALL_FRICTION, 1e-3);

        for _ in 0..2000 {
            integrate_ball(&mut ball, FIXED_TIMESTEP);
        }
        assert_eq!(ball.velocity_x, 0.0);
        assert_eq!(ball.velocity_y, 0.0);
    }

    #[test]
    fn test_ball_bounces_off_side_wall_outside_mouth() {
        let mut ball = Ball::new();
        ball.x = FIELD_MARGIN + BALL_RADIUS + 1.0;
        ball.y = FIELD_MARGIN + 100.0;
        ball.velocity_x = -600.0;

        integrate_ball(&mut ball, FIXED_TIMESTEP);

        assert_eq!(ball.x, FIELD_MARGIN + BALL_RADIUS);
        assert!(ball.velocity_x > 0.0);
        assert_approx_eq!(ball.velocity_x, 600.0 * BALL_FRICTION * BALL_RESTITUTION, 1e-2);
    }

    #[test]
    fn test_ball_passes_goal_line_inside_mouth() {
        let mut ball = Ball::new();
        ball.x = FIELD_MARGIN + BALL_RADIUS + 1.0;
        ball.velocity_x = -600.0;

        integrate_ball(&mut ball, FIXED_TIMESTEP);

        assert!(ball.x < FIELD_MARGIN + BALL_RADIUS);
        assert!(ball.velocity_x < 0.0);
    }

    #[test]
    fn test_ball_beside_the_net_cannot_slip_in_from_the_side() {
        let mut ball = Ball::new();
        ball.x = 5.0;
        ball.y = goal_mouth_top() - 5.0;
        ball.velocity_y = 600.0;

        integrate_ball(&mut ball, FIXED_TIMESTEP);

        assert_eq!(ball.y, goal_mouth_top() - BALL_RADIUS);
        assert!(ball.velocity_y < 0.0);
        assert_eq!(ball.x, 5.0);
        assert!(!within_goal_mouth(ball.y));
        assert_eq!(crate::goal::detect_goal(&ball), None);
    }

    #[test]
    fn test_ball_in_net_stops_at_the_post() {
        let mut ball = Ball::new();
        ball.x = 30.0;
        ball.y = goal_mouth_top() + 5.0;
        ball.velocity_y = -600.0;

        integrate_ball(&mut ball, FIXED_TIMESTEP);

        assert_eq!(ball.y, goal_mouth_top());
        assert!(ball.velocity_y > 0.0);
        assert_eq!(ball.x, 30.0);
    }

    #[test]
    fn test_right_net_is_contained_the_same_way() {
        let mut ball = Ball::new();
        ball.x = FIELD_WIDTH - 30.0;
        ball.y = goal_mouth_bottom() - 5.0;
        ball.velocity_y = 600.0;

        integrate_ball(&mut ball, FIXED_TIMESTEP);

        assert_eq!(ball.y, goal_mouth_bottom());
        assert_eq!(ball.x, FIELD_WIDTH - 30.0);

        let mut wide = Ball::new();
        wide.x = FIELD_WIDTH - FIELD_MARGIN - BALL_RADIUS - 1.0;
        wide.y = FIELD_MARGIN + 100.0;
        wide.velocity_x = 600.0;
        integrate_ball(&mut wide, FIXED_TIMESTEP);
        assert_eq!(wide.x, FIELD_WIDTH - FIELD_MARGIN - BALL_RADIUS);
        assert!(wide.velocity_x < 0.0);
    }

    #[test]
    fn test_ball_bounces_off_top_wall() {
        let mut ball = Ball::new();
        ball.y = FIELD_MARGIN + BALL_RADIUS + 1.0;
        ball.velocity_y = -600.0;

        integrate_ball(&mut ball, FIXED_TIMESTEP);

        assert_eq!(ball.y, FIELD_MARGIN + BALL_RADIUS);
        assert!(ball.velocity_y > 0.0);
    }

    #[test]
    fn test_held_or_frozen_ball_is_not_integrated() {
        let holder = test_player();
        let mut ball = Ball::new();
        ball.attach_to(&holder);
        ball.velocity_x = 100.0;
        let x = ball.x;
        integrate_ball(&mut ball, FIXED_TIMESTEP);
        assert_eq!(ball.x, x);

        let mut frozen = Ball::new();
        frozen.in_goal = true;
        frozen.velocity_x = 100.0;
        integrate_ball(&mut frozen, FIXED_TIMESTEP);
        assert_eq!(frozen.x, FIELD_WIDTH / 2.0);
    }
}
