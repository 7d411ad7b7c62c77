use crate::state::Ball;
use shared::{within_goal_mouth, Team, BALL_RADIUS, FIELD_MARGIN, FIELD_WIDTH};

/// A goal only counts once the whole ball is past the line, inside the mouth.
/// The left goal is defended by Blue, so crossing it scores for Red.
pub fn detect_goal(ball: &Ball) -> Option<Team> {
    if ball.in_goal || !within_goal_mouth(ball.y) {
        return None;
    }

    if ball.x + BALL_RADIUS < FIELD_MARGIN {
        Some(Team::Red)
    } else if ball.x - BALL_RADIUS > FIELD_WIDTH - FIELD_MARGIN {
        Some(Team::Blue)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{goal_mouth_bottom, goal_mouth_top, FIELD_HEIGHT};

    fn ball_at(x: f32, y: f32) -> Ball {
        let mut ball = Ball::new();
        ball.x = x;
        ball.y = y;
        ball
    }

    #[test]
    fn test_ball_touching_line_is_not_a_goal() {
        let mid = FIELD_HEIGHT / 2.0;
        assert_eq!(detect_goal(&ball_at(FIELD_MARGIN - BALL_RADIUS, mid)), None);
        assert_eq!(detect_goal(&ball_at(FIELD_MARGIN, mid)), None);
        assert_eq!(
            detect_goal(&ball_at(FIELD_WIDTH - FIELD_MARGIN + BALL_RADIUS, mid)),
            None
        );
    }

    #[test]
    fn test_fully_crossed_ball_scores() {
        let mid = FIELD_HEIGHT / 2.0;
        assert_eq!(
            detect_goal(&ball_at(FIELD_MARGIN - BALL_RADIUS - 0.5, mid)),
            Some(Team::Red)
        );
        assert_eq!(
            detect_goal(&ball_at(FIELD_WIDTH - FIELD_MARGIN + BALL_RADIUS + 0.5, mid)),
            Some(Team::Blue)
        );
    }

    #[test]
    fn test_mouth_edges_are_inclusive() {
        let x = FIELD_MARGIN - BALL_RADIUS - 1.0;
        assert_eq!(detect_goal(&ball_at(x, goal_mouth_top())), Some(Team::Red));
        assert_eq!(detect_goal(&ball_at(x, goal_mouth_bottom())), Some(Team::Red));
        assert_eq!(detect_goal(&ball_at(x, goal_mouth_top() - 1.0)), None);
        assert_eq!(detect_goal(&ball_at(x, goal_mouth_bottom() + 1.0)), None);
    }

    #[test]
    fn test_frozen_ball_does_not_score_twice() {
        let mut ball = ball_at(FIELD_MARGIN - BALL_RADIUS - 5.0, FIELD_HEIGHT / 2.0);
        ball.in_goal = true;
        assert_eq!(detect_goal(&ball), None);
    }
}
