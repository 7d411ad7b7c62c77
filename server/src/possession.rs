//! Ball possession state machine.
//!
//! A ball is either free or held. Four time-locks keep two players fighting
//! over the same ball from flickering possession every tick:
//!
//! - capture lockout: a fresh possessor cannot lose the ball to pressure,
//! - loss lockout: a player who just lost the ball cannot grab it back,
//! - shot immunity: a shooter cannot reclaim their own shot,
//! - release hysteresis: the drop distance is wider than the capture radius.

use crate::state::{Ball, MatchState, Player, PossessionLedger};
use log::debug;
use shared::{
    distance, PlayerId, Vec2, KICK_ANIMATION_MS, POSSESSION_RADIUS, PRESSURE_BUILDUP_RATE,
    PRESSURE_DECAY_RATE, PRESSURE_RADIUS, PRESSURE_RELEASE_THRESHOLD, RELEASE_HYSTERESIS,
    SHOOT_SPEED_MAX, SHOOT_SPEED_MIN,
};
use shared::VisualState;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Shot,
    Captured,
    Ignored,
}

/// Runs one tick of possession: release, magnetism, pressure and transfer
/// for a held ball, passive capture for a free one.
pub fn update_possession(state: &mut MatchState, ledger: &mut PossessionLedger, dt: f32, now: f64) {
    let MatchState { players, ball, .. } = state;

    if ball.in_goal {
        return;
    }

    match ball.possessed_by {
        Some(holder_id) => update_held_ball(players, ball, ledger, holder_id, dt, now),
        None => {
            if let Some(taker) = capture_candidate(players, ball, ledger, now) {
                gain(players, ball, ledger, taker, now);
            }
        }
    }
}

fn update_held_ball(
    players: &BTreeMap<PlayerId, Player>,
    ball: &mut Ball,
    ledger: &mut PossessionLedger,
    holder_id: PlayerId,
    dt: f32,
    now: f64,
) {
    let Some(holder) = players.get(&holder_id) else {
        debug!("Possessor {} vanished, releasing ball", holder_id);
        ball.release();
        return;
    };

    if distance(holder.x, holder.y, ball.x, ball.y) > POSSESSION_RADIUS + RELEASE_HYSTERESIS {
        debug!("Player {} drifted away from the ball", holder_id);
        ledger.record_loss(holder_id, now);
        ball.release();
        return;
    }

    ball.attach_to(holder);

    let challengers: Vec<&Player> = players
        .values()
        .filter(|p| p.team != holder.team)
        .filter(|p| distance(p.x, p.y, ball.x, ball.y) <= PRESSURE_RADIUS)
        .collect();

    let pressure = if challengers.is_empty() {
        ball.pressure_level - PRESSURE_DECAY_RATE * dt
    } else {
        ball.pressure_level + PRESSURE_BUILDUP_RATE * dt * challengers.len() as f32
    };
    ball.pressure_level = pressure.clamp(0.0, PRESSURE_RELEASE_THRESHOLD);

    if ball.pressure_level < PRESSURE_RELEASE_THRESHOLD {
        return;
    }

    if ledger.in_capture_lockout(holder_id, now) {
        // Pressure stays pinned at the threshold until the lockout expires.
        return;
    }

    let taker = challengers
        .into_iter()
        .filter(|p| !ledger.in_loss_lockout(p.id, now))
        .min_by(|a, b| {
            let da = distance(a.x, a.y, ball.x, ball.y);
            let db = distance(b.x, b.y, ball.x, ball.y);
            da.total_cmp(&db).then(a.id.cmp(&b.id))
        });

    if let Some(taker) = taker {
        debug!(
            "Pressure transfer: {} -> {} (pressure {:.2})",
            holder_id, taker.id, ball.pressure_level
        );
        ledger.record_loss(holder_id, now);
        ledger.record_gain(taker.id, now);
        ball.attach_to(taker);
        ball.pressure_level = 0.0;
    }
}

/// Nearest eligible player within capture range of a free ball; ties go to
/// the lowest player id so the outcome never depends on map iteration order.
fn capture_candidate(
    players: &BTreeMap<PlayerId, Player>,
    ball: &Ball,
    ledger: &PossessionLedger,
    now: f64,
) -> Option<PlayerId> {
    players
        .values()
        .filter(|p| can_capture(p, ball, ledger, now))
        .map(|p| (p.id, distance(p.x, p.y, ball.x, ball.y)))
        .min_by(|(ida, da), (idb, db)| da.total_cmp(db).then(ida.cmp(idb)))
        .map(|(id, _)| id)
}

fn can_capture(player: &Player, ball: &Ball, ledger: &PossessionLedger, now: f64) -> bool {
    ball.is_free()
        && !ball.in_goal
        && distance(player.x, player.y, ball.x, ball.y) <= POSSESSION_RADIUS
        && !ball.shooter_immune(player.id, now)
        && !ledger.in_loss_lockout(player.id, now)
}

fn gain(
    players: &BTreeMap<PlayerId, Player>,
    ball: &mut Ball,
    ledger: &mut PossessionLedger,
    taker: PlayerId,
    now: f64,
) {
    if let Some(player) = players.get(&taker) {
        debug!("Player {} captured the ball", taker);
        ledger.record_gain(taker, now);
        ball.attach_to(player);
        ball.pressure_level = 0.0;
    }
}

/// Action button handler. The possessor shoots; anyone else close to a free
/// ball gets a first touch instead.
pub fn handle_action(
    state: &mut MatchState,
    ledger: &mut PossessionLedger,
    player_id: PlayerId,
    power: f32,
    now: f64,
) -> ActionOutcome {
    let MatchState { players, ball, .. } = state;

    if ball.in_goal {
        return ActionOutcome::Ignored;
    }

    if ball.possessed_by == Some(player_id) {
        let Some(shooter) = players.get_mut(&player_id) else {
            ball.release();
            return ActionOutcome::Ignored;
        };
        shoot(shooter, ball, power, now);
        return ActionOutcome::Shot;
    }

    match players.get(&player_id) {
        Some(player) if can_capture(player, ball, ledger, now) => {
            gain(players, ball, ledger, player_id, now);
            ActionOutcome::Captured
        }
        _ => ActionOutcome::Ignored,
    }
}

fn shoot(shooter: &mut Player, ball: &mut Ball, power: f32, now: f64) {
    // Launch from the spot in front of the shooter's current facing.
    ball.attach_to(shooter);

    let speed = SHOOT_SPEED_MIN + (SHOOT_SPEED_MAX - SHOOT_SPEED_MIN) * power.clamp(0.0, 1.0);
    let heading = Vec2::from_angle(shooter.direction).scale(speed);

    ball.release();
    ball.velocity_x = heading.x;
    ball.velocity_y = heading.y;
    ball.last_shot_time = Some(now);
    ball.last_shooter = Some(shooter.id);

    shooter.kicking_until = now + KICK_ANIMATION_MS;
    shooter.visual_state = VisualState::Kicking;

    debug!(
        "Player {} shot at {:.0}px/s (power {:.2})",
        shooter.id, speed, power
    );
}
