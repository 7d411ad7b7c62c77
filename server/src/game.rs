use crate::goal::detect_goal;
use crate::input_queue::InputQueue;
use crate::physics::{apply_player_input, integrate_ball};
use crate::possession::{handle_action, update_possession};
use crate::scheduler::{FixedStepScheduler, TickReport};
use crate::state::{MatchState, Player, PossessionLedger};
use log::{debug, info};
use shared::{
    MatchEvent, MatchPhase, PlayerId, PlayerInput, SessionId, StateSnapshot, Team, VisualState,
    FIXED_TIMESTEP, GOAL_RESET_DELAY_MS, MAX_STEPS_PER_TICK,
};

/// One match: state, input mailbox, possession ledger and the clocks that
/// drive them. Owned by a single room task, so nothing here is locked.
#[derive(Debug)]
pub struct MatchSimulation {
    pub state: MatchState,
    ledger: PossessionLedger,
    inputs: InputQueue,
    scheduler: FixedStepScheduler,
    /// Advances by the fixed step; every time-lock reads this clock.
    sim_clock_ms: f64,
    /// Advances by the scaled real delta; only the goal pause reads it.
    pause_clock_ms: f64,
    goal_reset_at: Option<f64>,
    events: Vec<MatchEvent>,
    duration: f32,
}

impl MatchSimulation {
    pub fn new(duration: f32, time_scale: f32) -> Self {
        Self {
            state: MatchState::new(duration),
            ledger: PossessionLedger::new(),
            inputs: InputQueue::new(),
            scheduler: FixedStepScheduler::new(FIXED_TIMESTEP, MAX_STEPS_PER_TICK, time_scale),
            sim_clock_ms: 0.0,
            pause_clock_ms: 0.0,
            goal_reset_at: None,
            events: Vec::new(),
            duration,
        }
    }

    pub fn add_squad(&mut self, squad: Vec<Player>) {
        for player in squad {
            debug!(
                "Added player {} ({:?}, human: {}) at ({:.0}, {:.0})",
                player.id, player.team, player.is_human, player.x, player.y
            );
            self.state.add_player(player);
        }
    }

    /// Removes everything `owner` created. A ball they were holding is left
    /// for the possession pass to release.
    pub fn remove_owner(&mut self, owner: SessionId) -> Vec<PlayerId> {
        let removed = self.state.remove_players_owned_by(owner);
        for id in &removed {
            self.inputs.remove(*id);
            self.ledger.forget(*id);
        }
        if !removed.is_empty() {
            info!("Removed players {:?} of session {}", removed, owner);
        }
        removed
    }

    /// Kickoff: resets the clock, ball and formation and emits `MatchStart`.
    pub fn start(&mut self) {
        self.state.phase = MatchPhase::Playing;
        self.state.time_remaining = self.duration;
        self.state.ball.reset_to_center();
        self.state.reset_formation();
        self.ledger.clear();
        self.inputs.clear();
        self.scheduler.reset();
        self.goal_reset_at = None;

        info!("Match started ({:.0}s)", self.duration);
        self.events.push(MatchEvent::MatchStart {
            duration: self.duration,
        });
    }

    /// Mid-match abort: back to waiting with physics stopped.
    pub fn return_to_waiting(&mut self) {
        self.state.phase = MatchPhase::Waiting;
        self.scheduler.reset();
        self.inputs.clear();
    }

    /// Latest-wins write into the mailbox. Unknown players are refused.
    pub fn submit_input(&mut self, player_id: PlayerId, input: PlayerInput) -> bool {
        if !self.state.players.contains_key(&player_id) {
            return false;
        }
        if self.inputs.submit(player_id, input) {
            debug!("Input for player {} overwritten before consumption", player_id);
        }
        true
    }

    /// Moves direct control to `target`, which must belong to `owner`.
    pub fn switch_control(&mut self, owner: SessionId, target: PlayerId) -> bool {
        match self.state.players.get(&target) {
            Some(player) if player.owner == owner => {}
            _ => return false,
        }

        for player in self.state.players.values_mut() {
            if player.owner == owner {
                player.is_controlled = player.id == target;
            }
        }
        true
    }

    /// One network-visible frame: runs the fixed steps due for `real_delta`
    /// seconds, then the goal pause and the countdown. No-op unless playing.
    pub fn tick(&mut self, real_delta: f64) -> TickReport {
        if self.state.phase != MatchPhase::Playing {
            return TickReport {
                steps: 0,
                discarded: 0,
                scaled_delta: 0.0,
            };
        }

        let report = self.scheduler.plan(real_delta);
        self.pause_clock_ms += report.scaled_delta * 1000.0;

        if let Some(reset_at) = self.goal_reset_at {
            if self.pause_clock_ms >= reset_at {
                self.finish_goal_pause();
            }
        }

        for _ in 0..report.steps {
            self.step(FIXED_TIMESTEP);
        }

        self.state.time_remaining -= report.scaled_delta as f32;
        if self.state.time_remaining <= 0.0 {
            self.end_match();
        }

        report
    }

    /// Input, ball physics, possession, then goal detection over `dt`
    /// seconds. Possession sees the ball where this step moved it.
    pub fn step(&mut self, dt: f32) {
        self.sim_clock_ms += dt as f64 * 1000.0;
        let now = self.sim_clock_ms;

        let pending = self.inputs.take_all();
        for (player_id, input) in &pending {
            let Some(player) = self.state.players.get_mut(player_id) else {
                continue;
            };
            apply_player_input(player, input, dt, now);

            if input.action {
                let outcome = handle_action(
                    &mut self.state,
                    &mut self.ledger,
                    *player_id,
                    input.shoot_power(),
                    now,
                );
                debug!("Player {} action: {:?}", player_id, outcome);
            }
        }

        // Players without fresh input hold still; only their kick animation runs out.
        for player in self.state.players.values_mut() {
            if player.visual_state == VisualState::Kicking && !player.is_kicking(now) {
                player.visual_state = VisualState::Idle;
            }
        }

        integrate_ball(&mut self.state.ball, dt);
        update_possession(&mut self.state, &mut self.ledger, dt, now);

        if self.goal_reset_at.is_none() {
            if let Some(team) = detect_goal(&self.state.ball) {
                self.score_goal(team);
            }
        }

        self.state.tick = self.state.tick.wrapping_add(1);
    }

    fn score_goal(&mut self, team: Team) {
        self.state.award_goal(team);

        let ball = &mut self.state.ball;
        ball.release();
        ball.in_goal = true;
        ball.stop();

        self.state.reset_formation();
        self.goal_reset_at = Some(self.pause_clock_ms + GOAL_RESET_DELAY_MS);

        info!(
            "Goal for {:?}! Blue {} - {} Red",
            team, self.state.score_blue, self.state.score_red
        );
        self.events.push(MatchEvent::GoalScored {
            team,
            score_blue: self.state.score_blue,
            score_red: self.state.score_red,
        });
    }

    fn finish_goal_pause(&mut self) {
        self.goal_reset_at = None;
        self.state.ball.reset_to_center();
        self.ledger.clear();
        debug!("Goal pause over, ball back at center");
    }

    fn end_match(&mut self) {
        self.state.time_remaining = 0.0;
        self.state.phase = MatchPhase::Ended;

        let winner = self.state.winner();
        info!(
            "Match ended: Blue {} - {} Red (winner: {:?})",
            self.state.score_blue, self.state.score_red, winner
        );
        self.events.push(MatchEvent::MatchEnd {
            score_blue: self.state.score_blue,
            score_red: self.state.score_red,
            winner,
        });
    }

    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    pub fn sim_clock_ms(&self) -> f64 {
        self.sim_clock_ms
    }

    pub fn goal_pause_pending(&self) -> bool {
        self.goal_reset_at.is_some()
    }

    pub fn ledger(&self) -> &PossessionLedger {
        &self.ledger
    }
}
