use crate::game::{ClientGameState, RenderedPlayer};
use crate::network_graph::{ping_color, NetworkGraph};
use macroquad::prelude::*;
use shared::{
    goal_mouth_bottom, goal_mouth_top, CloseReason, MatchPhase, Team, VisualState, BALL_RADIUS,
    FIELD_HEIGHT, FIELD_MARGIN, FIELD_WIDTH, GOAL_DEPTH, PLAYER_RADIUS,
};

const PITCH: Color = Color::new(0.16, 0.45, 0.2, 1.0);
const LINES: Color = Color::new(0.9, 0.95, 0.9, 0.8);

/// Maps field coordinates onto the window, letterboxed to keep the aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl FieldTransform {
    pub fn fit(width: f32, height: f32) -> Self {
        let scale = (width / FIELD_WIDTH).min(height / FIELD_HEIGHT);
        Self {
            scale,
            offset_x: (width - FIELD_WIDTH * scale) / 2.0,
            offset_y: (height - FIELD_HEIGHT * scale) / 2.0,
        }
    }

    pub fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (self.offset_x + x * self.scale, self.offset_y + y * self.scale)
    }

    pub fn length(&self, l: f32) -> f32 {
        l * self.scale
    }
}

/// `m:ss`, rounding partial seconds up so 0:00 means time is over.
pub fn format_clock(seconds: f32) -> String {
    let total = seconds.max(0.0).ceil() as u32;
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn team_color(team: Team) -> Color {
    match team {
        Team::Blue => Color::from_rgba(60, 120, 255, 255),
        Team::Red => Color::from_rgba(230, 60, 60, 255),
    }
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub fake_ping_ms: u64,
    /// Shot power while Space is held.
    pub charge: Option<f32>,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&mut self, game: &ClientGameState, graph: &NetworkGraph, config: UiConfig) {
        // Track window resizes.
        self.width = screen_width();
        self.height = screen_height();
        let view = FieldTransform::fit(self.width, self.height);

        clear_background(Color::from_rgba(26, 26, 26, 255));
        self.draw_pitch(&view);

        let controlled = game.controlled_id();
        for (id, player) in &game.players {
            self.draw_player(&view, player, Some(*id) == controlled);
        }

        if let Some(ball) = &game.ball {
            let (x, y) = view.point(ball.x, ball.y);
            draw_circle(x, y, view.length(BALL_RADIUS), WHITE);
            draw_circle_lines(x, y, view.length(BALL_RADIUS), 1.0, BLACK);

            if let Some(holder) = ball.server.possessed_by.and_then(|id| game.players.get(&id)) {
                self.draw_pressure(&view, holder, ball.server.pressure_level);
            }
        }

        if let Some(id) = controlled {
            if let Some(player) = game.players.get(&id) {
                self.draw_velocity_vector(&view, player, game);
            }
        }

        self.draw_scoreboard(game);
        self.draw_banner(game);
        self.draw_ui(game, &config);
        graph.render();
    }

    fn draw_pitch(&self, view: &FieldTransform) {
        let (x0, y0) = view.point(0.0, 0.0);
        draw_rectangle(
            x0,
            y0,
            view.length(FIELD_WIDTH),
            view.length(FIELD_HEIGHT),
            PITCH,
        );

        let (lx, ly) = view.point(FIELD_MARGIN, FIELD_MARGIN);
        draw_rectangle_lines(
            lx,
            ly,
            view.length(FIELD_WIDTH - FIELD_MARGIN * 2.0),
            view.length(FIELD_HEIGHT - FIELD_MARGIN * 2.0),
            2.0,
            LINES,
        );

        let (cx, top) = view.point(FIELD_WIDTH / 2.0, FIELD_MARGIN);
        let (_, bottom) = view.point(FIELD_WIDTH / 2.0, FIELD_HEIGHT - FIELD_MARGIN);
        draw_line(cx, top, cx, bottom, 2.0, LINES);
        let (_, cy) = view.point(0.0, FIELD_HEIGHT / 2.0);
        draw_circle_lines(cx, cy, view.length(80.0), 2.0, LINES);

        let mouth = goal_mouth_bottom() - goal_mouth_top();
        for (goal_x, team) in [
            (FIELD_MARGIN - GOAL_DEPTH, Team::Blue),
            (FIELD_WIDTH - FIELD_MARGIN, Team::Red),
        ] {
            let (gx, gy) = view.point(goal_x, goal_mouth_top());
            let mut net = team_color(team);
            net.a = 0.35;
            draw_rectangle(gx, gy, view.length(GOAL_DEPTH), view.length(mouth), net);
            draw_rectangle_lines(gx, gy, view.length(GOAL_DEPTH), view.length(mouth), 2.0, WHITE);
        }
    }

    fn draw_player(&self, view: &FieldTransform, player: &RenderedPlayer, is_local: bool) {
        let (x, y) = view.point(player.x, player.y);
        let radius = view.length(PLAYER_RADIUS);

        draw_circle(x, y, radius, team_color(player.server.team));

        let outline = if is_local {
            YELLOW
        } else if player.server.is_controlled {
            WHITE
        } else {
            Color::from_rgba(0, 0, 0, 120)
        };
        let thickness = if player.server.state == VisualState::Kicking {
            4.0
        } else {
            2.0
        };
        draw_circle_lines(x, y, radius, thickness, outline);

        let (fx, fy) = (player.direction.cos(), player.direction.sin());
        draw_line(x, y, x + fx * radius, y + fy * radius, 2.0, WHITE);

        if player.server.is_human {
            draw_circle(x, y, radius * 0.25, WHITE);
        }
    }

    fn draw_pressure(&self, view: &FieldTransform, holder: &RenderedPlayer, level: f32) {
        if level <= 0.0 {
            return;
        }
        let (x, y) = view.point(holder.x, holder.y - PLAYER_RADIUS - 12.0);
        let width = view.length(PLAYER_RADIUS * 2.0);
        draw_rectangle(x - width / 2.0, y, width, 4.0, Color::from_rgba(51, 51, 51, 255));
        draw_rectangle(x - width / 2.0, y, width * level.min(1.0), 4.0, ORANGE);
    }

    fn draw_velocity_vector(&self, view: &FieldTransform, player: &RenderedPlayer, game: &ClientGameState) {
        let (vx, vy) = match game.predicted() {
            Some(body) => (body.velocity_x, body.velocity_y),
            None => (player.server.velocity_x, player.server.velocity_y),
        };
        if vx.abs() <= 10.0 && vy.abs() <= 10.0 {
            return;
        }

        let (x0, y0) = view.point(player.x, player.y);
        let (x1, y1) = view.point(player.x + vx * 0.15, player.y + vy * 0.15);
        draw_line(x0, y0, x1, y1, 2.0, YELLOW);
        self.draw_arrow_head(x0, y0, x1, y1);
    }

    fn draw_arrow_head(&self, x0: f32, y0: f32, x1: f32, y1: f32) {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let length = (dx * dx + dy * dy).sqrt();

        if length < 5.0 {
            return;
        }

        let arrow_size = 5.0;
        let nx = dx / length;
        let ny = dy / length;

        let base_x = x1 - nx * arrow_size;
        let base_y = y1 - ny * arrow_size;
        let half = arrow_size / 2.0;

        draw_line(x1, y1, base_x - ny * half, base_y + nx * half, 1.0, YELLOW);
        draw_line(x1, y1, base_x + ny * half, base_y - nx * half, 1.0, YELLOW);
    }

    fn draw_scoreboard(&self, game: &ClientGameState) {
        let center = self.width / 2.0;

        let score = format!("{}  -  {}", game.score_blue, game.score_red);
        let dims = measure_text(&score, None, 32, 1.0);
        draw_text(&score, center - dims.width / 2.0, 34.0, 32.0, WHITE);
        draw_circle(center - dims.width / 2.0 - 16.0, 24.0, 8.0, team_color(Team::Blue));
        draw_circle(center + dims.width / 2.0 + 16.0, 24.0, 8.0, team_color(Team::Red));

        let clock = format_clock(game.time_remaining);
        let dims = measure_text(&clock, None, 20, 1.0);
        draw_text(&clock, center - dims.width / 2.0, 56.0, 20.0, LIGHTGRAY);
    }

    fn draw_banner(&self, game: &ClientGameState) {
        let text = if let Some(reason) = &game.rejected {
            Some((format!("Rejected: {}", reason), RED))
        } else if let Some(reason) = game.closed {
            Some((
                match reason {
                    CloseReason::OpponentLeft => "Opponent left the match".to_string(),
                    CloseReason::ConnectionLost => "Connection lost".to_string(),
                },
                RED,
            ))
        } else if let Some(result) = game.result {
            let line = match result.winner {
                Some(Team::Blue) => "Blue wins!",
                Some(Team::Red) => "Red wins!",
                None => "Draw",
            };
            Some((
                format!("{}  {} - {}", line, result.score_blue, result.score_red),
                WHITE,
            ))
        } else if let Some((team, _)) = game.goal_banner {
            Some((format!("GOAL! {:?} scores", team), team_color(team)))
        } else if game.phase == MatchPhase::Waiting {
            Some(("Waiting for an opponent...".to_string(), LIGHTGRAY))
        } else {
            None
        };

        if let Some((text, color)) = text {
            let dims = measure_text(&text, None, 40, 1.0);
            let x = (self.width - dims.width) / 2.0;
            let y = self.height / 2.0;
            draw_rectangle(
                x - 16.0,
                y - dims.height - 12.0,
                dims.width + 32.0,
                dims.height + 28.0,
                Color::from_rgba(0, 0, 0, 160),
            );
            draw_text(&text, x, y, 40.0, color);
        }
    }

    fn draw_ui(&self, game: &ClientGameState, config: &UiConfig) {
        let y_start = 10.0;
        let indicator_size = 12.0;
        let spacing = 25.0;

        let features = [
            ("P", game.prediction_enabled),
            ("R", game.reconciliation_enabled),
            ("I", game.interpolation_enabled),
        ];

        for (i, (label, enabled)) in features.iter().enumerate() {
            let x = 10.0 + (i as f32) * spacing;
            let color = if *enabled { GREEN } else { RED };

            draw_rectangle(x, y_start, indicator_size, indicator_size, color);
            draw_rectangle_lines(x, y_start, indicator_size, indicator_size, 1.0, WHITE);

            draw_text(label, x + 3.0, y_start + indicator_size + 12.0, 12.0, WHITE);
        }

        let connection_color = if game.session_id.is_some() && game.closed.is_none() {
            GREEN
        } else {
            RED
        };
        draw_rectangle(10.0, y_start + 35.0, 8.0, 8.0, connection_color);
        draw_text("CON", 20.0, y_start + 35.0 + 8.0, 12.0, WHITE);

        // Measured round trip already includes the simulated latency.
        let ping_y = y_start + 50.0;
        let ping = game.ping_ms.unwrap_or(0);
        let ping_bars = (ping / 20).min(10) as i32;
        for i in 0..10i32 {
            let bar_color = if i < ping_bars {
                ping_color(ping as f32)
            } else {
                Color::from_rgba(51, 51, 51, 255)
            };
            draw_rectangle(10.0 + (i as f32) * 3.0, ping_y, 2.0, 8.0, bar_color);
        }
        let ping_text = match (game.ping_ms, config.fake_ping_ms) {
            (None, _) => "-- ms".to_string(),
            (Some(ms), 0) => format!("{}ms", ms),
            (Some(ms), fake) => format!("{}ms (+{} fake)", ms, fake),
        };
        draw_text(&ping_text, 45.0, ping_y + 8.0, 12.0, WHITE);

        if let Some(team) = game.team {
            draw_circle(14.0, ping_y + 22.0, 4.0, team_color(team));
            draw_text(
                &format!("{:?} / {} players", team, game.players.len()),
                24.0,
                ping_y + 26.0,
                12.0,
                WHITE,
            );
        }

        if let Some(charge) = config.charge {
            let width = 120.0;
            let x = (self.width - width) / 2.0;
            let y = self.height - 30.0;
            draw_rectangle(x, y, width, 10.0, Color::from_rgba(51, 51, 51, 255));
            draw_rectangle(x, y, width * charge, 10.0, YELLOW);
            draw_rectangle_lines(x, y, width, 10.0, 1.0, WHITE);
        }

        draw_text(
            "WASD move  Space shoot  Tab switch  1/2/3 P/R/I  G graph",
            10.0,
            self.height - 10.0,
            14.0,
            GRAY,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_transform_fits_wide_window() {
        let view = FieldTransform::fit(1600.0, 800.0);
        assert_approx_eq!(view.scale, 1.0, 1e-6);
        assert_approx_eq!(view.offset_x, 200.0, 1e-4);
        assert_eq!(view.offset_y, 0.0);
    }

    #[test]
    fn test_transform_maps_corners() {
        let view = FieldTransform::fit(600.0, 600.0);
        assert_approx_eq!(view.scale, 0.5, 1e-6);
        let (x, y) = view.point(FIELD_WIDTH, FIELD_HEIGHT);
        assert_approx_eq!(x, 600.0, 1e-3);
        assert_approx_eq!(y, 500.0, 1e-3);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(120.0), "2:00");
        assert_eq!(format_clock(65.2), "1:06");
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(-3.0), "0:00");
    }
}
