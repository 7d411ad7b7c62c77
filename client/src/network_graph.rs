//! Rolling ping graph for the debug view (G to toggle).

use macroquad::prelude::*;
use std::collections::VecDeque;

const MAX_SAMPLES: usize = 100;
const SAMPLE_INTERVAL_SECS: f64 = 0.1;
const MIN_SCALE_MS: f32 = 50.0;

pub struct NetworkGraph {
    /// (sample time in seconds, ping in ms)
    samples: VecDeque<(f64, f32)>,
    last_sample: Option<f64>,
    ping_scale_max: f32,
    visible: bool,
}

impl NetworkGraph {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            last_sample: None,
            ping_scale_max: 100.0,
            visible: false,
        }
    }

    pub fn toggle_visibility(&mut self) {
        self.visible = !self.visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Samples at a fixed cadence so the x axis stays even regardless of
    /// how often pongs arrive.
    pub fn record(&mut self, now: f64, ping_ms: f32) {
        if let Some(last) = self.last_sample {
            if now - last < SAMPLE_INTERVAL_SECS {
                return;
            }
        }
        self.last_sample = Some(now);

        self.samples.push_back((now, ping_ms));
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }

        let max_ping = self.samples.iter().map(|(_, p)| *p).fold(0.0f32, f32::max);
        let desired = (max_ping * 1.2).max(MIN_SCALE_MS);
        // Smoothed so the axis doesn't jump.
        self.ping_scale_max = self.ping_scale_max * 0.9 + desired * 0.1;
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.back().map(|(_, p)| *p)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn scale_max(&self) -> f32 {
        self.ping_scale_max
    }

    /// Top-right panel: ping line colored by quality.
    pub fn render(&self) {
        if !self.visible || self.samples.len() < 2 {
            return;
        }

        let (width, height, padding) = (300.0, 120.0, 12.0);
        let x = screen_width() - width - 20.0;
        let y = 60.0;

        draw_rectangle(x, y - 30.0, width, height + 30.0, Color::from_rgba(0, 0, 0, 200));
        draw_rectangle_lines(
            x,
            y - 30.0,
            width,
            height + 30.0,
            1.0,
            Color::from_rgba(120, 120, 120, 255),
        );
        draw_text("Ping (G to toggle)", x + padding, y - 12.0, 14.0, WHITE);

        let inner_w = width - padding * 2.0;
        let inner_h = height - padding * 2.0;
        let (first, _) = self.samples[0];
        let (last, _) = self.samples[self.samples.len() - 1];
        let span = (last - first).max(f64::EPSILON) as f32;

        let point = |(t, ping): (f64, f32)| {
            (
                x + padding + ((t - first) as f32 / span) * inner_w,
                y + padding + inner_h - (ping / self.ping_scale_max).min(1.0) * inner_h,
            )
        };

        for pair in self.samples.iter().collect::<Vec<_>>().windows(2) {
            let (x1, y1) = point(*pair[0]);
            let (x2, y2) = point(*pair[1]);
            draw_line(x1, y1, x2, y2, 2.0, ping_color(pair[1].1));
        }

        draw_text(
            &format!("{:.0}ms", self.ping_scale_max),
            x + width - 44.0,
            y + padding + 4.0,
            12.0,
            GRAY,
        );
    }
}

impl Default for NetworkGraph {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ping_color(ping_ms: f32) -> Color {
    if ping_ms < 30.0 {
        GREEN
    } else if ping_ms < 60.0 {
        YELLOW
    } else if ping_ms < 100.0 {
        ORANGE
    } else {
        RED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_respect_interval() {
        let mut graph = NetworkGraph::new();
        graph.record(0.0, 20.0);
        graph.record(0.05, 90.0);
        graph.record(0.1, 30.0);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.latest(), Some(30.0));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut graph = NetworkGraph::new();
        for i in 0..250 {
            graph.record(i as f64 * 0.2, 10.0);
        }
        assert_eq!(graph.len(), MAX_SAMPLES);
    }

    #[test]
    fn test_scale_tracks_spikes_smoothly() {
        let mut graph = NetworkGraph::new();
        graph.record(0.0, 500.0);
        let scale = graph.scale_max();
        assert!(scale > 100.0 && scale < 600.0);
        graph.record(0.2, 500.0);
        assert!(graph.scale_max() > scale);
    }

    #[test]
    fn test_toggle_visibility() {
        let mut graph = NetworkGraph::new();
        assert!(!graph.is_visible());
        graph.toggle_visibility();
        assert!(graph.is_visible());
    }
}
