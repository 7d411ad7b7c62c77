//! # Match Client Library
//!
//! Client side of the match: it renders an approximation of the server's
//! state that stays responsive under latency and converges on the truth.
//!
//! ## Core Concepts
//!
//! ### Client-Side Prediction
//! The player this client controls moves the instant a key is pressed. The
//! frame loop runs the same movement formula the server uses, with the
//! frame's own delta time.
//!
//! ### Server Reconciliation
//! Each new snapshot pulls the predicted position toward the authoritative
//! one. Small errors are blended gently, large ones hard, and anything under
//! half a pixel snaps, so corrections are never visible as jumps.
//!
//! ### Interpolation
//! Other players and the free ball are never predicted. Every frame they
//! glide a fixed fraction toward their latest server position.
//!
//! ## Module Organization
//!
//! - `prediction`: the locally simulated body
//! - `reconciliation`: blend factors, snapping and interpolation helpers
//! - `game`: the mirrored match state and the per-frame pipeline
//! - `input`: keyboard sampling and charged shots
//! - `network`: UDP task on a background tokio runtime
//! - `network_graph`: rolling ping graph
//! - `rendering`: debug view of pitch, players, ball and HUD
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::network::{NetworkConfig, NetworkHandle, OutgoingMessage};
//! use shared::{InputMessage, PlayerInput, Vec2};
//!
//! let config = NetworkConfig::new("127.0.0.1:8080".parse().unwrap(), "lobby", 0);
//! let mut network = NetworkHandle::spawn(config).unwrap();
//! let mut game = ClientGameState::new();
//!
//! // One frame:
//! for event in network.poll() {
//!     game.handle_event(event);
//! }
//! if let Some(id) = game.controlled_id() {
//!     let input = PlayerInput::idle(0);
//!     network.send(OutgoingMessage::Input(InputMessage::single(id, input)));
//! }
//! game.update(1.0 / 60.0, Vec2::ZERO);
//!
//! network.shutdown();
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod network_graph;
pub mod prediction;
pub mod reconciliation;
pub mod rendering;
