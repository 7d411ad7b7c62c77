//! # Match Server Library
//!
//! This library provides the authoritative server for a two-team,
//! ball-possession match. It owns the canonical match state, consumes client
//! inputs, and broadcasts snapshots and lifecycle events so clients can
//! predict and reconcile against a single source of truth.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every position, the ball, the score and the match phase are decided here.
//! The simulation advances in fixed 1/60 s steps driven by an accumulator, so
//! the outcome does not depend on how often the network tick fires.
//!
//! ### Possession
//! The ball is either free or magnetically held by one player. Opponents
//! crowding the holder build pressure until the ball changes hands; capture
//! and loss lockouts plus post-shot immunity stop possession from flickering.
//!
//! ### Rooms and Sessions
//! Clients join a named room. Each room runs its own match in its own task.
//! Sessions time out after five seconds of silence, and leaving mid-match
//! closes the room for the remaining player.
//!
//! ## Module Organization
//!
//! - `state`: players, ball, score, the possession ledger
//! - `input_queue`: latest-wins per-player input mailbox
//! - `physics`: player movement and free-ball integration
//! - `possession`: capture, pressure, transfer and shooting
//! - `goal`: goal-line crossing
//! - `scheduler`: fixed-timestep accumulator with a per-tick step cap
//! - `game`: one match, driving the modules above once per step
//! - `room`: sessions, team assignment, reliable events, disposal
//! - `registry`: best-effort claims that keep room names unique
//! - `client_manager`: session ids, addresses and timeouts
//! - `network`: UDP tasks, the dispatcher and room tasks
//! - `config`: command line configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::parse_from(["server", "--port", "9000"]);
//!     let mut server = Server::new(&config).await?;
//!
//!     // Runs until a Shutdown message arrives:
//!     // - the receiver task decodes datagrams
//!     // - the dispatcher routes them to sessions and rooms
//!     // - every room ticks, simulates and broadcasts on its own
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod goal;
pub mod input_queue;
pub mod network;
pub mod physics;
pub mod possession;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod state;
