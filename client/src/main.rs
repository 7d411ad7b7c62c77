use clap::Parser;
use client::game::ClientGameState;
use client::input::InputManager;
use client::network::{NetworkConfig, NetworkHandle, OutgoingMessage};
use client::network_graph::NetworkGraph;
use client::rendering::{Renderer, UiConfig};
use log::{error, info};
use macroquad::prelude::*;
use shared::InputMessage;
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Room to join
    #[arg(short = 'r', long, default_value = "lobby")]
    room: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "1200")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "800")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: format!("Match client - {}", args.room),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {} (room '{}')", args.server, args.room);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: WASD/arrows to move, hold Space to charge a shot, Tab to switch player");
    info!("Press 1/2/3 to toggle Prediction/Reconciliation/Interpolation, G for the ping graph");

    let config = NetworkConfig::new(args.server, args.room.clone(), args.fake_ping);
    let mut network = match NetworkHandle::spawn(config) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start network thread: {}", e);
            return;
        }
    };

    let mut game = ClientGameState::new();
    let mut input = InputManager::new();
    let mut graph = NetworkGraph::new();
    let mut renderer = Renderer::new(args.width, args.height);

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        for event in network.poll() {
            game.handle_event(event);
        }
        if let Some(ping) = game.ping_ms {
            graph.record(get_time(), ping as f32);
        }

        let frame = input.update(get_time());

        if frame.toggles.prediction {
            game.toggle_prediction();
            info!("Client-side prediction: {}", game.prediction_enabled);
        }
        if frame.toggles.reconciliation {
            game.toggle_reconciliation();
            info!("Server reconciliation: {}", game.reconciliation_enabled);
        }
        if frame.toggles.interpolation {
            game.toggle_interpolation();
            info!("Interpolation: {}", game.interpolation_enabled);
        }
        if frame.toggles.graph {
            graph.toggle_visibility();
        }

        if frame.switch_control {
            if let Some(next) = game.next_squad_member() {
                network.send(OutgoingMessage::SwitchControl(next));
            }
        }

        if game.accepts_input() {
            if let Some(controlled) = game.controlled_id() {
                network.send(OutgoingMessage::Input(InputMessage::single(
                    controlled,
                    frame.input.clone(),
                )));
            }
        }

        game.update(get_frame_time(), frame.input.movement);

        renderer.render(
            &game,
            &graph,
            UiConfig {
                fake_ping_ms: args.fake_ping,
                charge: frame.charge,
            },
        );

        next_frame().await;
    }

    network.shutdown();
    info!("Client stopped");
}
