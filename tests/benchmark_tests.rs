//! Performance benchmarks for critical match systems

use shared::{
    BallSnapshot, InputMessage, MatchPhase, Packet, PlayerInput, PlayerSnapshot, StateSnapshot,
    Team, Vec2, VisualState, FIXED_TIMESTEP,
};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

fn steering_input(i: u32) -> PlayerInput {
    let angle = i as f32 * 0.37;
    PlayerInput {
        movement: Vec2::from_angle(angle),
        action: i % 45 == 0,
        action_power: Some((i % 10) as f32 / 10.0),
        timestamp: i as u64 * 16,
    }
}

fn crowded_sim() -> server::game::MatchSimulation {
    use server::game::MatchSimulation;
    use server::state::spawn_squad;

    let mut sim = MatchSimulation::new(120.0, 1.0);
    sim.add_squad(spawn_squad(1, 1, Team::Blue, 0));
    sim.add_squad(spawn_squad(4, 2, Team::Red, 0));
    sim.add_squad(spawn_squad(7, 3, Team::Blue, 1));
    sim.add_squad(spawn_squad(10, 4, Team::Red, 1));
    sim.start();
    sim
}

/// Benchmarks the full fixed step with every player steering and shooting
#[test]
fn benchmark_simulation_step() {
    let mut sim = crowded_sim();

    let iterations = 10_000u32;
    let start = Instant::now();

    for i in 0..iterations {
        for id in 1..=12 {
            sim.submit_input(id, steering_input(i + id));
        }
        sim.step(FIXED_TIMESTEP);
    }

    let duration = start.elapsed();
    println!(
        "Simulation: 12 players × {} steps in {:?} ({:.2} μs/step)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // 10k steps is almost three minutes of match time
    assert!(duration.as_millis() < 3000);
    assert_eq!(sim.phase(), MatchPhase::Playing);
}

/// Benchmarks the tick pipeline including the scheduler and countdown
#[test]
fn benchmark_match_ticks() {
    let mut sim = crowded_sim();

    let ticks = 5_000u32;
    let start = Instant::now();
    let mut steps = 0u64;

    for i in 0..ticks {
        sim.submit_input(1, steering_input(i));
        steps += sim.tick(1.0 / 60.0).steps as u64;
    }

    let duration = start.elapsed();
    println!(
        "Ticks: {} ticks ({} steps) in {:?}",
        ticks, steps, duration
    );

    assert!(steps >= ticks as u64 - 1);
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks the possession state machine under heavy crowding
#[test]
fn benchmark_possession_updates() {
    use server::possession::update_possession;
    use server::state::PossessionLedger;

    let mut state = crowded_sim().state;
    let mut ledger = PossessionLedger::new();

    // Everyone piles onto the ball.
    for player in state.players.values_mut() {
        player.x = 600.0 + (player.id as f32 % 3.0) * 8.0;
        player.y = 400.0 + (player.id as f32 % 4.0) * 8.0;
    }

    let iterations = 20_000;
    let start = Instant::now();
    let mut now = 0.0;

    for _ in 0..iterations {
        now += FIXED_TIMESTEP as f64 * 1000.0;
        update_possession(&mut state, &mut ledger, FIXED_TIMESTEP, now);
    }

    let duration = start.elapsed();
    println!(
        "Possession: {} updates in {:?} ({:.2} μs/update)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
    let holders = state
        .players
        .values()
        .filter(|p| state.ball.possessed_by == Some(p.id))
        .count();
    assert!(holders <= 1);
}

fn full_snapshot() -> StateSnapshot {
    let players: BTreeMap<_, _> = (1..=12u32)
        .map(|id| {
            (
                id,
                PlayerSnapshot {
                    team: if id <= 6 { Team::Blue } else { Team::Red },
                    is_human: id % 3 == 1,
                    is_controlled: id % 3 == 1,
                    x: id as f32 * 90.0,
                    y: 400.0,
                    velocity_x: 200.0,
                    velocity_y: -50.0,
                    state: VisualState::Running,
                    direction: 0.5,
                },
            )
        })
        .collect();

    StateSnapshot {
        tick: 12345,
        time_remaining: 61.5,
        score_blue: 2,
        score_red: 3,
        phase: MatchPhase::Playing,
        players,
        ball: BallSnapshot {
            x: 612.0,
            y: 388.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            possessed_by: Some(4),
            pressure_level: 0.4,
        },
    }
}

/// Benchmarks snapshot encoding, the hottest path on the wire
#[test]
fn benchmark_packet_serialization() {
    let packet = Packet::State(full_snapshot());

    let iterations = 10_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let encoded = packet.encode().unwrap();
        bytes = encoded.len();
        let _decoded = Packet::decode(&encoded).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} iterations of {} bytes in {:?} ({:.2} μs/iter)",
        iterations,
        bytes,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A full snapshot must fit comfortably in one datagram.
    assert!(bytes < 1400);
    assert!(duration.as_millis() < 2000);
}

/// Stress tests the input mailbox with many writers per step
#[test]
fn stress_test_input_queue() {
    use server::input_queue::InputQueue;

    let mut queue = InputQueue::new();
    let start = Instant::now();
    let mut taken = 0;

    for round in 0..1_000u32 {
        for id in 0..50u32 {
            for burst in 0..4 {
                queue.submit(id, steering_input(round * 4 + burst));
            }
        }
        taken += queue.take_all().len();
    }

    let duration = start.elapsed();
    println!("Input queue: {} inputs taken in {:?}", taken, duration);

    // Latest wins: one input per player per round.
    assert_eq!(taken, 50 * 1_000);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks client-side prediction plus reconciliation per frame
#[test]
fn benchmark_client_frame_update() {
    use client::game::ClientGameState;
    use client::network::ClientEvent;

    let mut game = ClientGameState::new();
    game.on_player_ready(1, 1, Team::Blue);
    let mut snapshot = full_snapshot();

    let iterations = 10_000u32;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 3 == 0 {
            snapshot.tick += 1;
            for player in snapshot.players.values_mut() {
                player.x = (player.x + 1.0) % 1100.0 + 50.0;
            }
            game.handle_event(ClientEvent::State(snapshot.clone()));
        }
        game.update(1.0 / 144.0, Vec2::from_angle(i as f32 * 0.01));
    }

    let duration = start.elapsed();
    println!(
        "Client frames: {} frames in {:?} ({:.2} μs/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a room broadcasting to four sessions
#[test]
fn benchmark_room_update() {
    use server::registry::RoomRegistry;
    use server::room::{Room, RoomSettings};

    let registry = RoomRegistry::new(Duration::from_secs(10));
    let mut room = Room::new("bench", RoomSettings::default(), registry);
    let live: HashSet<u32> = (1..=4).collect();
    for session in 1..=4 {
        room.join(session, &live).unwrap();
    }

    let iterations = 2_000u32;
    let start = Instant::now();
    let mut packets = 0;

    for i in 0..iterations {
        let inputs = InputMessage::single(room.player_of(1).unwrap(), steering_input(i));
        room.submit_inputs(1, inputs).unwrap();
        room.update(1.0 / 60.0);
        packets += room.drain_outbound().len();
    }

    let duration = start.elapsed();
    println!(
        "Room: {} updates, {} packets in {:?}",
        iterations, packets, duration
    );

    assert!(packets >= iterations as usize * 4);
    assert!(duration.as_millis() < 3000);
}
