//! Health probe: asks a running server for its status and measures ping.

use clap::Parser;
use shared::Packet;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Number of pings to send
    #[arg(short = 'n', long, default_value = "3")]
    count: u32,
}

fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

async fn request(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
) -> Result<Packet, Box<dyn std::error::Error>> {
    socket.send_to(&packet.encode()?, server).await?;

    let mut buf = [0u8; 4096];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    Ok(Packet::decode(&buf[..len])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    match request(&socket, args.server, &Packet::StatusRequest).await? {
        Packet::Status {
            alive,
            version,
            rooms,
        } => println!("{}: alive={} version={} rooms={}", args.server, alive, version, rooms),
        other => println!("Unexpected reply: {:?}", other),
    }

    for _ in 0..args.count {
        let sent = get_timestamp();
        match request(&socket, args.server, &Packet::Ping { sent }).await? {
            Packet::Pong { echoed } => {
                println!("pong: {} ms", get_timestamp().saturating_sub(echoed))
            }
            other => println!("Unexpected reply: {:?}", other),
        }
    }

    Ok(())
}
