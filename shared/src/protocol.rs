//! Wire protocol between the match server and its clients.
//!
//! Every datagram carries exactly one bincode-encoded [`Packet`]. State
//! broadcasts are self-contained snapshots, so losing one is harmless; the
//! lifecycle events travel inside [`Packet::Event`] with an id the client acks.

use crate::{MatchPhase, PlayerId, PlayerInput, SessionId, Team, Vec2, VisualState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode packet: {0}")]
    Decode(#[from] bincode::Error),
    #[error("input payload has no player id and the sender owns no player")]
    MissingPlayerId,
    #[error("input for player {0} has a non-finite movement vector")]
    NonFiniteMovement(PlayerId),
    #[error("input for player {0} has a non-finite shoot power")]
    NonFinitePower(PlayerId),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // client -> server
    Join {
        client_version: u32,
        room: String,
    },
    Input(InputMessage),
    /// Single-input shape kept for older clients; normalized into `InputMessage`.
    LegacyInput {
        player_id: Option<PlayerId>,
        movement: Vec2,
        action: bool,
        action_power: Option<f32>,
        timestamp: u64,
    },
    SwitchControl {
        player_id: PlayerId,
    },
    EventAck {
        id: u64,
    },
    Ping {
        sent: u64,
    },
    Leave,
    StatusRequest,

    // server -> client
    PlayerReady {
        session_id: SessionId,
        player_id: PlayerId,
        team: Team,
    },
    State(StateSnapshot),
    Event {
        id: u64,
        event: MatchEvent,
    },
    Pong {
        echoed: u64,
    },
    Status {
        alive: bool,
        version: String,
        rooms: u32,
    },
    Rejected {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, ProtocolError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Batched inputs keyed by player id: a human plus their AI teammates.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct InputMessage {
    pub inputs: BTreeMap<PlayerId, PlayerInput>,
}

impl InputMessage {
    pub fn single(player_id: PlayerId, input: PlayerInput) -> Self {
        let mut inputs = BTreeMap::new();
        inputs.insert(player_id, input);
        Self { inputs }
    }

    /// Normalizes the legacy single-input shape. A missing id falls back to
    /// the sender's own player.
    pub fn from_legacy(
        player_id: Option<PlayerId>,
        fallback: Option<PlayerId>,
        input: PlayerInput,
    ) -> Result<Self, ProtocolError> {
        let id = player_id
            .or(fallback)
            .ok_or(ProtocolError::MissingPlayerId)?;
        Ok(Self::single(id, input))
    }

    /// Rejects entries whose movement or shoot power is NaN or infinite.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for (id, input) in &self.inputs {
            if !input.movement.x.is_finite() || !input.movement.y.is_finite() {
                return Err(ProtocolError::NonFiniteMovement(*id));
            }
            if input.action_power.is_some_and(|power| !power.is_finite()) {
                return Err(ProtocolError::NonFinitePower(*id));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    OpponentLeft,
    ConnectionLost,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum MatchEvent {
    MatchStart {
        duration: f32,
    },
    MatchEnd {
        score_blue: u32,
        score_red: u32,
        /// `None` on a draw.
        winner: Option<Team>,
    },
    GoalScored {
        team: Team,
        score_blue: u32,
        score_red: u32,
    },
    RoomClosed {
        reason: CloseReason,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub team: Team,
    pub is_human: bool,
    pub is_controlled: bool,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub state: VisualState,
    pub direction: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub possessed_by: Option<PlayerId>,
    pub pressure_level: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StateSnapshot {
    pub tick: u32,
    pub time_remaining: f32,
    pub score_blue: u32,
    pub score_red: u32,
    pub phase: MatchPhase,
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    pub ball: BallSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_snapshot() -> StateSnapshot {
        let mut players = BTreeMap::new();
        players.insert(
            1,
            PlayerSnapshot {
                team: Team::Blue,
                is_human: true,
                is_controlled: true,
                x: 123.456,
                y: 78.9,
                velocity_x: -200.0,
                velocity_y: 0.125,
                state: VisualState::Running,
                direction: std::f32::consts::PI,
            },
        );
        players.insert(
            2,
            PlayerSnapshot {
                team: Team::Red,
                is_human: false,
                is_controlled: false,
                x: 900.0,
                y: 400.0,
                velocity_x: 0.0,
                velocity_y: 0.0,
                state: VisualState::Kicking,
                direction: -1.25,
            },
        );

        StateSnapshot {
            tick: 42,
            time_remaining: 87.5,
            score_blue: 2,
            score_red: 1,
            phase: MatchPhase::Playing,
            players,
            ball: BallSnapshot {
                x: 148.0,
                y: 78.9,
                velocity_x: 0.0,
                velocity_y: 0.0,
                possessed_by: Some(1),
                pressure_level: 0.35,
            },
        }
    }

    #[test]
    fn test_state_snapshot_round_trip() {
        let snapshot = sample_snapshot();
        let bytes = Packet::State(snapshot.clone()).encode().unwrap();

        match Packet::decode(&bytes).unwrap() {
            Packet::State(decoded) => {
                assert_eq!(decoded.players.len(), 2);
                let original = &snapshot.players[&1];
                let player = &decoded.players[&1];
                assert_approx_eq!(player.x, original.x, 1e-6);
                assert_approx_eq!(player.y, original.y, 1e-6);
                assert_approx_eq!(player.velocity_y, original.velocity_y, 1e-6);
                assert_approx_eq!(player.direction, original.direction, 1e-6);
                assert_approx_eq!(decoded.ball.pressure_level, 0.35, 1e-6);
                assert_eq!(decoded, snapshot);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_input_message_round_trip() {
        let mut message = InputMessage::single(
            7,
            PlayerInput {
                movement: Vec2::new(0.6, 0.8),
                action: true,
                action_power: Some(1.0),
                timestamp: 99,
            },
        );
        message.inputs.insert(8, PlayerInput::idle(99));

        let bytes = Packet::Input(message.clone()).encode().unwrap();
        match Packet::decode(&bytes).unwrap() {
            Packet::Input(decoded) => assert_eq!(decoded, message),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_legacy_input_uses_explicit_id() {
        let message = InputMessage::from_legacy(Some(5), Some(1), PlayerInput::idle(3)).unwrap();
        assert!(message.inputs.contains_key(&5));
        assert_eq!(message.inputs.len(), 1);
    }

    #[test]
    fn test_legacy_input_falls_back_to_own_player() {
        let message = InputMessage::from_legacy(None, Some(1), PlayerInput::idle(3)).unwrap();
        assert!(message.inputs.contains_key(&1));
    }

    #[test]
    fn test_legacy_input_without_any_id_is_rejected() {
        let result = InputMessage::from_legacy(None, None, PlayerInput::idle(3));
        assert!(matches!(result, Err(ProtocolError::MissingPlayerId)));
    }

    #[test]
    fn test_validate_rejects_nan_movement() {
        let mut input = PlayerInput::idle(0);
        input.movement = Vec2::new(f32::NAN, 0.0);
        let message = InputMessage::single(4, input);
        assert!(matches!(
            message.validate(),
            Err(ProtocolError::NonFiniteMovement(4))
        ));
    }

    #[test]
    fn test_validate_rejects_nan_power() {
        let mut input = PlayerInput::idle(0);
        input.action = true;
        input.action_power = Some(f32::NAN);
        let message = InputMessage::single(2, input);
        assert!(matches!(
            message.validate(),
            Err(ProtocolError::NonFinitePower(2))
        ));

        let mut input = PlayerInput::idle(0);
        input.action_power = Some(f32::INFINITY);
        assert!(InputMessage::single(2, input).validate().is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Packet::decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]).is_err());
        assert!(Packet::decode(&[]).is_err());
    }

    #[test]
    fn test_event_packet_round_trip() {
        let packet = Packet::Event {
            id: 3,
            event: MatchEvent::MatchEnd {
                score_blue: 1,
                score_red: 1,
                winner: None,
            },
        };
        let bytes = packet.encode().unwrap();
        match Packet::decode(&bytes).unwrap() {
            Packet::Event { id, event } => {
                assert_eq!(id, 3);
                assert_eq!(
                    event,
                    MatchEvent::MatchEnd {
                        score_blue: 1,
                        score_red: 1,
                        winner: None
                    }
                );
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
