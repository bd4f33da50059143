//! Broadcaster port (spec §4.6): fan-out pub/sub keyed by tournament id.
//! Non-blocking — slow subscribers are dropped, never back-pressuring the
//! domain path.

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use uuid::Uuid;

pub type NoticeStream = Pin<Box<dyn Stream<Item = Envelope> + Send + 'static>>;

/// Message types emitted by the core (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TournamentUpdate,
    MatchesCreated,
    LeaderboardUpdate,
    MatchCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub tournament_id: Uuid,
    pub message_type: MessageType,
    pub payload: Value,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Subscribe to all envelopes for `tournament_id`; dropping the
    /// returned stream ends the subscription.
    async fn subscribe(&self, tournament_id: Uuid) -> NoticeStream;

    /// Best-effort fan-out; never fails from the caller's perspective —
    /// errors are swallowed inside the implementation (spec §7).
    async fn broadcast(&self, tournament_id: Uuid, message_type: MessageType, payload: Value);
}
