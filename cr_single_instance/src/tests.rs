use super::CrSingleInstance;
use app_core::ports::{Broadcaster, MessageType};
use futures_util::StreamExt;
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

#[tokio::test]
async fn subscriber_receives_broadcast_for_its_tournament() {
    let reg = CrSingleInstance::new();
    let tournament_id = Uuid::new_v4();
    let mut stream = reg.subscribe(tournament_id).await;

    reg.broadcast(tournament_id, MessageType::TournamentUpdate, json!({"status": "active"})).await;

    let envelope = timeout(Duration::from_secs(1), stream.next()).await.unwrap().unwrap();
    assert_eq!(envelope.tournament_id, tournament_id);
    assert_eq!(envelope.message_type, MessageType::TournamentUpdate);
}

#[tokio::test]
async fn broadcast_is_scoped_to_its_tournament() {
    let reg = CrSingleInstance::new();
    let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
    let mut stream1 = reg.subscribe(t1).await;

    reg.broadcast(t2, MessageType::MatchCompleted, json!({})).await;

    let result = timeout(Duration::from_millis(100), stream1.next()).await;
    assert!(result.is_err(), "subscriber to t1 must not see a broadcast for t2");
}

#[tokio::test]
async fn broadcast_with_no_subscribers_does_not_panic() {
    let reg = CrSingleInstance::new();
    reg.broadcast(Uuid::new_v4(), MessageType::LeaderboardUpdate, json!({})).await;
}

#[tokio::test]
async fn multiple_subscribers_all_receive_the_same_broadcast() {
    let reg = CrSingleInstance::new();
    let tournament_id = Uuid::new_v4();
    let mut s1 = reg.subscribe(tournament_id).await;
    let mut s2 = reg.subscribe(tournament_id).await;

    reg.broadcast(tournament_id, MessageType::MatchesCreated, json!({"count": 4})).await;

    let e1 = timeout(Duration::from_secs(1), s1.next()).await.unwrap().unwrap();
    let e2 = timeout(Duration::from_secs(1), s2.next()).await.unwrap().unwrap();
    assert_eq!(e1.message_type, e2.message_type);
}
