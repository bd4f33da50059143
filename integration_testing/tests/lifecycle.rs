//! Tournament lifecycle: create, join, start, complete, and the invariants
//! that must hold across those transitions (spec §8 scenarios C, D and
//! universal invariant 1 "status monotonicity").

use app_core::CoreError;
use app_core::domain::{CreateTournamentRequest, TournamentStatus};
use chrono::Utc;
use integration_testing::harness::Harness;
use std::collections::HashMap;

fn create_req(max_participants: Option<u32>) -> CreateTournamentRequest {
    CreateTournamentRequest { max_participants, max_team_size: 1, creator: None, metadata: HashMap::new() }
}

#[tokio::test]
async fn create_then_get_round_trips_through_the_cache() {
    let h = Harness::new();
    let created = h.service.create_tournament(create_req(None)).await.unwrap();
    assert_eq!(created.status(), TournamentStatus::Pending);
    assert_eq!(created.code().len(), 8);

    let fetched = h.service.get_tournament(created.id().unwrap()).await.unwrap();
    assert_eq!(fetched.id(), created.id());
    assert_eq!(h.tournament_cache.get_tournament(created.id().unwrap()).await.unwrap().unwrap().id(), created.id());
}

#[tokio::test]
async fn create_never_collides_on_code() {
    let h = Harness::new();
    let mut codes = std::collections::HashSet::new();
    for _ in 0..20 {
        let t = h.service.create_tournament(create_req(None)).await.unwrap();
        assert!(codes.insert(t.code().to_string()), "tournament codes must be unique");
    }
}

#[tokio::test]
async fn start_moves_pending_to_active_and_enqueues_the_round_robin() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req(None)).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    let p3 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();
    h.service.join_tournament(tid, p3).await.unwrap();

    let started = h.service.start_tournament(tid, Utc::now()).await.unwrap();
    assert_eq!(started.status(), TournamentStatus::Active);

    // 3 participants, directed round-robin in one game -> 3*2 = 6 matches, all enqueued.
    let size = h.queue.size().await.unwrap();
    assert_eq!(size.total(), 6);
}

#[tokio::test]
async fn starting_twice_is_rejected_and_never_double_schedules() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req(None)).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();

    h.service.start_tournament(tid, Utc::now()).await.unwrap();
    let err = h.service.start_tournament(tid, Utc::now()).await.unwrap_err();
    assert!(matches!(err, CoreError::TournamentStarted));

    // Still exactly the 2 matches (directed pair) from the one legitimate start.
    assert_eq!(h.queue.size().await.unwrap().total(), 2);
}

#[tokio::test]
async fn complete_requires_active_and_is_rejected_from_pending() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req(None)).await.unwrap();
    let tid = tournament.id().unwrap();

    let err = h.service.complete_tournament(tid, Utc::now()).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    h.service.start_tournament(tid, Utc::now()).await.unwrap();
    let completed = h.service.complete_tournament(tid, Utc::now()).await.unwrap();
    assert_eq!(completed.status(), TournamentStatus::Completed);
    assert!(completed.end_time().is_some());
}

#[tokio::test]
async fn join_after_start_is_rejected() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req(None)).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let err = h.service.join_tournament(tid, p2).await.unwrap_err();
    assert!(matches!(err, CoreError::TournamentStarted));
}

#[tokio::test]
async fn join_capacity_is_enforced_even_under_concurrent_attempts() {
    let h = std::sync::Arc::new(Harness::new());
    let tournament = h.service.create_tournament(create_req(Some(1))).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);

    let h1 = h.clone();
    let h2 = h.clone();
    let (r1, r2) = tokio::join!(h1.service.join_tournament(tid, p1), h2.service.join_tournament(tid, p2));

    let outcomes = [r1, r2];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let full_rejections = outcomes.iter().filter(|r| matches!(r, Err(CoreError::TournamentFull))).count();
    assert_eq!(successes, 1, "max_participants(1) must admit exactly one joiner");
    assert_eq!(full_rejections, 1);
    assert_eq!(h.repository.get_participants_count(tid).await.unwrap(), 1);
}
