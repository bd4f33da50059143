//! Match generation: round-robin completeness across games, priority
//! assignment by game order, admin re-run triggers, and incremental
//! scheduling for late joiners (spec §8 scenarios A, B, G and universal
//! invariant 4 "round-robin completeness").

use app_core::domain::{CreateTournamentRequest, MatchPriority};
use chrono::Utc;
use integration_testing::harness::Harness;
use std::collections::HashMap;

fn create_req() -> CreateTournamentRequest {
    CreateTournamentRequest { max_participants: None, max_team_size: 1, creator: None, metadata: HashMap::new() }
}

#[tokio::test]
async fn start_assigns_priority_by_lexicographic_game_order() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();

    // Seeded out of lexicographic order; Start must still assign high/medium/low
    // by sorted short_name, not insertion order.
    let zebra = h.seed_game("zebra");
    let ant = h.seed_game("ant");
    let mole = h.seed_game("mole");
    for game in [&zebra, &ant, &mole] {
        let p1 = h.seed_team_program(tid, game.id);
        let p2 = h.seed_team_program(tid, game.id);
        h.service.join_tournament(tid, p1).await.unwrap();
        h.service.join_tournament(tid, p2).await.unwrap();
    }

    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let matches = h.repository.get_matches_by_tournament(tid).await.unwrap();
    let priority_of = |game_id| matches.iter().find(|m| m.game_id == game_id).unwrap().priority;
    assert_eq!(priority_of(ant.id), MatchPriority::High);
    assert_eq!(priority_of(mole.id), MatchPriority::Medium);
    assert_eq!(priority_of(zebra.id), MatchPriority::Low);
}

#[tokio::test]
async fn round_robin_covers_every_ordered_pair_exactly_once() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let programs: Vec<_> = (0..4).map(|_| h.seed_team_program(tid, game.id)).collect();
    for &p in &programs {
        h.service.join_tournament(tid, p).await.unwrap();
    }

    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let matches = h.repository.get_matches_by_tournament(tid).await.unwrap();
    // 4 participants, directed round-robin -> 4*3 = 12 matches: both (a,b)
    // and (b,a) for every distinct pair.
    assert_eq!(matches.len(), 12);
    let mut seen = std::collections::HashSet::new();
    for m in &matches {
        let pair = (m.program1_id, m.program2_id);
        assert!(seen.insert(pair), "ordered pair {pair:?} scheduled more than once");
    }
    for &a in &programs {
        for &b in &programs {
            if a != b {
                assert!(seen.contains(&(a, b)), "missing ordered match ({a}, {b})");
            }
        }
    }
}

#[tokio::test]
async fn run_all_matches_regenerates_a_round_once_the_prior_one_is_empty() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    // The queue is cleared but the match rows themselves (both directions
    // of the one pair, still `pending`) are untouched -- run_all_matches
    // must re-enqueue those rather than generate a duplicate round.
    h.queue.clear().await.unwrap();
    let n = h.service.run_all_matches(tid, Utc::now()).await.unwrap();
    assert_eq!(n, 2);
    assert_eq!(h.repository.get_matches_by_tournament(tid).await.unwrap().len(), 2);
}

#[tokio::test]
async fn run_game_matches_generates_a_fresh_round_once_all_matches_are_settled() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let first_round = h.repository.get_matches_by_tournament(tid).await.unwrap();
    // Directed round-robin over 2 participants -> both (p1,p2) and (p2,p1).
    assert_eq!(first_round.len(), 2);

    // No pending matches remain once both have been settled (imagine a
    // worker just finished them), so a second run generates round 2.
    for m in &first_round {
        h.repository.finish_match_for_test(m.id);
    }

    let n = h.service.run_game_matches(tid, game.id, Utc::now()).await.unwrap();
    assert_eq!(n, 2);
    let matches = h.repository.get_matches_by_tournament(tid).await.unwrap();
    assert_eq!(matches.len(), 4);
    assert_eq!(matches.iter().map(|m| m.round_number).max().unwrap(), 2);
}

#[tokio::test]
async fn schedule_new_program_matches_pairs_the_newcomer_against_every_existing_latest_participant() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let newcomer = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, newcomer).await.unwrap();

    let n = h.service.schedule_new_program_matches(tid, game.id, newcomer, Utc::now()).await.unwrap();
    assert_eq!(n, 2);

    let matches = h.repository.get_matches_by_tournament(tid).await.unwrap();
    let newcomer_matches: Vec<_> =
        matches.iter().filter(|m| m.program1_id == newcomer || m.program2_id == newcomer).collect();
    assert_eq!(newcomer_matches.len(), 2);
    for m in &newcomer_matches {
        assert_eq!(m.priority, MatchPriority::High);
    }
}

#[tokio::test]
async fn schedule_new_program_matches_excludes_only_the_uploaders_own_team() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");

    // Team X = {X1, X2}, team Y = {Y1, Y2}, team Z = {Z1}.
    let team_x = app_core::domain::Team {
        id: uuid::Uuid::new_v4(),
        tournament_id: tid,
        join_code: "X".to_string(),
        leader_user_id: uuid::Uuid::new_v4(),
    };
    h.repository.seed_team(team_x.clone());
    let make_program = |team_id: uuid::Uuid| app_core::domain::Program {
        id: uuid::Uuid::new_v4(),
        team_id,
        game_id: game.id,
        tournament_id: Some(tid),
        version: 1,
        file_path: format!("/bots/{team_id}"),
    };
    let x1 = make_program(team_x.id);
    let x2 = make_program(team_x.id);
    h.repository.seed_program(x1.clone());
    h.repository.seed_program(x2.clone());

    let y1 = h.seed_team_program(tid, game.id);
    let y2 = h.seed_team_program(tid, game.id);
    let z1 = h.seed_team_program(tid, game.id);

    for p in [x1.id, x2.id, y1, y2, z1] {
        h.service.join_tournament(tid, p).await.unwrap();
    }
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    // New upload from team X: X'.
    let x_prime = make_program(team_x.id);
    h.repository.seed_program(x_prime.clone());
    h.service.join_tournament(tid, x_prime.id).await.unwrap();

    let n = h.service.schedule_new_program_matches(tid, game.id, x_prime.id, Utc::now()).await.unwrap();
    assert_eq!(n, 3, "X' must face every non-X program (Y1, Y2, Z1), not X1/X2");

    let matches = h.repository.get_matches_by_tournament(tid).await.unwrap();
    let opponents: std::collections::HashSet<_> = matches
        .iter()
        .filter(|m| m.program1_id == x_prime.id || m.program2_id == x_prime.id)
        .map(|m| if m.program1_id == x_prime.id { m.program2_id } else { m.program1_id })
        .collect();
    assert_eq!(opponents, std::collections::HashSet::from([y1, y2, z1]));
}

#[tokio::test]
async fn retry_failed_matches_resets_and_re_enqueues() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let m = h.repository.get_matches_by_tournament(tid).await.unwrap().remove(0);
    h.repository.fail_match_for_test(m.id);
    h.queue.clear().await.unwrap();

    let reset = h.service.retry_failed_matches(tid).await.unwrap();
    assert_eq!(reset, 1);
    assert_eq!(h.queue.size().await.unwrap().total(), 1);
    let refetched = h.repository.get_match(m.id).await.unwrap().unwrap();
    assert_eq!(refetched.status, app_core::domain::MatchStatus::Pending);
}
