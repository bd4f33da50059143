// @generated by hand to match migrations/2026-07-28-000000_init

diesel::table! {
    games (id) {
        id -> Uuid,
        short_name -> Text,
        display_name -> Text,
        rules_text -> Text,
    }
}

diesel::table! {
    tournaments (id) {
        id -> Uuid,
        version -> Int8,
        code -> Text,
        status -> Text,
        max_participants -> Nullable<Int4>,
        max_team_size -> Int4,
        start_time -> Nullable<Timestamptz>,
        end_time -> Nullable<Timestamptz>,
        creator -> Nullable<Uuid>,
        metadata -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tournament_games (tournament_id, game_id) {
        tournament_id -> Uuid,
        game_id -> Uuid,
        is_active -> Bool,
        current_round -> Int4,
        round_completed -> Bool,
    }
}

diesel::table! {
    teams (id) {
        id -> Uuid,
        tournament_id -> Uuid,
        join_code -> Text,
        leader_user_id -> Uuid,
    }
}

diesel::table! {
    team_members (team_id, user_id) {
        team_id -> Uuid,
        user_id -> Uuid,
    }
}

diesel::table! {
    programs (id) {
        id -> Uuid,
        team_id -> Uuid,
        game_id -> Uuid,
        tournament_id -> Nullable<Uuid>,
        version -> Int4,
        file_path -> Text,
    }
}

diesel::table! {
    tournament_participants (tournament_id, program_id) {
        tournament_id -> Uuid,
        program_id -> Uuid,
        rating -> Int4,
        wins -> Int4,
        losses -> Int4,
        draws -> Int4,
    }
}

diesel::table! {
    matches (id) {
        id -> Uuid,
        tournament_id -> Uuid,
        game_id -> Uuid,
        program1_id -> Uuid,
        program2_id -> Uuid,
        status -> Text,
        priority -> Text,
        round_number -> Int4,
        score1 -> Nullable<Int4>,
        score2 -> Nullable<Int4>,
        winner -> Nullable<Int2>,
        error_code -> Nullable<Int4>,
        error_message -> Nullable<Text>,
        started_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    rating_history (program_id, match_id) {
        program_id -> Uuid,
        match_id -> Uuid,
        old_rating -> Int4,
        new_rating -> Int4,
        delta -> Int4,
        recorded_at -> Timestamptz,
    }
}

diesel::table! {
    priority_queue (match_id) {
        match_id -> Uuid,
        priority -> Text,
        enqueued_at -> Timestamptz,
    }
}

diesel::joinable!(tournament_games -> tournaments (tournament_id));
diesel::joinable!(tournament_games -> games (game_id));
diesel::joinable!(teams -> tournaments (tournament_id));
diesel::joinable!(team_members -> teams (team_id));
diesel::joinable!(programs -> teams (team_id));
diesel::joinable!(programs -> games (game_id));
diesel::joinable!(matches -> tournaments (tournament_id));
diesel::joinable!(matches -> games (game_id));
diesel::joinable!(tournament_participants -> programs (program_id));

diesel::allow_tables_to_appear_in_same_query!(
    games,
    matches,
    priority_queue,
    programs,
    rating_history,
    team_members,
    teams,
    tournament_games,
    tournament_participants,
    tournaments,
);
