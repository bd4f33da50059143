//! `TournamentRepository` implementation: tournaments, tournament_games,
//! participants and the two leaderboard read models.

use crate::{PgDb, map_db_err, schema::*};
use app_core::domain::{
    CrossGameLeaderboardEntry, Game, LatestParticipant, LeaderboardEntry, Program, Tournament,
    TournamentGame, TournamentParticipant, TournamentStatus, rank_by_rating,
};
use app_core::ports::{DbResult, TournamentFilter, TournamentRepository};
use app_core::utils::id_version::IdVersion;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    dsl::sql,
    prelude::{AsChangeset, BoolExpressionMethods, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable},
    sql_types::BigInt,
};
use diesel_async::RunQueryDsl;
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Queryable)]
struct DbTournament {
    id: Uuid,
    version: i64,
    code: String,
    status: String,
    max_participants: Option<i32>,
    max_team_size: i32,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    creator: Option<Uuid>,
    metadata: serde_json::Value,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

fn status_to_str(s: TournamentStatus) -> &'static str {
    match s {
        TournamentStatus::Pending => "pending",
        TournamentStatus::Active => "active",
        TournamentStatus::Completed => "completed",
        TournamentStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> TournamentStatus {
    match s {
        "active" => TournamentStatus::Active,
        "completed" => TournamentStatus::Completed,
        "cancelled" => TournamentStatus::Cancelled,
        _ => TournamentStatus::Pending,
    }
}

impl TryFrom<DbTournament> for Tournament {
    type Error = app_core::ports::DbError;

    fn try_from(r: DbTournament) -> Result<Self, Self::Error> {
        let metadata: HashMap<String, String> = serde_json::from_value(r.metadata)
            .map_err(|e| app_core::ports::DbError::Other(anyhow::anyhow!(e)))?;
        Ok(Tournament::from_parts(
            IdVersion::existing(r.id, r.version as u32),
            r.code,
            status_from_str(&r.status),
            r.max_participants.map(|v| v as u32),
            r.max_team_size as u32,
            r.start_time,
            r.end_time,
            r.creator,
            metadata,
        ))
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = tournaments)]
struct WriteTournament {
    code: String,
    status: String,
    max_participants: Option<i32>,
    max_team_size: i32,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    creator: Option<Uuid>,
    metadata: serde_json::Value,
}

fn to_write(t: &Tournament) -> Result<WriteTournament, app_core::ports::DbError> {
    Ok(WriteTournament {
        code: t.code().to_string(),
        status: status_to_str(t.status()).to_string(),
        max_participants: t.max_participants().map(|v| v as i32),
        max_team_size: t.max_team_size() as i32,
        start_time: t.start_time(),
        end_time: t.end_time(),
        creator: t.creator(),
        metadata: serde_json::to_value(t.metadata())
            .map_err(|e| app_core::ports::DbError::Other(anyhow::anyhow!(e)))?,
    })
}

#[async_trait]
impl TournamentRepository for PgDb {
    #[instrument(name = "db.tournament.create", skip(self, tournament))]
    async fn create_tournament(&self, tournament: &Tournament) -> DbResult<Tournament> {
        let mut conn = self.new_connection().await?;
        let w = to_write(tournament)?;
        let row = diesel::insert_into(tournaments::table)
            .values(w)
            .get_result::<DbTournament>(&mut conn)
            .await
            .map_err(map_db_err)?;
        info!(id = %row.id, "tournament_created");
        row.try_into()
    }

    #[instrument(name = "db.tournament.get", skip(self))]
    async fn get_tournament(&self, id: Uuid) -> DbResult<Option<Tournament>> {
        let mut conn = self.new_connection().await?;
        let row = tournaments::table
            .filter(tournaments::id.eq(id))
            .first::<DbTournament>(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        row.map(Tournament::try_from).transpose()
    }

    #[instrument(name = "db.tournament.update", skip(self, tournament))]
    async fn update_tournament(&self, tournament: &Tournament) -> DbResult<Tournament> {
        let mut conn = self.new_connection().await?;
        let w = to_write(tournament)?;
        let (tid, tversion) = match tournament.id_version() {
            IdVersion::Existing { id, version } => (id, version),
            IdVersion::New => {
                return Err(app_core::ports::DbError::Other(anyhow::anyhow!(
                    "update_tournament called on a tournament without an id"
                )));
            }
        };

        let res = diesel::update(
            tournaments::table.filter(tournaments::id.eq(tid).and(tournaments::version.eq(tversion as i64))),
        )
        .set((w, tournaments::version.eq(sql::<BigInt>("version + 1")), tournaments::updated_at.eq(diesel::dsl::now)))
        .get_result::<DbTournament>(&mut conn)
        .await;

        match res {
            Ok(row) => row.try_into(),
            Err(diesel::result::Error::NotFound) => {
                let exists = diesel::select(diesel::dsl::exists(tournaments::table.filter(tournaments::id.eq(tid))))
                    .get_result::<bool>(&mut conn)
                    .await
                    .map_err(map_db_err)?;
                if exists {
                    warn!("optimistic_lock_conflict");
                    Err(app_core::ports::DbError::OptimisticLockConflict)
                } else {
                    Err(app_core::ports::DbError::NotFound)
                }
            }
            Err(e) => Err(map_db_err(e)),
        }
    }

    #[instrument(name = "db.tournament.update_status", skip(self))]
    async fn update_tournament_status(&self, id: Uuid, status: TournamentStatus) -> DbResult<Tournament> {
        let mut conn = self.new_connection().await?;
        let row = diesel::update(tournaments::table.filter(tournaments::id.eq(id)))
            .set((
                tournaments::status.eq(status_to_str(status)),
                tournaments::version.eq(sql::<BigInt>("version + 1")),
                tournaments::updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<DbTournament>(&mut conn)
            .await
            .map_err(map_db_err)?;
        row.try_into()
    }

    #[instrument(name = "db.tournament.delete", skip(self))]
    async fn delete_tournament(&self, id: Uuid) -> DbResult<()> {
        let mut conn = self.new_connection().await?;
        diesel::delete(tournaments::table.filter(tournaments::id.eq(id)))
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    #[instrument(name = "db.tournament.list", skip(self, filter))]
    async fn list_tournaments(&self, filter: &TournamentFilter) -> DbResult<Vec<Tournament>> {
        let mut conn = self.new_connection().await?;
        let mut query = tournaments::table.into_boxed::<diesel::pg::Pg>();
        if let Some(status) = filter.status {
            query = query.filter(tournaments::status.eq(status_to_str(status)));
        }
        if let Some(creator) = filter.creator {
            query = query.filter(tournaments::creator.eq(creator));
        }
        let rows = query
            .order(tournaments::created_at.desc())
            .load::<DbTournament>(&mut conn)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(Tournament::try_from).collect()
    }

    #[instrument(name = "db.tournament.code_exists", skip(self))]
    async fn code_exists(&self, code: &str) -> DbResult<bool> {
        let mut conn = self.new_connection().await?;
        diesel::select(diesel::dsl::exists(tournaments::table.filter(tournaments::code.eq(code))))
            .get_result(&mut conn)
            .await
            .map_err(map_db_err)
    }

    #[instrument(name = "db.tournament.participants_count", skip(self))]
    async fn get_participants_count(&self, tournament_id: Uuid) -> DbResult<u32> {
        let mut conn = self.new_connection().await?;
        let count: i64 = tournament_participants::table
            .filter(tournament_participants::tournament_id.eq(tournament_id))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(count as u32)
    }

    #[instrument(name = "db.tournament.participants", skip(self))]
    async fn get_participants(&self, tournament_id: Uuid) -> DbResult<Vec<TournamentParticipant>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<(Uuid, Uuid, i32, i32, i32, i32)> = tournament_participants::table
            .filter(tournament_participants::tournament_id.eq(tournament_id))
            .select((
                tournament_participants::tournament_id,
                tournament_participants::program_id,
                tournament_participants::rating,
                tournament_participants::wins,
                tournament_participants::losses,
                tournament_participants::draws,
            ))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|(tournament_id, program_id, rating, wins, losses, draws)| TournamentParticipant {
                tournament_id,
                program_id,
                rating,
                wins: wins as u32,
                losses: losses as u32,
                draws: draws as u32,
            })
            .collect())
    }

    #[instrument(name = "db.tournament.participant", skip(self))]
    async fn get_participant(&self, tournament_id: Uuid, program_id: Uuid) -> DbResult<Option<TournamentParticipant>> {
        let mut conn = self.new_connection().await?;
        let row: Option<(Uuid, Uuid, i32, i32, i32, i32)> = tournament_participants::table
            .filter(
                tournament_participants::tournament_id
                    .eq(tournament_id)
                    .and(tournament_participants::program_id.eq(program_id)),
            )
            .select((
                tournament_participants::tournament_id,
                tournament_participants::program_id,
                tournament_participants::rating,
                tournament_participants::wins,
                tournament_participants::losses,
                tournament_participants::draws,
            ))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(|(tournament_id, program_id, rating, wins, losses, draws)| TournamentParticipant {
            tournament_id,
            program_id,
            rating,
            wins: wins as u32,
            losses: losses as u32,
            draws: draws as u32,
        }))
    }

    #[instrument(name = "db.tournament.add_participant", skip(self, participant))]
    async fn add_participant(&self, participant: &TournamentParticipant) -> DbResult<TournamentParticipant> {
        let mut conn = self.new_connection().await?;
        diesel::insert_into(tournament_participants::table)
            .values((
                tournament_participants::tournament_id.eq(participant.tournament_id),
                tournament_participants::program_id.eq(participant.program_id),
                tournament_participants::rating.eq(participant.rating),
                tournament_participants::wins.eq(participant.wins as i32),
                tournament_participants::losses.eq(participant.losses as i32),
                tournament_participants::draws.eq(participant.draws as i32),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(*participant)
    }

    #[instrument(name = "db.tournament.latest_participants", skip(self))]
    async fn get_latest_participants(&self, tournament_id: Uuid) -> DbResult<Vec<LatestParticipant>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<(Uuid, Uuid, Uuid, Option<Uuid>, i32, String)> = programs::table
            .filter(programs::tournament_id.eq(tournament_id))
            .order((programs::team_id.asc(), programs::game_id.asc(), programs::version.desc()))
            .distinct_on((programs::team_id, programs::game_id))
            .select((
                programs::id,
                programs::team_id,
                programs::game_id,
                programs::tournament_id,
                programs::version,
                programs::file_path,
            ))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, team_id, game_id, tournament_id, version, file_path)| LatestParticipant {
                team_id,
                game_id,
                program: Program {
                    id,
                    team_id,
                    game_id,
                    tournament_id,
                    version: version as u32,
                    file_path,
                },
            })
            .collect())
    }

    #[instrument(name = "db.tournament.latest_participants_by_game", skip(self))]
    async fn get_latest_participants_grouped_by_game(
        &self,
        tournament_id: Uuid,
    ) -> DbResult<Vec<(Game, Vec<LatestParticipant>)>> {
        let latest = self.get_latest_participants(tournament_id).await?;
        let mut conn = self.new_connection().await?;
        let mut by_game: HashMap<Uuid, Vec<LatestParticipant>> = HashMap::new();
        for lp in latest {
            by_game.entry(lp.game_id).or_default().push(lp);
        }

        let game_ids: Vec<Uuid> = by_game.keys().copied().collect();
        let game_rows: Vec<(Uuid, String, String, String)> = games::table
            .filter(games::id.eq_any(&game_ids))
            .select((games::id, games::short_name, games::display_name, games::rules_text))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;

        let mut games_by_id: HashMap<Uuid, Game> = game_rows
            .into_iter()
            .map(|(id, short_name, display_name, rules_text)| {
                (id, Game { id, short_name, display_name, rules_text })
            })
            .collect();

        let mut result: Vec<(Game, Vec<LatestParticipant>)> = by_game
            .into_iter()
            .filter_map(|(game_id, participants)| games_by_id.remove(&game_id).map(|g| (g, participants)))
            .collect();
        // sorted lexicographically by short name (spec §4.1 Start, step 1)
        result.sort_by(|a, b| a.0.short_name.cmp(&b.0.short_name));
        Ok(result)
    }

    #[instrument(name = "db.tournament.leaderboard", skip(self))]
    async fn get_leaderboard(&self, tournament_id: Uuid, limit: u32) -> DbResult<Vec<LeaderboardEntry>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<(Uuid, i32, i32, i32, i32)> = tournament_participants::table
            .filter(tournament_participants::tournament_id.eq(tournament_id))
            .select((
                tournament_participants::program_id,
                tournament_participants::rating,
                tournament_participants::wins,
                tournament_participants::losses,
                tournament_participants::draws,
            ))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;

        let tuples: Vec<(Uuid, i32, u32, u32, u32)> = rows
            .into_iter()
            .map(|(program_id, rating, wins, losses, draws)| {
                (program_id, rating, wins as u32, losses as u32, draws as u32)
            })
            .collect();
        let mut ranked = rank_by_rating(tuples, tournament_id);
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    #[instrument(name = "db.tournament.cross_game_leaderboard", skip(self))]
    async fn get_cross_game_leaderboard(&self, tournament_id: Uuid) -> DbResult<Vec<CrossGameLeaderboardEntry>> {
        let mut conn = self.new_connection().await?;

        let rows: Vec<(Uuid, Uuid, Uuid, i32, i32, i32, i32)> = tournament_participants::table
            .inner_join(programs::table.on(programs::id.eq(tournament_participants::program_id)))
            .filter(tournament_participants::tournament_id.eq(tournament_id))
            .select((
                programs::team_id,
                programs::game_id,
                tournament_participants::program_id,
                tournament_participants::rating,
                tournament_participants::wins,
                tournament_participants::losses,
                tournament_participants::draws,
            ))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;

        use app_core::domain::GameSubEntry;
        let mut by_team: HashMap<Uuid, (i64, Vec<GameSubEntry>)> = HashMap::new();
        for (team_id, game_id, _program_id, rating, wins, losses, draws) in rows {
            let entry = by_team.entry(team_id).or_insert((0, Vec::new()));
            entry.0 += rating as i64;
            entry.1.push(GameSubEntry {
                game_id,
                rating,
                wins: wins as u32,
                losses: losses as u32,
                draws: draws as u32,
            });
        }

        let mut ranked: Vec<(Uuid, i64, Vec<GameSubEntry>)> =
            by_team.into_iter().map(|(team_id, (total, per_game))| (team_id, total, per_game)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(idx, (team_id, total_rating, per_game))| CrossGameLeaderboardEntry {
                rank: idx as u32 + 1,
                tournament_id,
                team_id,
                total_rating,
                per_game,
            })
            .collect())
    }

    #[instrument(name = "db.tournament.games", skip(self))]
    async fn get_tournament_games(&self, tournament_id: Uuid) -> DbResult<Vec<TournamentGame>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<(Uuid, Uuid, bool, i32, bool)> = tournament_games::table
            .filter(tournament_games::tournament_id.eq(tournament_id))
            .select((
                tournament_games::tournament_id,
                tournament_games::game_id,
                tournament_games::is_active,
                tournament_games::current_round,
                tournament_games::round_completed,
            ))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|(tournament_id, game_id, is_active, current_round, round_completed)| TournamentGame {
                tournament_id,
                game_id,
                is_active,
                current_round: current_round as u32,
                round_completed,
            })
            .collect())
    }

    #[instrument(name = "db.tournament.upsert_game", skip(self, tg))]
    async fn upsert_tournament_game(&self, tg: &TournamentGame) -> DbResult<TournamentGame> {
        let mut conn = self.new_connection().await?;
        diesel::insert_into(tournament_games::table)
            .values((
                tournament_games::tournament_id.eq(tg.tournament_id),
                tournament_games::game_id.eq(tg.game_id),
                tournament_games::is_active.eq(tg.is_active),
                tournament_games::current_round.eq(tg.current_round as i32),
                tournament_games::round_completed.eq(tg.round_completed),
            ))
            .on_conflict((tournament_games::tournament_id, tournament_games::game_id))
            .do_update()
            .set((
                tournament_games::is_active.eq(tg.is_active),
                tournament_games::current_round.eq(tg.current_round as i32),
                tournament_games::round_completed.eq(tg.round_completed),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(*tg)
    }
}
