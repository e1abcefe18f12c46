use std::collections::HashMap;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;
use shared::models::*;
use crate::store::{PollStore, StoreError, VoteChanges, VoteFilter, VoteStore};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const VOTE_COLUMNS: &str = "id, poll_id, option_id, vote_visibility, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PollRow {
    id: Uuid,
    title: String,
    creator: String,
    vote_quantity: i64,
    created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: Uuid,
    poll_id: Uuid,
    content: String,
    vote_quantity: i64,
}

fn database(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// A vote write that points at a poll or option deleted in the meantime
/// fails the foreign key check.
fn write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => StoreError::NotFound,
        _ => database(e),
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn assemble(rows: Vec<PollRow>, options: Vec<OptionRow>) -> Vec<Poll> {
    let mut by_poll: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
    for option in options {
        by_poll.entry(option.poll_id).or_default().push(PollOption {
            id: option.id,
            content: option.content,
            vote_quantity: option.vote_quantity,
        });
    }

    rows.into_iter()
        .map(|row| Poll {
            options: by_poll.remove(&row.id).unwrap_or_default(),
            id: row.id,
            title: row.title,
            vote_quantity: row.vote_quantity,
            creator: row.creator,
            created_at: row.created_at,
        })
        .collect()
}

fn push_vote_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &VoteFilter) {
    builder.push(" WHERE TRUE");
    if let Some(vote_id) = filter.vote_id {
        builder.push(" AND id = ").push_bind(vote_id);
    }
    if let Some(ids) = &filter.ids {
        builder.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(poll_id) = filter.poll_id {
        builder.push(" AND poll_id = ").push_bind(poll_id);
    }
    if let Some(visibility) = filter.visibility {
        builder.push(" AND vote_visibility = ").push_bind(visibility);
    }
    if let Some(voter_key) = &filter.voter_key {
        builder.push(" AND voter_key = ").push_bind(voter_key.clone());
    }
}

/// PostgreSQL backed poll and vote storage. The pool is handed in by the
/// caller and released through [`PgStore::close`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn load_polls(&self, rows: Vec<PollRow>) -> Result<Vec<Poll>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let options = sqlx::query_as::<_, OptionRow>(
            "SELECT id, poll_id, content, vote_quantity FROM poll_options
             WHERE poll_id = ANY($1) ORDER BY poll_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        Ok(assemble(rows, options))
    }

    /// Recomputes option counters from the vote table and poll aggregates
    /// from their options, returning the number of counters rewritten.
    pub async fn reconcile_tallies(&self) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(database)?;

        let options = sqlx::query(
            "UPDATE poll_options o SET vote_quantity = c.actual
             FROM (
                 SELECT o2.id, COUNT(v.id) AS actual
                 FROM poll_options o2
                 LEFT JOIN votes v ON v.poll_id = o2.poll_id AND v.option_id = o2.id
                 GROUP BY o2.id
             ) c
             WHERE o.id = c.id AND o.vote_quantity <> c.actual",
        )
        .execute(&mut *tx)
        .await
        .map_err(database)?;

        let polls = sqlx::query(
            "UPDATE polls p SET vote_quantity = s.total
             FROM (
                 SELECT poll_id, COALESCE(SUM(vote_quantity), 0)::BIGINT AS total
                 FROM poll_options GROUP BY poll_id
             ) s
             WHERE p.id = s.poll_id AND p.vote_quantity <> s.total",
        )
        .execute(&mut *tx)
        .await
        .map_err(database)?;

        tx.commit().await.map_err(database)?;
        Ok(options.rows_affected() + polls.rows_affected())
    }
}

#[rocket::async_trait]
impl PollStore for PgStore {
    async fn create_poll(&self, poll: &Poll) -> Result<Poll, StoreError> {
        let mut tx = self.pool.begin().await.map_err(database)?;

        sqlx::query(
            "INSERT INTO polls (id, title, creator, vote_quantity, created_at)
             VALUES ($1, $2, $3, 0, $4)",
        )
        .bind(poll.id)
        .bind(&poll.title)
        .bind(&poll.creator)
        .bind(poll.created_at)
        .execute(&mut *tx)
        .await
        .map_err(database)?;

        for (position, option) in poll.options.iter().enumerate() {
            sqlx::query(
                "INSERT INTO poll_options (id, poll_id, position, content, vote_quantity)
                 VALUES ($1, $2, $3, $4, 0)",
            )
            .bind(option.id)
            .bind(poll.id)
            .bind(position as i32)
            .bind(&option.content)
            .execute(&mut *tx)
            .await
            .map_err(database)?;
        }

        tx.commit().await.map_err(database)?;
        self.find_poll(poll.id).await
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Poll, StoreError> {
        let row = sqlx::query_as::<_, PollRow>(
            "SELECT id, title, creator, vote_quantity, created_at FROM polls WHERE id = $1",
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?
        .ok_or(StoreError::NotFound)?;

        self.load_polls(vec![row]).await?.pop().ok_or(StoreError::NotFound)
    }

    async fn find_poll_with_option(&self, poll_id: Uuid, option_id: Uuid) -> Result<Poll, StoreError> {
        let row = sqlx::query_as::<_, PollRow>(
            "SELECT p.id, p.title, p.creator, p.vote_quantity, p.created_at
             FROM polls p JOIN poll_options o ON o.poll_id = p.id
             WHERE p.id = $1 AND o.id = $2",
        )
        .bind(poll_id)
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?
        .ok_or(StoreError::NotFound)?;

        self.load_polls(vec![row]).await?.pop().ok_or(StoreError::NotFound)
    }

    async fn find_polls(&self, ids: &[Uuid]) -> Result<Vec<Poll>, StoreError> {
        let rows = sqlx::query_as::<_, PollRow>(
            "SELECT id, title, creator, vote_quantity, created_at FROM polls
             WHERE id = ANY($1) ORDER BY created_at DESC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        self.load_polls(rows).await
    }

    async fn count_polls(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM polls")
            .fetch_one(&self.pool)
            .await
            .map_err(database)?;
        Ok(count.max(0) as u64)
    }

    async fn list_polls(&self, offset: u64, limit: u64) -> Result<Vec<Poll>, StoreError> {
        let rows = sqlx::query_as::<_, PollRow>(
            "SELECT id, title, creator, vote_quantity, created_at FROM polls
             ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        self.load_polls(rows).await
    }

    async fn delete_poll(&self, poll_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(poll_id)
            .execute(&self.pool)
            .await
            .map_err(database)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn increment_tally(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> Result<Poll, StoreError> {
        // Both counters move in one statement.
        let bumped: Option<Uuid> = sqlx::query_scalar(
            "WITH bumped AS (
                 UPDATE poll_options SET vote_quantity = vote_quantity + $3
                 WHERE poll_id = $1 AND id = $2
                 RETURNING poll_id
             )
             UPDATE polls SET vote_quantity = vote_quantity + $3
             WHERE id = (SELECT poll_id FROM bumped)
             RETURNING id",
        )
        .bind(poll_id)
        .bind(option_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        match bumped {
            Some(_) => self.find_poll(poll_id).await,
            None => Err(StoreError::NotFound),
        }
    }
}

#[rocket::async_trait]
impl VoteStore for PgStore {
    async fn find_vote_for(&self, voter_key: &str, poll_id: Uuid) -> Result<Option<Vote>, StoreError> {
        sqlx::query_as::<_, Vote>(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE voter_key = $1 AND poll_id = $2"
        ))
        .bind(voter_key)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)
    }

    async fn create_vote(
        &self,
        voter_key: &str,
        poll_id: Uuid,
        option_id: Uuid,
        visibility: VoteVisibility,
    ) -> Result<Vote, StoreError> {
        sqlx::query_as::<_, Vote>(&format!(
            "INSERT INTO votes (id, voter_key, poll_id, option_id, vote_visibility)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT unique_voter_per_poll DO NOTHING
             RETURNING {VOTE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(voter_key)
        .bind(poll_id)
        .bind(option_id)
        .bind(visibility)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?
        .ok_or(StoreError::DuplicateVote)
    }

    async fn update_vote(&self, voter_key: &str, poll_id: Uuid, changes: VoteChanges) -> Result<Vote, StoreError> {
        sqlx::query_as::<_, Vote>(&format!(
            "UPDATE votes
             SET option_id = COALESCE($3, option_id),
                 vote_visibility = COALESCE($4, vote_visibility),
                 updated_at = NOW()
             WHERE voter_key = $1 AND poll_id = $2
               AND ($5::UUID IS NULL OR option_id = $5)
             RETURNING {VOTE_COLUMNS}"
        ))
        .bind(voter_key)
        .bind(poll_id)
        .bind(changes.option_id)
        .bind(changes.vote_visibility)
        .bind(changes.expected_option_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_vote(&self, voter_key: &str, poll_id: Uuid) -> Result<Vote, StoreError> {
        sqlx::query_as::<_, Vote>(&format!(
            "DELETE FROM votes WHERE voter_key = $1 AND poll_id = $2 RETURNING {VOTE_COLUMNS}"
        ))
        .bind(voter_key)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?
        .ok_or(StoreError::NotFound)
    }

    async fn find_vote(&self, filter: &VoteFilter) -> Result<Vote, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {VOTE_COLUMNS} FROM votes"));
        push_vote_filter(&mut builder, filter);
        builder.push(" LIMIT 1");

        builder.build_query_as::<Vote>()
            .fetch_optional(&self.pool)
            .await
            .map_err(database)?
            .ok_or(StoreError::NotFound)
    }

    async fn count_votes(&self, filter: &VoteFilter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM votes");
        push_vote_filter(&mut builder, filter);

        let count: i64 = builder.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(database)?;
        Ok(count.max(0) as u64)
    }

    async fn list_votes(&self, filter: &VoteFilter, offset: u64, limit: u64) -> Result<Vec<Vote>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {VOTE_COLUMNS} FROM votes"));
        push_vote_filter(&mut builder, filter);
        builder.push(" ORDER BY updated_at DESC OFFSET ")
            .push_bind(to_i64(offset))
            .push(" LIMIT ")
            .push_bind(to_i64(limit));

        builder.build_query_as::<Vote>()
            .fetch_all(&self.pool)
            .await
            .map_err(database)
    }
}
