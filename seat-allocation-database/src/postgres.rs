use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use seat_allocation_optimizer::{Allocation, Snapshot, Submission};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::models::{snapshot_of, NewStudent, StudentRecord, StudentRow};
use crate::schema::students;
use crate::SubmissionStore;

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

pub fn get_database_connection(
    database_url: &str,
) -> Result<Pool<AsyncPgConnection>, DatabaseError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}

const CREATE_STUDENTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS students (
    identity TEXT PRIMARY KEY,
    score BIGINT NOT NULL CHECK (score >= 0),
    preferences TEXT[] NOT NULL,
    admitted TEXT,
    submitted_at BIGINT NOT NULL
)";

/// Stores submissions in the `students` table of a PostgreSQL database.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<AsyncPgConnection>,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: Pool<AsyncPgConnection>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let store = Self::new(get_database_connection(database_url)?);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        let mut connection = self.pool.get().await?;
        diesel::sql_query(CREATE_STUDENTS_TABLE)
            .execute(&mut connection)
            .await?;
        info!("students table is ready");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        // a single statement, so all rows come from the same database snapshot
        let rows = students::table
            .order_by((
                students::score.desc(),
                students::submitted_at.asc(),
                students::identity.asc(),
            ))
            .select(StudentRow::as_select())
            .load(&mut connection)
            .await?;
        Ok(rows.into_iter().map(StudentRecord::from).collect())
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn put(&self, submission: Submission) -> Result<(), DatabaseError> {
        debug!(identity = %submission.identity, "storing submission");
        let mut connection = self.pool.get().await?;
        diesel::insert_into(students::table)
            .values(NewStudent::from(submission))
            .on_conflict(students::identity)
            .do_update()
            .set((
                students::score.eq(excluded(students::score)),
                students::preferences.eq(excluded(students::preferences)),
                students::submitted_at.eq(excluded(students::submitted_at)),
                students::admitted.eq(None::<String>),
            ))
            .execute(&mut connection)
            .await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, DatabaseError> {
        Ok(snapshot_of(self.load().await?))
    }

    async fn students(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
        self.load().await
    }

    async fn publish(&self, allocation: &Allocation) -> Result<(), DatabaseError> {
        let assignments: Vec<(String, i64, String)> = allocation
            .outcomes()
            .iter()
            .filter_map(|outcome| {
                outcome.placement.seat().map(|seat| {
                    (
                        outcome.identity.clone(),
                        outcome.submitted_at,
                        seat.as_str().to_owned(),
                    )
                })
            })
            .collect();
        let mut connection = self.pool.get().await?;
        connection
            .transaction::<_, DatabaseError, _>(|connection| {
                async move {
                    diesel::update(students::table)
                        .set(students::admitted.eq(None::<String>))
                        .execute(connection)
                        .await?;
                    for (identity, submitted_at, seat) in assignments {
                        // students who submitted again since the snapshot keep no seat
                        diesel::update(
                            students::table
                                .filter(students::identity.eq(identity))
                                .filter(students::submitted_at.eq(submitted_at)),
                        )
                        .set(students::admitted.eq(Some(seat)))
                        .execute(connection)
                        .await?;
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await
    }

    async fn reset(&self) -> Result<(), DatabaseError> {
        let mut connection = self.pool.get().await?;
        let deleted = diesel::delete(students::table)
            .execute(&mut connection)
            .await?;
        info!(deleted, "removed all submissions");
        Ok(())
    }
}
