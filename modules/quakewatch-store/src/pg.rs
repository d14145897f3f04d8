//! Postgres-backed `DisasterStore`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use quakewatch_common::{Event, QuakeError, QuakeResult, Row};

use crate::guard::{Catalog, ReadOnlyQuery};
use crate::traits::DisasterStore;

const DISASTER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS disaster (
    id                BIGSERIAL        PRIMARY KEY,
    event_date        TEXT             NOT NULL,
    event_time        TIME             NOT NULL,
    coordinates       TEXT             NOT NULL,
    magnitude         DOUBLE PRECISION NOT NULL,
    depth             DOUBLE PRECISION NOT NULL,
    area              TEXT             NOT NULL,
    tsunami_potential TEXT             NOT NULL,
    reported_by       INT              NOT NULL,
    UNIQUE (event_date, event_time, coordinates)
)
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout_ms: 5_000,
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> QuakeResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(store_error)?;
        Ok(Self::new(pool))
    }

    /// Upper bound applied to every guarded read-only query.
    pub fn with_statement_timeout(mut self, millis: u64) -> Self {
        self.statement_timeout_ms = millis.max(1);
        self
    }

    /// Create the `disaster` table when it does not exist yet.
    pub async fn migrate(&self) -> QuakeResult<()> {
        sqlx::query(DISASTER_DDL)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DisasterStore for PgStore {
    async fn upsert_event(&self, event: &Event) -> QuakeResult<Event> {
        let clock: NaiveTime = event.clock_time();
        let tsunami = if event.tsunami_potential { "Yes" } else { "No" };

        let (reported_by,) = sqlx::query_as::<_, (i32,)>(
            r#"
            INSERT INTO disaster (event_date, event_time, coordinates, magnitude, depth, area, tsunami_potential, reported_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (event_date, event_time, coordinates) DO UPDATE SET
                magnitude = EXCLUDED.magnitude,
                depth = EXCLUDED.depth,
                area = EXCLUDED.area,
                tsunami_potential = EXCLUDED.tsunami_potential
            RETURNING reported_by
            "#,
        )
        .bind(&event.event_date)
        .bind(clock)
        .bind(&event.coordinates)
        .bind(event.magnitude)
        .bind(event.depth_km)
        .bind(&event.area)
        .bind(tsunami)
        .bind(event.reported_by)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        debug!(fingerprint = %event.fingerprint(), reported_by, "Upserted event");

        Ok(Event {
            reported_by,
            ..event.clone()
        })
    }

    async fn catalog(&self) -> QuakeResult<Catalog> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT table_name::text, column_name::text
            FROM information_schema.columns
            WHERE table_schema = 'public'
            ORDER BY table_name, ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut catalog = Catalog::new();
        for (table, column) in rows {
            catalog.insert_column(&table, column);
        }
        Ok(catalog)
    }

    async fn query_readonly(&self, query: &ReadOnlyQuery) -> QuakeResult<Vec<Row>> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        let timeout = format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms);
        sqlx::query(&timeout)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        let wrapped = format!("SELECT to_jsonb(q) FROM ({}) AS q", query.sql());
        let values = sqlx::query_as::<_, (serde_json::Value,)>(&wrapped)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                if statement_timed_out(&e) {
                    QuakeError::timeout(
                        "read-only query",
                        Duration::from_millis(self.statement_timeout_ms),
                    )
                } else {
                    store_error(e)
                }
            })?;

        tx.rollback().await.map_err(store_error)?;

        Ok(values
            .into_iter()
            .filter_map(|(value,)| match value {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}

fn statement_timed_out(err: &sqlx::Error) -> bool {
    // 57014: query_canceled
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("57014"))
}

fn store_error(err: sqlx::Error) -> QuakeError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => QuakeError::StoreUnavailable(err.to_string()),
        other => QuakeError::Store(other.to_string()),
    }
}
