//! Durable settlement job queue
//!
//! Task approval enqueues a job row in the same transaction that flips the
//! task status; the settlement worker later claims and executes it. A crash
//! between approval and settlement therefore loses nothing: the job row
//! survives and gets picked up on the next poll.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::LedgerError;

/// Job lifecycle states, stored as small ints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn id(&self) -> i16 {
        match self {
            JobState::Pending => 0,
            JobState::Running => 10,
            JobState::Done => 40,
            JobState::Failed => -10,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(JobState::Pending),
            10 => Some(JobState::Running),
            40 => Some(JobState::Done),
            -10 => Some(JobState::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettlementJob {
    pub id: Uuid,
    pub task_id: Uuid,
    pub auditor_id: Uuid,
    pub state: JobState,
    pub retries: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SettlementQueue {
    pool: PgPool,
}

impl SettlementQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a settlement job for an approved task.
    ///
    /// One job per task: a duplicate enqueue hits the unique task_id index
    /// and is ignored. Returns whether a new job was inserted. Callers that
    /// approve a task should run this on the same transaction via
    /// [`Self::enqueue_on`].
    pub async fn enqueue(&self, task_id: Uuid, auditor_id: Uuid) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Self::enqueue_on(&mut conn, task_id, auditor_id).await
    }

    pub async fn enqueue_on(
        conn: &mut sqlx::PgConnection,
        task_id: Uuid,
        auditor_id: Uuid,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO settlement_jobs (id, task_id, auditor_id, state, retries, created_at, updated_at)
            VALUES (gen_random_uuid(), $1, $2, $3, 0, NOW(), NOW())
            ON CONFLICT (task_id) DO NOTHING
            "#,
        )
        .bind(task_id)
        .bind(auditor_id)
        .bind(JobState::Pending.id())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically claim up to `batch_size` pending jobs and mark them Running.
    ///
    /// SKIP LOCKED lets several workers poll the same table without handing
    /// out a job twice.
    pub async fn claim_batch(&self, batch_size: i64) -> Result<Vec<SettlementJob>, LedgerError> {
        let rows = sqlx::query(
            r#"
            UPDATE settlement_jobs
            SET state = $1, updated_at = NOW()
            WHERE id IN (
                SELECT id FROM settlement_jobs
                WHERE state = $2
                ORDER BY created_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, task_id, auditor_id, state, retries, last_error, created_at, updated_at
            "#,
        )
        .bind(JobState::Running.id())
        .bind(JobState::Pending.id())
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_job).collect()
    }

    /// CAS a job from Running to Done. Returns false if someone else moved it.
    pub async fn mark_done(&self, job_id: Uuid) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE settlement_jobs SET state = $1, updated_at = NOW() WHERE id = $2 AND state = $3",
        )
        .bind(JobState::Done.id())
        .bind(job_id)
        .bind(JobState::Running.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed attempt: bump the retry count and either requeue the
    /// job or park it as Failed once `max_retries` is reached.
    pub async fn record_failure(
        &self,
        job_id: Uuid,
        error: &str,
        max_retries: i32,
    ) -> Result<JobState, LedgerError> {
        let next_state: i16 = sqlx::query_scalar(
            r#"
            UPDATE settlement_jobs
            SET retries = retries + 1,
                last_error = $2,
                state = CASE WHEN retries + 1 >= $3 THEN $4 ELSE $5 END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING state
            "#,
        )
        .bind(job_id)
        .bind(error)
        .bind(max_retries)
        .bind(JobState::Failed.id())
        .bind(JobState::Pending.id())
        .fetch_one(&self.pool)
        .await?;

        JobState::from_id(next_state)
            .ok_or_else(|| LedgerError::System(format!("unknown job state id: {next_state}")))
    }

    /// Requeue Running jobs whose worker died mid-flight.
    ///
    /// Safe because settlement itself is idempotent on task id: re-running a
    /// job whose transaction actually committed is a no-op.
    pub async fn rescue_stale(&self, stale_after_secs: i64) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE settlement_jobs
            SET state = $1, updated_at = NOW()
            WHERE state = $2 AND updated_at < NOW() - make_interval(secs => $3)
            "#,
        )
        .bind(JobState::Pending.id())
        .bind(JobState::Running.id())
        .bind(stale_after_secs as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<SettlementJob, LedgerError> {
    let state_id: i16 = row.get("state");
    let state = JobState::from_id(state_id)
        .ok_or_else(|| LedgerError::System(format!("unknown job state id: {state_id}")))?;
    Ok(SettlementJob {
        id: row.get("id"),
        task_id: row.get("task_id"),
        auditor_id: row.get("auditor_id"),
        state,
        retries: row.get("retries"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_ids_roundtrip() {
        for state in [
            JobState::Pending,
            JobState::Running,
            JobState::Done,
            JobState::Failed,
        ] {
            assert_eq!(JobState::from_id(state.id()), Some(state));
        }
        assert_eq!(JobState::from_id(99), None);
    }
}
