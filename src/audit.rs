//! Financial audit trail
//!
//! Audit rows are written after the financial transaction commits. A failed
//! audit write is logged and dropped; it never rolls back or fails the money
//! movement it describes.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::LedgerError;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: &'static str,
    pub actor_id: Option<Uuid>,
    /// What kind of row the action touched ("withdrawal_request", ...)
    pub subject_type: &'static str,
    pub subject_id: Uuid,
    pub changes: Value,
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub subject_type: String,
    pub subject_id: Uuid,
    pub changes: Value,
    pub created_at: DateTime<Utc>,
}

pub struct AuditLog {
    pool: PgPool,
}

impl AuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Best-effort insert; errors are logged, never returned.
    pub async fn record(&self, entry: AuditEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO financial_audit_logs
                (id, action, actor_id, subject_type, subject_id, changes, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(entry.action)
        .bind(entry.actor_id)
        .bind(entry.subject_type)
        .bind(entry.subject_id)
        .bind(&entry.changes)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!(
                action = entry.action,
                subject_id = %entry.subject_id,
                error = %e,
                "Failed to write audit log"
            );
        }
    }

    /// Audit history for one subject, newest first
    pub async fn for_subject(
        &self,
        subject_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, action, actor_id, subject_type, subject_id, changes, created_at
            FROM financial_audit_logs
            WHERE subject_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(subject_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AuditRecord {
                id: row.get("id"),
                action: row.get("action"),
                actor_id: row.get("actor_id"),
                subject_type: row.get("subject_type"),
                subject_id: row.get("subject_id"),
                changes: row.get("changes"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
