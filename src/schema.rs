//! Postgres schema bootstrap
//!
//! All statements are idempotent; `init_schema` runs at service startup and
//! in test setup.

use sqlx::PgPool;

pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing ledger schema");

    for (name, ddl) in [
        ("credit_accounts", CREATE_CREDIT_ACCOUNTS),
        ("credit_transactions", CREATE_CREDIT_TRANSACTIONS),
        ("account_permissions", CREATE_ACCOUNT_PERMISSIONS),
        ("campaigns", CREATE_CAMPAIGNS),
        ("tasks", CREATE_TASKS),
        ("creators", CREATE_CREATORS),
        ("provider_staff", CREATE_PROVIDER_STAFF),
        ("merchant_staff", CREATE_MERCHANT_STAFF),
        ("settlement_jobs", CREATE_SETTLEMENT_JOBS),
        ("withdrawal_requests", CREATE_WITHDRAWAL_REQUESTS),
        ("cash_accounts", CREATE_CASH_ACCOUNTS),
        ("financial_audit_logs", CREATE_FINANCIAL_AUDIT_LOGS),
    ] {
        // raw_sql: several DDL blocks contain more than one statement
        sqlx::raw_sql(ddl).execute(pool).await.map_err(|e| {
            tracing::error!(table = name, error = %e, "Failed to create table");
            e
        })?;
    }

    tracing::info!("Ledger schema ready");
    Ok(())
}

const CREATE_CREDIT_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS credit_accounts (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    owner_id uuid NOT NULL,
    owner_type varchar(32) NOT NULL,
    balance bigint NOT NULL DEFAULT 0 CHECK (balance >= 0),
    frozen_balance bigint NOT NULL DEFAULT 0 CHECK (frozen_balance >= 0),
    created_at timestamptz NOT NULL DEFAULT NOW(),
    updated_at timestamptz NOT NULL DEFAULT NOW(),
    UNIQUE (owner_id, owner_type)
)
"#;

const CREATE_CREDIT_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS credit_transactions (
    id uuid PRIMARY KEY,
    seq bigserial,
    account_id uuid NOT NULL REFERENCES credit_accounts(id),
    type varchar(32) NOT NULL,
    amount bigint NOT NULL,
    balance_before bigint NOT NULL,
    balance_after bigint NOT NULL,
    frozen_before bigint NOT NULL,
    frozen_after bigint NOT NULL,
    transaction_group_id varchar(26),
    group_sequence integer,
    related_campaign_id uuid,
    related_task_id uuid,
    description text NOT NULL DEFAULT '',
    created_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_credit_tx_account ON credit_transactions (account_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_credit_tx_group ON credit_transactions (transaction_group_id);
CREATE INDEX IF NOT EXISTS idx_credit_tx_task ON credit_transactions (related_task_id);
CREATE INDEX IF NOT EXISTS idx_credit_tx_campaign ON credit_transactions (related_campaign_id)
"#;

const CREATE_ACCOUNT_PERMISSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS account_permissions (
    account_id uuid NOT NULL REFERENCES credit_accounts(id),
    user_id uuid NOT NULL,
    account_type varchar(32) NOT NULL,
    can_view boolean NOT NULL DEFAULT false,
    can_operate boolean NOT NULL DEFAULT false,
    created_at timestamptz NOT NULL DEFAULT NOW(),
    PRIMARY KEY (account_id, user_id)
)
"#;

const CREATE_CAMPAIGNS: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    merchant_id uuid NOT NULL,
    provider_id uuid,
    title text NOT NULL,
    task_amount bigint NOT NULL CHECK (task_amount > 0),
    campaign_amount bigint NOT NULL CHECK (campaign_amount > 0),
    quota bigint NOT NULL CHECK (quota > 0),
    creator_amount bigint,
    staff_referral_amount bigint,
    provider_amount bigint
)
"#;

const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    campaign_id uuid NOT NULL REFERENCES campaigns(id),
    creator_id uuid,
    inviter_id uuid,
    inviter_role varchar(64),
    status varchar(16) NOT NULL DEFAULT 'OPEN'
)
"#;

const CREATE_CREATORS: &str = r#"
CREATE TABLE IF NOT EXISTS creators (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id uuid NOT NULL UNIQUE
)
"#;

const CREATE_PROVIDER_STAFF: &str = r#"
CREATE TABLE IF NOT EXISTS provider_staff (
    user_id uuid PRIMARY KEY,
    provider_id uuid NOT NULL
)
"#;

const CREATE_MERCHANT_STAFF: &str = r#"
CREATE TABLE IF NOT EXISTS merchant_staff (
    user_id uuid PRIMARY KEY,
    merchant_id uuid NOT NULL
)
"#;

const CREATE_SETTLEMENT_JOBS: &str = r#"
CREATE TABLE IF NOT EXISTS settlement_jobs (
    id uuid PRIMARY KEY,
    task_id uuid NOT NULL UNIQUE,
    auditor_id uuid NOT NULL,
    state smallint NOT NULL DEFAULT 0,
    retries integer NOT NULL DEFAULT 0,
    last_error text,
    created_at timestamptz NOT NULL DEFAULT NOW(),
    updated_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_settlement_jobs_state ON settlement_jobs (state, created_at)
"#;

const CREATE_WITHDRAWAL_REQUESTS: &str = r#"
CREATE TABLE IF NOT EXISTS withdrawal_requests (
    id uuid PRIMARY KEY,
    account_id uuid NOT NULL REFERENCES credit_accounts(id),
    amount bigint NOT NULL CHECK (amount > 0),
    yuan_amount numeric(10,2) NOT NULL CHECK (yuan_amount > 0),
    status smallint NOT NULL DEFAULT 0,
    cash_account_type varchar(32),
    reviewer_id uuid,
    review_note text,
    created_at timestamptz NOT NULL DEFAULT NOW(),
    updated_at timestamptz NOT NULL DEFAULT NOW(),
    processed_at timestamptz
)
"#;

const CREATE_CASH_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS cash_accounts (
    account_type varchar(32) PRIMARY KEY,
    balance_cents bigint NOT NULL DEFAULT 0 CHECK (balance_cents >= 0),
    updated_at timestamptz NOT NULL DEFAULT NOW()
)
"#;

const CREATE_FINANCIAL_AUDIT_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS financial_audit_logs (
    id uuid PRIMARY KEY,
    action varchar(64) NOT NULL,
    actor_id uuid,
    subject_type varchar(64) NOT NULL,
    subject_id uuid NOT NULL,
    changes jsonb NOT NULL,
    created_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_audit_subject ON financial_audit_logs (subject_id, created_at DESC)
"#;
