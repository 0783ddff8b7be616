//! Credential store: users and OTP records over SQLite
//!
//! Uniqueness and referential invariants live in the schema, so
//! concurrent writers are arbitrated here and not in handler logic.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{AuthProvider, OtpRecord, User};
use crate::common::{generate_otp_id, generate_user_id, normalize_email};

/// Fields needed to create a user row.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub date_of_birth: Option<&'a str>,
    pub provider: AuthProvider,
    pub google_id: Option<&'a str>,
    pub is_active: bool,
}

/// True when an insert lost the race against the UNIQUE index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Insert a user and fetch the stored row back. A duplicate email
/// surfaces as a unique violation; callers decide whether that is a
/// conflict or a lost race.
pub async fn insert_user(pool: &SqlitePool, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
    let id = generate_user_id();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, date_of_birth, provider, google_id, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(normalize_email(new_user.email))
    .bind(new_user.name)
    .bind(new_user.date_of_birth)
    .bind(new_user.provider)
    .bind(new_user.google_id)
    .bind(new_user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
}

/// Delete a user row; the FK cascade takes its OTP records with it.
pub async fn delete_user(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn activate_user(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_active = 1, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Latest OTP record for a user. Normal flow keeps at most one live
/// record, newest wins if older ones linger.
pub async fn find_otp_by_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<OtpRecord>, sqlx::Error> {
    sqlx::query_as::<_, OtpRecord>(
        "SELECT * FROM otps WHERE user_id = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_otp(
    pool: &SqlitePool,
    user_id: &str,
    code_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<OtpRecord, sqlx::Error> {
    let id = generate_otp_id();

    sqlx::query(
        r#"
        INSERT INTO otps (id, user_id, code_hash, expires_at, attempts, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(code_hash)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    sqlx::query_as::<_, OtpRecord>("SELECT * FROM otps WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
}

pub async fn delete_otp(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM otps WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_otps_for_user(pool: &SqlitePool, user_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM otps WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Single-statement increment so concurrent wrong guesses never lose an
/// attempt count.
pub async fn increment_otp_attempts(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE otps SET attempts = attempts + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Opportunistic sweep of stale records, run whenever a new code is
/// issued. Expiry is still enforced lazily at verification time.
pub async fn delete_expired_otps(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM otps WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
