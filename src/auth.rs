//! Email/password identity provider backing the `auth.*` methods.
//!
//! Passwords are stored as Argon2id PHC strings. Error messages produced here
//! are shown to staff verbatim, so they read like the hosted provider's.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

pub const INVALID_CREDENTIALS: &str = "Invalid login credentials";
pub const EMAIL_NOT_CONFIRMED: &str = "Email not confirmed";
pub const ALREADY_REGISTERED: &str = "User already registered";
pub const CONFIRM_EMAIL_MESSAGE: &str = "Check your email for the confirmation link!";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Rejected by the provider; the message is surfaced as-is.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

pub struct SignUp {
    pub user_id: String,
    pub confirmation_token: Option<String>,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn sign_up(
    conn: &Connection,
    email: &str,
    password: &str,
    min_password_length: usize,
    require_confirmation: bool,
) -> Result<SignUp, AuthError> {
    let email = normalize_email(email);
    if !looks_like_email(&email) {
        return Err(AuthError::Rejected(
            "Unable to validate email address: invalid format".to_string(),
        ));
    }
    if password.chars().count() < min_password_length {
        return Err(AuthError::Rejected(format!(
            "Password should be at least {} characters",
            min_password_length
        )));
    }
    let exists: Option<String> = conn
        .query_row("SELECT id FROM users WHERE email = ?", [&email], |r| r.get(0))
        .optional()?;
    if exists.is_some() {
        return Err(AuthError::Rejected(ALREADY_REGISTERED.to_string()));
    }

    let user_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let (token, confirmed_at) = if require_confirmation {
        (Some(Uuid::new_v4().simple().to_string()), None)
    } else {
        (None, Some(now.clone()))
    };
    conn.execute(
        "INSERT INTO users(id, email, password_hash, confirmation_token, confirmed_at, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &user_id,
            &email,
            hash_password(password)?,
            &token,
            &confirmed_at,
            &now,
        ),
    )?;
    Ok(SignUp {
        user_id,
        confirmation_token: token,
    })
}

/// Returns the confirmed account's email.
pub fn confirm(conn: &Connection, token: &str) -> Result<String, AuthError> {
    let token = token.trim();
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT id, email FROM users WHERE confirmation_token = ?",
            [token],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((user_id, email)) = row.filter(|_| !token.is_empty()) else {
        return Err(AuthError::Rejected(
            "Email link is invalid or has expired".to_string(),
        ));
    };
    conn.execute(
        "UPDATE users SET confirmed_at = ?, confirmation_token = NULL WHERE id = ?",
        (Utc::now().to_rfc3339(), &user_id),
    )?;
    Ok(email)
}

pub fn sign_in(conn: &Connection, email: &str, password: &str) -> Result<Session, AuthError> {
    let email = normalize_email(email);
    let row: Option<(String, String, Option<String>)> = conn
        .query_row(
            "SELECT id, password_hash, confirmed_at FROM users WHERE email = ?",
            [&email],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((user_id, hash, confirmed_at)) = row else {
        return Err(AuthError::Rejected(INVALID_CREDENTIALS.to_string()));
    };
    if !verify_password(password, &hash)? {
        return Err(AuthError::Rejected(INVALID_CREDENTIALS.to_string()));
    }
    if confirmed_at.is_none() {
        return Err(AuthError::Rejected(EMAIL_NOT_CONFIRMED.to_string()));
    }
    Ok(Session { user_id, email })
}
