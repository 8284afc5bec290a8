use rusqlite::{Connection, OptionalExtension};

use crate::auth::Session;
use crate::calc::Role;
use crate::logging;

use super::error::HandlerErr;
use super::types::{AppState, Request};

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| HandlerErr::BadParams(format!("missing {}", key)))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or(HandlerErr::NoWorkspace)
}

/// Auth gate for every data method.
pub fn signed_in(state: &AppState) -> Result<(&Connection, Session), HandlerErr> {
    let conn = db_conn(state)?;
    let session = state.session.clone().ok_or(HandlerErr::Unauthenticated)?;
    Ok((conn, session))
}

pub fn resolve_role(conn: &Connection, user_id: &str) -> Result<Role, HandlerErr> {
    let raw: Option<String> = conn
        .query_row("SELECT role FROM profiles WHERE id = ?", [user_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(Role::from_profile(raw.as_deref()))
}

/// Re-checked before every admin-only action; runs before any write is issued.
pub fn require_admin(
    conn: &Connection,
    session: &Session,
    action: &'static str,
) -> Result<(), HandlerErr> {
    if resolve_role(conn, &session.user_id)? == Role::Admin {
        return Ok(());
    }
    logging::log_denied(&session.user_id, action);
    Err(HandlerErr::Forbidden(action))
}

pub fn require_confirm(req: &Request, prompt: &'static str) -> Result<(), HandlerErr> {
    match req.params.get("confirm").and_then(|v| v.as_bool()) {
        Some(true) => Ok(()),
        _ => Err(HandlerErr::ConfirmationRequired(prompt)),
    }
}
