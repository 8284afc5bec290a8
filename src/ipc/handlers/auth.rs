use crate::auth::{self, Session, CONFIRM_EMAIL_MESSAGE};
use crate::calc::Role;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::page::refresh_page;
use crate::ipc::types::{AppState, Request};
use crate::logging;
use serde_json::json;

/// Profiles are created on first sign-in; an existing row is never touched.
fn ensure_profile(state: &AppState, session: &Session) -> Result<(), HandlerErr> {
    let conn = db_conn(state)?;
    let role = if state.settings.is_bootstrap_admin(&session.email) {
        Role::Admin
    } else {
        Role::Teacher
    };
    conn.execute(
        "INSERT OR IGNORE INTO profiles(id, role) VALUES(?, ?)",
        (&session.user_id, role.as_str()),
    )?;
    Ok(())
}

fn sign_in(state: &mut AppState, req: &Request) -> HandlerResult {
    let email = required_str(req, "email")?;
    let password = required_str(req, "password")?;
    let conn = db_conn(state)?;
    let session = match auth::sign_in(conn, &email, &password) {
        Ok(s) => s,
        Err(e) => {
            logging::log_auth_event(&email, "sign_in", false, Some(&e.to_string()));
            return Err(e.into());
        }
    };
    ensure_profile(state, &session)?;
    logging::log_auth_event(&session.email, "sign_in", true, None);

    state.session = Some(session.clone());
    state.page.clear();
    let page = refresh_page(state);
    Ok(json!({
        "user": { "id": session.user_id, "email": session.email },
        "page": page,
    }))
}

fn sign_up(state: &mut AppState, req: &Request) -> HandlerResult {
    let email = required_str(req, "email")?;
    let password = required_str(req, "password")?;
    let conn = db_conn(state)?;
    let created = match auth::sign_up(
        conn,
        &email,
        &password,
        state.settings.min_password_length,
        state.settings.require_email_confirmation,
    ) {
        Ok(v) => v,
        Err(e) => {
            logging::log_auth_event(&email, "sign_up", false, Some(&e.to_string()));
            return Err(e.into());
        }
    };
    logging::log_auth_event(&email, "sign_up", true, None);

    let message = match &created.confirmation_token {
        Some(token) => {
            // Outgoing mail hook: the confirmation link carries this token.
            tracing::info!(email = %auth::normalize_email(&email), token = %token, "confirmation link issued");
            CONFIRM_EMAIL_MESSAGE
        }
        None => "Account created; you can sign in now.",
    };
    Ok(json!({
        "userId": created.user_id,
        "confirmationRequired": created.confirmation_token.is_some(),
        "message": message,
    }))
}

fn confirm(state: &mut AppState, req: &Request) -> HandlerResult {
    let token = required_str(req, "token")?;
    let email = auth::confirm(db_conn(state)?, &token)?;
    logging::log_auth_event(&email, "confirm", true, None);
    Ok(json!({ "email": email, "confirmed": true }))
}

fn sign_out(state: &mut AppState) -> HandlerResult {
    if let Some(s) = state.session.take() {
        logging::log_auth_event(&s.email, "sign_out", true, None);
    }
    state.page.clear();
    Ok(json!({ "signedOut": true }))
}

fn current_user(state: &AppState) -> HandlerResult {
    Ok(json!({
        "user": state
            .session
            .as_ref()
            .map(|s| json!({ "id": s.user_id, "email": s.email })),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.signIn" => sign_in(state, req),
        "auth.signUp" => sign_up(state, req),
        "auth.confirm" => confirm(state, req),
        "auth.signOut" => sign_out(state),
        "auth.currentUser" => current_user(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
