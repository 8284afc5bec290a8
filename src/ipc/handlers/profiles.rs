use crate::calc::Role;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{require_admin, required_str, resolve_role, signed_in};
use crate::ipc::page::refresh_page;
use crate::ipc::types::{AppState, Request};
use crate::logging;
use rusqlite::OptionalExtension;
use serde_json::json;

fn me(state: &AppState) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    let role = resolve_role(conn, &session.user_id)?;
    Ok(json!({
        "id": session.user_id,
        "email": session.email,
        "role": role.as_str(),
    }))
}

fn list(state: &AppState) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    require_admin(conn, &session, "list staff")?;

    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, p.role, u.confirmed_at IS NOT NULL
         FROM users u
         LEFT JOIN profiles p ON p.id = u.id
         ORDER BY u.email",
    )?;
    let staff = stmt
        .query_map([], |r| {
            let role: Option<String> = r.get(2)?;
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "email": r.get::<_, String>(1)?,
                "role": Role::from_profile(role.as_deref()).as_str(),
                "confirmed": r.get::<_, bool>(3)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "staff": staff }))
}

fn set_role(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    require_admin(conn, &session, "change staff roles")?;

    let user_id = required_str(req, "userId")?;
    let role_raw = required_str(req, "role")?;
    let Some(role) = Role::parse(role_raw.trim()) else {
        return Err(HandlerErr::BadParams(
            "role must be admin or teacher".to_string(),
        ));
    };
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [&user_id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Err(HandlerErr::NotFound("staff member not found".to_string()));
    }
    conn.execute(
        "INSERT INTO profiles(id, role) VALUES(?, ?)
         ON CONFLICT(id) DO UPDATE SET role = excluded.role",
        (&user_id, role.as_str()),
    )?;
    logging::log_admin_action(&session.user_id, "set_role", Some(&user_id));
    let page = refresh_page(state);
    Ok(json!({ "userId": user_id, "role": role.as_str(), "page": page }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "profiles.me" => me(state),
        "profiles.list" => list(state),
        "profiles.setRole" => set_role(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
