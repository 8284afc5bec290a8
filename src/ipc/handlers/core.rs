use crate::db;
use crate::ipc::error::{err, ok, respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::signed_in;
use crate::ipc::page::refresh_page;
use crate::ipc::types::{AppState, Request};
use crate::settings::Settings;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "schoolName": state.settings.school_name,
            "signedIn": state.session.is_some(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let settings = match Settings::load(Some(&path)) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "bad_settings", format!("{e:#}"), None),
    };
    match db::open_db(&path) {
        Ok(conn) => {
            tracing::info!(workspace = %path.display(), "workspace opened");
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            state.settings = settings;
            // Accounts live in the workspace database; a session never carries over.
            state.session = None;
            state.page.clear();
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "schoolName": state.settings.school_name,
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn page_load(state: &mut AppState) -> HandlerResult {
    signed_in(state)?;
    Ok(refresh_page(state))
}

fn handle_page_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, page_load(state))
}

fn page_view(state: &AppState) -> HandlerResult {
    let session = state.session.as_ref().ok_or(HandlerErr::Unauthenticated)?;
    Ok(state.page.to_json(Some(session)))
}

fn handle_page_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, page_view(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "page.load" | "page.refresh" => Some(handle_page_load(state, req)),
        "page.view" => Some(handle_page_view(state, req)),
        _ => None,
    }
}
