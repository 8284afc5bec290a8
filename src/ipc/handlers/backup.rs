use crate::backup;
use crate::db;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{require_admin, required_str, signed_in};
use crate::ipc::types::{AppState, Request};
use crate::logging;
use serde_json::json;
use std::path::PathBuf;

fn export_bundle(state: &AppState, req: &Request) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    require_admin(conn, &session, "export backups")?;
    let workspace = state.workspace.clone().ok_or(HandlerErr::NoWorkspace)?;
    let out = PathBuf::from(required_str(req, "outPath")?);

    let export = backup::export_workspace_bundle(&workspace, &state.settings.school_name, &out)
        .map_err(HandlerErr::Io)?;
    logging::log_admin_action(&session.user_id, "backup_export", Some(&out.to_string_lossy()));
    Ok(json!({
        "path": out.to_string_lossy(),
        "bundleFormat": export.bundle_format,
        "dbSha256": export.db_sha256,
        "entryCount": export.entry_count,
    }))
}

fn import_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    require_admin(conn, &session, "restore backups")?;
    let workspace = state.workspace.clone().ok_or(HandlerErr::NoWorkspace)?;
    let src = PathBuf::from(required_str(req, "inPath")?);

    // Close the live connection before the database file is replaced.
    state.db = None;
    let import = match backup::import_workspace_bundle(&src, &workspace) {
        Ok(import) => import,
        Err(e) => {
            state.db = Some(db::open_db(&workspace).map_err(HandlerErr::Io)?);
            return Err(HandlerErr::Io(e));
        }
    };
    match db::open_db(&workspace) {
        Ok(conn) => {
            backup::discard_previous(&workspace);
            state.db = Some(conn);
        }
        Err(e) => {
            tracing::warn!(error = %e, "restored database failed to open; rolling back");
            backup::rollback_import(&workspace).map_err(HandlerErr::Io)?;
            state.db = Some(db::open_db(&workspace).map_err(HandlerErr::Io)?);
            return Err(HandlerErr::Io(e));
        }
    }

    logging::log_admin_action(&session.user_id, "backup_import", Some(&src.to_string_lossy()));
    // The restored database has its own accounts.
    state.session = None;
    state.page.clear();
    Ok(json!({
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormatDetected": import.bundle_format_detected,
        "signedOut": true,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export_bundle(state, req),
        "backup.importWorkspaceBundle" => import_bundle(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
