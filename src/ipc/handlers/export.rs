use crate::calc;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{optional_str, required_str, signed_in};
use crate::ipc::page::PageState;
use crate::ipc::types::{AppState, Request};
use crate::render::{self, Panel, Row};
use serde_json::json;
use std::path::PathBuf;

pub const DAILY_REPORT_PANEL: &str = "daily-report-card";
pub const HISTORY_PANEL: &str = "history-card";

/// The panels exist only once they have been rendered into the page state.
fn build_panel(page: &PageState, school_name: &str, panel_id: &str) -> Option<Panel> {
    match panel_id {
        DAILY_REPORT_PANEL => {
            let date = page.date?;
            Some(Panel {
                title: "Daily Attendance Report".to_string(),
                subtitle: Some(format!("{} - {}", school_name, calc::date_key(date))),
                headline: None,
                rows: page
                    .report
                    .iter()
                    .map(|r| Row {
                        left: r.name.clone(),
                        right: r.status.clone(),
                        color: if r.status == calc::PRESENT {
                            render::GOOD
                        } else {
                            render::BAD
                        },
                    })
                    .collect(),
            })
        }
        HISTORY_PANEL => {
            let s = page.summary.as_ref()?;
            Some(Panel {
                title: s.name.clone(),
                subtitle: Some(format!("{} - {}", school_name, s.window.label())),
                headline: Some(format!("{}%", s.counts.percentage)),
                rows: vec![
                    Row {
                        left: "Present".to_string(),
                        right: s.counts.present.to_string(),
                        color: render::GOOD,
                    },
                    Row {
                        left: "Absent".to_string(),
                        right: s.counts.absent.to_string(),
                        color: render::BAD,
                    },
                    Row {
                        left: "Total Days".to_string(),
                        right: s.counts.total.to_string(),
                        color: render::INK,
                    },
                ],
            })
        }
        _ => None,
    }
}

fn export_panel_png(state: &AppState, req: &Request) -> HandlerResult {
    signed_in(state)?;
    let panel_id = required_str(req, "panelId")?;
    let file_name = required_str(req, "fileName")?;
    let file_name = file_name.trim();
    if file_name.is_empty()
        || file_name.contains(['/', '\\'])
        || file_name == "."
        || file_name == ".."
    {
        return Err(HandlerErr::BadParams(
            "fileName must be a plain file name".to_string(),
        ));
    }
    let out_dir = match optional_str(req, "outDir") {
        Some(dir) => PathBuf::from(dir),
        None => state
            .workspace
            .as_ref()
            .ok_or(HandlerErr::NoWorkspace)?
            .join("exports"),
    };

    let Some(panel) = build_panel(&state.page, &state.settings.school_name, &panel_id) else {
        tracing::debug!(panel_id = %panel_id, "panel not rendered; nothing to export");
        return Ok(json!({ "exported": false, "panelId": panel_id }));
    };
    let img = render::render_panel(&panel, state.settings.export_scale);
    let path = out_dir.join(file_name);
    render::save_png(&img, &path).map_err(HandlerErr::Io)?;
    tracing::info!(panel_id = %panel_id, path = %path.display(), "panel exported");
    Ok(json!({
        "exported": true,
        "panelId": panel_id,
        "path": path.to_string_lossy(),
        "width": img.width(),
        "height": img.height(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "export.panelPng" => export_panel_png(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
