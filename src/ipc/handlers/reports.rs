use crate::calc::{self, Window};
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{optional_str, required_str, signed_in};
use crate::ipc::page::{report_row_json, ReportRow, StudentSummary};
use crate::ipc::types::{AppState, Request};
use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};

use super::attendance::records_for_date;
use super::students::find_student;

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn daily_csv(rows: &[ReportRow]) -> String {
    let mut out = String::from("Student,Roll Number,Status,Date\n");
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_quote(&r.name),
            csv_quote(r.roll_number.as_deref().unwrap_or("")),
            csv_quote(&r.status),
            csv_quote(&r.date)
        ));
    }
    out
}

pub fn student_summary(
    conn: &Connection,
    student_id: &str,
    window: Window,
    today: NaiveDate,
) -> Result<StudentSummary, HandlerErr> {
    let student = find_student(conn, student_id)?;
    let start = calc::window_start(window, today);
    let mut stmt = conn.prepare(
        "SELECT status FROM attendance
         WHERE student_id = ? AND date >= ?",
    )?;
    let statuses = stmt
        .query_map((&student.id, calc::date_key(start)), |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StudentSummary {
        student_id: student.id,
        name: student.name,
        window,
        start,
        counts: calc::summarize(statuses.iter().map(String::as_str)),
    })
}

fn reports_daily(state: &AppState) -> HandlerResult {
    let (conn, _) = signed_in(state)?;
    let today = calc::today();
    let rows: Vec<serde_json::Value> = records_for_date(conn, today)?
        .iter()
        .map(report_row_json)
        .collect();
    Ok(json!({ "date": calc::date_key(today), "rows": rows }))
}

fn reports_student_summary(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, _) = signed_in(state)?;
    let Some(student_id) = optional_str(req, "studentId") else {
        return Err(HandlerErr::BadParams(
            "Please select a student first".to_string(),
        ));
    };
    let window = match optional_str(req, "window") {
        None => Window::Monthly,
        Some(raw) => Window::parse(&raw).ok_or_else(|| {
            HandlerErr::BadParams("window must be daily, weekly or monthly".to_string())
        })?,
    };
    let summary = student_summary(conn, &student_id, window, calc::today())?;
    let result = summary.to_json();
    state.page.summary = Some(summary);
    Ok(result)
}

fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, text)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))
}

fn reports_daily_csv(state: &AppState, req: &Request) -> HandlerResult {
    let (conn, _) = signed_in(state)?;
    let out = PathBuf::from(required_str(req, "outPath")?);
    let rows = records_for_date(conn, calc::today())?;
    write_text(&out, &daily_csv(&rows)).map_err(HandlerErr::Io)?;
    Ok(json!({ "path": out.to_string_lossy(), "rowsExported": rows.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.daily" => reports_daily(state),
        "reports.studentSummary" => reports_student_summary(state, req),
        "reports.dailyCsv" => reports_daily_csv(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quotes_names_with_commas() {
        let rows = vec![ReportRow {
            id: "a1".into(),
            student_id: "s1".into(),
            name: "Khan, Amina".into(),
            roll_number: Some("ALJ-101".into()),
            status: "Present".into(),
            date: "2024-03-15".into(),
        }];
        assert_eq!(
            daily_csv(&rows),
            "Student,Roll Number,Status,Date\n\"Khan, Amina\",ALJ-101,Present,2024-03-15\n"
        );
    }
}
