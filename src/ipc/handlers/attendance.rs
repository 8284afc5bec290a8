use crate::calc::{self, Status};
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{require_admin, require_confirm, required_str, signed_in};
use crate::ipc::page::{refresh_page, report_row_json, ReportRow};
use crate::ipc::types::{AppState, Request};
use crate::logging;
use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use super::students::find_student;

/// Records for one calendar day joined with student names, in insertion order.
/// Rows whose student is gone do not join and are not returned.
pub fn records_for_date(conn: &Connection, date: NaiveDate) -> rusqlite::Result<Vec<ReportRow>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.student_id, s.name, s.roll_number, a.status, a.date
         FROM attendance a
         JOIN students s ON s.id = a.student_id
         WHERE a.date = ?
         ORDER BY a.rowid",
    )?;
    let rows = stmt
        .query_map([calc::date_key(date)], |r| {
            Ok(ReportRow {
                id: r.get(0)?,
                student_id: r.get(1)?,
                name: r.get(2)?,
                roll_number: r.get(3)?,
                status: r.get(4)?,
                date: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn existing_status(conn: &Connection, student_id: &str, date: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT status FROM attendance WHERE student_id = ? AND date = ?",
        (student_id, date),
        |r| r.get(0),
    )
    .optional()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == ErrorCode::ConstraintViolation
                && f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn attendance_mark(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, _) = signed_in(state)?;
    let student_id = required_str(req, "studentId")?;
    let status_raw = required_str(req, "status")?;
    let Some(status) = Status::parse(status_raw.trim()) else {
        return Err(HandlerErr::BadParams(
            "status must be Present or Absent".to_string(),
        ));
    };
    let student = find_student(conn, &student_id)?;
    let date = calc::date_key(calc::today());

    // First write of the day wins; the unique index settles racing clients.
    if let Some(existing) = existing_status(conn, &student.id, &date)? {
        return Err(HandlerErr::AlreadyMarked {
            student_id: student.id,
            status: existing,
        });
    }
    let record_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO attendance(id, student_id, status, date) VALUES(?, ?, ?, ?)",
        (&record_id, &student.id, status.as_str(), &date),
    ) {
        if is_unique_violation(&e) {
            let existing = existing_status(conn, &student.id, &date)?.unwrap_or_default();
            return Err(HandlerErr::AlreadyMarked {
                student_id: student.id,
                status: existing,
            });
        }
        return Err(e.into());
    }
    tracing::info!(student_id = %student.id, status = status.as_str(), date = %date, "attendance marked");

    let record = ReportRow {
        id: record_id,
        student_id: student.id,
        name: student.name,
        roll_number: student.roll_number,
        status: status.as_str().to_string(),
        date,
    };
    let page = refresh_page(state);
    Ok(json!({
        "record": report_row_json(&record),
        "page": page,
    }))
}

fn attendance_clear_today(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    require_admin(conn, &session, "clear today's attendance")?;
    require_confirm(req, "Clear all attendance recorded today?")?;

    let date = calc::date_key(calc::today());
    let deleted = conn.execute("DELETE FROM attendance WHERE date = ?", [&date])?;
    logging::log_admin_action(&session.user_id, "clear_today", Some(&date));

    let page = refresh_page(state);
    Ok(json!({ "deleted": deleted, "date": date, "page": page }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.mark" => attendance_mark(state, req),
        "attendance.clearToday" => attendance_clear_today(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
