//! Per-session view state: the role, roster, today's report and the last
//! generated summary. Nothing here is a cache; every mutation re-fetches it
//! in full from the workspace database.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

use crate::auth::Session;
use crate::calc::{self, Role, Window};

use super::handlers::{attendance, students};
use super::helpers::resolve_role;
use super::types::AppState;

#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: String,
    pub student_id: String,
    pub name: String,
    pub roll_number: Option<String>,
    pub status: String,
    pub date: String,
}

#[derive(Debug, Clone)]
pub struct StudentSummary {
    pub student_id: String,
    pub name: String,
    pub window: Window,
    pub start: NaiveDate,
    pub counts: calc::Summary,
}

impl StudentSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "studentId": self.student_id,
            "name": self.name,
            "window": self.window.as_str(),
            "label": self.window.label(),
            "startDate": calc::date_key(self.start),
            "present": self.counts.present,
            "absent": self.counts.absent,
            "total": self.counts.total,
            "percentage": self.counts.percentage,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub role: Option<Role>,
    pub date: Option<NaiveDate>,
    pub roster: Vec<Student>,
    pub report: Vec<ReportRow>,
    pub summary: Option<StudentSummary>,
}

impl PageState {
    /// Load failures leave an empty roster/report instead of failing the caller.
    pub fn refresh(&mut self, conn: &Connection, session: &Session) {
        let today = calc::today();
        self.date = Some(today);
        self.role = Some(resolve_role(conn, &session.user_id).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "role lookup failed; using teacher");
            Role::Teacher
        }));
        self.roster = students::list_students(conn).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "roster load failed");
            Vec::new()
        });
        self.report = attendance::records_for_date(conn, today).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "daily report load failed");
            Vec::new()
        });
        let summary_student_present = self
            .summary
            .as_ref()
            .map_or(true, |s| self.roster.iter().any(|r| r.id == s.student_id));
        if !summary_student_present {
            self.summary = None;
        }
    }

    pub fn clear(&mut self) {
        *self = PageState::default();
    }

    pub fn to_json(&self, session: Option<&Session>) -> serde_json::Value {
        let marked: HashMap<&str, &str> = self
            .report
            .iter()
            .map(|r| (r.student_id.as_str(), r.status.as_str()))
            .collect();
        let roster: Vec<serde_json::Value> = self
            .roster
            .iter()
            .map(|s| {
                let today_status = marked.get(s.id.as_str()).copied();
                json!({
                    "id": s.id,
                    "name": s.name,
                    "rollNumber": s.roll_number,
                    "todayStatus": today_status,
                    "canMark": today_status.is_none(),
                })
            })
            .collect();
        let report: Vec<serde_json::Value> = self.report.iter().map(report_row_json).collect();
        json!({
            "user": session.map(|s| json!({ "id": s.user_id, "email": s.email })),
            "role": self.role.map(|r| r.as_str()),
            "date": self.date.map(calc::date_key),
            "roster": roster,
            "report": report,
            "summary": self.summary.as_ref().map(|s| s.to_json()),
        })
    }
}

pub fn report_row_json(r: &ReportRow) -> serde_json::Value {
    json!({
        "id": r.id,
        "studentId": r.student_id,
        "name": r.name,
        "rollNumber": r.roll_number,
        "status": r.status,
        "date": r.date,
    })
}

/// Full unconditional re-fetch; called after every mutation.
pub fn refresh_page(state: &mut AppState) -> serde_json::Value {
    let AppState {
        db, session, page, ..
    } = state;
    match (db.as_ref(), session.as_ref()) {
        (Some(conn), Some(s)) => page.refresh(conn, s),
        _ => page.clear(),
    }
    page.to_json(session.as_ref())
}
