use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{require_admin, require_confirm, required_str, signed_in};
use crate::ipc::page::{refresh_page, Student};
use crate::ipc::types::{AppState, Request};
use crate::logging;
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub const MAX_NAME_LENGTH: usize = 120;

pub fn list_students(conn: &Connection) -> rusqlite::Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, roll_number
         FROM students
         ORDER BY name ASC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Student {
                id: r.get(0)?,
                name: r.get(1)?,
                roll_number: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_student(conn: &Connection, student_id: &str) -> Result<Student, HandlerErr> {
    conn.query_row(
        "SELECT id, name, roll_number FROM students WHERE id = ?",
        [student_id],
        |r| {
            Ok(Student {
                id: r.get(0)?,
                name: r.get(1)?,
                roll_number: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| HandlerErr::NotFound("student not found".to_string()))
}

/// Display roll number: prefix plus a random 3-digit number. Collisions are
/// possible and are not checked.
pub fn generate_roll_number(prefix: &str, rng: &mut impl Rng) -> String {
    format!("{}{}", prefix, rng.gen_range(100..=999))
}

fn students_list(state: &AppState) -> HandlerResult {
    let (conn, _) = signed_in(state)?;
    let students: Vec<serde_json::Value> = list_students(conn)?
        .into_iter()
        .map(|s| json!({ "id": s.id, "name": s.name, "rollNumber": s.roll_number }))
        .collect();
    Ok(json!({ "students": students }))
}

fn students_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    require_admin(conn, &session, "add students")?;

    let name = required_str(req, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::BadParams("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(HandlerErr::BadParams(format!(
            "name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    let student_id = Uuid::new_v4().to_string();
    let roll_number = generate_roll_number(&state.settings.roll_prefix, &mut rand::thread_rng());
    conn.execute(
        "INSERT INTO students(id, name, roll_number, created_at) VALUES(?, ?, ?, ?)",
        (&student_id, &name, &roll_number, chrono::Utc::now().to_rfc3339()),
    )?;
    logging::log_admin_action(&session.user_id, "add_student", Some(&student_id));

    let page = refresh_page(state);
    Ok(json!({
        "studentId": student_id,
        "name": name,
        "rollNumber": roll_number,
        "page": page,
    }))
}

fn students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, session) = signed_in(state)?;
    require_admin(conn, &session, "delete students")?;

    let student_id = required_str(req, "studentId")?;
    require_confirm(req, "Delete this student and their attendance history?")?;
    // attendance rows go with the student (ON DELETE CASCADE)
    let removed = conn.execute("DELETE FROM students WHERE id = ?", [&student_id])?;
    if removed == 0 {
        return Err(HandlerErr::NotFound("student not found".to_string()));
    }
    logging::log_admin_action(&session.user_id, "delete_student", Some(&student_id));

    let page = refresh_page(state);
    Ok(json!({ "deleted": true, "page": page }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state),
        "students.create" => students_create(state, req),
        "students.delete" => students_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn roll_numbers_stay_in_three_digit_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let roll = generate_roll_number("ALJ-", &mut rng);
            let n: u32 = roll
                .strip_prefix("ALJ-")
                .expect("prefix")
                .parse()
                .expect("numeric");
            assert!((100..=999).contains(&n), "{roll}");
        }
    }
}
