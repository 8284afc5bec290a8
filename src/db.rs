use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "attendance.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            confirmation_token TEXT,
            confirmed_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles(
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL DEFAULT 'teacher',
            FOREIGN KEY(id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            roll_number TEXT,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;
    ensure_students_created_at(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('Present', 'Absent')),
            date TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
        [],
    )?;
    ensure_attendance_unique_per_day(&conn)?;

    Ok(conn)
}

fn ensure_students_created_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "created_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN created_at TEXT", [])?;
    Ok(())
}

/// Workspaces written before the (student, date) constraint may hold racing
/// duplicates. The earliest row for a day wins; later ones are dropped.
fn ensure_attendance_unique_per_day(conn: &Connection) -> anyhow::Result<()> {
    if index_exists(conn, "idx_attendance_student_date")? {
        return Ok(());
    }
    let removed = conn.execute(
        "DELETE FROM attendance
         WHERE rowid NOT IN (
           SELECT MIN(rowid) FROM attendance GROUP BY student_id, date
         )",
        [],
    )?;
    if removed > 0 {
        tracing::warn!(removed, "dropped duplicate attendance rows before adding unique index");
    }
    conn.execute(
        "CREATE UNIQUE INDEX idx_attendance_student_date ON attendance(student_id, date)",
        [],
    )?;
    Ok(())
}

fn index_exists(conn: &Connection, name: &str) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?",
        [name],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
