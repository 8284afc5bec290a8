use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "expected failure: {}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn write_settings(workspace: &PathBuf, admin_email: &str) {
    std::fs::write(
        workspace.join("attendanced.toml"),
        format!(
            "require_email_confirmation = false\nadmin_emails = [\"{}\"]\n",
            admin_email
        ),
    )
    .expect("write settings");
}

fn sign_up_and_in(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    email: &str,
) -> serde_json::Value {
    let _ = request_ok(
        stdin,
        reader,
        &format!("{}-up", id),
        "auth.signUp",
        json!({ "email": email, "password": "attendance-pass" }),
    );
    request_ok(
        stdin,
        reader,
        &format!("{}-in", id),
        "auth.signIn",
        json!({ "email": email, "password": "attendance-pass" }),
    )
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[test]
fn report_panels_export_as_png() {
    let workspace = temp_dir("attendance-export");
    write_settings(&workspace, "head@school.test");
    let out_dir = workspace.join("out");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up_and_in(&mut stdin, &mut reader, "2", "head@school.test");
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Amina" }),
    );
    let amina = created["studentId"].as_str().expect("studentId").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({ "studentId": amina, "status": "Present" }),
    );

    // No summary generated yet: the history panel is not rendered.
    let skipped = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "export.panelPng",
        json!({
            "panelId": "history-card",
            "fileName": "Student_Summary.png",
            "outDir": out_dir.to_string_lossy()
        }),
    );
    assert_eq!(skipped["exported"], false);
    assert!(!out_dir.join("Student_Summary.png").exists());

    let unknown = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "export.panelPng",
        json!({ "panelId": "nope", "fileName": "x.png" }),
    );
    assert_eq!(unknown["exported"], false);

    let daily = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "export.panelPng",
        json!({
            "panelId": "daily-report-card",
            "fileName": "Daily_Report.png",
            "outDir": out_dir.to_string_lossy()
        }),
    );
    assert_eq!(daily["exported"], true);
    assert_eq!(daily["width"].as_u64().map(|w| w % 2), Some(0));
    let bytes = std::fs::read(out_dir.join("Daily_Report.png")).expect("read png");
    assert_eq!(bytes[..8], PNG_SIGNATURE);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "reports.studentSummary",
        json!({ "studentId": amina, "window": "weekly" }),
    );
    let history = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "export.panelPng",
        json!({ "panelId": "history-card", "fileName": "Student_Summary.png" }),
    );
    assert_eq!(history["exported"], true);
    assert!(workspace.join("exports").join("Student_Summary.png").is_file());

    let escape = request(
        &mut stdin,
        &mut reader,
        "10",
        "export.panelPng",
        json!({ "panelId": "daily-report-card", "fileName": "../evil.png" }),
    );
    assert_eq!(error_code(&escape), "bad_params");
    let dot = request(
        &mut stdin,
        &mut reader,
        "10b",
        "export.panelPng",
        json!({ "panelId": "daily-report-card", "fileName": "." }),
    );
    assert_eq!(error_code(&dot), "bad_params");

    let csv_path = out_dir.join("daily.csv");
    let csv = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "reports.dailyCsv",
        json!({ "outPath": csv_path.to_string_lossy() }),
    );
    assert_eq!(csv["rowsExported"], 1);
    let text = std::fs::read_to_string(&csv_path).expect("read csv");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Student,Roll Number,Status,Date"));
    assert!(lines.next().expect("data row").starts_with("Amina,ALJ-"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn backup_restores_deleted_students() {
    let workspace = temp_dir("attendance-backup");
    write_settings(&workspace, "head@school.test");
    let bundle = workspace.join("backups").join("school.zip");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up_and_in(&mut stdin, &mut reader, "2", "head@school.test");
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Hana" }),
    );
    let hana = created["studentId"].as_str().expect("studentId").to_string();

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], "attendance-workspace-v1");
    assert_eq!(exported["dbSha256"].as_str().map(|s| s.len()), Some(64));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.delete",
        json!({ "studentId": hana, "confirm": true }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["signedOut"], true);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "auth.signIn",
        json!({ "email": "head@school.test", "password": "attendance-pass" }),
    );
    let list = request_ok(&mut stdin, &mut reader, "8", "students.list", json!({}));
    assert_eq!(list["students"][0]["name"], "Hana");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn importing_a_non_bundle_keeps_the_live_database() {
    let workspace = temp_dir("attendance-bad-import");
    write_settings(&workspace, "head@school.test");
    let notes = workspace.join("notes.txt");
    std::fs::write(&notes, "just some text, not sqlite").expect("write notes");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up_and_in(&mut stdin, &mut reader, "2", "head@school.test");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Amina" }),
    );

    let refused = request(
        &mut stdin,
        &mut reader,
        "4",
        "backup.importWorkspaceBundle",
        json!({ "inPath": notes.to_string_lossy() }),
    );
    assert_eq!(error_code(&refused), "io_failed");

    // Session and connection survive a refused import.
    let list = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(list["students"][0]["name"], "Amina");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let header = std::fs::read(workspace.join("attendance.sqlite3")).expect("read db");
    assert!(header.starts_with(b"SQLite format 3\0"));

    let _ = std::fs::remove_dir_all(workspace);
}
