mod auth;
mod backup;
mod calc;
mod db;
mod ipc;
mod logging;
mod render;
mod settings;

use std::io::{self, BufRead, Write};

fn main() {
    let settings = match settings::Settings::load(None) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("invalid settings, using defaults: {e:#}");
            settings::Settings::default()
        }
    };
    logging::init_logging(&settings.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "attendanced started");

    let mut state = ipc::AppState::new(settings);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; answer with an id-less error.
                tracing::warn!(error = %e, "unparseable request line");
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed; shutting down");
}
