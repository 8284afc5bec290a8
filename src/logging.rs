use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr; stdout carries the IPC responses.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init();
}

pub fn log_auth_event(email: &str, action: &str, success: bool, detail: Option<&str>) {
    if success {
        info!(email = email, action = action, "auth action succeeded");
    } else {
        warn!(email = email, action = action, detail = detail, "auth action failed");
    }
}

pub fn log_admin_action(user_id: &str, action: &str, target: Option<&str>) {
    warn!(user_id = user_id, action = action, target = target, "admin action performed");
}

pub fn log_denied(user_id: &str, action: &str) {
    warn!(user_id = user_id, action = action, "admin action refused for teacher role");
}
