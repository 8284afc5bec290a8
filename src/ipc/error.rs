use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug, Error)]
pub enum HandlerErr {
    #[error("{0}")]
    BadParams(String),
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("sign in first")]
    Unauthenticated,
    #[error("{0}")]
    AuthFailed(String),
    #[error("only admins can {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("attendance already marked for this student today")]
    AlreadyMarked { student_id: String, status: String },
    #[error("{0}")]
    ConfirmationRequired(&'static str),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error("{0:#}")]
    Io(anyhow::Error),
}

impl HandlerErr {
    pub fn code(&self) -> &'static str {
        match self {
            HandlerErr::BadParams(_) => "bad_params",
            HandlerErr::NoWorkspace => "no_workspace",
            HandlerErr::Unauthenticated => "unauthenticated",
            HandlerErr::AuthFailed(_) => "auth_failed",
            HandlerErr::Forbidden(_) => "forbidden",
            HandlerErr::NotFound(_) => "not_found",
            HandlerErr::AlreadyMarked { .. } => "already_marked",
            HandlerErr::ConfirmationRequired(_) => "confirmation_required",
            HandlerErr::Db(_) => "db_query_failed",
            HandlerErr::Io(_) => "io_failed",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            HandlerErr::AlreadyMarked { student_id, status } => Some(json!({
                "studentId": student_id,
                "status": status,
            })),
            _ => None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code(), self.to_string(), self.details())
    }
}

impl From<AuthError> for HandlerErr {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Rejected(message) => HandlerErr::AuthFailed(message),
            AuthError::Db(e) => HandlerErr::Db(e),
            AuthError::Hash(message) => HandlerErr::AuthFailed(message),
        }
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

pub fn respond(id: &str, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => {
            if matches!(e, HandlerErr::Db(_) | HandlerErr::Io(_)) {
                tracing::error!(code = e.code(), error = %e, "request failed");
            }
            e.response(id)
        }
    }
}
