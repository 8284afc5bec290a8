use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::Session;
use crate::settings::Settings;

use super::page::PageState;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub settings: Settings,
    pub session: Option<Session>,
    pub page: PageState,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            workspace: None,
            db: None,
            settings,
            session: None,
            page: PageState::default(),
        }
    }
}
