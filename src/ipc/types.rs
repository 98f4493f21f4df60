use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
        }
    }

    /// Open (or create) the database in `path`, replacing any open workspace.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path, &self.config.store.database_file)?;
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        Ok(())
    }

    pub fn conn(&self) -> Result<&Connection> {
        self.db.as_ref().ok_or(Error::NoWorkspace)
    }
}
