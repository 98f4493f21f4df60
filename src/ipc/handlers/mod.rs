use rusqlite::Connection;
use serde_json::Value;

use crate::error::Result;
use crate::ipc::error::respond;
use crate::ipc::types::{AppState, Request};

pub mod analytics;
pub mod attendance;
pub mod classes;
pub mod core;
pub mod reports;
pub mod students;

/// Run `f` against the open workspace and wrap its outcome in an envelope.
fn with_conn<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value>,
{
    let result = state.conn().and_then(|conn| f(conn, &req.params));
    respond(&req.id, result, state.config.diagnostics)
}
