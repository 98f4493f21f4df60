use std::path::PathBuf;

use serde_json::json;
use tracing::{error, info};

use crate::error::Error;
use crate::ipc::error::{err, from_error, ok};
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return from_error(
            &req.id,
            &Error::validation("path", "is required"),
            state.config.diagnostics,
        );
    };

    match state.open_workspace(&path) {
        Ok(()) => {
            info!(path = %path.display(), "workspace selected");
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            error!(path = %path.display(), error = ?e, "workspace open failed");
            let message = if state.config.diagnostics {
                format!("{e:#}")
            } else {
                "failed to open workspace".to_string()
            };
            let mut resp = err(&req.id, "db_error", message, None);
            resp["error"]["status"] = json!(500);
            resp
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
