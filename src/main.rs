mod calc;
mod config;
mod db;
mod error;
mod ipc;
mod logging;
mod model;
mod report;
mod store;
mod validate;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let config = config::Config::load().context("failed to load configuration")?;
    logging::init_logging(&config.log.level);

    let mut state = ipc::AppState::new(config);
    if let Some(workspace) = state.config.workspace.clone() {
        state
            .open_workspace(&workspace)
            .with_context(|| format!("failed to open workspace {}", workspace.display()))?;
    }
    info!(version = env!("CARGO_PKG_VERSION"), "attendanced ready");

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
                // No id to echo back.
                warn!(error = %e, "unparseable request");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
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
    Ok(())
}
