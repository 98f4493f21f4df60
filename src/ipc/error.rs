use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::Error;

pub fn ok(id: &str, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
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

/// Map a domain error onto the wire envelope.
///
/// Store and I/O detail stays in the log unless `diagnostics` is on.
pub fn from_error(id: &str, e: &Error, diagnostics: bool) -> Value {
    let message = if e.is_internal() {
        error!(error = %e, code = e.code(), "request failed");
        if diagnostics {
            e.to_string()
        } else {
            "internal store error".to_string()
        }
    } else {
        warn!(error = %e, code = e.code(), "request rejected");
        e.to_string()
    };

    let mut resp = err(id, e.code(), message, e.field().map(|f| json!({ "field": f })));
    resp["error"]["status"] = json!(e.status());
    resp
}

pub fn respond(id: &str, result: crate::error::Result<Value>, diagnostics: bool) -> Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => from_error(id, &e, diagnostics),
    }
}
