use rusqlite::Connection;
use serde_json::{json, Value};

use super::with_conn;
use crate::error::Result;
use crate::ipc::types::{AppState, Request};
use crate::store::classes;
use crate::validate;

fn classes_list(conn: &Connection, _params: &Value) -> Result<Value> {
    let rows = classes::list(conn)?;
    Ok(json!({ "classes": rows }))
}

fn classes_get(conn: &Connection, params: &Value) -> Result<Value> {
    let class_id = validate::required_id(params, "classId")?;
    let detail = classes::get_detail(conn, &class_id)?;
    Ok(json!({ "class": detail }))
}

fn classes_create(conn: &Connection, params: &Value) -> Result<Value> {
    let input = validate::class(params)?;
    let class = classes::create(conn, &input)?;
    Ok(json!({ "class": class }))
}

fn classes_update(conn: &Connection, params: &Value) -> Result<Value> {
    let class_id = validate::required_id(params, "classId")?;
    let input = validate::class(params)?;
    let class = classes::update(conn, &class_id, &input)?;
    Ok(json!({ "class": class }))
}

fn classes_delete(conn: &Connection, params: &Value) -> Result<Value> {
    let class_id = validate::required_id(params, "classId")?;
    classes::delete(conn, &class_id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> Result<Value> = match req.method.as_str() {
        "classes.list" => classes_list,
        "classes.get" => classes_get,
        "classes.create" => classes_create,
        "classes.update" => classes_update,
        "classes.delete" => classes_delete,
        _ => return None,
    };
    Some(with_conn(state, req, handler))
}
