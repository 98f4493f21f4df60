use rusqlite::Connection;
use serde_json::{json, Value};

use super::with_conn;
use crate::calc;
use crate::error::{Error, Result};
use crate::ipc::types::{AppState, Request};
use crate::model::Gender;
use crate::store::students::{self, StudentFilter};
use crate::validate;

pub(crate) fn parse_gender(params: &Value) -> Result<Option<Gender>> {
    match validate::optional_str(params, "gender") {
        Some(raw) => raw
            .parse::<Gender>()
            .map(Some)
            .map_err(|_| Error::validation("gender", "must be one of: Male, Female")),
        None => Ok(None),
    }
}

fn parse_filter(params: &Value, page_size: u32) -> Result<StudentFilter> {
    Ok(StudentFilter {
        class_id: validate::optional_str(params, "classId"),
        gender: parse_gender(params)?,
        search: validate::optional_str(params, "search"),
        limit: Some(validate::optional_u32(params, "limit")?.unwrap_or(page_size)),
        offset: validate::optional_u32(params, "offset")?.unwrap_or(0),
        ..StudentFilter::default()
    })
}

fn students_list(conn: &Connection, params: &Value, page_size: u32) -> Result<Value> {
    let filter = parse_filter(params, page_size)?;
    let (rows, pagination) = students::list_page(conn, &filter)?;
    Ok(json!({ "students": rows, "pagination": pagination }))
}

fn students_get(conn: &Connection, params: &Value) -> Result<Value> {
    let student_id = validate::required_id(params, "studentId")?;
    Ok(json!({ "student": students::get(conn, &student_id)? }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value> {
    let input = validate::student(params, calc::today())?;
    Ok(json!({ "student": students::create(conn, &input)? }))
}

fn students_update(conn: &Connection, params: &Value) -> Result<Value> {
    let student_id = validate::required_id(params, "studentId")?;
    let input = validate::student(params, calc::today())?;
    Ok(json!({ "student": students::update(conn, &student_id, &input)? }))
}

fn students_delete(conn: &Connection, params: &Value) -> Result<Value> {
    let student_id = validate::required_id(params, "studentId")?;
    students::delete(conn, &student_id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let page_size = state.config.store.page_size;
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, |c, p| students_list(c, p, page_size))),
        "students.get" => Some(with_conn(state, req, students_get)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.update" => Some(with_conn(state, req, students_update)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        _ => None,
    }
}
