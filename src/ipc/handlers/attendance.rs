use rusqlite::Connection;
use serde_json::{json, Value};

use super::with_conn;
use crate::error::Result;
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;
use crate::store::attendance::{self, AttendanceFilter};
use crate::store::classes;
use crate::validate;

pub(crate) fn parse_status_filter(params: &Value) -> Result<Option<AttendanceStatus>> {
    match params.get("status") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        v => validate::parse_status("status", v).map(Some),
    }
}

/// Filter fields shared by listing, charts and exports. Paging is left to
/// the caller.
pub(crate) fn parse_filter(params: &Value) -> Result<AttendanceFilter> {
    Ok(AttendanceFilter {
        student_id: validate::optional_str(params, "studentId"),
        class_id: validate::optional_str(params, "classId"),
        date: validate::optional_date(params, "date")?,
        start_date: validate::optional_date(params, "startDate")?,
        end_date: validate::optional_date(params, "endDate")?,
        status: parse_status_filter(params)?,
        ..AttendanceFilter::default()
    })
}

fn attendance_list(conn: &Connection, params: &Value, page_size: u32) -> Result<Value> {
    let mut filter = parse_filter(params)?;
    filter.limit = Some(validate::optional_u32(params, "limit")?.unwrap_or(page_size));
    filter.offset = validate::optional_u32(params, "offset")?.unwrap_or(0);
    let (rows, pagination) = attendance::list(conn, &filter)?;
    Ok(json!({ "attendance": rows, "pagination": pagination }))
}

fn attendance_record(conn: &Connection, params: &Value) -> Result<Value> {
    let input = validate::attendance(params)?;
    Ok(json!({ "attendance": attendance::record(conn, &input)? }))
}

fn attendance_bulk_record(conn: &Connection, params: &Value) -> Result<Value> {
    let input = validate::bulk_attendance(params)?;
    let rows = attendance::record_bulk(conn, &input)?;
    Ok(json!({ "count": rows.len(), "attendance": rows }))
}

fn attendance_class_date(conn: &Connection, params: &Value) -> Result<Value> {
    let class_id = validate::required_id(params, "classId")?;
    let date = validate::required_date(params, "date")?;
    let entries = attendance::class_date_view(conn, &class_id, date)?;
    let class = classes::get(conn, &class_id)?;
    Ok(json!({
        "class": class,
        "date": date,
        "students": entries,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let page_size = state.config.store.page_size;
    match req.method.as_str() {
        "attendance.list" => Some(with_conn(state, req, |c, p| attendance_list(c, p, page_size))),
        "attendance.record" => Some(with_conn(state, req, attendance_record)),
        "attendance.bulkRecord" => Some(with_conn(state, req, attendance_bulk_record)),
        "attendance.classDate" => Some(with_conn(state, req, attendance_class_date)),
        _ => None,
    }
}
