use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::info;

use super::attendance::parse_filter;
use super::students::parse_gender;
use super::with_conn;
use crate::calc;
use crate::error::{Error, Result};
use crate::ipc::types::{AppState, Request};
use crate::report::export::{self, DateRange, ExportFormat, Period};
use crate::report::xlsx::XlsxReport;
use crate::store::attendance::{self, Order};
use crate::store::students::{self, StudentFilter};
use crate::validate;

fn parse_period(params: &Value) -> Result<Period> {
    match validate::optional_str(params, "period") {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::validation("period", "must be one of: 1m, 3m, 6m, 1y")),
        None => Ok(Period::default()),
    }
}

fn parse_format(params: &Value) -> Result<ExportFormat> {
    match validate::optional_str(params, "format") {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::validation("format", "must be xlsx or json")),
        None => Ok(ExportFormat::Xlsx),
    }
}

fn out_path(params: &Value) -> Result<PathBuf> {
    validate::optional_str(params, "outPath")
        .map(PathBuf::from)
        .ok_or_else(|| Error::validation("outPath", "is required for xlsx exports"))
}

fn resolve(params: &Value, today: NaiveDate) -> Result<(Period, DateRange)> {
    let period = parse_period(params)?;
    let range = export::resolve_range(
        period,
        validate::optional_date(params, "startDate")?,
        validate::optional_date(params, "endDate")?,
        today,
    )?;
    Ok((period, range))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn file_result(path: &Path, bytes: usize, row_count: usize, period: Value) -> Value {
    json!({
        "format": "xlsx",
        "path": path.to_string_lossy(),
        "bytes": bytes,
        "rowCount": row_count,
        "period": period,
    })
}

fn exports_attendance(conn: &Connection, params: &Value, today: NaiveDate) -> Result<Value> {
    let format = parse_format(params)?;
    let (period, range) = resolve(params, today)?;
    let mut filter = parse_filter(params)?;
    filter.start_date = Some(range.start);
    filter.end_date = Some(range.end);
    let rows = attendance::query(conn, &filter, Order::NewestFirst)?;

    match format {
        ExportFormat::Json => Ok(json!({
            "format": "json",
            "period": range,
            "periodLabel": period.label(),
            "rowCount": rows.len(),
            "rows": rows,
        })),
        ExportFormat::Xlsx => {
            let path = out_path(params)?;
            let bytes = export::attendance_report(XlsxReport::new("Attendance"), &rows, &range)?;
            write_file(&path, &bytes)?;
            info!(path = %path.display(), rows = rows.len(), "attendance export written");
            Ok(file_result(&path, bytes.len(), rows.len(), json!(range)))
        }
    }
}

/// Without an explicit period the whole roster is exported; with one, the
/// range applies to each student's registration date.
fn exports_students(conn: &Connection, params: &Value, today: NaiveDate) -> Result<Value> {
    let format = parse_format(params)?;
    let explicit = ["period", "startDate", "endDate"]
        .iter()
        .any(|k| validate::optional_str(params, k).is_some());
    let range = if explicit {
        Some(resolve(params, today)?.1)
    } else {
        None
    };

    let filter = StudentFilter {
        class_id: validate::optional_str(params, "classId"),
        gender: parse_gender(params)?,
        registered_from: range.map(|r| r.start),
        registered_to: range.map(|r| r.end),
        ..StudentFilter::default()
    };
    let (students, _) = students::list(conn, &filter)?;
    let rows = export::student_rows(students, today);
    let period = range.map(|r| json!(r)).unwrap_or(Value::Null);

    match format {
        ExportFormat::Json => Ok(json!({
            "format": "json",
            "period": period,
            "rowCount": rows.len(),
            "rows": rows,
        })),
        ExportFormat::Xlsx => {
            let path = out_path(params)?;
            let subtitle = range
                .map(|r| r.describe())
                .unwrap_or_else(|| "All students".to_string());
            let bytes = export::students_report(XlsxReport::new("Students"), &rows, &subtitle)?;
            write_file(&path, &bytes)?;
            info!(path = %path.display(), rows = rows.len(), "student export written");
            Ok(file_result(&path, bytes.len(), rows.len(), period))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "exports.attendance" => Some(with_conn(state, req, |c, p| {
            exports_attendance(c, p, calc::today())
        })),
        "exports.students" => Some(with_conn(state, req, |c, p| {
            exports_students(c, p, calc::today())
        })),
        _ => None,
    }
}
