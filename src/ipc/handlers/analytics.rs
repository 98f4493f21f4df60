use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::debug;

use super::with_conn;
use crate::calc;
use crate::error::{Error, Result};
use crate::ipc::types::{AppState, Request};
use crate::store::attendance::{self, AttendanceFilter, Order};
use crate::store::{classes, students};
use crate::validate;

const MAX_CHART_DAYS: u32 = 366;

fn charts_attendance(
    conn: &Connection,
    params: &Value,
    default_days: u32,
    today: NaiveDate,
) -> Result<Value> {
    let days = validate::optional_u32(params, "days")?.unwrap_or(default_days);
    if !(1..=MAX_CHART_DAYS).contains(&days) {
        return Err(Error::validation(
            "days",
            format!("must be between 1 and {}", MAX_CHART_DAYS),
        ));
    }
    let window = calc::chart_window(today, days);
    let filter = AttendanceFilter {
        class_id: validate::optional_str(params, "classId"),
        student_id: validate::optional_str(params, "studentId"),
        start_date: Some(window.start_date),
        end_date: Some(window.end_date),
        ..AttendanceFilter::default()
    };
    let rows = attendance::query(conn, &filter, Order::Chronological)?;
    debug!(rows = rows.len(), days, "chart window loaded");

    let agg = calc::aggregate_rows(&rows);
    let rate = calc::attendance_rate(agg.status_counts.present, agg.status_counts.absent);
    Ok(json!({
        "window": window,
        "statusCounts": agg.status_counts,
        "byDate": agg.by_date,
        "daily": agg.daily,
        "attendanceRate": rate,
    }))
}

fn dashboard_summary(conn: &Connection, today: NaiveDate) -> Result<Value> {
    let filter = AttendanceFilter {
        date: Some(today),
        ..AttendanceFilter::default()
    };
    let rows = attendance::query(conn, &filter, Order::Chronological)?;
    let counts = calc::aggregate_rows(&rows).status_counts;
    Ok(json!({
        "date": today,
        "classCount": classes::count(conn)?,
        "studentCount": students::count(conn)?,
        "today": counts,
        "recordedToday": counts.total(),
        "attendanceRate": calc::attendance_rate(counts.present, counts.absent),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let default_days = state.config.charts.default_days;
    match req.method.as_str() {
        "charts.attendance" => Some(with_conn(state, req, |c, p| {
            charts_attendance(c, p, default_days, calc::today())
        })),
        "dashboard.summary" => Some(with_conn(state, req, |c, _| {
            dashboard_summary(c, calc::today())
        })),
        _ => None,
    }
}
