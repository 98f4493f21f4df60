use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::now_stamp;
use crate::error::{Error, Result};
use crate::model::{AttendanceRow, AttendanceStatus, ClassDateEntry, Pagination, StudentRef};
use crate::store::{classes, students};
use crate::validate::{AttendanceInput, BulkAttendanceInput};

const ATTENDANCE_FROM: &str = " FROM attendance a
     JOIN students s ON s.id = a.student_id
     JOIN classes c ON c.id = s.class_id";

const ATTENDANCE_COLUMNS: &str = "SELECT
       a.id, a.date, a.status, a.created_at, a.updated_at,
       s.id, s.name, s.gender, c.id, c.name, c.grade";

/// AND-combined attendance filter. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceFilter {
    pub student_id: Option<String>,
    pub class_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    /// `None` returns every matching row.
    pub limit: Option<u32>,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// date, then creation time, then insertion order; all descending.
    NewestFirst,
    Chronological,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Order::NewestFirst => " ORDER BY a.date DESC, a.created_at DESC, a.rowid DESC",
            Order::Chronological => " ORDER BY a.date ASC, a.created_at ASC, a.rowid ASC",
        }
    }
}

impl AttendanceFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(student_id) = &self.student_id {
            clauses.push("a.student_id = ?");
            args.push(Value::Text(student_id.clone()));
        }
        if let Some(class_id) = &self.class_id {
            clauses.push("s.class_id = ?");
            args.push(Value::Text(class_id.clone()));
        }
        if let Some(date) = self.date {
            clauses.push("a.date = ?");
            args.push(date_value(date));
        }
        if let Some(start) = self.start_date {
            clauses.push("a.date >= ?");
            args.push(date_value(start));
        }
        if let Some(end) = self.end_date {
            clauses.push("a.date <= ?");
            args.push(date_value(end));
        }
        if let Some(status) = self.status {
            clauses.push("a.status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        if clauses.is_empty() {
            (String::new(), args)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), args)
        }
    }
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}

fn row_to_attendance(row: &Row) -> rusqlite::Result<AttendanceRow> {
    Ok(AttendanceRow {
        id: row.get(0)?,
        date: row.get(1)?,
        status: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        student: StudentRef {
            id: row.get(5)?,
            name: row.get(6)?,
            gender: row.get(7)?,
            class_id: row.get(8)?,
            class_name: row.get(9)?,
            grade: row.get(10)?,
        },
    })
}

pub fn query(conn: &Connection, filter: &AttendanceFilter, order: Order) -> Result<Vec<AttendanceRow>> {
    let (where_sql, mut args) = filter.where_clause();
    let mut sql = format!("{}{}{}{}", ATTENDANCE_COLUMNS, ATTENDANCE_FROM, where_sql, order.sql());
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ? OFFSET ?");
        args.push(Value::Integer(i64::from(limit)));
        args.push(Value::Integer(i64::from(filter.offset)));
    }
    debug!(sql = %sql, "attendance query");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), row_to_attendance)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection, filter: &AttendanceFilter) -> Result<i64> {
    let (where_sql, args) = filter.where_clause();
    let sql = format!("SELECT COUNT(*){}{}", ATTENDANCE_FROM, where_sql);
    Ok(conn.query_row(&sql, params_from_iter(args.iter()), |r| r.get(0))?)
}

/// One page in default order, plus the pagination echo.
pub fn list(conn: &Connection, filter: &AttendanceFilter) -> Result<(Vec<AttendanceRow>, Pagination)> {
    let rows = query(conn, filter, Order::NewestFirst)?;
    let total = count(conn, filter)?;
    Ok((
        rows,
        Pagination {
            limit: filter.limit.unwrap_or(0),
            offset: filter.offset,
            total,
        },
    ))
}

pub fn find(conn: &Connection, student_id: &str, date: NaiveDate) -> Result<Option<AttendanceRow>> {
    let sql = format!(
        "{}{} WHERE a.student_id = ? AND a.date = ?",
        ATTENDANCE_COLUMNS, ATTENDANCE_FROM
    );
    Ok(conn
        .query_row(&sql, (student_id, date), row_to_attendance)
        .optional()?)
}

fn upsert(conn: &Connection, input: &AttendanceInput) -> Result<AttendanceRow> {
    let stamp = now_stamp();
    conn.execute(
        "INSERT INTO attendance(id, student_id, date, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET
           status = excluded.status,
           updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            &input.student_id,
            input.date,
            input.status,
            &stamp,
            &stamp,
        ),
    )?;
    find(conn, &input.student_id, input.date)?
        .ok_or_else(|| Error::not_found("attendance", &input.student_id))
}

/// Insert or overwrite the record for `(student, date)`.
pub fn record(conn: &Connection, input: &AttendanceInput) -> Result<AttendanceRow> {
    if !students::exists(conn, &input.student_id)? {
        return Err(Error::not_found("student", &input.student_id));
    }
    let row = upsert(conn, input)?;
    info!(
        student_id = %input.student_id,
        date = %input.date,
        status = %input.status,
        "attendance recorded"
    );
    Ok(row)
}

/// All-or-nothing batch write for one date.
///
/// Every referenced student must exist before anything is written; the
/// upserts then run inside one transaction, so a store error on any row
/// leaves the batch unapplied.
pub fn record_bulk(conn: &Connection, input: &BulkAttendanceInput) -> Result<Vec<AttendanceRow>> {
    let records = input.stamped();
    let ids: Vec<&str> = records.iter().map(|r| r.student_id.as_str()).collect();
    let found = students::existing_ids(conn, &ids)?;
    if found.len() != ids.len() {
        let missing: Vec<&str> = ids
            .iter()
            .copied()
            .filter(|id| !found.contains(*id))
            .collect();
        warn!(missing = ?missing, "bulk attendance rejected");
        return Err(Error::not_found("student", missing.join(", ")));
    }

    let tx = conn.unchecked_transaction()?;
    let mut rows = Vec::with_capacity(records.len());
    for r in &records {
        rows.push(upsert(&tx, r)?);
    }
    tx.commit()?;
    info!(date = %input.date, count = rows.len(), "bulk attendance recorded");
    Ok(rows)
}

/// Every student of the class with their record for `date`, or `None`
/// where nothing has been recorded yet.
pub fn class_date_view(conn: &Connection, class_id: &str, date: NaiveDate) -> Result<Vec<ClassDateEntry>> {
    classes::get(conn, class_id)?;
    let roster = students::list_for_class(conn, class_id)?;
    let filter = AttendanceFilter {
        class_id: Some(class_id.to_string()),
        date: Some(date),
        ..AttendanceFilter::default()
    };
    let mut by_student: HashMap<String, AttendanceRow> = query(conn, &filter, Order::NewestFirst)?
        .into_iter()
        .map(|row| (row.student.id.clone(), row))
        .collect();

    Ok(roster
        .into_iter()
        .map(|student| {
            let attendance = by_student.remove(&student.id);
            ClassDateEntry {
                student,
                attendance,
            }
        })
        .collect())
}
