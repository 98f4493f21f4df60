//! Boundary checks that turn loosely typed request params into typed inputs.
//!
//! Every parser is fail-fast: the first offending field is reported and the
//! rest of the payload is not inspected. Checks that need the store (class or
//! student existence) live in `store`, which runs them before any write.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{AttendanceStatus, Gender};

pub const CLASS_NAME_MAX: usize = 50;
pub const STUDENT_NAME_MIN: usize = 2;
pub const STUDENT_NAME_MAX: usize = 100;
pub const GRADE_MIN: i64 = 1;
pub const GRADE_MAX: i64 = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInput {
    pub name: String,
    pub grade: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentInput {
    pub name: String,
    pub class_id: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceInput {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkAttendanceInput {
    pub date: NaiveDate,
    pub records: Vec<BulkEntry>,
}

impl BulkAttendanceInput {
    /// Each entry stamped with the shared batch date.
    pub fn stamped(&self) -> Vec<AttendanceInput> {
        self.records
            .iter()
            .map(|r| AttendanceInput {
                student_id: r.student_id.clone(),
                date: self.date,
                status: r.status,
            })
            .collect()
    }
}

pub fn class(params: &Value) -> Result<ClassInput> {
    let name = required_trimmed(params, "name")?;
    if name.is_empty() {
        return Err(Error::validation("name", "must not be empty"));
    }
    if name.chars().count() > CLASS_NAME_MAX {
        return Err(Error::validation(
            "name",
            format!("must be at most {} characters", CLASS_NAME_MAX),
        ));
    }
    let grade = required_int(params, "grade")?;
    if !(GRADE_MIN..=GRADE_MAX).contains(&grade) {
        return Err(Error::validation(
            "grade",
            format!("must be between {} and {}", GRADE_MIN, GRADE_MAX),
        ));
    }
    Ok(ClassInput { name, grade })
}

pub fn student(params: &Value, today: NaiveDate) -> Result<StudentInput> {
    let name = required_trimmed(params, "name")?;
    let len = name.chars().count();
    if !(STUDENT_NAME_MIN..=STUDENT_NAME_MAX).contains(&len) {
        return Err(Error::validation(
            "name",
            format!(
                "must be between {} and {} characters",
                STUDENT_NAME_MIN, STUDENT_NAME_MAX
            ),
        ));
    }
    let class_id = required_id(params, "classId")?;
    let gender = required_trimmed(params, "gender")?
        .parse::<Gender>()
        .map_err(|_| Error::validation("gender", "must be one of: Male, Female"))?;
    let date_of_birth = required_date(params, "dateOfBirth")?;
    if date_of_birth > today {
        return Err(Error::validation("dateOfBirth", "must not be in the future"));
    }
    Ok(StudentInput {
        name,
        class_id,
        gender,
        date_of_birth,
    })
}

pub fn attendance(params: &Value) -> Result<AttendanceInput> {
    let student_id = required_id(params, "studentId")?;
    let date = required_date(params, "date")?;
    let status = parse_status("status", params.get("status"))?;
    Ok(AttendanceInput {
        student_id,
        date,
        status,
    })
}

pub fn bulk_attendance(params: &Value) -> Result<BulkAttendanceInput> {
    let date = required_date(params, "date")?;
    let Some(items) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(Error::validation("records", "must be an array"));
    };
    if items.is_empty() {
        return Err(Error::validation("records", "must not be empty"));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let id_field = format!("records[{}].studentId", i);
        let student_id = item
            .get("studentId")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::validation(id_field.clone(), "is required"))?;
        if !seen.insert(student_id) {
            return Err(Error::validation(
                id_field,
                format!("duplicate student {} in batch", student_id),
            ));
        }
        let status = parse_status(&format!("records[{}].status", i), item.get("status"))?;
        records.push(BulkEntry {
            student_id: student_id.to_string(),
            status,
        });
    }
    Ok(BulkAttendanceInput { date, records })
}

pub fn parse_status(field: &str, v: Option<&Value>) -> Result<AttendanceStatus> {
    v.and_then(|v| v.as_str())
        .and_then(|s| s.trim().parse::<AttendanceStatus>().ok())
        .ok_or_else(|| {
            Error::validation(field, "must be one of: Present, Absent, Late, Excused")
        })
}

/// Strict `YYYY-MM-DD`; chrono alone would accept `2024-1-5`.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    let invalid = || Error::validation(field, "must be a date in YYYY-MM-DD form");
    if raw.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())
}

pub fn required_date(params: &Value, key: &str) -> Result<NaiveDate> {
    let raw = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::validation(key, "is required"))?;
    parse_date(key, raw)
}

/// Missing, null and empty strings all mean "no filter".
pub fn optional_date(params: &Value, key: &str) -> Result<Option<NaiveDate>> {
    match optional_str(params, key) {
        Some(raw) => parse_date(key, &raw).map(Some),
        None => Ok(None),
    }
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn optional_u32(params: &Value, key: &str) -> Result<Option<u32>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| Error::validation(key, "must be a non-negative integer")),
    }
}

pub fn required_id(params: &Value, key: &str) -> Result<String> {
    optional_str(params, key).ok_or_else(|| Error::validation(key, "is required"))
}

fn required_trimmed(params: &Value, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::validation(key, "is required"))
}

/// Form inputs arrive as numbers or numeric strings.
fn required_int(params: &Value, key: &str) -> Result<i64> {
    match params.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| Error::validation(key, "must be an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::validation(key, "must be an integer")),
        _ => Err(Error::validation(key, "is required")),
    }
}
