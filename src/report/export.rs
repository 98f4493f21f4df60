//! Report layouts for the attendance and student exports.

use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::calc::{age_in_years, aggregate_rows};
use crate::error::{Error, Result};
use crate::model::{AttendanceRow, AttendanceStatus, Student};
use crate::report::{Cell, ReportBuilder, RowStyle};

pub const ATTENDANCE_COLUMNS: [&str; 5] = ["Date", "Student", "Class", "Grade", "Status"];
pub const STUDENT_COLUMNS: [&str; 6] =
    ["Name", "Class", "Grade", "Gender", "Date of Birth", "Age"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Period {
    #[default]
    OneMonth,
    ThreeMonths,
    /// Semester.
    SixMonths,
    OneYear,
}

impl Period {
    fn months(self) -> u32 {
        match self {
            Period::OneMonth => 1,
            Period::ThreeMonths => 3,
            Period::SixMonths => 6,
            Period::OneYear => 12,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Period::OneMonth => "Last month",
            Period::ThreeMonths => "Last 3 months",
            Period::SixMonths => "Last semester",
            Period::OneYear => "Last year",
        }
    }

    /// `[today - preset, today]`.
    pub fn range(self, today: NaiveDate) -> DateRange {
        let start = today
            .checked_sub_months(Months::new(self.months()))
            .unwrap_or(NaiveDate::MIN);
        DateRange { start, end: today }
    }
}

impl FromStr for Period {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "month" => Ok(Period::OneMonth),
            "3m" | "quarter" => Ok(Period::ThreeMonths),
            "6m" | "semester" => Ok(Period::SixMonths),
            "1y" | "year" => Ok(Period::OneYear),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    #[serde(rename = "startDate")]
    pub start: NaiveDate,
    #[serde(rename = "endDate")]
    pub end: NaiveDate,
}

impl DateRange {
    pub fn describe(&self) -> String {
        format!("Period: {} to {}", self.start, self.end)
    }
}

/// Resolve the export window: explicit bounds override the preset, and a
/// missing bound falls back to the preset's.
pub fn resolve_range(
    period: Period,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<DateRange> {
    let preset = period.range(today);
    let range = DateRange {
        start: start.unwrap_or(preset.start),
        end: end.unwrap_or(preset.end),
    };
    if range.start > range.end {
        return Err(Error::validation("startDate", "must not be after endDate"));
    }
    Ok(range)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Json,
}

impl FromStr for ExportFormat {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "json" => Ok(ExportFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentExportRow {
    #[serde(flatten)]
    pub student: Student,
    pub age: i64,
}

pub fn student_rows(students: Vec<Student>, today: NaiveDate) -> Vec<StudentExportRow> {
    students
        .into_iter()
        .map(|student| StudentExportRow {
            age: age_in_years(student.date_of_birth, today),
            student,
        })
        .collect()
}

fn shading(i: usize) -> RowStyle {
    RowStyle { shaded: i % 2 == 1 }
}

pub fn attendance_report<B: ReportBuilder>(
    mut builder: B,
    rows: &[AttendanceRow],
    range: &DateRange,
) -> Result<Vec<u8>> {
    builder.add_title("Attendance Report");
    builder.add_subtitle(&range.describe());
    builder.add_header(&ATTENDANCE_COLUMNS);
    for (i, row) in rows.iter().enumerate() {
        builder.add_row(
            vec![
                Cell::text(row.date.to_string()),
                Cell::text(row.student.name.as_str()),
                Cell::text(row.student.class_name.as_str()),
                Cell::number(row.student.grade),
                Cell::status(row.status),
            ],
            shading(i),
        );
    }

    let counts = aggregate_rows(rows).status_counts;
    for status in AttendanceStatus::ALL {
        builder.add_summary(status.as_str(), i64::from(counts.get(status)));
    }
    builder.add_summary("Total", i64::from(counts.total()));
    builder.finish()
}

pub fn students_report<B: ReportBuilder>(
    mut builder: B,
    rows: &[StudentExportRow],
    subtitle: &str,
) -> Result<Vec<u8>> {
    builder.add_title("Student Report");
    builder.add_subtitle(subtitle);
    builder.add_header(&STUDENT_COLUMNS);
    for (i, row) in rows.iter().enumerate() {
        let s = &row.student;
        builder.add_row(
            vec![
                Cell::text(s.name.as_str()),
                Cell::text(s.class_name.as_str()),
                Cell::number(s.grade),
                Cell::text(s.gender.as_str()),
                Cell::text(s.date_of_birth.to_string()),
                Cell::number(row.age),
            ],
            shading(i),
        );
    }
    builder.add_summary("Total students", rows.len() as i64);
    builder.finish()
}
