use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::model::{AttendanceRow, AttendanceStatus};

/// Calendar date in the process's local time zone.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "Present")]
    pub present: u32,
    #[serde(rename = "Absent")]
    pub absent: u32,
    #[serde(rename = "Late")]
    pub late: u32,
    #[serde(rename = "Excused")]
    pub excused: u32,
}

impl StatusCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    pub fn get(&self, status: AttendanceStatus) -> u32 {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Late => self.late,
            AttendanceStatus::Excused => self.excused,
        }
    }

    pub fn total(&self) -> u32 {
        self.present + self.absent + self.late + self.excused
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub status_counts: StatusCounts,
    /// `YYYY-MM-DD` → counts for that date.
    pub by_date: BTreeMap<String, StatusCounts>,
    /// One entry per date, in the order dates were first seen.
    pub daily: Vec<DailySummary>,
}

/// Tally a flat sequence of `(date, status)` pairs.
///
/// Dates with no rows do not appear in the output.
pub fn aggregate<I>(rows: I) -> Aggregation
where
    I: IntoIterator<Item = (NaiveDate, AttendanceStatus)>,
{
    let mut status_counts = StatusCounts::default();
    let mut order: Vec<NaiveDate> = Vec::new();
    let mut per_date: HashMap<NaiveDate, StatusCounts> = HashMap::new();

    for (date, status) in rows {
        status_counts.add(status);
        per_date
            .entry(date)
            .or_insert_with(|| {
                order.push(date);
                StatusCounts::default()
            })
            .add(status);
    }

    let daily: Vec<DailySummary> = order
        .iter()
        .map(|date| {
            let counts = per_date[date];
            DailySummary {
                date: *date,
                counts,
                total: counts.total(),
            }
        })
        .collect();
    let by_date = per_date
        .into_iter()
        .map(|(date, counts)| (date.format("%Y-%m-%d").to_string(), counts))
        .collect();

    Aggregation {
        status_counts,
        by_date,
        daily,
    }
}

pub fn aggregate_rows(rows: &[AttendanceRow]) -> Aggregation {
    aggregate(rows.iter().map(|r| (r.date, r.status)))
}

/// Present share of (present + absent) as a whole percentage; 0 when
/// nobody was marked either way.
pub fn attendance_rate(present: u32, absent: u32) -> u32 {
    let denom = present + absent;
    if denom == 0 {
        return 0;
    }
    (100.0 * f64::from(present) / f64::from(denom)).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
}

/// The previous `days` days ending at `today`, both ends inclusive.
pub fn chart_window(today: NaiveDate, days: u32) -> Window {
    let start_date = today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    Window {
        start_date,
        end_date: today,
        days,
    }
}

/// Whole years between `dob` and `today`, counting a year as 365.25 days.
pub fn age_in_years(dob: NaiveDate, today: NaiveDate) -> i64 {
    let days = (today - dob).num_days();
    (days as f64 / 365.25).floor() as i64
}
