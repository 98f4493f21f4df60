//! Tabular report output.
//!
//! Report layouts (`export`) only talk to the [`ReportBuilder`] capability;
//! the concrete spreadsheet format lives behind it (`xlsx`).

pub mod export;
pub mod xlsx;

use crate::error::Result;
use crate::model::AttendanceStatus;

/// Visual emphasis attached to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    /// Text coloured by attendance status.
    Status(AttendanceStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(i64),
}

impl CellValue {
    /// Display text, used for column sizing.
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub tone: Tone,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            value: CellValue::Text(s.into()),
            tone: Tone::Plain,
        }
    }

    pub fn number(n: i64) -> Self {
        Self {
            value: CellValue::Number(n),
            tone: Tone::Plain,
        }
    }

    pub fn status(status: AttendanceStatus) -> Self {
        Self {
            value: CellValue::Text(status.as_str().to_string()),
            tone: Tone::Status(status),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowStyle {
    /// Alternate-row background.
    pub shaded: bool,
}

pub trait ReportBuilder {
    fn add_title(&mut self, text: &str);
    fn add_subtitle(&mut self, text: &str);
    fn add_header(&mut self, columns: &[&str]);
    fn add_row(&mut self, cells: Vec<Cell>, style: RowStyle);
    /// One `label: value` line of the trailing summary block.
    fn add_summary(&mut self, label: &str, value: i64);
    fn finish(self) -> Result<Vec<u8>>;
}
