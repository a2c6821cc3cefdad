use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::MonthKey;
use crate::clock::WorkCalendar;
use crate::model::attendance::AttendanceRecord;

/// Rendered in place of any missing value so mixed punch/declaration rows keep
/// their columns aligned.
pub const NOT_AVAILABLE: &str = "N/A";

const HEADERS: [&str; 10] = [
    "Record ID",
    "Employee ID",
    "Employee",
    "Entry date",
    "Entry time",
    "Exit date",
    "Exit time",
    "Origin",
    "Status",
    "Notes",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub record_id: String,
    pub employee_id: String,
    pub employee: String,
    pub entry_date: String,
    pub entry_time: String,
    pub exit_date: String,
    pub exit_time: String,
    pub origin: String,
    pub status: String,
    pub notes: String,
}

fn or_na(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

impl ExportRow {
    pub fn from_record(record: &AttendanceRecord, calendar: &WorkCalendar) -> Self {
        let entry = record.clock_in.map(|t| calendar.local(t));
        let exit = record.clock_out.map(|t| calendar.local(t));
        let employee = format!("{} {}", record.employee_name, record.employee_surname);

        Self {
            record_id: record.id.to_string(),
            employee_id: record.employee_id.to_string(),
            employee: or_na(Some(employee.trim().to_string())),
            // declarations have no clock-in; the day they cover is the entry date
            entry_date: entry
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| record.work_day.format("%Y-%m-%d").to_string()),
            entry_time: or_na(entry.map(|t| t.format("%H:%M:%S").to_string())),
            exit_date: or_na(exit.map(|t| t.format("%Y-%m-%d").to_string())),
            exit_time: or_na(exit.map(|t| t.format("%H:%M:%S").to_string())),
            origin: or_na(
                record
                    .clock_in_origin
                    .clone()
                    .or_else(|| record.clock_out_origin.clone()),
            ),
            status: record.entry.status_str().to_string(),
            notes: or_na(record.notes.clone()),
        }
    }

    fn cells(&self) -> [&str; 10] {
        [
            &self.record_id,
            &self.employee_id,
            &self.employee,
            &self.entry_date,
            &self.entry_time,
            &self.exit_date,
            &self.exit_time,
            &self.origin,
            &self.status,
            &self.notes,
        ]
    }
}

pub fn sheet_name(month: MonthKey) -> String {
    format!("Attendance {month}")
}

/// One workbook, one sheet, header row plus one row per record.
pub fn render_workbook(month: MonthKey, rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(month))?;

    for (col, title) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let line = idx as u32 + 1;
        for (col, value) in row.cells().iter().enumerate() {
            worksheet.write_string(line, col as u16, *value)?;
        }
    }

    worksheet.set_freeze_panes(1, 0)?;

    workbook.save_to_buffer()
}
