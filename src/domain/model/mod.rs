//! Request-level records accepted by the services.

pub mod daily_report;
pub mod salary;
pub mod shipment;

pub use daily_report::{DailyReportInput, MaterialUsage, PhotoAttachment, ReportStatus};
pub use salary::{SalaryLine, SalarySnapshotInput};
pub use shipment::ShipmentInput;

use chrono::NaiveDate;

pub(crate) fn parse_work_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Site and worker ids end up in blob keys; keep them to a safe alphabet.
pub(crate) fn is_safe_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
