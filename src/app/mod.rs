pub mod daily_reports;
pub mod error;
pub mod known_columns;
pub mod post_commit;
pub mod salary_snapshots;
pub mod shipment_updater;
pub mod shipments;
pub mod upsert;

pub use daily_reports::DailyReportService;
pub use error::ServiceError;
pub use known_columns::KnownMissingColumns;
pub use salary_snapshots::SalarySnapshotService;
pub use shipments::ShipmentService;
pub use upsert::{AdaptiveUpsert, UpsertError, UpsertOutcome, WriteIntent};
