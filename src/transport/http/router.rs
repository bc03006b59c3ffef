use crate::domain::model::{
    DailyReportInput, MaterialUsage, PhotoAttachment, ReportStatus, SalaryLine, SalarySnapshotInput,
    ShipmentInput,
};
use crate::transport::http::handlers::{daily_reports, health, salary_snapshots, shipments};
use crate::transport::http::types::{ApiResponse, AppState, RecordPatch};
use axum::routing::{get, patch, post, put};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        daily_reports::submit_report_handler,
        daily_reports::update_report_handler,
        daily_reports::mobile_list_reports_handler,
        shipments::create_shipment_handler,
        shipments::update_shipment_handler,
        shipments::list_shipments_handler,
        salary_snapshots::issue_snapshot_handler,
        salary_snapshots::get_snapshot_handler
    ),
    components(schemas(
        ApiResponse,
        RecordPatch,
        DailyReportInput,
        ReportStatus,
        MaterialUsage,
        PhotoAttachment,
        ShipmentInput,
        SalarySnapshotInput,
        SalaryLine
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/api/daily-reports", post(daily_reports::submit_report_handler))
        .route("/api/daily-reports/:id", put(daily_reports::update_report_handler))
        .route(
            "/api/mobile/daily-reports",
            get(daily_reports::mobile_list_reports_handler),
        )
        .route(
            "/api/shipments",
            post(shipments::create_shipment_handler).get(shipments::list_shipments_handler),
        )
        .route("/api/shipments/:id", patch(shipments::update_shipment_handler))
        .route("/api/salary-snapshots", post(salary_snapshots::issue_snapshot_handler))
        .route("/api/salary-snapshots/:id", get(salary_snapshots::get_snapshot_handler))
        .with_state(app_state)
}
