pub mod router;
pub mod types;
pub mod handlers {
    pub mod common;
    pub mod daily_reports;
    pub mod health;
    pub mod salary_snapshots;
    pub mod shipments;
}

pub use router::{create_router, ApiDoc};
pub use types::AppState;
