use crate::domain::model::is_safe_segment;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SalaryLine {
    pub label: String,
    pub amount: f64,
}

/// Payroll figures for one worker, site and month, frozen at issuance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SalarySnapshotInput {
    pub site_id: String,
    pub worker_id: String,
    /// `YYYY-MM`
    pub period: String,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub earnings: Vec<SalaryLine>,
    #[serde(default)]
    pub deductions: Vec<SalaryLine>,
}

impl SalarySnapshotInput {
    pub fn validate(&self) -> Result<(), String> {
        if !is_safe_segment(&self.site_id) {
            return Err(format!("site_id '{}' must be 1-64 of [A-Za-z0-9_-]", self.site_id));
        }
        if !is_safe_segment(&self.worker_id) {
            return Err(format!("worker_id '{}' must be 1-64 of [A-Za-z0-9_-]", self.worker_id));
        }
        if NaiveDate::parse_from_str(&format!("{}-01", self.period), "%Y-%m-%d").is_err() {
            return Err(format!("period '{}' is not a YYYY-MM month", self.period));
        }
        for line in self.earnings.iter().chain(&self.deductions) {
            if !line.amount.is_finite() {
                return Err(format!("amount for '{}' is not a finite number", line.label));
            }
        }
        Ok(())
    }

    pub fn gross_total(&self) -> f64 {
        self.earnings.iter().map(|l| l.amount).sum()
    }

    pub fn net_total(&self) -> f64 {
        self.gross_total() - self.deductions.iter().map(|l| l.amount).sum::<f64>()
    }

    /// The document stored as the snapshot blob.
    pub fn to_document(&self, issued_at: &str) -> JsonValue {
        json!({
            "site_id": self.site_id,
            "worker_id": self.worker_id,
            "worker_name": self.worker_name,
            "period": self.period,
            "earnings": self.earnings,
            "deductions": self.deductions,
            "gross_total": self.gross_total(),
            "net_total": self.net_total(),
            "issued_at": issued_at,
        })
    }
}
