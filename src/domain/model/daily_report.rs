use crate::domain::model::parse_work_date;
use crate::domain::payload::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Submitted => "submitted",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ReportStatus::Draft),
            "submitted" => Ok(ReportStatus::Submitted),
            "approved" => Ok(ReportStatus::Approved),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(format!("unknown report status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialUsage {
    pub material_name: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhotoAttachment {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// A daily work report as submitted from the field.
///
/// One report exists per (site, work date); submitting again for the same pair
/// updates it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyReportInput {
    pub site_id: String,
    /// ISO date, `YYYY-MM-DD`.
    pub work_date: String,
    #[serde(default)]
    pub status: Option<ReportStatus>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub headcount: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Structured description of the work performed.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub work_content: Option<JsonValue>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub location: Option<JsonValue>,
    #[serde(default)]
    pub materials: Vec<MaterialUsage>,
    #[serde(default)]
    pub photos: Vec<PhotoAttachment>,
}

impl DailyReportInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.site_id.trim().is_empty() {
            return Err("site_id is required".to_string());
        }
        if parse_work_date(&self.work_date).is_none() {
            return Err(format!("work_date '{}' is not a YYYY-MM-DD date", self.work_date));
        }
        if let Some(h) = self.headcount {
            if h < 0 {
                return Err("headcount cannot be negative".to_string());
            }
        }
        for (idx, m) in self.materials.iter().enumerate() {
            if m.material_name.trim().is_empty() {
                return Err(format!("materials[{idx}].material_name is required"));
            }
            if !m.quantity.is_finite() || m.quantity < 0.0 {
                return Err(format!("materials[{idx}].quantity must be a non-negative number"));
            }
        }
        for (idx, p) in self.photos.iter().enumerate() {
            if p.url.trim().is_empty() {
                return Err(format!("photos[{idx}].url is required"));
            }
        }
        Ok(())
    }

    /// Columns of the `daily_reports` row. Materials and photos are written separately.
    pub fn to_payload(&self) -> Payload {
        let mut p = Payload::new();
        p.insert("site_id", JsonValue::from(self.site_id.trim()));
        if let Some(date) = parse_work_date(&self.work_date) {
            p.insert("work_date", JsonValue::from(date.format("%Y-%m-%d").to_string()));
        }
        if let Some(status) = self.status {
            p.insert("status", JsonValue::from(status.as_str()));
        }
        let optional_text = [
            ("author_name", &self.author_name),
            ("weather", &self.weather),
            ("notes", &self.notes),
        ];
        for (column, value) in optional_text {
            if let Some(v) = value {
                p.insert(column, JsonValue::from(v.as_str()));
            }
        }
        if let Some(h) = self.headcount {
            p.insert("headcount", JsonValue::from(h));
        }
        if let Some(v) = &self.work_content {
            p.insert("work_content", v.clone());
        }
        if let Some(v) = &self.location {
            p.insert("location", v.clone());
        }
        p
    }
}
