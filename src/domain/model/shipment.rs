use crate::domain::payload::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// A material shipment headed to a site.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShipmentInput {
    pub site_id: String,
    pub material_name: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub shipped_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ShipmentInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.site_id.trim().is_empty() {
            return Err("site_id is required".to_string());
        }
        if self.material_name.trim().is_empty() {
            return Err("material_name is required".to_string());
        }
        if let Some(q) = self.quantity {
            if !q.is_finite() || q < 0.0 {
                return Err("quantity must be a non-negative number".to_string());
            }
        }
        if let Some(ts) = &self.shipped_at {
            chrono::DateTime::parse_from_rfc3339(ts)
                .map_err(|_| format!("shipped_at '{ts}' is not an RFC 3339 timestamp"))?;
        }
        Ok(())
    }

    pub fn to_payload(&self) -> Payload {
        let mut p = Payload::new();
        p.insert("site_id", JsonValue::from(self.site_id.trim()));
        p.insert("material_name", JsonValue::from(self.material_name.trim()));
        if let Some(q) = self.quantity {
            p.insert("quantity", JsonValue::from(q));
        }
        let optional_text = [
            ("unit", &self.unit),
            ("status", &self.status),
            ("carrier", &self.carrier),
            ("tracking_number", &self.tracking_number),
            ("shipped_at", &self.shipped_at),
            ("notes", &self.notes),
        ];
        for (column, value) in optional_text {
            if let Some(v) = value {
                p.insert(column, JsonValue::from(v.as_str()));
            }
        }
        p
    }
}
