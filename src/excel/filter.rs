use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::shipment;

/// Dashboard filter predicate, shared by the live list view and
/// "export filtered" so both go through one code path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ShipmentFilter {
    /// Case-insensitive substring match on the id fields and reason.
    pub search: Option<String>,
    /// Exact status match; `"all"` (or absent) disables the filter.
    pub status: Option<String>,
    /// `"yes"` / `"no"`; `"all"` (or absent) disables the filter.
    pub photos_received: Option<String>,
    /// Inclusive receiving-date lower bound.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive receiving-date upper bound.
    pub date_to: Option<DateTime<Utc>>,
}

impl ShipmentFilter {
    pub fn matches(&self, record: &shipment::Model) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let term = search.to_lowercase();
            let hit = record.shipment_id.to_lowercase().contains(&term)
                || record.order_id.to_lowercase().contains(&term)
                || record.item_id.to_lowercase().contains(&term)
                || record.sku_id.to_lowercase().contains(&term)
                || record.reason.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }

        if let Some(status) = self.status.as_deref().filter(|s| *s != "all") {
            if record.status.as_str() != status {
                return false;
            }
        }

        if let Some(photos) = self.photos_received.as_deref().filter(|p| *p != "all") {
            if record.photos_received != (photos == "yes") {
                return false;
            }
        }

        if let Some(from) = self.date_from {
            if record.receiving_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if record.receiving_date > to {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, records: Vec<shipment::Model>) -> Vec<shipment::Model> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}
