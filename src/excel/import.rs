use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::coerce::{
    coerce_aging, coerce_checked, coerce_photos_received, coerce_receiving_date, coerce_status,
    coerce_text, CellValue,
};
use crate::entities::shipment::ShipmentStatus;

/// Sheet the importer looks for first; falls back to the first sheet.
pub const MASTER_SHEET: &str = "MASTER SHEET";

pub const COL_SHIPMENT_ID: &str = "Shipment Id";
pub const COL_ORDER_ID: &str = "Order Id";
pub const COL_ITEM_ID: &str = "Item ID";
pub const COL_SKU_ID: &str = "SKU ID";
pub const COL_REASON: &str = "REASON";
pub const COL_AGING: &str = "Aging";
pub const COL_RECEIVING_DATE: &str = "RECEIVING DATE";
pub const COL_PHOTOS_RECEIVED: &str = "PHOTOS RECEIVED";
pub const COL_STATUS: &str = "STATUS";
pub const COL_CHECK_BOX: &str = "CHECK BOX";

/// One normalized row parsed from an uploaded workbook. Not yet persisted;
/// `id` is a synthesized key for UI listing only, the database assigns its
/// own identifier on insert.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParsedShipment {
    pub id: String,
    pub shipment_id: String,
    pub order_id: String,
    pub item_id: String,
    pub sku_id: String,
    pub reason: String,
    pub aging: i32,
    pub receiving_date: DateTime<Utc>,
    pub photos_received: bool,
    pub status: ShipmentStatus,
    pub checked: bool,
}

/// Import result: either every row parsed cleanly, or `errors` lists each
/// violation and no records are returned. All-or-nothing by contract, even
/// though validation is per row.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<ParsedShipment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ImportOutcome {
    fn ok(records: Vec<ParsedShipment>) -> Self {
        Self {
            success: true,
            records: Some(records),
            errors: None,
        }
    }

    fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            records: None,
            errors: Some(errors),
        }
    }
}

/// Parses workbook bytes into normalized shipment rows.
///
/// Never touches storage; the caller decides whether to persist the batch.
pub fn import_workbook(bytes: &[u8]) -> ImportOutcome {
    let mut workbook = match open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())) {
        Ok(wb) => wb,
        Err(err) => {
            warn!(error = %err, "rejected unreadable workbook upload");
            return ImportOutcome::failed(vec![
                "Failed to parse the workbook. Check the file format and ensure it contains the required columns."
                    .to_string(),
            ]);
        }
    };

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = if sheet_names.iter().any(|n| n == MASTER_SHEET) {
        MASTER_SHEET.to_string()
    } else {
        match sheet_names.first() {
            Some(first) => first.clone(),
            None => {
                return ImportOutcome::failed(vec![
                    "No worksheets found in the workbook".to_string()
                ])
            }
        }
    };

    let range = match workbook.worksheet_range(&sheet_name) {
        Ok(range) => range,
        Err(err) => {
            warn!(sheet = %sheet_name, error = %err, "failed to read worksheet");
            return ImportOutcome::failed(vec![format!(
                "Failed to read worksheet '{}'",
                sheet_name
            )]);
        }
    };

    let mut rows = range.rows();
    let header_index: HashMap<String, usize> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| match cell {
                Data::String(s) => Some((s.trim().to_string(), idx)),
                Data::Empty => None,
                other => Some((other.to_string(), idx)),
            })
            .collect(),
        None => return ImportOutcome::ok(Vec::new()),
    };

    let batch_millis = Utc::now().timestamp_millis();
    let now = Utc::now();

    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (index, row) in rows.enumerate() {
        // Visual spreadsheet row: 1-based plus the header row.
        let row_number = index + 2;
        let cell = |header: &str| -> CellValue {
            header_index
                .get(header)
                .and_then(|&col| row.get(col))
                .map(CellValue::from)
                .unwrap_or(CellValue::Empty)
        };

        let shipment_id = coerce_text(&cell(COL_SHIPMENT_ID));
        let order_id = coerce_text(&cell(COL_ORDER_ID));
        let item_id = coerce_text(&cell(COL_ITEM_ID));
        let sku_id = coerce_text(&cell(COL_SKU_ID));
        let receiving_date = coerce_receiving_date(&cell(COL_RECEIVING_DATE), now);

        let mut row_errors = Vec::new();
        if shipment_id.is_empty() {
            row_errors.push(format!("Row {}: Missing Shipment ID", row_number));
        }
        if order_id.is_empty() {
            row_errors.push(format!("Row {}: Missing Order ID", row_number));
        }
        if item_id.is_empty() {
            row_errors.push(format!("Row {}: Missing Item ID", row_number));
        }
        if sku_id.is_empty() {
            row_errors.push(format!("Row {}: Missing SKU ID", row_number));
        }
        if receiving_date.is_none() {
            row_errors.push(format!("Row {}: Invalid receiving date format", row_number));
        }

        if row_errors.is_empty() {
            records.push(ParsedShipment {
                id: format!("import-{}-{}", batch_millis, index),
                shipment_id,
                order_id,
                item_id,
                sku_id,
                reason: coerce_text(&cell(COL_REASON)),
                aging: coerce_aging(&cell(COL_AGING)),
                receiving_date: receiving_date.unwrap_or(now),
                photos_received: coerce_photos_received(&cell(COL_PHOTOS_RECEIVED)),
                status: coerce_status(&cell(COL_STATUS)),
                checked: coerce_checked(&cell(COL_CHECK_BOX)),
            });
        } else {
            errors.extend(row_errors);
        }
    }

    if errors.is_empty() {
        debug!(sheet = %sheet_name, rows = records.len(), "workbook import parsed cleanly");
        ImportOutcome::ok(records)
    } else {
        debug!(sheet = %sheet_name, errors = errors.len(), "workbook import rejected");
        ImportOutcome::failed(errors)
    }
}
