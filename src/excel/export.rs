use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::entities::shipment;
use crate::errors::ServiceError;

/// Sheet name of the produced workbook.
pub const EXPORT_SHEET: &str = "Shipments";

pub const EXPORT_HEADERS: [&str; 12] = [
    "Shipment ID",
    "Order ID",
    "Item ID",
    "SKU ID",
    "Reason",
    "Aging (Days)",
    "Receiving Date",
    "Photos Received",
    "Status",
    "Checked",
    "Created Date",
    "Last Updated",
];

/// Presentation hints only, not semantically significant.
const COLUMN_WIDTHS: [f64; 12] = [
    15.0, 15.0, 15.0, 15.0, 25.0, 12.0, 15.0, 15.0, 12.0, 10.0, 15.0, 15.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// RFC 3339, round-trips through the importer exactly.
    Iso,
    /// Locale-style `M/D/YYYY`, what the dashboard shows.
    #[default]
    Readable,
}

impl DateFormat {
    fn render(&self, value: &DateTime<Utc>) -> String {
        match self {
            DateFormat::Iso => value.to_rfc3339(),
            DateFormat::Readable => value.format("%-m/%-d/%Y").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ExportOptions {
    /// Download filename; generated from the current date when omitted.
    pub filename: Option<String>,
    pub include_headers: bool,
    pub date_format: DateFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            filename: None,
            include_headers: true,
            date_format: DateFormat::default(),
        }
    }
}

impl ExportOptions {
    pub fn resolved_filename(&self, today: DateTime<Utc>) -> String {
        self.filename.clone().unwrap_or_else(|| {
            format!("shipments_export_{}.xlsx", today.format("%Y-%m-%d"))
        })
    }
}

/// Serializes shipment records into workbook bytes.
///
/// Column order and formatting are fixed: booleans render as Yes/No, status
/// as its capitalized label, dates per the requested format. An empty record
/// list still produces a valid workbook.
pub fn export_workbook(
    records: &[shipment::Model],
    options: &ExportOptions,
) -> Result<Vec<u8>, ServiceError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET)?;

    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    let mut next_row: u32 = 0;
    if options.include_headers {
        let header_format = Format::new().set_bold();
        for (col, header) in EXPORT_HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }
        next_row = 1;
    }

    let fmt = options.date_format;
    for record in records {
        let yes_no = |flag: bool| if flag { "Yes" } else { "No" };
        worksheet.write_string(next_row, 0, &record.shipment_id)?;
        worksheet.write_string(next_row, 1, &record.order_id)?;
        worksheet.write_string(next_row, 2, &record.item_id)?;
        worksheet.write_string(next_row, 3, &record.sku_id)?;
        worksheet.write_string(next_row, 4, &record.reason)?;
        worksheet.write_number(next_row, 5, record.aging as f64)?;
        worksheet.write_string(next_row, 6, fmt.render(&record.receiving_date))?;
        worksheet.write_string(next_row, 7, yes_no(record.photos_received))?;
        worksheet.write_string(next_row, 8, record.status.label())?;
        worksheet.write_string(next_row, 9, yes_no(record.checked))?;
        worksheet.write_string(next_row, 10, fmt.render(&record.created_at))?;
        worksheet.write_string(next_row, 11, fmt.render(&record.updated_at))?;
        next_row += 1;
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(rows = records.len(), bytes = bytes.len(), "built export workbook");
    Ok(bytes)
}
