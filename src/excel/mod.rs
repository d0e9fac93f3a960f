//! Spreadsheet import/export pipeline.
//!
//! The importer turns an uploaded workbook into normalized shipment rows with
//! per-row validation; the exporter serializes shipment records back into a
//! downloadable workbook. Both go through the same per-field coercion rules,
//! which are total: unrecognized input falls back to a default instead of
//! failing the cell.

pub mod coerce;
pub mod export;
pub mod filter;
pub mod import;

pub use coerce::CellValue;
pub use export::{export_workbook, DateFormat, ExportOptions};
pub use filter::ShipmentFilter;
pub use import::{import_workbook, ImportOutcome, ParsedShipment};
