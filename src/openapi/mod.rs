use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shipment Tracker API",
        version = "1.0.0",
        description = r#"
# Shipment Tracker API

Backend for a warehouse shipment-tracking dashboard: CRUD over shipment
records plus spreadsheet import/export with field normalization.

## Features

- **Shipment Records**: Create, update, list, and delete shipment records
- **Bulk Create**: Atomically persist a confirmed import batch
- **Workbook Import**: Parse `.xlsx`/`.xls` uploads into normalized rows with per-row validation
- **Workbook Export**: Generate a formatted workbook, optionally restricted by the dashboard filter
- **Statistics**: Status, photo, and aging-bucket aggregates for the dashboard

## Authentication

Session endpoints issue an opaque bearer token with a fixed lifetime:

```
Authorization: Bearer <session-token>
```

## Error Handling

Errors use a consistent JSON shape with appropriate HTTP status codes:

```json
{
  "error": "Bad Request",
  "message": "Validation failed",
  "timestamp": "2025-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100),
plus the filter parameters `search`, `status`, `photos_received`,
`date_from`, and `date_to`.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "shipments", description = "Shipment record and workbook endpoints"),
        (name = "auth", description = "Session endpoints")
    ),
    paths(
        // Shipments
        crate::handlers::shipments::list_shipments,
        crate::handlers::shipments::get_shipment,
        crate::handlers::shipments::create_shipment,
        crate::handlers::shipments::update_shipment,
        crate::handlers::shipments::delete_shipment,
        crate::handlers::shipments::bulk_create_shipments,
        crate::handlers::shipments::import_shipments,
        crate::handlers::shipments::export_shipments,
        crate::handlers::shipments::shipment_stats,

        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::session,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Shipment types
            crate::handlers::shipments::ShipmentSummary,
            crate::handlers::shipments::BulkCreateRequest,
            crate::handlers::shipments::ExportRequest,
            crate::services::shipments::ShipmentData,
            crate::services::shipments::ShipmentStats,
            crate::entities::shipment::ShipmentStatus,
            crate::excel::ShipmentFilter,
            crate::excel::ExportOptions,
            crate::excel::DateFormat,
            crate::excel::ImportOutcome,
            crate::excel::ParsedShipment,

            // Auth types
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::SessionResponse,
            crate::auth::Session,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_paths() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Shipment Tracker API"));
        assert!(json.contains("/api/v1/shipments"));
        assert!(json.contains("/auth/login"));
    }
}
