use crate::{
    entities::shipment,
    errors::ServiceError,
    excel::{export_workbook, import_workbook, ExportOptions, ImportOutcome, ShipmentFilter},
    services::shipments::{ShipmentData, ShipmentStats},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Case-insensitive substring match on id fields and reason
    pub search: Option<String>,
    /// Status filter; "all" disables it
    pub status: Option<String>,
    /// Photos filter: "yes", "no", or "all"
    pub photos_received: Option<String>,
    /// Inclusive receiving-date lower bound
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive receiving-date upper bound
    pub date_to: Option<DateTime<Utc>>,
}

impl ShipmentListQuery {
    fn filter(&self) -> ShipmentFilter {
        ShipmentFilter {
            search: self.search.clone(),
            status: self.status.clone(),
            photos_received: self.photos_received.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "990e8400-e29b-41d4-a716-446655440000",
    "shipment_id": "SH-1001",
    "order_id": "ORD-2001",
    "item_id": "ITEM-3001",
    "sku_id": "SKU-4001",
    "reason": "Damaged in transit",
    "aging": 5,
    "receiving_date": "2025-08-02T00:00:00Z",
    "photos_received": true,
    "status": "in-transit",
    "checked": false,
    "created_at": "2025-08-02T10:30:00Z",
    "updated_at": "2025-08-02T14:30:00Z"
}))]
pub struct ShipmentSummary {
    /// Record UUID
    pub id: Uuid,
    /// Business shipment identifier
    #[schema(example = "SH-1001")]
    pub shipment_id: String,
    /// Associated order identifier
    #[schema(example = "ORD-2001")]
    pub order_id: String,
    /// Item identifier
    pub item_id: String,
    /// SKU identifier
    pub sku_id: String,
    /// Free-text reason
    pub reason: String,
    /// Days in the warehouse
    pub aging: i32,
    /// When the shipment was received
    pub receiving_date: DateTime<Utc>,
    /// Whether photos have been received
    pub photos_received: bool,
    /// Shipment status (pending, in-transit, delivered, delayed, cancelled)
    #[schema(example = "in-transit")]
    pub status: String,
    /// Whether the record has been reviewed
    pub checked: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<shipment::Model> for ShipmentSummary {
    fn from(model: shipment::Model) -> Self {
        Self {
            id: model.id,
            shipment_id: model.shipment_id,
            order_id: model.order_id,
            item_id: model.item_id,
            sku_id: model.sku_id,
            reason: model.reason,
            aging: model.aging,
            receiving_date: model.receiving_date,
            photos_received: model.photos_received,
            status: model.status.to_string(),
            checked: model.checked,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkCreateRequest {
    #[validate(length(min = 1, message = "At least one shipment is required"))]
    pub shipments: Vec<ShipmentData>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ExportRequest {
    /// Restricts the export to matching records
    pub filter: ShipmentFilter,
    /// Filename and formatting overrides
    pub options: ExportOptions,
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Shipments listed", body = ApiResponse<PaginatedResponse<ShipmentSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (records, total) = state
        .shipment_service()
        .list_shipments(page, limit, &query.filter())
        .await?;

    let items: Vec<ShipmentSummary> = records.into_iter().map(ShipmentSummary::from).collect();

    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/:id",
    params(
        ("id" = Uuid, Path, description = "Shipment record ID")
    ),
    responses(
        (status = 200, description = "Shipment fetched", body = ApiResponse<ShipmentSummary>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    match state.shipment_service().get_shipment(id).await? {
        Some(model) => Ok(Json(ApiResponse::success(ShipmentSummary::from(model)))),
        None => Err(ServiceError::NotFound(format!("Shipment {} not found", id))),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments",
    request_body = ShipmentData,
    responses(
        (status = 200, description = "Shipment created", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    Json(payload): Json<ShipmentData>,
) -> ApiResult<ShipmentSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let created = state.shipment_service().create_shipment(payload).await?;

    Ok(Json(ApiResponse::success(ShipmentSummary::from(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/shipments/:id",
    params(
        ("id" = Uuid, Path, description = "Shipment record ID")
    ),
    request_body = ShipmentData,
    responses(
        (status = 200, description = "Shipment updated", body = ApiResponse<ShipmentSummary>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn update_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShipmentData>,
) -> ApiResult<ShipmentSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let updated = state.shipment_service().update_shipment(id, payload).await?;

    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shipments/:id",
    params(
        ("id" = Uuid, Path, description = "Shipment record ID")
    ),
    responses(
        (status = 200, description = "Shipment deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.shipment_service().delete_shipment(id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/bulk",
    request_body = BulkCreateRequest,
    responses(
        (status = 200, description = "Shipments created atomically", body = ApiResponse<Vec<ShipmentSummary>>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn bulk_create_shipments(
    State(state): State<AppState>,
    Json(payload): Json<BulkCreateRequest>,
) -> ApiResult<Vec<ShipmentSummary>> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    for (index, data) in payload.shipments.iter().enumerate() {
        data.validate().map_err(|e| {
            ServiceError::ValidationError(format!("Shipment {}: {}", index + 1, e))
        })?;
    }

    let created = state
        .shipment_service()
        .bulk_create_shipments(payload.shipments)
        .await?;

    let items: Vec<ShipmentSummary> = created.into_iter().map(ShipmentSummary::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/import",
    request_body(content = String, description = "Workbook in a `file` multipart field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Workbook parsed; outcome carries either records or per-row errors", body = ImportOutcome),
        (status = 400, description = "No file uploaded or upload too large", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn import_shipments(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportOutcome>, ServiceError> {
    let max_bytes = state.config.max_import_bytes;

    let mut upload: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::BadRequest(format!("Failed to read upload: {}", e)))?;
        if data.len() > max_bytes {
            return Err(ServiceError::BadRequest(format!(
                "Upload exceeds the {} byte limit",
                max_bytes
            )));
        }
        upload = Some(data.to_vec());
        break;
    }

    let bytes = upload.ok_or_else(|| {
        ServiceError::BadRequest("No file field found in the upload".to_string())
    })?;

    // Parsing only; nothing is persisted until the client posts the
    // confirmed batch to the bulk endpoint.
    let outcome = import_workbook(&bytes);
    tracing::info!(
        success = outcome.success,
        rows = outcome.records.as_ref().map(Vec::len).unwrap_or(0),
        errors = outcome.errors.as_ref().map(Vec::len).unwrap_or(0),
        "Workbook import parsed"
    );
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/export",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Workbook generated", body = Vec<u8>, content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 500, description = "Workbook generation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn export_shipments(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, ServiceError> {
    let records = state
        .shipment_service()
        .export_snapshot(&request.filter)
        .await?;
    let count = records.len();

    let bytes = export_workbook(&records, &request.options)?;
    let filename = request.options.resolved_filename(Utc::now());
    tracing::info!(records = count, filename = %filename, "Workbook export generated");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|_| ServiceError::ExportError("Invalid export filename".to_string()))?,
    );

    Ok((StatusCode::OK, headers, bytes).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/stats",
    responses(
        (status = 200, description = "Aggregate shipment statistics", body = ApiResponse<ShipmentStats>)
    ),
    tag = "shipments"
)]
pub async fn shipment_stats(State(state): State<AppState>) -> ApiResult<ShipmentStats> {
    let stats = state.shipment_service().stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
