use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::shipment::{self, ShipmentStatus};
use crate::errors::ServiceError;
use crate::excel::ShipmentFilter;

/// Normalized shipment payload for create/update/bulk operations.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShipmentData {
    #[validate(length(min = 1, message = "Shipment ID is required"))]
    pub shipment_id: String,
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "Item ID is required"))]
    pub item_id: String,
    #[validate(length(min = 1, message = "SKU ID is required"))]
    pub sku_id: String,
    #[serde(default)]
    pub reason: String,
    #[validate(range(min = 0, message = "Aging cannot be negative"))]
    #[serde(default)]
    pub aging: i32,
    pub receiving_date: DateTime<Utc>,
    #[serde(default)]
    pub photos_received: bool,
    pub status: ShipmentStatus,
    #[serde(default)]
    pub checked: bool,
}

impl ShipmentData {
    fn apply(self, active: &mut shipment::ActiveModel, now: DateTime<Utc>) {
        active.shipment_id = Set(self.shipment_id);
        active.order_id = Set(self.order_id);
        active.item_id = Set(self.item_id);
        active.sku_id = Set(self.sku_id);
        active.reason = Set(self.reason);
        active.aging = Set(self.aging);
        active.receiving_date = Set(self.receiving_date);
        active.photos_received = Set(self.photos_received);
        active.status = Set(self.status);
        active.checked = Set(self.checked);
        active.updated_at = Set(now);
    }
}

/// Case-insensitive literal substring condition over the searchable
/// columns. Matches [`ShipmentFilter::matches`]: the term is lowercased
/// and LIKE metacharacters are escaped so user input never acts as a
/// wildcard.
fn search_condition(search: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
    let column_like = |column: shipment::Column| {
        Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(&pattern).escape('\\'))
    };
    Condition::any()
        .add(column_like(shipment::Column::ShipmentId))
        .add(column_like(shipment::Column::OrderId))
        .add(column_like(shipment::Column::ItemId))
        .add(column_like(shipment::Column::SkuId))
        .add(column_like(shipment::Column::Reason))
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Analytics summary for the dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub photos_received: u64,
    pub photos_pending: u64,
    pub aging_buckets: BTreeMap<String, u64>,
    pub average_aging: f64,
}

/// Service for managing shipment records
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
}

impl ShipmentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Creates a new shipment record
    #[instrument(skip(self, data))]
    pub async fn create_shipment(&self, data: ShipmentData) -> Result<shipment::Model, ServiceError> {
        data.validate()?;
        let db = &*self.db_pool;
        let now = Utc::now();

        let mut active = shipment::ActiveModel {
            created_at: Set(now),
            ..Default::default()
        };
        data.apply(&mut active, now);

        let created = active.insert(db).await.map_err(ServiceError::db_error)?;
        Ok(created)
    }

    /// Gets a shipment by ID
    #[instrument(skip(self))]
    pub async fn get_shipment(&self, id: Uuid) -> Result<Option<shipment::Model>, ServiceError> {
        let db = &*self.db_pool;
        let found = shipment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(found)
    }

    /// Full update of an existing shipment; fails if the id is unknown
    #[instrument(skip(self, data))]
    pub async fn update_shipment(
        &self,
        id: Uuid,
        data: ShipmentData,
    ) -> Result<shipment::Model, ServiceError> {
        data.validate()?;
        let db = &*self.db_pool;

        let model = shipment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", id)))?;

        let mut active: shipment::ActiveModel = model.into();
        data.apply(&mut active, Utc::now());

        let updated = active.update(db).await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }

    /// Deletes a shipment; fails if the id is unknown
    #[instrument(skip(self))]
    pub async fn delete_shipment(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let result = shipment::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Shipment {} not found", id)));
        }
        Ok(())
    }

    /// Inserts a whole batch atomically; a failed row rolls the batch back
    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    pub async fn bulk_create_shipments(
        &self,
        batch: Vec<ShipmentData>,
    ) -> Result<Vec<shipment::Model>, ServiceError> {
        for data in &batch {
            data.validate()?;
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let created = db
            .transaction::<_, Vec<shipment::Model>, sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    let mut created = Vec::with_capacity(batch.len());
                    for data in batch {
                        let mut active = shipment::ActiveModel {
                            created_at: Set(now),
                            ..Default::default()
                        };
                        data.apply(&mut active, now);
                        created.push(active.insert(txn).await?);
                    }
                    Ok(created)
                })
            })
            .await
            .map_err(|e| match e {
                sea_orm::TransactionError::Connection(e) => ServiceError::DatabaseError(e),
                sea_orm::TransactionError::Transaction(e) => ServiceError::DatabaseError(e),
            })?;

        Ok(created)
    }

    /// Lists shipments with pagination, most-recently-created first
    #[instrument(skip(self, filter))]
    pub async fn list_shipments(
        &self,
        page: u64,
        limit: u64,
        filter: &ShipmentFilter,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = shipment::Entity::find();

        if let Some(status) = filter.status.as_deref().filter(|s| *s != "all") {
            match status.parse::<ShipmentStatus>() {
                Ok(parsed) => query = query.filter(shipment::Column::Status.eq(parsed)),
                // Unknown status matches nothing.
                Err(_) => return Ok((vec![], 0)),
            }
        }

        if let Some(photos) = filter.photos_received.as_deref().filter(|p| *p != "all") {
            query = query.filter(shipment::Column::PhotosReceived.eq(photos == "yes"));
        }

        if let Some(from) = filter.date_from {
            query = query.filter(shipment::Column::ReceivingDate.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(shipment::Column::ReceivingDate.lte(to));
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.filter(search_condition(search));
        }

        let paginator = query
            .order_by_desc(shipment::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let records = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((records, total))
    }

    /// Full ordered snapshot for the exporter; the filter predicate is
    /// applied in memory so export shares its semantics with the dashboard.
    #[instrument(skip(self, filter))]
    pub async fn export_snapshot(
        &self,
        filter: &ShipmentFilter,
    ) -> Result<Vec<shipment::Model>, ServiceError> {
        let db = &*self.db_pool;
        let all = shipment::Entity::find()
            .order_by_desc(shipment::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(filter.apply(all))
    }

    /// Dashboard analytics: status/photos breakdowns and aging distribution
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<ShipmentStats, ServiceError> {
        let db = &*self.db_pool;
        let all = shipment::Entity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
        let mut aging_buckets: BTreeMap<String, u64> = BTreeMap::new();
        let mut photos_received = 0u64;
        let mut aging_sum = 0i64;

        for record in &all {
            *by_status.entry(record.status.as_str().to_string()).or_default() += 1;
            *aging_buckets
                .entry(record.aging_bucket().to_string())
                .or_default() += 1;
            if record.photos_received {
                photos_received += 1;
            }
            aging_sum += i64::from(record.aging);
        }

        let total = all.len() as u64;
        let average_aging = if total > 0 {
            aging_sum as f64 / total as f64
        } else {
            0.0
        };

        Ok(ShipmentStats {
            total,
            by_status,
            photos_received,
            photos_pending: total - photos_received,
            aging_buckets,
            average_aging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\temp"), "c:\\\\temp");
        assert_eq!(escape_like("plain"), "plain");
    }
}
