use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Shipment status enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ShipmentStatus {
    #[sea_orm(string_value = "pending")]
    #[serde(rename = "pending")]
    Pending,

    #[sea_orm(string_value = "in-transit")]
    #[serde(rename = "in-transit")]
    InTransit,

    #[sea_orm(string_value = "delivered")]
    #[serde(rename = "delivered")]
    Delivered,

    #[sea_orm(string_value = "delayed")]
    #[serde(rename = "delayed")]
    Delayed,

    #[sea_orm(string_value = "cancelled")]
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl ShipmentStatus {
    /// Canonical wire value, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::InTransit => "in-transit",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Delayed => "delayed",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }

    /// Export label: wire value with the first letter capitalized.
    pub fn label(&self) -> String {
        let raw = self.as_str();
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ShipmentStatus::Pending),
            "in-transit" => Ok(ShipmentStatus::InTransit),
            "delivered" => Ok(ShipmentStatus::Delivered),
            "delayed" => Ok(ShipmentStatus::Delayed),
            "cancelled" => Ok(ShipmentStatus::Cancelled),
            other => Err(format!("Unknown shipment status '{}'", other)),
        }
    }
}

/// Shipment entity model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

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

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

/// Active model behavior for database hooks
#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Assigns the primary key before insert.
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        if insert {
            active_model.id = Set(Uuid::new_v4());
        }
        Ok(active_model)
    }
}

impl Model {
    /// Aging bucket used by the analytics summary.
    pub fn aging_bucket(&self) -> &'static str {
        match self.aging {
            a if a > 30 => "30+ days",
            a if a > 14 => "15-30 days",
            a if a > 7 => "8-14 days",
            a if a > 3 => "4-7 days",
            _ => "0-3 days",
        }
    }
}
