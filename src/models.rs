// src/models.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub developer: String,
    pub year: i32,
    pub price: f64,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct LicenseKey {
    pub id: i32,
    pub key: String,
    pub available: bool,
    pub item_id: i32,
}

#[derive(Debug, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

/// Catalog listing row: an item plus how many of its keys are still sellable.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct CatalogEntry {
    pub id: i32,
    pub name: String,
    pub developer: String,
    pub year: i32,
    pub price: f64,
    pub available_keys: i64,
}

/// Cart row joined with its item.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct CartLine {
    pub item_id: i32,
    pub name: String,
    pub developer: String,
    pub year: i32,
    pub price: f64,
    pub added_at: DateTime<Utc>,
}

/// Purchase receipt joined with the item name and the delivered key.
/// `name` and `key` go null if an admin later deletes the item or
/// replaces its key pool; the receipt itself is immutable.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct PurchaseLine {
    pub id: i32,
    pub item_id: Option<i32>,
    pub name: Option<String>,
    pub key: Option<String>,
    pub price_paid: f64,
    pub purchased_at: DateTime<Utc>,
}
