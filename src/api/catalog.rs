// src/api/catalog.rs

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::auth::{identity_from_request, Identity};
use crate::error::ShopError;
use crate::{db, AppState};

/// Item form: scalar fields plus the key pool as raw text, one key per line.
/// Blank lines are ignored; every key is trimmed before insert.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ItemPayload {
    pub name: String,
    pub developer: String,
    pub year: i32,
    pub price: f64,
    pub keys: String,
}

impl ItemPayload {
    fn validate(&self) -> Result<(String, String, Vec<String>), ShopError> {
        let name = self.name.trim();
        let developer = self.developer.trim();
        if name.is_empty() || developer.is_empty() {
            return Err(ShopError::Validation(
                "name and developer must not be blank".into(),
            ));
        }
        if !(2000..=2100).contains(&self.year) {
            return Err(ShopError::Validation(
                "year must be between 2000 and 2100".into(),
            ));
        }
        if self.price <= 0.0 {
            return Err(ShopError::Validation("price must be positive".into()));
        }
        let keys = split_key_lines(&self.keys);
        if keys.is_empty() {
            return Err(ShopError::Validation(
                "at least one license key is required".into(),
            ));
        }
        Ok((name.to_string(), developer.to_string(), keys))
    }
}

pub fn split_key_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[utoipa::path(
    get,
    path = "/loja",
    responses((status = 200, description = "Catalog with available-key counts and caller's cart count")),
    tag = "catalog"
)]
#[get("/loja")]
pub async fn list_catalog(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ShopError> {
    let items = db::list_catalog(&state.pool).await?;

    // Anonymous callers get a zero cart count; a valid bearer token is
    // honored even though the listing itself is public.
    let cart_count = match identity_from_request(&req) {
        Some(identity) => db::count_cart(&state.pool, identity.user_id).await?,
        None => 0,
    };

    Ok(HttpResponse::Ok().json(json!({ "items": items, "cart_count": cart_count })))
}

#[utoipa::path(
    post,
    path = "/loja/adicionar",
    request_body = ItemPayload,
    responses(
        (status = 200, description = "Item and key batch created"),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "A submitted key already exists somewhere in the system")
    ),
    tag = "catalog",
    security(("bearer" = []))
)]
#[post("/loja/adicionar")]
pub async fn create_item(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
    payload: web::Json<ItemPayload>,
) -> Result<HttpResponse, ShopError> {
    identity.require_admin()?;
    let (name, developer, keys) = payload.validate()?;

    // Item and the whole key batch land in one transaction: a duplicate
    // key string aborts everything, never a partial insert.
    let mut tx = state.pool.begin().await?;
    let item_id = db::insert_item(&mut *tx, &name, &developer, payload.year, payload.price).await?;
    for key in &keys {
        db::insert_key(&mut *tx, item_id, key)
            .await
            .map_err(ShopError::from_key_insert)?;
    }
    tx.commit().await?;

    log::info!("item {item_id} created with {} keys", keys.len());
    Ok(HttpResponse::Ok().json(json!({ "item_id": item_id, "keys": keys.len() })))
}

#[utoipa::path(
    put,
    path = "/loja/editar/{id}",
    request_body = ItemPayload,
    responses(
        (status = 200, description = "Item overwritten, key pool replaced"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Unknown item"),
        (status = 409, description = "A submitted key already exists somewhere in the system")
    ),
    tag = "catalog",
    security(("bearer" = []))
)]
#[put("/loja/editar/{id}")]
pub async fn edit_item(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
    path: web::Path<i32>,
    payload: web::Json<ItemPayload>,
) -> Result<HttpResponse, ShopError> {
    identity.require_admin()?;
    let item_id = path.into_inner();
    let (name, developer, keys) = payload.validate()?;

    // Destructive replace-all: every existing key for the item is dropped,
    // availability history included, and the submitted batch is inserted
    // fresh. Receipts pointing at a dropped key keep the row but lose the
    // reference (ON DELETE SET NULL).
    let mut tx = state.pool.begin().await?;
    if !db::update_item(&mut *tx, item_id, &name, &developer, payload.year, payload.price).await? {
        return Err(ShopError::NotFound);
    }
    db::delete_keys_for_item(&mut *tx, item_id).await?;
    for key in &keys {
        db::insert_key(&mut *tx, item_id, key)
            .await
            .map_err(ShopError::from_key_insert)?;
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({ "item_id": item_id, "keys": keys.len() })))
}

#[utoipa::path(
    delete,
    path = "/loja/apagar/{id}",
    responses(
        (status = 200, description = "Item and its keys deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Unknown item")
    ),
    tag = "catalog",
    security(("bearer" = []))
)]
#[delete("/loja/apagar/{id}")]
pub async fn delete_item(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ShopError> {
    identity.require_admin()?;
    let item_id = path.into_inner();

    let mut tx = state.pool.begin().await?;
    db::delete_keys_for_item(&mut *tx, item_id).await?;
    if !db::delete_item(&mut *tx, item_id).await? {
        return Err(ShopError::NotFound);
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": item_id })))
}
