// src/api/checkout.rs

use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use sqlx::PgConnection;

use crate::api::auth::Identity;
use crate::error::ShopError;
use crate::{db, AppState};

/// One claim-and-record step: mark a key sold, snapshot the item's current
/// price into the receipt, drop a matching cart entry if there is one.
/// Returns None when the item has no available key left.
async fn claim_and_record(
    conn: &mut PgConnection,
    user_id: i32,
    item_id: i32,
) -> Result<Option<i32>, ShopError> {
    let Some(key_id) = db::claim_available_key(conn, item_id).await? else {
        return Ok(None);
    };
    let Some(price) = db::item_price(conn, item_id).await? else {
        return Ok(None);
    };
    db::delete_cart_entry(conn, user_id, item_id).await?;
    let purchase_id = db::insert_purchase(conn, user_id, item_id, key_id, price).await?;
    Ok(Some(purchase_id))
}

#[utoipa::path(
    post,
    path = "/loja/comprar/{id}",
    responses(
        (status = 200, description = "Key claimed, receipt written"),
        (status = 404, description = "Unknown item"),
        (status = 409, description = "No key left to sell")
    ),
    tag = "checkout",
    security(("bearer" = []))
)]
#[post("/loja/comprar/{id}")]
pub async fn purchase_single(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ShopError> {
    let item_id = path.into_inner();

    if db::get_item(&state.pool, item_id).await?.is_none() {
        return Err(ShopError::NotFound);
    }

    let mut tx = state.pool.begin().await?;
    let Some(purchase_id) = claim_and_record(&mut *tx, identity.user_id, item_id).await? else {
        return Err(ShopError::NoKeysAvailable);
    };
    tx.commit().await?;

    log::info!("user {} purchased item {item_id}", identity.user_id);
    Ok(HttpResponse::Ok().json(json!({ "purchase_id": purchase_id })))
}

#[utoipa::path(
    post,
    path = "/loja/finalizar_compra",
    responses(
        (status = 200, description = "Cart checked out; items with no key left stay in the cart"),
        (status = 400, description = "Cart is empty")
    ),
    tag = "checkout",
    security(("bearer" = []))
)]
#[post("/loja/finalizar_compra")]
pub async fn checkout_cart(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
) -> Result<HttpResponse, ShopError> {
    let user_id = identity.user_id;

    let mut tx = state.pool.begin().await?;
    let item_ids = db::cart_item_ids(&mut *tx, user_id).await?;
    if item_ids.is_empty() {
        return Err(ShopError::EmptyCart);
    }

    // Entries whose item ran out of keys are skipped without raising an
    // error; they stay in the cart for a later attempt.
    let mut purchased = 0u32;
    for item_id in item_ids {
        if claim_and_record(&mut *tx, user_id, item_id).await?.is_some() {
            purchased += 1;
        }
    }
    tx.commit().await?;

    log::info!("user {user_id} checked out {purchased} items");
    Ok(HttpResponse::Ok().json(json!({ "purchased": purchased })))
}

#[utoipa::path(
    get,
    path = "/loja/historico",
    responses((status = 200, description = "Caller's receipts with the delivered key strings")),
    tag = "checkout",
    security(("bearer" = []))
)]
#[get("/loja/historico")]
pub async fn purchase_history(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
) -> Result<HttpResponse, ShopError> {
    let purchases = db::purchase_history(&state.pool, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "purchases": purchases })))
}
