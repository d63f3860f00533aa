// src/api/cart.rs

use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;

use crate::api::auth::Identity;
use crate::error::ShopError;
use crate::{db, AppState};

#[utoipa::path(
    post,
    path = "/loja/adicionar_carrinho/{id}",
    responses(
        (status = 200, description = "Item added to the cart"),
        (status = 404, description = "Unknown item"),
        (status = 409, description = "Already in the cart, or no key left to sell")
    ),
    tag = "cart",
    security(("bearer" = []))
)]
#[post("/loja/adicionar_carrinho/{id}")]
pub async fn add_to_cart(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ShopError> {
    let item_id = path.into_inner();

    if db::get_item(&state.pool, item_id).await?.is_none() {
        return Err(ShopError::NotFound);
    }
    if !db::has_available_key(&state.pool, item_id).await? {
        return Err(ShopError::NoKeysAvailable);
    }
    if db::cart_contains(&state.pool, identity.user_id, item_id).await? {
        return Err(ShopError::AlreadyInCart);
    }

    db::insert_cart_entry(&state.pool, identity.user_id, item_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "item_id": item_id })))
}

#[utoipa::path(
    get,
    path = "/loja/carrinho",
    responses((status = 200, description = "Cart lines plus the price total")),
    tag = "cart",
    security(("bearer" = []))
)]
#[get("/loja/carrinho")]
pub async fn view_cart(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
) -> Result<HttpResponse, ShopError> {
    let lines = db::cart_lines(&state.pool, identity.user_id).await?;
    let total: f64 = lines.iter().map(|l| l.price).sum();
    Ok(HttpResponse::Ok().json(json!({ "entries": lines, "total": total })))
}

#[utoipa::path(
    delete,
    path = "/loja/remover_carrinho/{id}",
    responses(
        (status = 200, description = "Entry removed"),
        (status = 404, description = "Item is not in the cart")
    ),
    tag = "cart",
    security(("bearer" = []))
)]
#[delete("/loja/remover_carrinho/{id}")]
pub async fn remove_from_cart(
    state: web::Data<AppState>,
    identity: web::ReqData<Identity>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ShopError> {
    let item_id = path.into_inner();

    let mut conn = state.pool.acquire().await?;
    if !db::delete_cart_entry(&mut *conn, identity.user_id, item_id).await? {
        return Err(ShopError::NotFound);
    }
    Ok(HttpResponse::Ok().json(json!({ "item_id": item_id })))
}
