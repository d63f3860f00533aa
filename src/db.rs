// src/db.rs
//
// Query layer. Multi-statement flows (item create/edit, checkout) run on a
// caller-owned transaction; dropping the transaction on error rolls back
// every statement of the flow.

use sqlx::{PgConnection, PgPool, Row};

use crate::models::{CartLine, CatalogEntry, Item, LicenseKey, PurchaseLine, User};

pub async fn list_catalog(pool: &PgPool) -> Result<Vec<CatalogEntry>, sqlx::Error> {
    sqlx::query_as::<_, CatalogEntry>(
        r#"SELECT i.id, i.name, i.developer, i.year, i.price,
                  COUNT(k.id) FILTER (WHERE k.available) AS available_keys
           FROM items i
           LEFT JOIN license_keys k ON k.item_id = i.id
           GROUP BY i.id
           ORDER BY i.id"#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get_item(pool: &PgPool, item_id: i32) -> Result<Option<Item>, sqlx::Error> {
    sqlx::query_as::<_, Item>(r#"SELECT id, name, developer, year, price FROM items WHERE id = $1"#)
        .bind(item_id)
        .fetch_optional(pool)
        .await
}

pub async fn item_price(
    conn: &mut PgConnection,
    item_id: i32,
) -> Result<Option<f64>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT price FROM items WHERE id = $1"#)
        .bind(item_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|r| r.get("price")))
}

pub async fn insert_item(
    conn: &mut PgConnection,
    name: &str,
    developer: &str,
    year: i32,
    price: f64,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO items (name, developer, year, price)
           VALUES ($1, $2, $3, $4)
           RETURNING id"#,
    )
    .bind(name)
    .bind(developer)
    .bind(year)
    .bind(price)
    .fetch_one(conn)
    .await?;
    Ok(row.get("id"))
}

/// Overwrites the scalar fields of an item. Returns false when the id is unknown.
pub async fn update_item(
    conn: &mut PgConnection,
    item_id: i32,
    name: &str,
    developer: &str,
    year: i32,
    price: f64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE items SET name = $1, developer = $2, year = $3, price = $4 WHERE id = $5"#,
    )
    .bind(name)
    .bind(developer)
    .bind(year)
    .bind(price)
    .bind(item_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_item(conn: &mut PgConnection, item_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM items WHERE id = $1"#)
        .bind(item_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_keys_for_item(
    conn: &mut PgConnection,
    item_id: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM license_keys WHERE item_id = $1"#)
        .bind(item_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_key(
    conn: &mut PgConnection,
    item_id: i32,
    key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"INSERT INTO license_keys (key, item_id) VALUES ($1, $2)"#)
        .bind(key)
        .bind(item_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn keys_for_item(pool: &PgPool, item_id: i32) -> Result<Vec<LicenseKey>, sqlx::Error> {
    sqlx::query_as::<_, LicenseKey>(
        r#"SELECT id, key, available, item_id FROM license_keys WHERE item_id = $1"#,
    )
    .bind(item_id)
    .fetch_all(pool)
    .await
}

pub async fn has_available_key(pool: &PgPool, item_id: i32) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT 1 AS one FROM license_keys WHERE item_id = $1 AND available LIMIT 1"#,
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Picks one arbitrary available key for the item and marks it sold.
/// No row lock and no compare-and-swap: two transactions racing for the
/// last key are left to the database's default isolation (known gap,
/// see tests/checkout_integration.rs).
pub async fn claim_available_key(
    conn: &mut PgConnection,
    item_id: i32,
) -> Result<Option<i32>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id FROM license_keys WHERE item_id = $1 AND available LIMIT 1"#,
    )
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else { return Ok(None) };
    let key_id: i32 = row.get("id");

    sqlx::query(r#"UPDATE license_keys SET available = FALSE WHERE id = $1"#)
        .bind(key_id)
        .execute(conn)
        .await?;

    Ok(Some(key_id))
}

pub async fn insert_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
    role: &str,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO users (username, password_hash, role)
           VALUES ($1, $2, $3)
           RETURNING id"#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"SELECT id, username, password_hash, role FROM users WHERE username = $1"#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn count_cart(pool: &PgPool, user_id: i32) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS n FROM cart_entries WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("n"))
}

pub async fn cart_contains(
    pool: &PgPool,
    user_id: i32,
    item_id: i32,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT 1 AS one FROM cart_entries WHERE user_id = $1 AND item_id = $2"#,
    )
    .bind(user_id)
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

pub async fn insert_cart_entry(
    pool: &PgPool,
    user_id: i32,
    item_id: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"INSERT INTO cart_entries (user_id, item_id) VALUES ($1, $2)"#)
        .bind(user_id)
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_cart_entry(
    conn: &mut PgConnection,
    user_id: i32,
    item_id: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM cart_entries WHERE user_id = $1 AND item_id = $2"#)
        .bind(user_id)
        .bind(item_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn cart_lines(pool: &PgPool, user_id: i32) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as::<_, CartLine>(
        r#"SELECT c.item_id, i.name, i.developer, i.year, i.price, c.added_at
           FROM cart_entries c
           JOIN items i ON i.id = c.item_id
           WHERE c.user_id = $1
           ORDER BY c.added_at, c.id"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Item ids currently in the user's cart, in insertion order.
pub async fn cart_item_ids(
    conn: &mut PgConnection,
    user_id: i32,
) -> Result<Vec<i32>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT item_id FROM cart_entries WHERE user_id = $1 ORDER BY added_at, id"#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|r| r.get("item_id")).collect())
}

pub async fn insert_purchase(
    conn: &mut PgConnection,
    user_id: i32,
    item_id: i32,
    key_id: i32,
    price_paid: f64,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO purchases (user_id, item_id, key_id, price_paid)
           VALUES ($1, $2, $3, $4)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(item_id)
    .bind(key_id)
    .bind(price_paid)
    .fetch_one(conn)
    .await?;
    Ok(row.get("id"))
}

pub async fn purchase_history(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<PurchaseLine>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseLine>(
        r#"SELECT p.id, p.item_id, i.name, k.key, p.price_paid, p.purchased_at
           FROM purchases p
           LEFT JOIN items i ON i.id = p.item_id
           LEFT JOIN license_keys k ON k.id = p.key_id
           WHERE p.user_id = $1
           ORDER BY p.purchased_at, p.id"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
