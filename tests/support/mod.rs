// Shared harness: each test gets a freshly recreated database named by
// TEST_DATABASE_URL. A process-wide lock serializes tests because they
// share that one database.
#![allow(dead_code)]

use sqlx::{PgPool, Row};
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};

use keyshop::api::auth::{generate_jwt, ROLE_ADMIN, ROLE_USER};
use keyshop::AppState;

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

pub async fn init_test_db() -> TestDb {
    dotenvy::dotenv().ok();
    env::set_var("JWT_SECRET", "test-secret");

    let test_url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");
    let quoted_name = quote_identifier(&db_name);
    sqlx::query(&format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)"))
        .execute(&admin_pool)
        .await
        .expect("drop test db");
    sqlx::query(&format!("CREATE DATABASE {quoted_name}"))
        .execute(&admin_pool)
        .await
        .expect("create test db");
    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");

    TestDb {
        pool,
        _guard: guard,
    }
}

pub fn build_state(pool: PgPool) -> AppState {
    AppState { pool }
}

/// Inserts an account directly (cheap bcrypt cost, this is test-only data)
/// and returns (user_id, bearer token).
async fn seed_account(pool: &PgPool, username: &str, role: &str) -> (i32, String) {
    let password_hash = bcrypt::hash("password", 4).expect("hash");
    let user_id: i32 = sqlx::query(
        r#"INSERT INTO users (username, password_hash, role)
           VALUES ($1, $2, $3)
           RETURNING id"#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("insert account")
    .get("id");

    let token = generate_jwt(user_id, role).expect("token");
    (user_id, token)
}

pub async fn seed_admin(pool: &PgPool) -> (i32, String) {
    seed_account(pool, "admin", ROLE_ADMIN).await
}

pub async fn seed_user(pool: &PgPool, username: &str) -> (i32, String) {
    seed_account(pool, username, ROLE_USER).await
}

/// Inserts an item with one available key per entry of `keys`.
pub async fn seed_item(pool: &PgPool, name: &str, price: f64, keys: &[&str]) -> i32 {
    let item_id: i32 = sqlx::query(
        r#"INSERT INTO items (name, developer, year, price)
           VALUES ($1, 'id Software', 2020, $2)
           RETURNING id"#,
    )
    .bind(name)
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("insert item")
    .get("id");

    for key in keys {
        sqlx::query(r#"INSERT INTO license_keys (key, item_id) VALUES ($1, $2)"#)
            .bind(key)
            .bind(item_id)
            .execute(pool)
            .await
            .expect("insert key");
    }
    item_id
}
