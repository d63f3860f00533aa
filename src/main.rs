// src/main.rs

use actix_web::{middleware, web, App, HttpResponse, HttpServer, Responder};
use bcrypt::{hash, DEFAULT_COST};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use keyshop::api::auth::ROLE_ADMIN;
use keyshop::{api, db, docs, AppState};

async fn index() -> impl Responder {
    HttpResponse::Found()
        .insert_header(("Location", "/loja"))
        .finish()
}

/// "Admin assigned out-of-band": registration only ever creates plain
/// users, so the one admin account comes from the environment at startup.
async fn bootstrap_admin(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let (Ok(username), Ok(password)) = (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD"))
    else {
        return Ok(());
    };

    if db::find_user_by_username(pool, &username).await?.is_some() {
        return Ok(());
    }

    let password_hash = hash(&password, DEFAULT_COST)?;
    db::insert_user(pool, &username, &password_hash, ROLE_ADMIN).await?;
    log::info!("bootstrapped admin account '{username}'");
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    bootstrap_admin(&pool).await.expect("admin bootstrap");

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8065".to_string());
    let state = web::Data::new(AppState { pool });

    log::info!("listening on {bind_addr}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Public routes
            .service(api::auth::register)
            .service(api::auth::login)
            .service(api::catalog::list_catalog)
            // Everything else needs a bearer token
            .service(
                web::scope("")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::auth::logout)
                    .service(api::catalog::create_item)
                    .service(api::catalog::edit_item)
                    .service(api::catalog::delete_item)
                    .service(api::cart::add_to_cart)
                    .service(api::cart::view_cart)
                    .service(api::cart::remove_from_cart)
                    .service(api::checkout::purchase_single)
                    .service(api::checkout::checkout_cart)
                    .service(api::checkout::purchase_history),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
