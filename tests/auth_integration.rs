use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use sqlx::Row;

use keyshop::api;

mod support;

macro_rules! auth_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .service(api::auth::register)
                .service(api::auth::login)
                .service(api::catalog::list_catalog)
                .service(
                    web::scope("")
                        .wrap(api::auth::JwtMiddleware)
                        .service(api::auth::logout)
                        .service(api::catalog::create_item),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn register_then_duplicate_username_conflicts() {
    let test_db = support::init_test_db().await;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = auth_app!(state);

    let req = TestRequest::post()
        .uri("/registo")
        .set_json(json!({ "username": "alice", "password": "secret" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["token"].as_str().is_some());

    let req = TestRequest::post()
        .uri("/registo")
        .set_json(json!({ "username": "alice", "password": "other" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Second attempt must not have created a row.
    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE username = 'alice'")
        .fetch_one(&test_db.pool)
        .await
        .expect("count users")
        .get("n");
    assert_eq!(count, 1);
}

#[actix_web::test]
async fn register_rejects_blank_fields() {
    let test_db = support::init_test_db().await;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = auth_app!(state);

    for payload in [
        json!({ "username": "   ", "password": "secret" }),
        json!({ "username": "bob", "password": "  " }),
    ] {
        let req = TestRequest::post()
            .uri("/registo")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[actix_web::test]
async fn register_trims_username() {
    let test_db = support::init_test_db().await;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = auth_app!(state);

    let req = TestRequest::post()
        .uri("/registo")
        .set_json(json!({ "username": "  carol  ", "password": "secret" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = TestRequest::post()
        .uri("/login")
        .set_json(json!({ "username": "carol", "password": "secret" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn login_rejects_bad_credentials() {
    let test_db = support::init_test_db().await;
    support::seed_user(&test_db.pool, "dave").await;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = auth_app!(state);

    let req = TestRequest::post()
        .uri("/login")
        .set_json(json!({ "username": "dave", "password": "wrong" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/login")
        .set_json(json!({ "username": "nobody", "password": "password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_routes_forbid_plain_users() {
    let test_db = support::init_test_db().await;
    let (_, token) = support::seed_user(&test_db.pool, "eve").await;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = auth_app!(state);

    let req = TestRequest::post()
        .uri("/loja/adicionar")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "name": "Doom", "developer": "id Software",
            "year": 2020, "price": 9.99, "keys": "AAA-1"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn protected_routes_require_a_token() {
    let test_db = support::init_test_db().await;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = auth_app!(state);

    let req = TestRequest::post().uri("/logout").to_request();
    let resp = test::try_call_service(&app, req).await;
    let err = resp.expect_err("request without a token must fail");
    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_web::test]
async fn logout_acknowledges_with_valid_token() {
    let test_db = support::init_test_db().await;
    let (_, token) = support::seed_user(&test_db.pool, "frank").await;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = auth_app!(state);

    let req = TestRequest::post()
        .uri("/logout")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
