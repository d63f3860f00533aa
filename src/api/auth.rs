// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{post, web, Error, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::task::{Context, Poll};
use utoipa::ToSchema;

use crate::error::{is_unique_violation, ShopError};
use crate::{db, AppState};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i32,
    role: String,
    exp: usize,
}

/// Request-scoped identity, put into request extensions by [`JwtMiddleware`].
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i32,
    pub role: String,
}

impl Identity {
    pub fn require_admin(&self) -> Result<(), ShopError> {
        if self.role == ROLE_ADMIN {
            Ok(())
        } else {
            Err(ShopError::Forbidden)
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i32,
}

fn trimmed_credentials(username: &str, password: &str) -> Result<(String, String), ShopError> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ShopError::Validation(
            "username and password must not be blank".into(),
        ));
    }
    Ok((username.to_string(), password.to_string()))
}

#[utoipa::path(
    post,
    path = "/registo",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Blank username or password"),
        (status = 409, description = "Username already taken")
    ),
    tag = "auth"
)]
#[post("/registo")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ShopError> {
    let (username, password) = trimmed_credentials(&payload.username, &payload.password)?;
    let password_hash = hash(&password, DEFAULT_COST)?;

    // Role is always "user" here; admins are provisioned out-of-band
    // (see the bootstrap in main.rs).
    let user_id = match db::insert_user(&state.pool, &username, &password_hash, ROLE_USER).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => return Err(ShopError::DuplicateUser),
        Err(e) => return Err(e.into()),
    };

    let token = generate_jwt(user_id, ROLE_USER)?;
    Ok(HttpResponse::Ok().json(AuthResponse { token, user_id }))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Unknown username or wrong password")
    ),
    tag = "auth"
)]
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ShopError> {
    let Some(user) = db::find_user_by_username(&state.pool, payload.username.trim()).await? else {
        return Err(ShopError::InvalidCredentials);
    };

    if !verify(&payload.password, &user.password_hash)? {
        return Err(ShopError::InvalidCredentials);
    }

    let token = generate_jwt(user.id, &user.role)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user_id: user.id,
    }))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Acknowledged")),
    tag = "auth",
    security(("bearer" = []))
)]
#[post("/logout")]
pub async fn logout(_identity: web::ReqData<Identity>) -> HttpResponse {
    // Tokens are stateless; the server has nothing to revoke.
    HttpResponse::Ok().json(json!({ "message": "logged out, discard the token" }))
}

pub fn generate_jwt(user_id: i32, role: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = std::env::var("JWT_SECRET").unwrap_or_default();

    let expiration = (Utc::now() + Duration::days(30)).timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

fn decode_jwt(token: &str) -> Option<Identity> {
    let secret = std::env::var("JWT_SECRET").unwrap_or_default();
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .ok()
    .map(|data| Identity {
        user_id: data.claims.sub,
        role: data.claims.role,
    })
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Optional identity for public endpoints: the catalog listing reports the
/// caller's cart count when a valid token is presented and 0 otherwise.
pub fn identity_from_request(req: &HttpRequest) -> Option<Identity> {
    bearer_token(req).and_then(decode_jwt)
}

/// Middleware that:
/// - takes `Authorization: Bearer <jwt>`
/// - validates the token
/// - puts an [`Identity`] into `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_owned);

        let identity = token.as_deref().and_then(decode_jwt);

        match identity {
            Some(identity) => {
                req.extensions_mut().insert(identity);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            None => Box::pin(async move {
                Err(actix_web::error::ErrorUnauthorized(
                    "missing or invalid Authorization header",
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_carries_role() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let token = generate_jwt(42, ROLE_ADMIN).expect("encode");
        let identity = decode_jwt(&token).expect("decode");
        assert_eq!(identity.user_id, 42);
        assert_eq!(identity.role, ROLE_ADMIN);
    }

    #[test]
    fn garbage_token_is_rejected() {
        std::env::set_var("JWT_SECRET", "test-secret");
        assert!(decode_jwt("not-a-token").is_none());
    }

    #[test]
    fn credentials_are_trimmed() {
        let (u, p) = trimmed_credentials("  alice  ", " pw ").expect("valid");
        assert_eq!(u, "alice");
        assert_eq!(p, "pw");
    }

    #[test]
    fn blank_credentials_fail_validation() {
        assert!(matches!(
            trimmed_credentials("   ", "pw"),
            Err(ShopError::Validation(_))
        ));
        assert!(matches!(
            trimmed_credentials("alice", ""),
            Err(ShopError::Validation(_))
        ));
    }

    #[test]
    fn admin_gate() {
        let admin = Identity {
            user_id: 1,
            role: ROLE_ADMIN.into(),
        };
        let user = Identity {
            user_id: 2,
            role: ROLE_USER.into(),
        };
        assert!(admin.require_admin().is_ok());
        assert!(matches!(user.require_admin(), Err(ShopError::Forbidden)));
    }
}
