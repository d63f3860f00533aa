// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),
    #[error("username already taken")]
    DuplicateUser,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("admin access required")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("item already in cart")]
    AlreadyInCart,
    #[error("no license keys available for this item")]
    NoKeysAvailable,
    #[error("cart is empty")]
    EmptyCart,
    #[error("duplicate license key")]
    DuplicateKey,
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("password hashing error")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token error")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ShopError {
    /// Classifies a sqlx error raised while inserting a license key:
    /// the global UNIQUE constraint on the key string surfaces as
    /// DuplicateKey, everything else stays a storage failure.
    pub fn from_key_insert(e: sqlx::Error) -> Self {
        if is_unique_violation(&e) {
            ShopError::DuplicateKey
        } else {
            ShopError::Database(e)
        }
    }
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl ResponseError for ShopError {
    fn status_code(&self) -> StatusCode {
        match self {
            ShopError::Validation(_) | ShopError::EmptyCart => StatusCode::BAD_REQUEST,
            ShopError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ShopError::Forbidden => StatusCode::FORBIDDEN,
            ShopError::NotFound => StatusCode::NOT_FOUND,
            ShopError::DuplicateUser
            | ShopError::AlreadyInCart
            | ShopError::NoKeysAvailable
            | ShopError::DuplicateKey => StatusCode::CONFLICT,
            ShopError::Database(_) | ShopError::Hash(_) | ShopError::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("internal error: {self:?}");
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
