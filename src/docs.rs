use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::logout,
        crate::api::catalog::list_catalog,
        crate::api::catalog::create_item,
        crate::api::catalog::edit_item,
        crate::api::catalog::delete_item,
        crate::api::cart::add_to_cart,
        crate::api::cart::view_cart,
        crate::api::cart::remove_from_cart,
        crate::api::checkout::purchase_single,
        crate::api::checkout::checkout_cart,
        crate::api::checkout::purchase_history
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::catalog::ItemPayload,
            crate::models::Item,
            crate::models::LicenseKey,
            crate::models::CatalogEntry,
            crate::models::CartLine,
            crate::models::PurchaseLine
        )
    ),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "catalog", description = "Item and key-pool administration"),
        (name = "cart", description = "Per-user cart"),
        (name = "checkout", description = "Key claims and receipts")
    )
)]
pub struct ApiDoc;
