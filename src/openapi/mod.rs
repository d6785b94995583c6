use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Catalog browsing, per-user carts, checkout and account management for a small
furniture shop.

## Authentication

Obtain a token pair from `POST /auth/login` and send the access token:

```
Authorization: Bearer <your-jwt-token>
```

Accounts start inactive; follow the emailed activation link before logging in.

## Errors

Failures share one body. Form errors list messages per field under `details`:

```json
{
  "error": "Bad Request",
  "message": "Invalid form data",
  "details": {"password2": ["The two password fields didn't match."]},
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "Catalog", description = "Items, comments and reference data"),
        (name = "Cart", description = "The signed-in user's cart"),
        (name = "Checkout", description = "Turning a cart into purchases"),
        (name = "Purchases", description = "Purchase records and history"),
        (name = "Accounts", description = "Signup, activation and profile"),
        (name = "auth", description = "Token issue and rotation")
    ),
    paths(
        // Catalog
        handlers::catalog::index,
        handlers::catalog::list_items,
        handlers::catalog::get_item,
        handlers::catalog::create_item,
        handlers::catalog::update_item,
        handlers::catalog::delete_item,
        handlers::catalog::post_comment,
        handlers::catalog::delete_comment,
        handlers::catalog::list_reference,
        handlers::catalog::create_reference,
        handlers::catalog::delete_reference,
        // Cart
        handlers::carts::get_cart,
        handlers::carts::add_to_cart,
        handlers::carts::update_cart_line,
        handlers::carts::remove_cart_line,
        // Checkout
        handlers::checkout::checkout,
        // Purchases
        handlers::purchases::list_records,
        handlers::purchases::delete_record,
        handlers::purchases::list_snapshots,
        handlers::purchases::delete_snapshot,
        // Accounts
        handlers::accounts::signup,
        handlers::accounts::activate,
        handlers::accounts::get_profile,
        handlers::accounts::update_profile,
        // Auth
        crate::auth::login_handler,
        crate::auth::refresh_token_handler,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::repositories::ItemFilter,
            handlers::common::PaginationParams,
            handlers::common::PageParam,
            crate::services::catalog::ItemInput,
            crate::services::catalog::CommentInput,
            crate::services::catalog::ReferenceInput,
            crate::services::catalog::ReferenceEntry,
            crate::services::catalog::ItemSummary,
            crate::services::catalog::ItemPage,
            crate::services::catalog::ItemDetail,
            crate::services::catalog::CommentView,
            crate::services::catalog::IndexCounts,
            crate::services::cart::AddToCartInput,
            crate::services::cart::UpdateQuantityInput,
            crate::services::cart::CartLineView,
            crate::services::cart::CartView,
            crate::services::cart::AddToCartOutcome,
            crate::services::checkout::PaymentForm,
            crate::services::checkout::CheckoutReceipt,
            crate::services::purchases::PurchaseRecordView,
            crate::services::purchases::PurchaseRecordPage,
            crate::services::purchases::SnapshotView,
            crate::services::accounts::SignupForm,
            crate::services::accounts::SignupOutcome,
            crate::services::accounts::ActivationStatus,
            crate::services::accounts::ActivationOutcome,
            crate::services::accounts::ProfileUpdateForm,
            crate::services::accounts::ProfileView,
            crate::auth::LoginCredentials,
            crate::auth::RefreshTokenRequest,
            crate::auth::TokenPair,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
