// storefront/src/web/routes.rs

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};

use crate::errors::AppError;
use crate::web::handlers::{admin_handlers, order_handlers, payment_handlers, webhook_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed or mistyped JSON bodies surface as ordinary validation errors.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  AppError::Validation(format!("Invalid request body: {}", err)).into()
}

/// Mounted under `/api` by `main.rs` and by the HTTP tests.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
    .service(
      web::scope("/api")
        .route("/health", web::get().to(health_check_handler))
        .service(
          web::scope("/orders")
            // Admin routes are registered before `/{id}` so `admin` is never read as an id.
            .route("/admin/all", web::get().to(admin_handlers::list_all_orders_handler))
            .route(
              "/admin/{id}/status",
              web::patch().to(admin_handlers::update_order_status_handler),
            )
            .service(
              web::resource("")
                .route(web::post().to(order_handlers::create_checkout_order_handler))
                .route(web::get().to(order_handlers::list_my_orders_handler)),
            )
            .route("/from-cart", web::post().to(order_handlers::create_order_from_cart_handler))
            .route("/{id}", web::get().to(order_handlers::get_order_handler))
            .route("/{id}/cancel", web::patch().to(order_handlers::cancel_order_handler))
            .route(
              "/{id}/confirm-payment",
              web::patch().to(payment_handlers::confirm_payment_handler),
            ),
        )
        .service(
          web::scope("/payments")
            .route("/intent", web::post().to(payment_handlers::create_payment_intent_handler))
            .route("/webhook", web::post().to(webhook_handlers::payment_webhook_handler)),
        ),
    );
}
