use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{admin, bookings, health_check, payments, webhook};
use crate::state::AppState;

pub fn create_routes(
    state: AppState,
    production: bool,
    cors_allowed_origins: Option<&str>,
) -> Router {
    let api = Router::new()
        .route("/razorpay/create-order", post(payments::create_order))
        .route("/razorpay/verify-payment", post(payments::verify_payment))
        .route("/razorpay/webhook", post(webhook::razorpay_webhook))
        .route("/admin/verify-ticket", post(admin::verify_ticket))
        .route("/booking/pay-later", post(bookings::request_pay_later))
        .route("/booking/:booking_id", get(bookings::get_booking))
        .route("/user/bookings", get(bookings::list_user_bookings))
        .route("/download/ticket/:booking_id", get(bookings::download_ticket))
        .route("/download/invoice/:booking_id", get(bookings::download_invoice));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(production))
        .layer(create_cors_layer(cors_allowed_origins))
}
