use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::web::handlers::*;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/user/{id}", get(get_user))
        .route("/api/user/{id}/approve", post(approve_user))
        .route("/api/user-rib/{user_id}", get(get_user_rib))
        .route("/api/users/pending", get(list_pending_users))
        .route("/api/accounts/user/{user_id}", get(list_user_accounts))
        .route("/api/accounts/{id}", get(get_account))
        .route("/api/accounts/{id}/name", put(rename_account))
        .route("/api/accounts/{id}/iban", get(get_account_iban))
        .route("/api/cards/user/{user_id}", get(list_user_cards))
        .route("/api/cards/{id}/status", patch(set_card_status))
        .route("/api/cards/{id}/pin", post(reveal_card_pin))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
