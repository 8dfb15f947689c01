use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Everything here either reveals nothing about
/// events or is part of establishing/ending a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Landing document with links to the main listings.
        .route("/", get(handlers::home))
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /accounts/signup/
        // Form fields / registers, logs in and redirects to /all-events/.
        .route(
            "/accounts/signup/",
            get(handlers::signup_form).post(handlers::signup),
        )
        // GET/POST /accounts/login/?next=...
        // Target of every login redirect.
        .route(
            "/accounts/login/",
            get(handlers::login_form).post(handlers::login),
        )
        // POST /accounts/logout/
        .route("/accounts/logout/", post(handlers::logout))
}
