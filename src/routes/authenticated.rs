use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `AuthUser` route layer; anonymous requests are redirected
/// to the login page. Handlers on `/events/{id}/...` (detail, update, delete) additionally
/// enforce that the caller is the event's organizer.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Organizer views ---
        // GET /events/
        // Events organized by the caller, ordered by date and time.
        .route("/events/", get(handlers::list_own_events))
        // GET/POST /events/create/
        // Form defaults / create. Organizer is always the caller.
        .route(
            "/events/create/",
            get(handlers::event_create_form).post(handlers::create_event),
        )
        // GET /events/{id}/
        // Organizer-only detail.
        .route("/events/{id}/", get(handlers::get_event_detail))
        // GET/POST /events/{id}/update/
        .route(
            "/events/{id}/update/",
            get(handlers::event_update_form).post(handlers::update_event),
        )
        // GET/POST /events/{id}/delete/
        // Deleting cascades to the volunteer roster and likes.
        .route(
            "/events/{id}/delete/",
            get(handlers::event_delete_confirm).post(handlers::delete_event),
        )
        // --- Volunteer roster ---
        // POST /events/{id}/add_volunteer/?next=...
        .route(
            "/events/{id}/add_volunteer/",
            post(handlers::add_volunteer),
        )
        // POST /events/{id}/withdraw_volunteer/?next=...
        .route(
            "/events/{id}/withdraw_volunteer/",
            post(handlers::withdraw_volunteer),
        )
        // GET /my-events/
        // Events the caller has joined.
        .route("/my-events/", get(handlers::list_volunteering_events))
        // --- Browsing & likes ---
        // GET /all-events/
        // Every event plus the ids the caller has liked.
        .route("/all-events/", get(handlers::list_all_events))
        // GET /all-events/{id}/
        // Detail view for any logged-in user.
        .route("/all-events/{id}/", get(handlers::get_public_event_detail))
        // POST /like/{id}/ and /unlike/{id}/
        .route("/like/{id}/", post(handlers::like_event))
        .route("/unlike/{id}/", post(handlers::unlike_event))
}
