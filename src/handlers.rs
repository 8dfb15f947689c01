use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, ErrorResponse},
    forms::{EventForm, EventFormDefaults, FieldErrors, JsonForm, LoginForm, SignupForm},
    models::{AccountFormPage, AllEventsResponse, Event, HomePage, Like},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Local;
use serde::Deserialize;

/// Where create/update/delete send the organizer afterwards.
pub const OWN_EVENTS_PATH: &str = "/events/";
/// Where signup and login land by default.
pub const ALL_EVENTS_PATH: &str = "/all-events/";
/// Registration form.
pub const SIGNUP_PATH: &str = "/accounts/signup/";
/// Fallback for toggles without a usable `next`.
pub const ROOT_PATH: &str = "/";

// --- Query Structs ---

/// ReturnTo
///
/// Explicit return target for the volunteer and like toggles (and login). Only local absolute
/// paths are honoured; anything else falls back to the route's default.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReturnTo {
    /// Local path to redirect to afterwards, e.g. `/all-events/`.
    pub next: Option<String>,
}

impl ReturnTo {
    pub fn target<'a>(&'a self, default: &'a str) -> &'a str {
        match self.next.as_deref() {
            Some(next) if is_local_path(next) => next,
            _ => default,
        }
    }
}

// Rejects scheme-relative (`//host`) and backslash tricks that browsers treat as external.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

async fn load_event(state: &AppState, id: i64) -> Result<Event, AppError> {
    state
        .repo
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {id}")))
}

// Owner-scoped access: 404 if missing, 403 if not the organizer.
async fn load_owned_event(state: &AppState, user: &AuthUser, id: i64) -> Result<Event, AppError> {
    let event = load_event(state, id).await?;
    user.ensure_organizer(&event)?;
    Ok(event)
}

// --- Handlers ---

/// home
///
/// [Public Route] Landing document.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Landing", body = HomePage)))]
pub async fn home() -> Json<HomePage> {
    Json(HomePage {
        name: "Volunteer Hub".to_string(),
        links: vec![
            ALL_EVENTS_PATH.to_string(),
            OWN_EVENTS_PATH.to_string(),
            "/my-events/".to_string(),
            SIGNUP_PATH.to_string(),
            auth::LOGIN_PATH.to_string(),
        ],
    })
}

/// list_own_events
///
/// [Authenticated Route] Events organized by the caller, soonest first.
#[utoipa::path(
    get,
    path = "/events/",
    responses(
        (status = 200, description = "My organized events", body = [Event]),
        (status = 303, description = "Not logged in")
    )
)]
pub async fn list_own_events(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(state.repo.list_events_by_organizer(user.id).await?))
}

/// get_event_detail
///
/// [Authenticated Route] Organizer-only detail view.
#[utoipa::path(
    get,
    path = "/events/{id}/",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Found", body = Event),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_event_detail(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(load_owned_event(&state, &user, id).await?))
}

/// event_create_form
///
/// [Authenticated Route] Initial values for an empty create form.
#[utoipa::path(
    get,
    path = "/events/create/",
    responses((status = 200, description = "Form defaults", body = EventFormDefaults))
)]
pub async fn event_create_form(_user: AuthUser) -> Json<EventFormDefaults> {
    let now = Local::now();
    Json(EventFormDefaults {
        date: now.date_naive(),
        time: now.time(),
        volunteers_needed: 1,
    })
}

/// create_event
///
/// [Authenticated Route] Creates an event organized by the caller, then redirects to the
/// caller's event list. Omitted date/time default to today/now.
#[utoipa::path(
    post,
    path = "/events/create/",
    request_body = EventForm,
    responses(
        (status = 303, description = "Created; redirects to /events/"),
        (status = 422, description = "Invalid form", body = ErrorResponse)
    )
)]
pub async fn create_event(
    user: AuthUser,
    State(state): State<AppState>,
    JsonForm(form): JsonForm<EventForm>,
) -> Result<Redirect, AppError> {
    let now = Local::now();
    let fields = form
        .validate(now.date_naive(), now.time())
        .map_err(AppError::Validation)?;

    let event = state.repo.create_event(user.id, fields).await?;
    tracing::info!(event_id = event.id, organizer_id = %user.id, "event created");
    Ok(Redirect::to(OWN_EVENTS_PATH))
}

/// event_update_form
///
/// [Authenticated Route] Current values for the edit form. Organizer only.
#[utoipa::path(
    get,
    path = "/events/{id}/update/",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Current values", body = Event),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn event_update_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(load_owned_event(&state, &user, id).await?))
}

/// update_event
///
/// [Authenticated Route] Replaces the event's fields. The organizer check runs before the
/// form is even validated, so a non-organizer never learns anything about the event.
#[utoipa::path(
    post,
    path = "/events/{id}/update/",
    params(("id" = i64, Path, description = "Event ID")),
    request_body = EventForm,
    responses(
        (status = 303, description = "Updated; redirects to /events/"),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 422, description = "Invalid form", body = ErrorResponse)
    )
)]
pub async fn update_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonForm(form): JsonForm<EventForm>,
) -> Result<Redirect, AppError> {
    let event = load_owned_event(&state, &user, id).await?;
    let fields = form
        .validate(event.date, event.time)
        .map_err(AppError::Validation)?;

    state
        .repo
        .update_event(id, fields)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {id}")))?;
    tracing::info!(event_id = id, organizer_id = %user.id, "event updated");
    Ok(Redirect::to(OWN_EVENTS_PATH))
}

/// event_delete_confirm
///
/// [Authenticated Route] The event about to be deleted. Organizer only.
#[utoipa::path(
    get,
    path = "/events/{id}/delete/",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event pending deletion", body = Event),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn event_delete_confirm(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(load_owned_event(&state, &user, id).await?))
}

/// delete_event
///
/// [Authenticated Route] Deletes the event with its roster and likes. Organizer only.
#[utoipa::path(
    post,
    path = "/events/{id}/delete/",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 303, description = "Deleted; redirects to /events/"),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    load_owned_event(&state, &user, id).await?;
    if !state.repo.delete_event(id).await? {
        return Err(AppError::NotFound(format!("event {id}")));
    }
    tracing::info!(event_id = id, organizer_id = %user.id, "event deleted");
    Ok(Redirect::to(OWN_EVENTS_PATH))
}

/// add_volunteer
///
/// [Authenticated Route] Joins the caller to the event's roster. Idempotent, no capacity
/// check against `volunteers_needed`, organizers may join their own events.
#[utoipa::path(
    post,
    path = "/events/{id}/add_volunteer/",
    params(("id" = i64, Path, description = "Event ID"), ReturnTo),
    responses(
        (status = 303, description = "Redirects to `next` or /"),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn add_volunteer(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(return_to): Query<ReturnTo>,
) -> Result<Redirect, AppError> {
    let event = load_event(&state, id).await?;
    if !event.has_volunteer(user.id) && state.repo.add_volunteer(id, user.id).await? {
        tracing::info!(event_id = id, user_id = %user.id, "volunteer added");
    }
    Ok(Redirect::to(return_to.target(ROOT_PATH)))
}

/// withdraw_volunteer
///
/// [Authenticated Route] Removes the caller from the roster. No-op for non-members.
#[utoipa::path(
    post,
    path = "/events/{id}/withdraw_volunteer/",
    params(("id" = i64, Path, description = "Event ID"), ReturnTo),
    responses(
        (status = 303, description = "Redirects to `next` or /"),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn withdraw_volunteer(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(return_to): Query<ReturnTo>,
) -> Result<Redirect, AppError> {
    let event = load_event(&state, id).await?;
    if event.has_volunteer(user.id) && state.repo.remove_volunteer(id, user.id).await? {
        tracing::info!(event_id = id, user_id = %user.id, "volunteer withdrew");
    }
    Ok(Redirect::to(return_to.target(ROOT_PATH)))
}

/// list_volunteering_events
///
/// [Authenticated Route] Events the caller has joined, soonest first.
#[utoipa::path(
    get,
    path = "/my-events/",
    responses((status = 200, description = "Events I volunteer for", body = [Event]))
)]
pub async fn list_volunteering_events(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(state.repo.list_events_by_volunteer(user.id).await?))
}

/// list_all_events
///
/// [Authenticated Route] Every event, soonest first, with the ids the caller has liked.
#[utoipa::path(
    get,
    path = "/all-events/",
    responses((status = 200, description = "All events", body = AllEventsResponse))
)]
pub async fn list_all_events(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AllEventsResponse>, AppError> {
    let events = state.repo.list_all_events().await?;
    let liked_events = state.repo.liked_event_ids(user.id).await?;
    Ok(Json(AllEventsResponse {
        events,
        liked_events,
    }))
}

/// get_public_event_detail
///
/// [Authenticated Route] Detail view open to any logged-in user.
#[utoipa::path(
    get,
    path = "/all-events/{id}/",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Found", body = Event),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_public_event_detail(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(load_event(&state, id).await?))
}

/// like_event
///
/// [Authenticated Route] Get-or-create a like; liking twice keeps a single row.
#[utoipa::path(
    post,
    path = "/like/{id}/",
    params(("id" = i64, Path, description = "Event ID"), ReturnTo),
    responses(
        (status = 303, description = "Redirects to `next` or /"),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn like_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(return_to): Query<ReturnTo>,
) -> Result<Redirect, AppError> {
    load_event(&state, id).await?;
    let like = Like {
        user_id: user.id,
        event_id: id,
    };
    if state.repo.like_event(like).await? {
        tracing::info!(event_id = id, user_id = %user.id, "event liked");
    }
    Ok(Redirect::to(return_to.target(ROOT_PATH)))
}

/// unlike_event
///
/// [Authenticated Route] Removes the caller's like, if any.
#[utoipa::path(
    post,
    path = "/unlike/{id}/",
    params(("id" = i64, Path, description = "Event ID"), ReturnTo),
    responses(
        (status = 303, description = "Redirects to `next` or /"),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn unlike_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(return_to): Query<ReturnTo>,
) -> Result<Redirect, AppError> {
    load_event(&state, id).await?;
    let like = Like {
        user_id: user.id,
        event_id: id,
    };
    if state.repo.unlike_event(like).await? {
        tracing::info!(event_id = id, user_id = %user.id, "event unliked");
    }
    Ok(Redirect::to(return_to.target(ROOT_PATH)))
}

// Redirect that also establishes a session for `user_id`.
fn login_redirect(state: &AppState, user_id: uuid::Uuid, target: &str) -> Result<Response, AppError> {
    let token = auth::issue_session_token(user_id, &state.config)?;
    let cookie = auth::session_cookie_header(&token, &state.config);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(target)).into_response())
}

/// signup_form
///
/// [Public Route] The fields the signup form expects.
#[utoipa::path(
    get,
    path = "/accounts/signup/",
    responses((status = 200, description = "Signup form", body = AccountFormPage))
)]
pub async fn signup_form() -> Json<AccountFormPage> {
    Json(AccountFormPage {
        action: SIGNUP_PATH.to_string(),
        fields: vec![
            "username".to_string(),
            "password1".to_string(),
            "password2".to_string(),
        ],
        next: None,
    })
}

/// signup
///
/// [Public Route] Registers an account, logs it in and redirects to /all-events/.
/// Any failure answers with the generic "Invalid sign up - try again" plus field errors.
#[utoipa::path(
    post,
    path = "/accounts/signup/",
    request_body = SignupForm,
    responses(
        (status = 303, description = "Registered and logged in; redirects to /all-events/"),
        (status = 400, description = "Invalid sign up", body = ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    JsonForm(form): JsonForm<SignupForm>,
) -> Result<Response, AppError> {
    let username = form.validate().map_err(AppError::InvalidSignup)?;

    let taken = || {
        let mut errors = FieldErrors::new();
        errors.add("username", "A user with that username already exists.");
        AppError::InvalidSignup(errors)
    };
    if state.repo.get_credentials(&username).await?.is_some() {
        return Err(taken());
    }

    let hash = auth::hash_password(form.password1, state.config.bcrypt_cost).await?;
    // A concurrent signup may still win the race; the store's unique key decides.
    let user = state
        .repo
        .create_user(&username, &hash)
        .await?
        .ok_or_else(taken)?;

    tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
    login_redirect(&state, user.id, ALL_EVENTS_PATH)
}

/// login_form
///
/// [Public Route] Login form. Anonymous requests to protected routes are redirected here; the
/// sanitized `next` is echoed back for the subsequent POST.
#[utoipa::path(
    get,
    path = "/accounts/login/",
    params(ReturnTo),
    responses((status = 200, description = "Login form", body = AccountFormPage))
)]
pub async fn login_form(Query(return_to): Query<ReturnTo>) -> Json<AccountFormPage> {
    Json(AccountFormPage {
        action: auth::LOGIN_PATH.to_string(),
        fields: vec!["username".to_string(), "password".to_string()],
        next: Some(return_to.target(ALL_EVENTS_PATH).to_string()),
    })
}

/// login
///
/// [Public Route] Verifies credentials, sets the session cookie and redirects to `next`
/// (local paths only) or /all-events/.
#[utoipa::path(
    post,
    path = "/accounts/login/",
    params(ReturnTo),
    request_body = LoginForm,
    responses(
        (status = 303, description = "Logged in"),
        (status = 400, description = "Wrong username or password", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Query(return_to): Query<ReturnTo>,
    JsonForm(form): JsonForm<LoginForm>,
) -> Result<Response, AppError> {
    let creds = state
        .repo
        .get_credentials(form.username.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(form.password, creds.password_hash).await {
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!(user_id = %creds.id, "user logged in");
    login_redirect(&state, creds.id, return_to.target(ALL_EVENTS_PATH))
}

/// logout
///
/// [Public Route] Clears the session cookie and redirects to /.
#[utoipa::path(
    post,
    path = "/accounts/logout/",
    responses((status = 303, description = "Logged out"))
)]
pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, auth::clear_session_cookie_header())],
        Redirect::to(ROOT_PATH),
    )
        .into_response()
}
