use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Method, Request, Uri, header, request::Parts},
    response::IntoResponse,
};
use chrono::{NaiveDate, NaiveTime};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;
use volunteer_hub::{
    AppError, AppState, InMemoryRepository,
    auth::{self, AuthUser, Claims, LoginRequired},
    config::{AppConfig, Env},
    models::{Event, User},
};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn create_token(user_id: Uuid, exp_offset_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset_secs) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: InMemoryRepository) -> AppState {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState::new(Arc::new(repo), config)
}

fn seeded_repo() -> (InMemoryRepository, User) {
    let repo = InMemoryRepository::new();
    let user = repo.insert_user("alice", "unused-hash").unwrap().unwrap();
    (repo, user)
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn event_organized_by(organizer_id: Uuid) -> Event {
    Event {
        id: 7,
        title: "Park Cleanup".to_string(),
        description: String::new(),
        date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        location: "Riverside Park".to_string(),
        volunteers_needed: 5,
        organizer_id,
        organizer_username: "alice".to_string(),
        volunteers: vec![],
        like_count: 0,
    }
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_bearer_token() {
    let (repo, user) = seeded_repo();
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/events/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", create_token(user.id, 3600))).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.username, "alice");
}

#[tokio::test]
async fn test_auth_success_with_session_cookie() {
    let (repo, user) = seeded_repo();
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/events/".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!(
            "theme=dark; session={}; other=1",
            create_token(user.id, 3600)
        ))
        .unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, user.id);
}

#[tokio::test]
async fn test_auth_missing_credentials_redirects_to_login() {
    let (repo, _) = seeded_repo();
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/events/".parse().unwrap());

    let rejection = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert_eq!(
        rejection,
        LoginRequired {
            next: "/events/".to_string()
        }
    );
    let response = rejection.into_response();
    assert_eq!(response.status(), 303);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/accounts/login/?next=%2Fevents%2F"
    );
}

#[tokio::test]
async fn test_login_redirect_keeps_encoded_query_string() {
    let (repo, _) = seeded_repo();
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/all-events/?page=2&sort=date".parse().unwrap());

    let rejection = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert_eq!(rejection.next, "/all-events/?page=2&sort=date");
    assert_eq!(
        rejection.location(),
        "/accounts/login/?next=%2Fall-events%2F%3Fpage%3D2%26sort%3Ddate"
    );
}

#[tokio::test]
async fn test_auth_rejects_expired_token() {
    let (repo, user) = seeded_repo();
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", create_token(user.id, -3600))).unwrap(),
    );

    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
}

#[tokio::test]
async fn test_auth_rejects_token_signed_with_other_secret() {
    let (repo, user) = seeded_repo();
    let mut state = create_app_state(Env::Production, repo);
    state.config.jwt_secret = "a-different-secret".to_string();

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", create_token(user.id, 3600))).unwrap(),
    );

    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
}

#[tokio::test]
async fn test_auth_rejects_token_for_unknown_user() {
    let (repo, _) = seeded_repo();
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", create_token(Uuid::new_v4(), 3600)))
            .unwrap(),
    );

    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
}

#[tokio::test]
async fn test_local_bypass_success() {
    let (repo, user) = seeded_repo();
    let state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        "x-user-id",
        HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, user.id);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let (repo, user) = seeded_repo();
    let state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        "x-user-id",
        HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
}

#[test]
fn test_issued_token_round_trips_through_verification() {
    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    let user_id = Uuid::new_v4();

    let token = auth::issue_session_token(user_id, &config).unwrap();

    assert_eq!(auth::verify_session_token(&token, &config).unwrap(), user_id);
}

#[test]
fn test_session_cookie_flags() {
    let mut config = AppConfig::default();
    let local = auth::session_cookie_header("tok", &config);
    assert!(local.starts_with("session=tok; HttpOnly; Path=/; SameSite=Lax"));
    assert!(!local.contains("Secure"));

    config.env = Env::Production;
    assert!(auth::session_cookie_header("tok", &config).ends_with("; Secure"));
    assert!(auth::clear_session_cookie_header().contains("Max-Age=0"));
}

#[test]
fn test_ensure_organizer() {
    let organizer = AuthUser {
        id: Uuid::new_v4(),
        username: "alice".to_string(),
    };
    let stranger = AuthUser {
        id: Uuid::new_v4(),
        username: "bob".to_string(),
    };
    let event = event_organized_by(organizer.id);

    assert!(organizer.ensure_organizer(&event).is_ok());
    assert!(matches!(
        stranger.ensure_organizer(&event),
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_password_hash_and_verify() {
    let hash = auth::hash_password("s3cure-passphrase".to_string(), 4)
        .await
        .unwrap();

    assert!(auth::verify_password("s3cure-passphrase".to_string(), hash.clone()).await);
    assert!(!auth::verify_password("wrong".to_string(), hash).await);
    assert!(!auth::verify_password("anything".to_string(), "not-a-hash".to_string()).await);
}
