use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Public identity of an account (`users` table). The password hash never leaves
/// `UserCredentials`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// UserCredentials
///
/// Internal row used only by the login flow.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

/// Event
///
/// A volunteering event (`volunteering_events` table) joined with its organizer's username,
/// its volunteer roster and its like count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
    #[ts(type = "string")]
    pub time: NaiveTime,
    pub location: String,
    pub volunteers_needed: i32,
    // FK to users.id. Set once at creation, never reassigned.
    pub organizer_id: Uuid,
    pub organizer_username: String,
    // Unordered membership, aggregated from event_volunteers.
    pub volunteers: Vec<Uuid>,
    pub like_count: i64,
}

impl Event {
    pub fn volunteer_count(&self) -> usize {
        self.volunteers.len()
    }

    pub fn has_volunteer(&self, user_id: Uuid) -> bool {
        self.volunteers.contains(&user_id)
    }

    pub fn is_organized_by(&self, user_id: Uuid) -> bool {
        self.organizer_id == user_id
    }
}

/// Like
///
/// One row of the `likes` table. The composite primary key (user_id, event_id) allows at most
/// one like per user and event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Like {
    pub user_id: Uuid,
    pub event_id: i64,
}

// --- Response Payloads (Output Schemas) ---

/// AllEventsResponse
///
/// Output of GET /all-events/: every event plus the ids of events the caller has liked.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AllEventsResponse {
    pub events: Vec<Event>,
    // Distinct ids, ascending.
    pub liked_events: Vec<i64>,
}

/// HomePage
///
/// Landing document served at `/`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HomePage {
    pub name: String,
    pub links: Vec<String>,
}

/// AccountFormPage
///
/// GET view of the signup and login forms: where to post and which fields to send.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccountFormPage {
    pub action: String,
    pub fields: Vec<String>,
    // Sanitized return target, login only.
    pub next: Option<String>,
}
