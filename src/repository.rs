use crate::{
    error::AppError,
    forms::EventFields,
    models::{Event, Like, User, UserCredentials},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, AppError>;

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are interchangeable.
///
/// Ownership is NOT checked here: handlers load the event, compare the organizer and only then
/// call a mutating method.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>>;
    // Returns None when the username is already taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> RepoResult<Option<User>>;

    // --- Event retrieval (all ordered by date, time, id) ---
    async fn get_event(&self, id: i64) -> RepoResult<Option<Event>>;
    async fn list_events_by_organizer(&self, organizer_id: Uuid) -> RepoResult<Vec<Event>>;
    async fn list_events_by_volunteer(&self, user_id: Uuid) -> RepoResult<Vec<Event>>;
    async fn list_all_events(&self) -> RepoResult<Vec<Event>>;

    // --- Event mutation ---
    async fn create_event(&self, organizer_id: Uuid, fields: EventFields) -> RepoResult<Event>;
    // Returns None if the event no longer exists.
    async fn update_event(&self, id: i64, fields: EventFields) -> RepoResult<Option<Event>>;
    // Cascades to the roster and to likes. Returns false if nothing was deleted.
    async fn delete_event(&self, id: i64) -> RepoResult<bool>;

    // --- Volunteer roster (idempotent; true when membership changed) ---
    async fn add_volunteer(&self, event_id: i64, user_id: Uuid) -> RepoResult<bool>;
    async fn remove_volunteer(&self, event_id: i64, user_id: Uuid) -> RepoResult<bool>;

    // --- Likes (idempotent; true when a row was created/removed) ---
    async fn like_event(&self, like: Like) -> RepoResult<bool>;
    async fn unlike_event(&self, like: Like) -> RepoResult<bool>;
    async fn liked_event_ids(&self, user_id: Uuid) -> RepoResult<Vec<i64>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// Shared projection for every event read: organizer name, aggregated roster, like count.
const EVENT_SELECT: &str = r#"
    SELECT
        e.id, e.title, e.description, e.date, e.time, e.location, e.volunteers_needed,
        e.organizer_id,
        u.username AS organizer_username,
        COALESCE(ARRAY_AGG(v.user_id) FILTER (WHERE v.user_id IS NOT NULL), '{}') AS volunteers,
        (SELECT COUNT(*) FROM likes l WHERE l.event_id = e.id) AS like_count
    FROM volunteering_events e
    JOIN users u ON u.id = e.organizer_id
    LEFT JOIN event_volunteers v ON v.event_id = e.id
"#;

const EVENT_GROUP_ORDER: &str = " GROUP BY e.id, u.username ORDER BY e.date, e.time, e.id";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Uniqueness of roster entries and likes is enforced by
/// composite primary keys, so the toggles are single `ON CONFLICT DO NOTHING` / `DELETE`
/// statements.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_events(&self, filter: &str, user_id: Option<Uuid>) -> RepoResult<Vec<Event>> {
        let sql = format!("{EVENT_SELECT} {filter} {EVENT_GROUP_ORDER}");
        let mut query = sqlx::query_as::<_, Event>(&sql);
        if let Some(id) = user_id {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(creds)
    }

    /// create_user
    ///
    /// `ON CONFLICT DO NOTHING` on the unique username turns a duplicate signup into `None`
    /// instead of a database error.
    async fn create_user(&self, username: &str, password_hash: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, username, password_hash) VALUES ($1, $2, $3)
               ON CONFLICT (username) DO NOTHING
               RETURNING id, username"#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_event(&self, id: i64) -> RepoResult<Option<Event>> {
        let sql = format!("{EVENT_SELECT} WHERE e.id = $1 {EVENT_GROUP_ORDER}");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_events_by_organizer(&self, organizer_id: Uuid) -> RepoResult<Vec<Event>> {
        self.fetch_events("WHERE e.organizer_id = $1", Some(organizer_id))
            .await
    }

    async fn list_events_by_volunteer(&self, user_id: Uuid) -> RepoResult<Vec<Event>> {
        self.fetch_events(
            "WHERE EXISTS (SELECT 1 FROM event_volunteers m WHERE m.event_id = e.id AND m.user_id = $1)",
            Some(user_id),
        )
        .await
    }

    async fn list_all_events(&self) -> RepoResult<Vec<Event>> {
        self.fetch_events("", None).await
    }

    async fn create_event(&self, organizer_id: Uuid, fields: EventFields) -> RepoResult<Event> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO volunteering_events
                   (title, description, date, time, location, volunteers_needed, organizer_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id"#,
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.date)
        .bind(fields.time)
        .bind(&fields.location)
        .bind(fields.volunteers_needed)
        .bind(organizer_id)
        .fetch_one(&self.pool)
        .await?;

        self.get_event(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("event {id} vanished after insert")))
    }

    async fn update_event(&self, id: i64, fields: EventFields) -> RepoResult<Option<Event>> {
        let updated = sqlx::query(
            r#"UPDATE volunteering_events
               SET title = $2, description = $3, date = $4, time = $5,
                   location = $6, volunteers_needed = $7
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.date)
        .bind(fields.time)
        .bind(&fields.location)
        .bind(fields.volunteers_needed)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_event(id).await
    }

    async fn delete_event(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM volunteering_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_volunteer(&self, event_id: i64, user_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query(
            "INSERT INTO event_volunteers (event_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove_volunteer(&self, event_id: i64, user_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM event_volunteers WHERE event_id = $1 AND user_id = $2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// like_event
    ///
    /// Get-or-create: the composite primary key on `likes` makes a repeated like a no-op.
    async fn like_event(&self, like: Like) -> RepoResult<bool> {
        let res = sqlx::query(
            "INSERT INTO likes (user_id, event_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(like.user_id)
        .bind(like.event_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn unlike_event(&self, like: Like) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND event_id = $2")
            .bind(like.user_id)
            .bind(like.event_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn liked_event_ids(&self, user_id: Uuid) -> RepoResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT event_id FROM likes WHERE user_id = $1 ORDER BY event_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

// --- In-memory implementation ---

struct StoredUser {
    username: String,
    password_hash: String,
}

struct StoredEvent {
    fields: EventFields,
    organizer_id: Uuid,
    volunteers: BTreeSet<Uuid>,
}

#[derive(Default)]
struct MemoryTables {
    users: BTreeMap<Uuid, StoredUser>,
    events: BTreeMap<i64, StoredEvent>,
    likes: BTreeSet<(Uuid, i64)>,
    next_event_id: i64,
}

impl MemoryTables {
    fn event_view(&self, id: i64) -> Option<Event> {
        let stored = self.events.get(&id)?;
        let organizer_username = self
            .users
            .get(&stored.organizer_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        let like_count = self.likes.iter().filter(|(_, e)| *e == id).count() as i64;
        Some(Event {
            id,
            title: stored.fields.title.clone(),
            description: stored.fields.description.clone(),
            date: stored.fields.date,
            time: stored.fields.time,
            location: stored.fields.location.clone(),
            volunteers_needed: stored.fields.volunteers_needed,
            organizer_id: stored.organizer_id,
            organizer_username,
            volunteers: stored.volunteers.iter().copied().collect(),
            like_count,
        })
    }

    fn events_where(&self, keep: impl Fn(&StoredEvent) -> bool) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|(_, stored)| keep(stored))
            .filter_map(|(id, _)| self.event_view(*id))
            .collect();
        events.sort_by(|a, b| (a.date, a.time, a.id).cmp(&(b.date, b.time, b.id)));
        events
    }
}

/// InMemoryRepository
///
/// Process-local `Repository` with the same semantics as the Postgres store (unique usernames,
/// unique likes, cascade on event delete). Used by the test suites and for running the API
/// without a database.
#[derive(Default, Clone)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<MemoryTables>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user directly, bypassing signup validation. Returns None if the name is taken.
    pub fn insert_user(&self, username: &str, password_hash: &str) -> RepoResult<Option<User>> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.username == username) {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        tables.users.insert(
            id,
            StoredUser {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(Some(User {
            id,
            username: username.to_string(),
        }))
    }

    /// Number of like rows for a (user, event) pair: 0 or 1.
    pub fn like_rows(&self, like: Like) -> usize {
        self.lock()
            .map(|t| usize::from(t.likes.contains(&(like.user_id, like.event_id))))
            .unwrap_or(0)
    }

    /// Number of like rows referencing an event, including rows of deleted events.
    pub fn likes_for_event(&self, event_id: i64) -> usize {
        self.lock()
            .map(|t| t.likes.iter().filter(|(_, e)| *e == event_id).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, MemoryTables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let tables = self.lock()?;
        Ok(tables.users.get(&id).map(|u| User {
            id,
            username: u.username.clone(),
        }))
    }

    async fn get_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .iter()
            .find(|(_, u)| u.username == username)
            .map(|(id, u)| UserCredentials {
                id: *id,
                username: u.username.clone(),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> RepoResult<Option<User>> {
        self.insert_user(username, password_hash)
    }

    async fn get_event(&self, id: i64) -> RepoResult<Option<Event>> {
        Ok(self.lock()?.event_view(id))
    }

    async fn list_events_by_organizer(&self, organizer_id: Uuid) -> RepoResult<Vec<Event>> {
        Ok(self.lock()?.events_where(|e| e.organizer_id == organizer_id))
    }

    async fn list_events_by_volunteer(&self, user_id: Uuid) -> RepoResult<Vec<Event>> {
        Ok(self.lock()?.events_where(|e| e.volunteers.contains(&user_id)))
    }

    async fn list_all_events(&self) -> RepoResult<Vec<Event>> {
        Ok(self.lock()?.events_where(|_| true))
    }

    async fn create_event(&self, organizer_id: Uuid, fields: EventFields) -> RepoResult<Event> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&organizer_id) {
            return Err(AppError::Internal(format!("unknown organizer {organizer_id}")));
        }
        tables.next_event_id += 1;
        let id = tables.next_event_id;
        tables.events.insert(
            id,
            StoredEvent {
                fields,
                organizer_id,
                volunteers: BTreeSet::new(),
            },
        );
        tables
            .event_view(id)
            .ok_or_else(|| AppError::Internal(format!("event {id} vanished after insert")))
    }

    async fn update_event(&self, id: i64, fields: EventFields) -> RepoResult<Option<Event>> {
        let mut tables = self.lock()?;
        match tables.events.get_mut(&id) {
            Some(stored) => stored.fields = fields,
            None => return Ok(None),
        }
        Ok(tables.event_view(id))
    }

    async fn delete_event(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        let removed = tables.events.remove(&id).is_some();
        if removed {
            tables.likes.retain(|(_, event_id)| *event_id != id);
        }
        Ok(removed)
    }

    async fn add_volunteer(&self, event_id: i64, user_id: Uuid) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(tables
            .events
            .get_mut(&event_id)
            .is_some_and(|e| e.volunteers.insert(user_id)))
    }

    async fn remove_volunteer(&self, event_id: i64, user_id: Uuid) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(tables
            .events
            .get_mut(&event_id)
            .is_some_and(|e| e.volunteers.remove(&user_id)))
    }

    async fn like_event(&self, like: Like) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        if !tables.events.contains_key(&like.event_id) {
            return Ok(false);
        }
        Ok(tables.likes.insert((like.user_id, like.event_id)))
    }

    async fn unlike_event(&self, like: Like) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(tables.likes.remove(&(like.user_id, like.event_id)))
    }

    async fn liked_event_ids(&self, user_id: Uuid) -> RepoResult<Vec<i64>> {
        let tables = self.lock()?;
        Ok(tables
            .likes
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, e)| *e)
            .collect())
    }
}
