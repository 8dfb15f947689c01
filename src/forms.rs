use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::AppError;

/// Per-field error messages, keyed by form field name.
///
/// Serialized as a JSON object (`{"title": ["This field is required."]}`) in the `details`
/// member of error responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors that belong to the form as a whole rather than to one field.
    pub fn non_field(message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(NON_FIELD_ERRORS, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

pub const REQUIRED: &str = "This field is required.";
/// Key for errors not tied to a single field, e.g. an unparseable body.
pub const NON_FIELD_ERRORS: &str = "__all__";

const TEXT_MAX_CHARS: usize = 255;
const USERNAME_MAX_CHARS: usize = 150;
const PASSWORD_MIN_CHARS: usize = 8;

// Accepted input formats, most specific last.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

// --- Event form ---

/// EventForm
///
/// Raw create/update payload. Every field is optional on the wire so that a missing value
/// surfaces as a field error instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
#[serde(default)]
pub struct EventForm {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `YYYY-MM-DD`.
    #[schema(example = "2024-06-01")]
    pub date: Option<String>,
    /// `HH:MM` or `HH:MM:SS`.
    #[schema(example = "09:00")]
    pub time: Option<String>,
    pub location: Option<String>,
    pub volunteers_needed: Option<i64>,
}

/// Validated event fields, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFields {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub volunteers_needed: i32,
}

/// Initial values shown on an empty create form.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct EventFormDefaults {
    #[ts(type = "string")]
    pub date: NaiveDate,
    #[ts(type = "string")]
    pub time: NaiveTime,
    pub volunteers_needed: i32,
}

impl EventForm {
    /// validate
    ///
    /// Checks every field and collects all errors at once. `date`/`time` fall back to the
    /// supplied values when omitted: "today"/"now" on create, the stored values on update.
    pub fn validate(
        self,
        default_date: NaiveDate,
        default_time: NaiveTime,
    ) -> Result<EventFields, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = required_text(&mut errors, "title", self.title, Some(TEXT_MAX_CHARS));
        let description = required_text(&mut errors, "description", self.description, None);
        let location = required_text(&mut errors, "location", self.location, Some(TEXT_MAX_CHARS));

        let date = match blank_to_none(self.date) {
            None => Some(default_date),
            Some(raw) => {
                let parsed = parse_date(&raw);
                if parsed.is_none() {
                    errors.add("date", "Enter a valid date.");
                }
                parsed
            }
        };

        let time = match blank_to_none(self.time) {
            None => Some(default_time),
            Some(raw) => {
                let parsed = parse_time(&raw);
                if parsed.is_none() {
                    errors.add("time", "Enter a valid time.");
                }
                parsed
            }
        };

        let volunteers_needed = match self.volunteers_needed.unwrap_or(1) {
            n if n < 0 => {
                errors.add("volunteers_needed", "Ensure this value is greater than or equal to 0.");
                None
            }
            n => match i32::try_from(n) {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.add(
                        "volunteers_needed",
                        format!("Ensure this value is less than or equal to {}.", i32::MAX),
                    );
                    None
                }
            },
        };

        match (title, description, date, time, location, volunteers_needed) {
            (Some(title), Some(description), Some(date), Some(time), Some(location), Some(volunteers_needed))
                if errors.is_empty() =>
            {
                Ok(EventFields {
                    title,
                    description,
                    date,
                    time,
                    location,
                    volunteers_needed,
                })
            }
            _ => Err(errors),
        }
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_chars: Option<usize>,
) -> Option<String> {
    let Some(value) = blank_to_none(value) else {
        errors.add(field, REQUIRED);
        return None;
    };
    let value = value.trim().to_string();
    if let Some(max) = max_chars {
        let len = value.chars().count();
        if len > max {
            errors.add(
                field,
                format!("Ensure this value has at most {max} characters (it has {len})."),
            );
            return None;
        }
    }
    Some(value)
}

// --- Signup / login forms ---

/// SignupForm
///
/// Registration payload. The password is entered twice; only a bcrypt hash is ever stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

// A short list of passwords rejected outright; the full common-password corpus is not shipped.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "letmein1", "welcome1", "admin123",
    "abc12345", "football", "baseball", "sunshine", "princess", "trustno1",
];

impl SignupForm {
    /// validate
    ///
    /// Returns the cleaned username on success. Username uniqueness is checked separately
    /// by the caller against the store.
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = self.username.trim();

        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() > USERNAME_MAX_CHARS {
            errors.add(
                "username",
                format!(
                    "Ensure this value has at most {USERNAME_MAX_CHARS} characters (it has {}).",
                    username.chars().count()
                ),
            );
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }

        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                for message in password_problems(&self.password2, username) {
                    errors.add("password2", message);
                }
            }
        }

        if errors.is_empty() {
            Ok(username.to_string())
        } else {
            Err(errors)
        }
    }
}

fn password_problems(password: &str, username: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let lowered = password.to_lowercase();

    if !username.is_empty() {
        let user = username.to_lowercase();
        if lowered.contains(&user) || user.contains(&lowered) {
            problems.push("The password is too similar to the username.".to_string());
        }
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        problems.push(format!(
            "This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}

/// LoginForm
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

// --- Request body extraction ---

/// A JSON form body. Decides which error a body that fails to deserialize turns into.
pub trait FormPayload: DeserializeOwned + Send {
    fn rejected(rejection: JsonRejection) -> AppError {
        rejection.into()
    }
}

impl FormPayload for EventForm {}

impl FormPayload for LoginForm {}

impl FormPayload for SignupForm {
    // Every failed signup reports the same generic message.
    fn rejected(rejection: JsonRejection) -> AppError {
        AppError::InvalidSignup(FieldErrors::non_field(rejection.body_text()))
    }
}

/// JsonForm
///
/// `Json<T>` whose rejections go through `AppError`, so a malformed body still answers with the
/// JSON error envelope.
#[derive(Debug, Clone)]
pub struct JsonForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonForm<T>
where
    S: Send + Sync,
    T: FormPayload,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonForm(value)),
            Err(rejection) => Err(T::rejected(rejection)),
        }
    }
}
