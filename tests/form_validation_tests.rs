use chrono::{NaiveDate, NaiveTime};
use volunteer_hub::forms::{EventForm, REQUIRED, SignupForm, parse_time};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
}

fn now() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 30, 0).unwrap()
}

fn park_cleanup() -> EventForm {
    EventForm {
        title: Some("Park Cleanup".to_string()),
        description: Some("Bring gloves".to_string()),
        date: Some("2024-06-01".to_string()),
        time: Some("09:00".to_string()),
        location: Some("Riverside Park".to_string()),
        volunteers_needed: Some(5),
    }
}

// --- EventForm ---

#[test]
fn test_event_form_valid() {
    let fields = park_cleanup().validate(today(), now()).unwrap();

    assert_eq!(fields.title, "Park Cleanup");
    assert_eq!(fields.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    assert_eq!(fields.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(fields.volunteers_needed, 5);
}

#[test]
fn test_event_form_applies_defaults() {
    let form = EventForm {
        date: None,
        time: Some("   ".to_string()),
        volunteers_needed: None,
        ..park_cleanup()
    };

    let fields = form.validate(today(), now()).unwrap();

    assert_eq!(fields.date, today());
    assert_eq!(fields.time, now());
    assert_eq!(fields.volunteers_needed, 1);
}

#[test]
fn test_event_form_reports_every_missing_field() {
    let errors = EventForm::default().validate(today(), now()).unwrap_err();

    for field in ["title", "description", "location"] {
        assert_eq!(errors.get(field), [REQUIRED.to_string()], "field {field}");
    }
    // date/time/volunteers_needed have defaults
    assert!(!errors.has("date"));
    assert!(!errors.has("volunteers_needed"));
}

#[test]
fn test_event_form_rejects_bad_values() {
    let form = EventForm {
        title: Some("x".repeat(256)),
        date: Some("01/06/2024".to_string()),
        time: Some("25:00".to_string()),
        volunteers_needed: Some(-1),
        ..park_cleanup()
    };

    let errors = form.validate(today(), now()).unwrap_err();

    assert_eq!(
        errors.get("title"),
        ["Ensure this value has at most 255 characters (it has 256).".to_string()]
    );
    assert_eq!(errors.get("date"), ["Enter a valid date.".to_string()]);
    assert_eq!(errors.get("time"), ["Enter a valid time.".to_string()]);
    assert!(errors.has("volunteers_needed"));
    assert!(!errors.has("location"));
}

#[test]
fn test_event_form_zero_volunteers_allowed() {
    let form = EventForm {
        volunteers_needed: Some(0),
        ..park_cleanup()
    };
    assert_eq!(form.validate(today(), now()).unwrap().volunteers_needed, 0);

    let too_many = EventForm {
        volunteers_needed: Some(i64::from(i32::MAX) + 1),
        ..park_cleanup()
    };
    assert!(too_many.validate(today(), now()).unwrap_err().has("volunteers_needed"));
}

#[test]
fn test_time_formats() {
    assert_eq!(parse_time("09:00"), NaiveTime::from_hms_opt(9, 0, 0));
    assert_eq!(parse_time("09:00:30"), NaiveTime::from_hms_opt(9, 0, 30));
    assert_eq!(
        parse_time("09:00:30.250000"),
        NaiveTime::from_hms_milli_opt(9, 0, 30, 250)
    );
    assert_eq!(parse_time("9am"), None);
}

#[test]
fn test_event_form_deserializes_partial_json() {
    let form: EventForm = serde_json::from_str(r#"{"title": "Food Drive"}"#).unwrap();
    assert_eq!(form.title.as_deref(), Some("Food Drive"));
    assert!(form.description.is_none());
}

// --- SignupForm ---

fn signup(username: &str, p1: &str, p2: &str) -> SignupForm {
    SignupForm {
        username: username.to_string(),
        password1: p1.to_string(),
        password2: p2.to_string(),
    }
}

#[test]
fn test_signup_valid() {
    let username = signup("  alice ", "s3cure-passphrase", "s3cure-passphrase")
        .validate()
        .unwrap();
    assert_eq!(username, "alice");
}

#[test]
fn test_signup_password_mismatch() {
    let errors = signup("alice", "s3cure-passphrase", "different-passphrase")
        .validate()
        .unwrap_err();
    assert_eq!(
        errors.get("password2"),
        ["The two password fields didn't match.".to_string()]
    );
}

#[test]
fn test_signup_weak_passwords() {
    let errors = signup("alice", "1234567", "1234567").validate().unwrap_err();
    let messages = errors.get("password2");
    assert!(messages.iter().any(|m| m.contains("too short")));
    assert!(messages.iter().any(|m| m.contains("entirely numeric")));

    let errors = signup("alice", "password", "password").validate().unwrap_err();
    assert!(errors.get("password2").iter().any(|m| m.contains("too common")));

    let errors = signup("bartholomew", "Bartholomew99", "Bartholomew99")
        .validate()
        .unwrap_err();
    assert!(errors.get("password2").iter().any(|m| m.contains("too similar")));
}

#[test]
fn test_signup_username_rules() {
    let errors = signup("", "s3cure-passphrase", "s3cure-passphrase")
        .validate()
        .unwrap_err();
    assert_eq!(errors.get("username"), [REQUIRED.to_string()]);

    let errors = signup("bad name!", "s3cure-passphrase", "s3cure-passphrase")
        .validate()
        .unwrap_err();
    assert!(errors.get("username")[0].starts_with("Enter a valid username."));

    assert!(
        signup("a.b+c-d_e@f", "s3cure-passphrase", "s3cure-passphrase")
            .validate()
            .is_ok()
    );

    let errors = signup(&"u".repeat(151), "s3cure-passphrase", "s3cure-passphrase")
        .validate()
        .unwrap_err();
    assert!(errors.has("username"));
}

#[test]
fn test_signup_missing_passwords() {
    let errors = signup("alice", "", "").validate().unwrap_err();
    assert_eq!(errors.get("password1"), [REQUIRED.to_string()]);
    assert_eq!(errors.get("password2"), [REQUIRED.to_string()]);
}
