use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::db::ProfileRecord;

/// Exact key set a signup payload must carry once the service has stamped it.
pub const REQUIRED_KEYS: [&str; 6] = [
    "first_name",
    "last_name",
    "email",
    "user_name",
    "password",
    "creation_date_time",
];

/// Stamps `creation_date_time` onto the payload (overwriting any value the
/// caller sent), then checks that the key set matches [`REQUIRED_KEYS`]
/// exactly and that every value renders to non-empty text.
///
/// Content is judged by text length only: `0`, `null` or `[]` all pass, an
/// empty string fails. Stricter form validation is a client-side concern.
pub fn validate_payload(payload: &mut Map<String, Value>, now: OffsetDateTime) -> bool {
    let stamp = now.format(&Rfc3339).unwrap_or_default();
    payload.insert("creation_date_time".into(), Value::String(stamp));

    if payload.len() != REQUIRED_KEYS.len() {
        return false;
    }
    if !REQUIRED_KEYS.iter().all(|key| payload.contains_key(*key)) {
        return false;
    }
    payload.values().all(|value| !value_as_text(value).is_empty())
}

/// Field rendering used both for validation and for persistence: strings
/// verbatim, everything else through its JSON form.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Splits a validated payload into the profile half and the raw material for
/// the credentials half: `(profile, user_name, plaintext password)`. The
/// plaintext is consumed by the hasher right after; it is never persisted.
pub fn split_payload(
    payload: &Map<String, Value>,
    now: OffsetDateTime,
) -> Option<(ProfileRecord, String, String)> {
    let text = |key: &str| payload.get(key).map(value_as_text);
    Some((
        ProfileRecord {
            first_name: text("first_name")?,
            last_name: text("last_name")?,
            email: text("email")?,
            creation_date_time: now,
        },
        text("user_name")?,
        text("password")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn complete() -> Map<String, Value> {
        fields(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "user_name": "alovelace",
            "password": "engine-no-1",
        }))
    }

    #[test]
    fn complete_payload_is_valid() {
        let mut payload = complete();
        assert!(validate_payload(&mut payload, OffsetDateTime::now_utc()));
    }

    #[test]
    fn timestamp_is_stamped_onto_the_payload() {
        let mut payload = complete();
        payload.insert("creation_date_time".into(), json!("caller-supplied"));
        assert!(validate_payload(&mut payload, OffsetDateTime::now_utc()));
        let stamped = payload["creation_date_time"].as_str().unwrap();
        assert_ne!(stamped, "caller-supplied");
        assert!(stamped.contains('T'));
    }

    #[test]
    fn missing_key_is_invalid() {
        for key in ["first_name", "last_name", "email", "user_name", "password"] {
            let mut payload = complete();
            payload.remove(key);
            assert!(
                !validate_payload(&mut payload, OffsetDateTime::now_utc()),
                "payload without {key} should be invalid"
            );
        }
    }

    #[test]
    fn extra_key_is_invalid() {
        let mut payload = complete();
        payload.insert("middle_name".into(), json!("Augusta"));
        assert!(!validate_payload(&mut payload, OffsetDateTime::now_utc()));
    }

    #[test]
    fn empty_string_value_is_invalid() {
        let mut payload = complete();
        payload.insert("last_name".into(), json!(""));
        assert!(!validate_payload(&mut payload, OffsetDateTime::now_utc()));
    }

    #[test]
    fn zero_and_null_values_pass_the_length_check() {
        let mut payload = complete();
        payload.insert("first_name".into(), json!(0));
        payload.insert("last_name".into(), json!(null));
        assert!(validate_payload(&mut payload, OffsetDateTime::now_utc()));
    }

    #[test]
    fn split_renders_non_string_fields_as_text() {
        let mut payload = complete();
        payload.insert("first_name".into(), json!(0));
        let now = OffsetDateTime::now_utc();
        assert!(validate_payload(&mut payload, now));

        let (profile, user_name, password) = split_payload(&payload, now).expect("split");
        assert_eq!(profile.first_name, "0");
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.creation_date_time, now);
        assert_eq!(user_name, "alovelace");
        assert_eq!(password, "engine-no-1");
    }
}
