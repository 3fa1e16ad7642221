//! The `QuickTest` record and its request types.
//!
//! The manufacturer enters the list of unregistered tests. A person registers
//! a test by name, and the test expires 24 hours after registration, at which
//! point the name is scrubbed.

use crate::error::{QuickTestError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// How long a registration stays valid before the registrant is scrubbed.
pub const QUICK_TEST_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on the registrant name, in characters.
pub const QUICK_TEST_MAX_PERSON_LEN: usize = 4000;

/// Identifier of a physical test kit.
///
/// The canonical form is a random (version 4) UUID rendered as lowercase
/// hyphenated text, e.g. `0f8fad5b-d9cb-469f-a165-70867728950e`.
///
/// [`QuickTestId::new`] wraps any string without checking it, so malformed
/// input can reach [`QuickTestId::validate`] and be rejected with
/// [`QuickTestError::Invalid`]. Parsing through [`FromStr`] validates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuickTestId(String);

impl QuickTestId {
    /// Wrap a raw identifier without validating it.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// The identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Check that the identifier is a canonical random UUID.
    ///
    /// # Errors
    ///
    /// Returns [`QuickTestError::Invalid`] if the identifier is empty, is not a
    /// UUID, is not in lowercase hyphenated form, or is not an RFC 4122
    /// version 4 UUID.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(QuickTestError::invalid("quick test id is required"));
        }

        let parsed = Uuid::parse_str(&self.0)
            .map_err(|_| QuickTestError::invalid("quick test id is not a valid UUID"))?;

        if parsed.hyphenated().to_string() != self.0 {
            return Err(QuickTestError::invalid(
                "quick test id must be a lowercase hyphenated UUID",
            ));
        }

        if parsed.get_version() != Some(uuid::Version::Random)
            || parsed.get_variant() != uuid::Variant::RFC4122
        {
            return Err(QuickTestError::invalid("quick test id must be a random UUID"));
        }

        Ok(())
    }
}

impl fmt::Display for QuickTestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QuickTestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for QuickTestId {
    type Err = QuickTestError;

    fn from_str(s: &str) -> Result<Self> {
        let id = Self::new(s);
        id.validate()?;
        Ok(id)
    }
}

/// Request to bind a kit to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickTestRegister {
    /// Kit to register.
    pub id: QuickTestId,
    /// Full name of the registrant.
    pub person: String,
}

impl QuickTestRegister {
    /// Create a registration request.
    #[must_use]
    pub fn new(id: QuickTestId, person: impl Into<String>) -> Self {
        Self {
            id,
            person: person.into(),
        }
    }

    /// Validate the request before touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`QuickTestError::Invalid`] if the id is invalid, the person is
    /// blank, or the person exceeds [`QUICK_TEST_MAX_PERSON_LEN`] characters.
    pub fn validate(&self) -> Result<()> {
        self.id.validate()?;

        if self.person.trim().is_empty() {
            return Err(QuickTestError::invalid("person is required"));
        }

        if self.person.chars().count() > QUICK_TEST_MAX_PERSON_LEN {
            return Err(QuickTestError::invalid(format!(
                "person must be at most {QUICK_TEST_MAX_PERSON_LEN} characters"
            )));
        }

        Ok(())
    }
}

/// One physical test kit.
///
/// Invariants maintained by the store:
/// - `person` is `Some` iff the kit is registered and not expired
/// - `registered_at` is set once and never reset, even after expiry
/// - `expired` only ever goes from `false` to `true`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickTest {
    /// Kit identifier, immutable once created.
    pub id: QuickTestId,

    /// Registrant's full name. `None` before registration and after expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,

    /// Whether the personal data has been scrubbed.
    #[serde(default)]
    pub expired: bool,

    /// Set by the store's unit-of-work clock on creation.
    pub created_at: DateTime<Utc>,

    /// Set by the store's unit-of-work clock on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl QuickTest {
    /// A freshly created, unregistered kit.
    #[must_use]
    pub const fn new(id: QuickTestId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            person: None,
            expired: false,
            created_at,
            registered_at: None,
        }
    }

    /// Whether the kit has ever been registered.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered_at.is_some()
    }

    /// When the validity window closes, if the kit is registered.
    #[must_use]
    pub fn expires_at(&self, validity: Duration) -> Option<DateTime<Utc>> {
        let validity = to_time_delta(validity);
        self.registered_at
            .and_then(|registered_at| registered_at.checked_add_signed(validity))
    }

    /// Whether the sweep should scrub this kit at `now`.
    ///
    /// Pure function of `registered_at` and `now`: true once more than
    /// `validity` has elapsed since registration, false if the kit was never
    /// registered or is already expired.
    #[must_use]
    pub fn should_expire_at(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        if self.expired {
            return false;
        }
        self.registered_at
            .is_some_and(|registered_at| now.signed_duration_since(registered_at) > to_time_delta(validity))
    }
}

/// Convert a std duration, saturating at the largest representable delta.
fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn assert_invalid(result: Result<()>) {
        match result {
            Err(err) => assert_eq!(err.kind(), ErrorKind::Invalid, "unexpected error: {err}"),
            Ok(()) => panic!("expected an Invalid error"),
        }
    }

    #[test]
    fn id_validation() {
        assert_invalid(QuickTestId::new("").validate());
        assert_invalid(QuickTestId::new("abcdef").validate());
        assert!(QuickTestId::generate().validate().is_ok());
    }

    #[test]
    fn id_rejects_non_canonical_forms() {
        let id = QuickTestId::generate();
        assert_invalid(QuickTestId::new(id.as_str().to_uppercase()).validate());
        assert_invalid(QuickTestId::new(id.as_str().replace('-', "")).validate());
        assert_invalid(QuickTestId::new(format!("{{{id}}}")).validate());
    }

    #[test]
    fn id_rejects_non_random_uuids() {
        assert_invalid(QuickTestId::new(Uuid::nil().hyphenated().to_string()).validate());
        // Version 1 (time based)
        assert_invalid(QuickTestId::new("c232ab00-9414-11ec-b3c8-9f6bdeced846").validate());
        // Version 4 digit but a non-RFC 4122 variant (reserved, Microsoft, NCS)
        assert_invalid(QuickTestId::new("0f8fad5b-d9cb-469f-e165-70867728950e").validate());
        assert_invalid(QuickTestId::new("0f8fad5b-d9cb-469f-c165-70867728950e").validate());
        assert_invalid(QuickTestId::new("0f8fad5b-d9cb-469f-0165-70867728950e").validate());
        assert!(QuickTestId::new("0f8fad5b-d9cb-469f-a165-70867728950e").validate().is_ok());
    }

    #[test]
    fn id_from_str_validates() {
        assert!("abc".parse::<QuickTestId>().is_err());
        let id = QuickTestId::generate();
        assert_eq!(id.as_str().parse::<QuickTestId>().unwrap(), id);
    }

    #[test]
    fn register_validation() {
        assert_invalid(QuickTestRegister::new(QuickTestId::new(""), "Markus").validate());
        assert_invalid(QuickTestRegister::new(QuickTestId::new("abc"), "Markus").validate());
        assert_invalid(QuickTestRegister::new(QuickTestId::generate(), "").validate());
        assert_invalid(QuickTestRegister::new(QuickTestId::generate(), "   ").validate());
        assert_invalid(
            QuickTestRegister::new(
                QuickTestId::generate(),
                "a".repeat(QUICK_TEST_MAX_PERSON_LEN + 1),
            )
            .validate(),
        );

        assert!(QuickTestRegister::new(QuickTestId::generate(), "Markus").validate().is_ok());
    }

    #[test]
    fn person_limit_counts_characters() {
        // 4000 two-byte characters is 8000 bytes but still within the limit
        let person = "é".repeat(QUICK_TEST_MAX_PERSON_LEN);
        assert!(QuickTestRegister::new(QuickTestId::generate(), person).validate().is_ok());
    }

    #[test]
    fn registration_state() {
        let now = Utc::now();
        let mut qt = QuickTest::new(QuickTestId::generate(), now);
        assert!(!qt.is_registered());
        assert_eq!(qt.expires_at(QUICK_TEST_VALIDITY), None);

        qt.registered_at = Some(now);
        qt.person = Some("Tim".to_string());
        assert!(qt.is_registered());
        assert_eq!(
            qt.expires_at(QUICK_TEST_VALIDITY),
            Some(now + TimeDelta::hours(24))
        );
    }

    #[test]
    fn should_expire() {
        let now = Utc::now();
        let id = QuickTestId::generate();

        let mut outdated = QuickTest::new(id.clone(), now - TimeDelta::hours(30));
        outdated.registered_at = Some(now - TimeDelta::hours(25));
        assert!(outdated.should_expire_at(now, QUICK_TEST_VALIDITY));

        let mut fresh = QuickTest::new(id.clone(), now);
        fresh.registered_at = Some(now - TimeDelta::hours(23));
        assert!(!fresh.should_expire_at(now, QUICK_TEST_VALIDITY));

        let unregistered = QuickTest::new(id, now - TimeDelta::days(30));
        assert!(!unregistered.should_expire_at(now, QUICK_TEST_VALIDITY));

        outdated.expired = true;
        assert!(!outdated.should_expire_at(now, QUICK_TEST_VALIDITY));
    }

    #[test]
    fn json_omits_absent_fields() {
        let created_at = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let qt = QuickTest::new(QuickTestId::new("id-1"), created_at);

        let json = serde_json::to_value(&qt).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "id-1",
                "expired": false,
                "created_at": "2025-01-01T00:00:00Z",
            })
        );
    }

    proptest! {
        #[test]
        fn generated_ids_always_validate(_seed in 0u8..8) {
            prop_assert!(QuickTestId::generate().validate().is_ok());
        }

        #[test]
        fn short_strings_are_never_ids(s in "[a-z0-9-]{0,35}") {
            prop_assert!(QuickTestId::new(s).validate().is_err());
        }

        #[test]
        fn person_length_bound(len in 1usize..=QUICK_TEST_MAX_PERSON_LEN + 50) {
            let reg = QuickTestRegister::new(QuickTestId::generate(), "x".repeat(len));
            prop_assert_eq!(reg.validate().is_ok(), len <= QUICK_TEST_MAX_PERSON_LEN);
        }
    }
}
