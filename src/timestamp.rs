//! Timestamp handling for server responses.
//!
//! The server emits RFC 3339 timestamps with up to nanosecond precision
//! (`2021-05-11T03:12:22.563960100Z`). Values are normalized to
//! [`DateTime<Utc>`] truncated to microseconds.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer};

use crate::ClientError;

/// Conversion into the canonical timestamp representation.
pub trait IntoTimestamp {
    type Output;

    fn into_timestamp(self) -> Result<Self::Output, ClientError>;
}

impl IntoTimestamp for &str {
    type Output = DateTime<Utc>;

    fn into_timestamp(self) -> Result<Self::Output, ClientError> {
        let parsed = DateTime::parse_from_rfc3339(self)
            .map_err(|_| ClientError::InvalidTimestamp(self.to_owned()))?
            .with_timezone(&Utc);
        Ok(truncate_to_micros(parsed))
    }
}

impl IntoTimestamp for String {
    type Output = DateTime<Utc>;

    fn into_timestamp(self) -> Result<Self::Output, ClientError> {
        self.as_str().into_timestamp()
    }
}

/// Already canonical values pass through untouched.
impl IntoTimestamp for DateTime<Utc> {
    type Output = DateTime<Utc>;

    fn into_timestamp(self) -> Result<Self::Output, ClientError> {
        Ok(self)
    }
}

impl<T: IntoTimestamp> IntoTimestamp for Option<T> {
    type Output = Option<T::Output>;

    fn into_timestamp(self) -> Result<Self::Output, ClientError> {
        self.map(T::into_timestamp).transpose()
    }
}

fn truncate_to_micros(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(6)
}

/// Serde helper for optional timestamp fields.
pub(crate) fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.filter(|value| !value.is_empty())
        .into_timestamp()
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::IntoTimestamp;

    #[test]
    fn truncates_nanoseconds_to_microseconds() {
        let parsed = "2021-05-11T03:12:22.563960100Z"
            .into_timestamp()
            .expect("valid timestamp");
        let expected = NaiveDate::from_ymd_opt(2021, 5, 11)
            .and_then(|date| date.and_hms_micro_opt(3, 12, 22, 563_960))
            .expect("valid date");
        assert_eq!(parsed.naive_utc(), expected);
    }

    #[test]
    fn none_stays_none() {
        let parsed = None::<&str>.into_timestamp().expect("no-op");
        assert_eq!(parsed, None);
    }

    #[test]
    fn canonical_value_is_identity() {
        let value = Utc.with_ymd_and_hms(2021, 5, 11, 3, 12, 22).unwrap();
        assert_eq!(value.into_timestamp().expect("identity"), value);
        assert_eq!(Some(value).into_timestamp().expect("identity"), Some(value));
    }

    #[test]
    fn rejects_garbage() {
        assert!("yesterday".into_timestamp().is_err());
    }
}
