use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geohash;

pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const ENDPOINT_MAX_LEN: usize = 2048;
pub const KEY_MAX_LEN: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Danger,
    Warning,
    Safe,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Danger => "danger",
            ReportType::Warning => "warning",
            ReportType::Safe => "safe",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ReportType::Danger => "🚨",
            ReportType::Warning => "⚠️",
            ReportType::Safe => "✅",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportType::Danger => "DANGER",
            ReportType::Warning => "Warning",
            ReportType::Safe => "All Clear",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "danger" => Ok(ReportType::Danger),
            "warning" => Ok(ReportType::Warning),
            "safe" => Ok(ReportType::Safe),
            other => Err(ValidationError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown report type {0:?}")]
    UnknownType(String),
    #[error("geohash must be {min}-{max} characters of the geohash alphabet")]
    Geohash { min: usize, max: usize },
    #[error("description must be at most 500 characters")]
    DescriptionTooLong,
    #[error("lat must be within [-90, 90]")]
    Latitude,
    #[error("long must be within [-180, 180]")]
    Longitude,
    #[error("endpoint must be an https URL")]
    Endpoint,
    #[error("subscription keys are missing or too long")]
    Keys,
}

/// A report as submitted by a client. Nothing here identifies the submitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub geohash: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    pub lat: f64,
    pub long: f64,
}

impl NewReport {
    pub fn validate(&self) -> Result<ReportType, ValidationError> {
        let kind = self.kind.parse::<ReportType>()?;
        if !geohash::is_valid_len(&self.geohash, geohash::REPORT_MIN_LEN) {
            return Err(ValidationError::Geohash {
                min: geohash::REPORT_MIN_LEN,
                max: geohash::MAX_LEN,
            });
        }
        if let Some(description) = &self.description {
            if description.chars().count() > DESCRIPTION_MAX_CHARS {
                return Err(ValidationError::DescriptionTooLong);
            }
        }
        if !valid_latitude(self.lat) {
            return Err(ValidationError::Latitude);
        }
        if !valid_longitude(self.long) {
            return Err(ValidationError::Longitude);
        }
        Ok(kind)
    }

    /// Description with surrounding whitespace removed; empty becomes `None`.
    pub fn normalized_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

pub fn valid_latitude(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

pub fn valid_longitude(long: f64) -> bool {
    long.is_finite() && (-180.0..=180.0).contains(&long)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A browser push subscription plus the coarse location it was made from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub geohash: String,
}

impl NewSubscription {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let endpoint = self.endpoint.as_str();
        if !endpoint.starts_with("https://")
            || endpoint.len() > ENDPOINT_MAX_LEN
            || endpoint.chars().any(char::is_whitespace)
        {
            return Err(ValidationError::Endpoint);
        }
        let key_ok = |key: &str| !key.trim().is_empty() && key.len() <= KEY_MAX_LEN;
        if !key_ok(&self.keys.p256dh) || !key_ok(&self.keys.auth) {
            return Err(ValidationError::Keys);
        }
        if !geohash::is_cell_len(&self.geohash, geohash::PROXIMITY_PREFIX_LEN) {
            return Err(ValidationError::Geohash {
                min: geohash::PROXIMITY_PREFIX_LEN,
                max: geohash::MAX_LEN,
            });
        }
        Ok(())
    }
}

/// Notification title for a stored report type. Unknown types get a generic
/// pin and label rather than failing.
pub fn notification_title(kind: &str) -> String {
    match kind.parse::<ReportType>() {
        Ok(kind) => format!("{} {}", kind.icon(), kind.label()),
        Err(_) => "📍 Report".to_string(),
    }
}

/// JSON body delivered to the service worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub id: String,
    pub url: String,
}

impl NotificationPayload {
    pub fn for_report(
        id: &str,
        kind: &str,
        description: Option<&str>,
        lat: f64,
        long: f64,
    ) -> Self {
        Self {
            title: notification_title(kind),
            body: description.unwrap_or_default().to_string(),
            id: id.to_string(),
            url: format!("/?lat={lat:.6}&long={long:.6}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(kind: &str) -> NewReport {
        NewReport {
            geohash: "9q8yyk12".to_string(),
            kind: kind.to_string(),
            description: Some("Ice on the bridge".to_string()),
            lat: 37.7749,
            long: -122.4194,
        }
    }

    fn subscription() -> NewSubscription {
        NewSubscription {
            endpoint: "https://push.example.net/send/abc".to_string(),
            keys: SubscriptionKeys {
                p256dh: "BEl62iUYgUivxIkv69yViEuiBIa".to_string(),
                auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
            },
            geohash: "9q8yab".to_string(),
        }
    }

    #[test]
    fn test_report_type_round_trip_names() {
        for kind in [ReportType::Danger, ReportType::Warning, ReportType::Safe] {
            assert_eq!(kind.as_str().parse::<ReportType>().unwrap(), kind);
        }
        assert!("fire".parse::<ReportType>().is_err());
    }

    #[test]
    fn test_report_type_serde_lowercase() {
        let json = serde_json::to_string(&ReportType::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }

    #[test]
    fn test_valid_report() {
        assert_eq!(report("danger").validate(), Ok(ReportType::Danger));
    }

    #[test]
    fn test_report_rejects_unknown_type() {
        assert_eq!(
            report("fire").validate(),
            Err(ValidationError::UnknownType("fire".to_string()))
        );
    }

    #[test]
    fn test_report_rejects_bad_geohash() {
        let mut r = report("safe");
        r.geohash = "9q8y".to_string();
        assert!(matches!(r.validate(), Err(ValidationError::Geohash { .. })));

        r.geohash = "9q8yyk12bcdef".to_string();
        assert!(matches!(r.validate(), Err(ValidationError::Geohash { .. })));
    }

    #[test]
    fn test_report_description_limit_counts_chars() {
        let mut r = report("warning");
        r.description = Some("é".repeat(DESCRIPTION_MAX_CHARS));
        assert!(r.validate().is_ok());

        r.description = Some("x".repeat(DESCRIPTION_MAX_CHARS + 1));
        assert_eq!(r.validate(), Err(ValidationError::DescriptionTooLong));
    }

    #[test]
    fn test_report_coordinate_bounds() {
        let mut r = report("danger");
        r.lat = 90.0;
        r.long = -180.0;
        assert!(r.validate().is_ok());

        r.lat = 90.5;
        assert_eq!(r.validate(), Err(ValidationError::Latitude));

        r.lat = 0.0;
        r.long = f64::NAN;
        assert_eq!(r.validate(), Err(ValidationError::Longitude));
    }

    #[test]
    fn test_normalized_description() {
        let mut r = report("safe");
        r.description = Some("   ".to_string());
        assert_eq!(r.normalized_description(), None);

        r.description = Some("  clear now ".to_string());
        assert_eq!(r.normalized_description(), Some("clear now"));
    }

    #[test]
    fn test_report_deserializes_type_field() {
        let r: NewReport = serde_json::from_str(
            r#"{"geohash":"9q8yyk","type":"danger","lat":1.5,"long":2.5}"#,
        )
        .unwrap();
        assert_eq!(r.kind, "danger");
        assert_eq!(r.description, None);
    }

    #[test]
    fn test_subscription_validation() {
        assert!(subscription().validate().is_ok());

        let mut s = subscription();
        s.endpoint = "http://push.example.net/send/abc".to_string();
        assert_eq!(s.validate(), Err(ValidationError::Endpoint));

        let mut s = subscription();
        s.keys.auth = String::new();
        assert_eq!(s.validate(), Err(ValidationError::Keys));

        let mut s = subscription();
        s.geohash = "9q8".to_string();
        assert!(matches!(s.validate(), Err(ValidationError::Geohash { .. })));
    }

    #[test]
    fn test_notification_titles() {
        assert_eq!(notification_title("danger"), "🚨 DANGER");
        assert_eq!(notification_title("warning"), "⚠️ Warning");
        assert_eq!(notification_title("safe"), "✅ All Clear");
        assert_eq!(notification_title("flood"), "📍 Report");
    }

    #[test]
    fn test_payload_for_report() {
        let payload =
            NotificationPayload::for_report("abc123", "danger", Some("Black ice"), 37.5, -122.25);

        assert_eq!(payload.title, "🚨 DANGER");
        assert_eq!(payload.body, "Black ice");
        assert_eq!(payload.id, "abc123");
        assert_eq!(payload.url, "/?lat=37.500000&long=-122.250000");
    }

    #[test]
    fn test_payload_without_description() {
        let payload = NotificationPayload::for_report("abc123", "safe", None, 0.0, 0.0);
        assert_eq!(payload.body, "");
    }
}
