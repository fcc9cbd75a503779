//! Quality selection and transformation URL construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::signals::EnvironmentSignals;

/// Default base of the image transformation (fetch) endpoint.
pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://res.cloudinary.com/deanhume/image/fetch";

/// Format directive sent with every transformation request.
pub const FORMAT_DIRECTIVE: &str = "f_auto";

/// Compression level requested from the transformation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLevel {
    /// Explicit quality, 1..=100.
    Fixed(u8),
    /// Let the service pick.
    Auto,
}

impl QualityLevel {
    pub const LOW: QualityLevel = QualityLevel::Fixed(30);
    pub const HIGH: QualityLevel = QualityLevel::Fixed(80);

    /// Path directive, e.g. `q_30` or `q_auto`.
    pub fn directive(&self) -> String {
        format!("q_{self}")
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLevel::Fixed(q) => write!(f, "{q}"),
            QualityLevel::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for QualityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(QualityLevel::Auto);
        }
        match s.parse::<u8>() {
            Ok(q) if (1..=100).contains(&q) => Ok(QualityLevel::Fixed(q)),
            _ => Err(format!("quality must be 1-100 or \"auto\", got {s:?}")),
        }
    }
}

impl Serialize for QualityLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QualityLevel::Fixed(q) => serializer.serialize_u8(*q),
            QualityLevel::Auto => serializer.serialize_str("auto"),
        }
    }
}

impl<'de> Deserialize<'de> for QualityLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => n.to_string().parse().map_err(serde::de::Error::custom),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// The two quality tiers used for adaptive images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTiers {
    pub low: QualityLevel,
    pub high: QualityLevel,
}

impl Default for QualityTiers {
    fn default() -> Self {
        Self {
            low: QualityLevel::LOW,
            high: QualityLevel::HIGH,
        }
    }
}

impl QualityTiers {
    /// Low tier when save-data is on, the connection is 2G-class, or the
    /// device has under 1 GB of memory. High tier otherwise.
    pub fn select(&self, signals: &EnvironmentSignals) -> QualityLevel {
        if signals.is_constrained() {
            self.low
        } else {
            self.high
        }
    }
}

/// Build `{endpoint}/{quality},f_auto/{original}`.
///
/// The original URL is appended verbatim; the fetch endpoint expects the
/// absolute URL as a raw path suffix.
pub fn transform_url(endpoint: &str, quality: QualityLevel, original_url: &str) -> String {
    format!(
        "{}/{},{}/{}",
        endpoint.trim_end_matches('/'),
        quality.directive(),
        FORMAT_DIRECTIVE,
        original_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive() {
        assert_eq!(QualityLevel::Fixed(30).directive(), "q_30");
        assert_eq!(QualityLevel::Auto.directive(), "q_auto");
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!("80".parse::<QualityLevel>(), Ok(QualityLevel::Fixed(80)));
        assert_eq!("AUTO".parse::<QualityLevel>(), Ok(QualityLevel::Auto));
        assert!("0".parse::<QualityLevel>().is_err());
        assert!("101".parse::<QualityLevel>().is_err());
        assert!("best".parse::<QualityLevel>().is_err());
    }

    #[test]
    fn test_serde_number_or_auto() {
        let tiers: QualityTiers = serde_json::from_str(r#"{"low": 1, "high": "auto"}"#).unwrap();
        assert_eq!(tiers.low, QualityLevel::Fixed(1));
        assert_eq!(tiers.high, QualityLevel::Auto);

        let json = serde_json::to_value(tiers).unwrap();
        assert_eq!(json, serde_json::json!({"low": 1, "high": "auto"}));

        assert!(serde_json::from_str::<QualityLevel>("300").is_err());
    }

    #[test]
    fn test_select_is_binary() {
        let tiers = QualityTiers::default();
        let fast = EnvironmentSignals {
            save_data: false,
            effective_type: Some("4g".into()),
            device_memory: Some(4.0),
        };
        assert_eq!(tiers.select(&fast), QualityLevel::Fixed(80));

        let saving = EnvironmentSignals {
            save_data: true,
            ..fast.clone()
        };
        assert_eq!(tiers.select(&saving), QualityLevel::Fixed(30));

        let slow = EnvironmentSignals {
            effective_type: Some("2g".into()),
            ..fast.clone()
        };
        assert_eq!(tiers.select(&slow), QualityLevel::Fixed(30));

        let tiny = EnvironmentSignals {
            device_memory: Some(0.5),
            ..fast
        };
        assert_eq!(tiers.select(&tiny), QualityLevel::Fixed(30));
    }

    #[test]
    fn test_transform_url() {
        assert_eq!(
            transform_url(
                DEFAULT_IMAGE_ENDPOINT,
                QualityLevel::Fixed(80),
                "https://site.example/img/photo.png"
            ),
            "https://res.cloudinary.com/deanhume/image/fetch/q_80,f_auto/https://site.example/img/photo.png"
        );
        assert_eq!(
            transform_url("http://127.0.0.1:9000/fetch/", QualityLevel::Auto, "http://o/a.gif"),
            "http://127.0.0.1:9000/fetch/q_auto,f_auto/http://o/a.gif"
        );
    }
}
