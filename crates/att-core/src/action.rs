//! Badge action enum as the single source of truth for action strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two canonical badge actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Arrival,
    Departure,
}

impl Action {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Arrival => "arrival",
            Self::Departure => "departure",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    /// Matching ignores case and surrounding whitespace.
    ///
    /// Source terminals log localized verbs ("Príchod"/"Odchod"), sometimes
    /// with the diacritics stripped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.trim().to_lowercase();
        match folded.as_str() {
            "arrival" | "arrive" | "in" | "check-in" | "checkin" | "príchod" | "prichod" => {
                Ok(Self::Arrival)
            }
            "departure" | "depart" | "out" | "check-out" | "checkout" | "odchod" => {
                Ok(Self::Departure)
            }
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unrecognized action strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(String);

impl UnknownAction {
    /// The action string as it appeared in the source.
    pub fn raw(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action: {}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        for variant in [Action::Arrival, Action::Departure] {
            let s = variant.to_string();
            let parsed: Action = s.parse().expect("should parse");
            assert_eq!(parsed, variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn localized_verbs_parse_case_insensitively() {
        for raw in ["Príchod", "PRÍCHOD", "príchod", " prichod "] {
            assert_eq!(raw.parse::<Action>().unwrap(), Action::Arrival, "{raw}");
        }
        for raw in ["Odchod", "ODCHOD", "Departure", "check-out"] {
            assert_eq!(raw.parse::<Action>().unwrap(), Action::Departure, "{raw}");
        }
    }

    #[test]
    fn unknown_action_errors() {
        let err = "Prestávka".parse::<Action>().unwrap_err();
        assert_eq!(err.raw(), "Prestávka");
        assert_eq!(err.to_string(), "unknown action: Prestávka");
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&Action::Departure).unwrap();
        assert_eq!(json, r#""departure""#);
        let parsed: Action = serde_json::from_str(r#""Odchod""#).unwrap();
        assert_eq!(parsed, Action::Departure);
    }
}
