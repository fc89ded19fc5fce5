//! Retro filter selector sent alongside a submitted image.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Black-and-white conversion.
pub const FILTER_GRAYSCALE: &str = "grayscale";

/// Warm brown tint.
pub const FILTER_SEPIA: &str = "sepia";

/// Filters the service knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Grayscale,
    Sepia,
}

impl Filter {
    pub const ALL: [Filter; 2] = [Filter::Grayscale, Filter::Sepia];

    /// Wire name of the filter (the multipart `filter` field value).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grayscale => FILTER_GRAYSCALE,
            Self::Sepia => FILTER_SEPIA,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = CoreError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|filter| filter.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownFilter(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_known_filters() {
        assert_eq!("grayscale".parse::<Filter>().unwrap(), Filter::Grayscale);
        assert_eq!(" Sepia ".parse::<Filter>().unwrap(), Filter::Sepia);
    }

    #[test]
    fn rejects_unknown_filter() {
        assert_matches!("vaporwave".parse::<Filter>(), Err(CoreError::UnknownFilter(name)) if name == "vaporwave");
        assert_matches!("".parse::<Filter>(), Err(CoreError::UnknownFilter(_)));
    }

    #[test]
    fn display_matches_wire_name() {
        for filter in Filter::ALL {
            assert_eq!(filter.to_string(), filter.as_str());
            assert_eq!(filter.to_string().parse::<Filter>().unwrap(), filter);
        }
    }
}
