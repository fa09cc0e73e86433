//! Location categories the inspection service groups region-specific info
//! types under.

use std::fmt;
use std::str::FromStr;

use crate::error::InspectionError;

const KNOWN: &[&str] = &[
    "GLOBAL",
    "ARGENTINA",
    "ARMENIA",
    "AUSTRALIA",
    "AZERBAIJAN",
    "BELARUS",
    "BELGIUM",
    "BRAZIL",
    "CANADA",
    "CHILE",
    "CHINA",
    "COLOMBIA",
    "CROATIA",
    "DENMARK",
    "FRANCE",
    "FINLAND",
    "GERMANY",
    "HONG_KONG",
    "INDIA",
    "INDONESIA",
    "IRELAND",
    "ISRAEL",
    "ITALY",
    "JAPAN",
    "KAZAKHSTAN",
    "KOREA",
    "MEXICO",
    "THE_NETHERLANDS",
    "NEW_ZEALAND",
    "NORWAY",
    "PARAGUAY",
    "PERU",
    "POLAND",
    "PORTUGAL",
    "RUSSIA",
    "SINGAPORE",
    "SOUTH_AFRICA",
    "SPAIN",
    "SWEDEN",
    "SWITZERLAND",
    "TAIWAN",
    "THAILAND",
    "TURKEY",
    "UKRAINE",
    "UNITED_KINGDOM",
    "UNITED_STATES",
    "URUGUAY",
    "UZBEKISTAN",
    "VENEZUELA",
];

/// A validated location category (`GLOBAL`, `UNITED_STATES`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationCategory(&'static str);

impl LocationCategory {
    pub const GLOBAL: Self = Self("GLOBAL");

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.0 == "GLOBAL"
    }
}

impl fmt::Display for LocationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl FromStr for LocationCategory {
    type Err = InspectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        KNOWN
            .iter()
            .copied()
            .find(|known| *known == wanted)
            .map(Self)
            .ok_or_else(|| InspectionError::UnknownLocationCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("GLOBAL", "GLOBAL")]
    #[case("united_states", "UNITED_STATES")]
    #[case("United Kingdom", "UNITED_KINGDOM")]
    #[case("hong-kong", "HONG_KONG")]
    fn parses_known_categories(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(raw.parse::<LocationCategory>().unwrap().as_str(), expected);
    }

    #[test]
    fn rejects_unknown_category() {
        let err = "ATLANTIS".parse::<LocationCategory>().unwrap_err();
        assert!(matches!(err, InspectionError::UnknownLocationCategory(_)));
    }
}
