//! Display labels for synthesized day and level titles.
//!
//! Locale only ever changes these strings, never plan structure.

use std::fmt;

/// Label language. Anything not recognized as French renders in English.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    /// Map a loose locale tag (`fr`, `fr-CA`, `FR_be`, `en-US`, ...) to a
    /// label language by its primary subtag.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match primary.as_str() {
            "fr" | "fra" | "fre" | "french" | "francais" | "français" => Self::Fr,
            _ => Self::En,
        }
    }

    /// Title for the `n`-th day (1-based).
    pub fn day_label(self, n: u32) -> String {
        match self {
            Self::En => format!("Day {n}"),
            Self::Fr => format!("Jour {n}"),
        }
    }

    /// Title for the `n`-th level (1-based).
    pub fn week_label(self, n: u32) -> String {
        match self {
            Self::En => format!("Week {n}"),
            Self::Fr => format!("Semaine {n}"),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::En => f.write_str("en"),
            Self::Fr => f.write_str("fr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_like_tags() {
        for tag in ["fr", "FR", "fr-CA", "fr_BE", " fr ", "French", "français", "FRANÇAIS"] {
            assert_eq!(Locale::from_tag(tag), Locale::Fr, "tag {tag:?}");
        }
    }

    #[test]
    fn everything_else_is_english() {
        for tag in ["en", "en-US", "de", "", "frisian", "f"] {
            assert_eq!(Locale::from_tag(tag), Locale::En, "tag {tag:?}");
        }
    }

    #[test]
    fn labels() {
        assert_eq!(Locale::En.day_label(3), "Day 3");
        assert_eq!(Locale::Fr.day_label(3), "Jour 3");
        assert_eq!(Locale::En.week_label(2), "Week 2");
        assert_eq!(Locale::Fr.week_label(2), "Semaine 2");
    }
}
