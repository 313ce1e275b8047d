/// Hierarchy level definitions
///
/// Each level of the division tree has a fixed code width and a CSS class
/// marking its rows in the published tables.
use std::fmt;

/// One of the five administrative levels, from widest to narrowest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    /// Province-level division (省级)
    Province,

    /// Prefecture-level city (地级)
    City,

    /// County-level division (县级)
    County,

    /// Town or sub-district (乡级)
    Town,

    /// Village or residential committee (村级)
    Village,
}

impl Level {
    /// Number of significant code digits at this level
    ///
    /// Published codes are always 12 digits wide; everything past this width is
    /// zero padding for display.
    pub fn code_width(&self) -> usize {
        match self {
            Self::Province => 2,
            Self::City => 4,
            Self::County => 6,
            Self::Town => 9,
            Self::Village => 12,
        }
    }

    /// CSS class of the table rows listing divisions of this level
    pub fn row_marker(&self) -> &'static str {
        match self {
            Self::Province => "provincetr",
            Self::City => "citytr",
            Self::County => "countytr",
            Self::Town => "towntr",
            Self::Village => "villagetr",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Province => "province",
            Self::City => "city",
            Self::County => "county",
            Self::Town => "town",
            Self::Village => "village",
        }
    }

    /// Returns all levels, top to bottom
    pub fn all() -> [Self; 5] {
        [
            Self::Province,
            Self::City,
            Self::County,
            Self::Town,
            Self::Village,
        ]
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
