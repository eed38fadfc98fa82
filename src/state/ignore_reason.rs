use std::fmt;

/// Reason code recorded when a node ends in the `ignored` state
///
/// Quality rejections from the filter gate and scraping failures share one
/// column so analytics can group them, but they are distinct codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// Location matches a disallowed country
    BannedCountry,

    /// Too few optional profile fields are populated
    SparseProfile,

    /// No contribution calendar could be obtained
    NoContributionData,

    /// Total contributions below the configured minimum
    LowContributions,

    /// Active in too few distinct months
    FewActiveMonths,

    /// Contributions are concentrated on weekdays
    WeekdayHeavy,

    /// Fetching or processing the node failed
    ErrorScraping,
}

impl IgnoreReason {
    /// Returns true for outcomes produced by the filter gate
    pub fn is_quality_rejection(&self) -> bool {
        !matches!(self, Self::ErrorScraping)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::BannedCountry => "BANNED_COUNTRY",
            Self::SparseProfile => "SPARSE_PROFILE",
            Self::NoContributionData => "NO_CONTRIBUTION_DATA",
            Self::LowContributions => "LOW_CONTRIBUTIONS",
            Self::FewActiveMonths => "FEW_ACTIVE_MONTHS",
            Self::WeekdayHeavy => "WEEKDAY_HEAVY",
            Self::ErrorScraping => "ERROR_SCRAPING",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "BANNED_COUNTRY" => Some(Self::BannedCountry),
            "SPARSE_PROFILE" => Some(Self::SparseProfile),
            "NO_CONTRIBUTION_DATA" => Some(Self::NoContributionData),
            "LOW_CONTRIBUTIONS" => Some(Self::LowContributions),
            "FEW_ACTIVE_MONTHS" => Some(Self::FewActiveMonths),
            "WEEKDAY_HEAVY" => Some(Self::WeekdayHeavy),
            "ERROR_SCRAPING" => Some(Self::ErrorScraping),
            _ => None,
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
