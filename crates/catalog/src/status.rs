//! Match lifecycle state machine.
//!
//! Every book record carries a `MatchStatus` describing how much trust its
//! metadata has earned, and a `Confidence` describing where that metadata
//! came from. Automation may only ever touch records it matched itself;
//! anything a human has touched is out of bounds for it.

use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// How a record's metadata relates to reality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStatus {
    /// No identification has succeeded yet.
    #[default]
    Unmatched,
    /// The cascade matched it without human involvement.
    AutoMatched,
    /// A human flagged it for attention, or a watched file vanished.
    NeedsReview,
    /// A human confirmed the metadata. Absorbing for automation.
    Confirmed,
    /// A human told automation to leave this record alone, permanently.
    Skip,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::AutoMatched => "auto_matched",
            Self::NeedsReview => "needs_review",
            Self::Confirmed => "confirmed",
            Self::Skip => "skip",
        }
    }

    /// May automated enrichment replace this record's metadata wholesale?
    ///
    /// Re-running enrichment over `auto_matched` records is allowed (fresher
    /// source data may have appeared); everything human-touched is not.
    pub fn can_auto_update(self) -> bool {
        matches!(self, Self::Unmatched | Self::AutoMatched)
    }

    /// Is the record protected from automated cleanup decisions?
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

impl FromStr for MatchStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "unmatched" => Self::Unmatched,
            "auto_matched" => Self::AutoMatched,
            "needs_review" => Self::NeedsReview,
            "confirmed" => Self::Confirmed,
            "skip" => Self::Skip,
            _ => exn::bail!(ErrorKind::InvalidData("match status")),
        })
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record's metadata came from and how sure the matcher was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confidence {
    /// No metadata attached yet.
    #[default]
    None,
    /// Matched on a title search or other fuzzy signal.
    Low,
    /// Matched on an exact identifier.
    High,
    /// Entered or confirmed by a human.
    Manual,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::High => "high",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for Confidence {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "none" => Self::None,
            "low" => Self::Low,
            "high" => Self::High,
            "manual" => Self::Manual,
            _ => exn::bail!(ErrorKind::InvalidData("confidence")),
        })
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MatchStatus::Unmatched, true)]
    #[case(MatchStatus::AutoMatched, true)]
    #[case(MatchStatus::NeedsReview, false)]
    #[case(MatchStatus::Confirmed, false)]
    #[case(MatchStatus::Skip, false)]
    fn test_auto_update_rules(#[case] status: MatchStatus, #[case] allowed: bool) {
        assert_eq!(status.can_auto_update(), allowed);
    }

    #[test]
    fn test_round_trip_through_strings() {
        for status in [
            MatchStatus::Unmatched,
            MatchStatus::AutoMatched,
            MatchStatus::NeedsReview,
            MatchStatus::Confirmed,
            MatchStatus::Skip,
        ] {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        assert!("totally_matched".parse::<MatchStatus>().is_err());
    }
}
