use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Reporting window for releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    All,
    Year(i32),
    Quarter { year: i32, quarter: u32 },
    Month { year: i32, month: u32 },
}

impl Period {
    /// Parse a period, falling back to [`Period::All`] with a warning on bad input.
    pub fn parse_lenient(s: &str) -> Self {
        match s.parse() {
            Ok(period) => period,
            Err(e) => {
                tracing::warn!(period = s, error = %e, "invalid period, showing all data");
                Period::All
            }
        }
    }

    /// Inclusive first and last day, or `None` for all time.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            Period::All => None,
            Period::Year(year) => Some((
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year, 12, 31)?,
            )),
            Period::Quarter { year, quarter } => {
                if !(1..=4).contains(&quarter) {
                    return None;
                }
                let start_month = (quarter - 1) * 3 + 1;
                Some((
                    NaiveDate::from_ymd_opt(year, start_month, 1)?,
                    last_day_of_month(year, start_month + 2)?,
                ))
            }
            Period::Month { year, month } => Some((
                NaiveDate::from_ymd_opt(year, month, 1)?,
                last_day_of_month(year, month)?,
            )),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self.date_range() {
            Some((start, end)) => start <= date && date <= end,
            None => true,
        }
    }

    /// Human-readable name: "All Time", "2025", "Q4 2025", "November 2025".
    pub fn display_name(&self) -> String {
        match *self {
            Period::All => "All Time".to_string(),
            Period::Year(year) => year.to_string(),
            Period::Quarter { year, quarter } => format!("Q{quarter} {year}"),
            Period::Month { year, month } => match NaiveDate::from_ymd_opt(year, month, 1) {
                Some(date) => date.format("%B %Y").to_string(),
                None => self.to_string(),
            },
        }
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::All => write!(f, "all"),
            Period::Year(year) => write!(f, "{year}"),
            Period::Quarter { year, quarter } => write!(f, "{year}-Q{quarter}"),
            Period::Month { year, month } => write!(f, "{year}-{month:02}"),
        }
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Period::All);
        }

        let parse_year = |y: &str| -> anyhow::Result<i32> {
            if y.len() != 4 || !y.chars().all(|c| c.is_ascii_digit()) {
                bail!("invalid year '{y}'");
            }
            Ok(y.parse()?)
        };

        if let Some((year, quarter)) = s.split_once("-Q").or_else(|| s.split_once("-q")) {
            let year = parse_year(year)?;
            let quarter: u32 = quarter
                .parse()
                .map_err(|_| anyhow!("invalid quarter '{quarter}'"))?;
            if !(1..=4).contains(&quarter) {
                bail!("quarter must be 1-4, got {quarter}");
            }
            return Ok(Period::Quarter { year, quarter });
        }

        if let Some((year, month)) = s.split_once('-') {
            let year = parse_year(year)?;
            let month: u32 = month
                .parse()
                .map_err(|_| anyhow!("invalid month '{month}'"))?;
            if !(1..=12).contains(&month) {
                bail!("month must be 1-12, got {month}");
            }
            return Ok(Period::Month { year, month });
        }

        Ok(Period::Year(parse_year(s).map_err(|_| {
            anyhow!("unknown period '{s}' (expected all, YYYY, YYYY-MM or YYYY-QN)")
        })?))
    }
}

/// First day of the month containing `date`, used to bucket timelines.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_all() {
        assert_eq!("all".parse::<Period>().unwrap(), Period::All);
        assert_eq!(Period::All.date_range(), None);
        assert!(Period::All.contains(ymd(1999, 1, 1)));
    }

    #[test]
    fn test_parse_year_range() {
        let period: Period = "2025".parse().unwrap();
        assert_eq!(period, Period::Year(2025));
        assert_eq!(period.date_range(), Some((ymd(2025, 1, 1), ymd(2025, 12, 31))));
    }

    #[test]
    fn test_parse_quarter_range() {
        let period: Period = "2025-Q4".parse().unwrap();
        assert_eq!(period, Period::Quarter { year: 2025, quarter: 4 });
        assert_eq!(period.date_range(), Some((ymd(2025, 10, 1), ymd(2025, 12, 31))));

        let q1: Period = "2024-Q1".parse().unwrap();
        assert_eq!(q1.date_range(), Some((ymd(2024, 1, 1), ymd(2024, 3, 31))));
    }

    #[test]
    fn test_parse_month_range_handles_leap_year() {
        let period: Period = "2024-02".parse().unwrap();
        assert_eq!(period.date_range(), Some((ymd(2024, 2, 1), ymd(2024, 2, 29))));
        let nov: Period = "2025-11".parse().unwrap();
        assert_eq!(nov.date_range(), Some((ymd(2025, 11, 1), ymd(2025, 11, 30))));
    }

    #[test]
    fn test_invalid_periods_rejected() {
        assert!("2025-Q5".parse::<Period>().is_err());
        assert!("2025-13".parse::<Period>().is_err());
        assert!("25".parse::<Period>().is_err());
        assert!("last-week".parse::<Period>().is_err());
    }

    #[test]
    fn test_parse_lenient_falls_back_to_all() {
        assert_eq!(Period::parse_lenient("2025-Q9"), Period::All);
        assert_eq!(Period::parse_lenient("2025-03"), Period::Month { year: 2025, month: 3 });
    }

    #[test]
    fn test_contains_is_inclusive() {
        let period: Period = "2025-11".parse().unwrap();
        assert!(period.contains(ymd(2025, 11, 1)));
        assert!(period.contains(ymd(2025, 11, 30)));
        assert!(!period.contains(ymd(2025, 12, 1)));
        assert!(!period.contains(ymd(2025, 10, 31)));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Period::All.display_name(), "All Time");
        assert_eq!(Period::Year(2025).display_name(), "2025");
        assert_eq!(
            Period::Quarter { year: 2025, quarter: 4 }.display_name(),
            "Q4 2025"
        );
        assert_eq!(
            Period::Month { year: 2025, month: 11 }.display_name(),
            "November 2025"
        );
    }

    #[test]
    fn test_slug_round_trips() {
        for s in ["all", "2025", "2025-Q4", "2025-03"] {
            let period: Period = s.parse().unwrap();
            assert_eq!(period.to_string(), s);
        }
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(ymd(2025, 11, 17)), ymd(2025, 11, 1));
    }
}
