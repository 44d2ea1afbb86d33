//! Listed expiration calendars.
//!
//! Entries are only allowed on dates where some listed expiration falls
//! inside the configured DTE window, which spaces trades the way discrete
//! expiration cycles do.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Which expirations are listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpirationCycle {
    /// Standard monthlies: third Friday of each month.
    #[default]
    Monthly,
    /// Every Friday.
    Weekly,
    /// An expiration exactly `min_dte` days out from any date.
    Continuous,
}

impl ExpirationCycle {
    /// Nearest listed expiration whose DTE from `date` lies in `[min_dte, max_dte]`.
    pub fn expiration_for(&self, date: NaiveDate, min_dte: i64, max_dte: i64) -> Option<NaiveDate> {
        if min_dte > max_dte {
            return None;
        }
        let earliest = date + Duration::days(min_dte);
        let latest = date + Duration::days(max_dte);

        let expiration = match self {
            Self::Continuous => Some(earliest),
            Self::Weekly => Some(next_weekday_on_or_after(earliest, Weekday::Fri)),
            Self::Monthly => {
                let (mut year, mut month) = (earliest.year(), earliest.month());
                let mut found = None;
                // The window never spans more than a handful of monthlies.
                for _ in 0..=(max_dte - min_dte) / 28 + 1 {
                    if let Some(third_friday) = third_friday(year, month) {
                        if third_friday >= earliest {
                            found = Some(third_friday);
                            break;
                        }
                    }
                    (year, month) = next_month(year, month);
                }
                found
            }
        };

        expiration.filter(|exp| *exp <= latest)
    }
}

impl fmt::Display for ExpirationCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
            Self::Continuous => "continuous",
        };
        f.write_str(name)
    }
}

impl FromStr for ExpirationCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            "continuous" => Ok(Self::Continuous),
            other => Err(format!("unknown expiration cycle '{}'", other)),
        }
    }
}

fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Fri, 3)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn next_weekday_on_or_after(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(ahead as i64)
}
