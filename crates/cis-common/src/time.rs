//! Time handling for atmospheric datasets.
//!
//! Every time value inside the data model is a floating-point number of days
//! since the standard epoch, 1600-01-01 00:00:00 on the (proleptic) Gregorian
//! calendar. Readers convert on ingest with [`TimeUnits::to_std_days`].

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{CisError, Result};

/// Units string attached to every time coordinate after conversion.
pub const STD_TIME_UNITS: &str = "days since 1600-01-01 00:00:00";

/// Calendar recorded alongside [`STD_TIME_UNITS`].
pub const STD_CALENDAR: &str = "gregorian";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// The standard epoch as a naive (UTC) datetime.
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1600, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Convert a datetime to days since the standard epoch.
pub fn datetime_to_days(dt: NaiveDateTime) -> f64 {
    (dt - epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Convert days since the standard epoch back to a datetime (millisecond resolution).
pub fn days_to_datetime(days: f64) -> NaiveDateTime {
    epoch() + Duration::milliseconds((days * MILLIS_PER_DAY).round() as i64)
}

/// Which end of a partial datetime's interval to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
}

/// A datetime given to some precision only, e.g. `2010` or `2010-02-03T12`.
///
/// It denotes the closed interval of all instants sharing the given fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialDateTime {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<f64>,
}

impl PartialDateTime {
    /// Parse `YYYY[-MM[-DD[(T| )HH[:MM[:SS[.fff]]]]]]`, optionally suffixed with `Z`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || CisError::InvalidTime(format!("'{}' is not a valid date-time", s));

        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_suffix(" UTC")
            .or_else(|| trimmed.strip_suffix('Z'))
            .unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (date_part, time_part) = match trimmed.find(['T', ' ']) {
            Some(pos) => (&trimmed[..pos], Some(trimmed[pos + 1..].trim())),
            None => (trimmed, None),
        };

        // A leading '-' would be a negative year; not supported.
        let date_fields: Vec<&str> = date_part.split('-').collect();
        if date_fields.is_empty() || date_fields.len() > 3 {
            return Err(invalid());
        }
        let parse_u32 = |f: &str| f.parse::<u32>().map_err(|_| invalid());

        let year = date_fields[0].parse::<i32>().map_err(|_| invalid())?;
        let month = date_fields.get(1).map(|f| parse_u32(f)).transpose()?;
        let day = date_fields.get(2).map(|f| parse_u32(f)).transpose()?;

        let (mut hour, mut minute, mut second) = (None, None, None);
        if let Some(time) = time_part.filter(|t| !t.is_empty()) {
            if day.is_none() {
                return Err(invalid());
            }
            let time_fields: Vec<&str> = time.split(':').collect();
            if time_fields.len() > 3 {
                return Err(invalid());
            }
            hour = Some(parse_u32(time_fields[0])?);
            minute = time_fields.get(1).map(|f| parse_u32(f)).transpose()?;
            second = time_fields
                .get(2)
                .map(|f| f.parse::<f64>().map_err(|_| invalid()))
                .transpose()?;
        }

        let parsed = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        };
        // Validate field ranges by building both ends.
        parsed.to_datetime(Bound::Lower)?;
        parsed.to_datetime(Bound::Upper)?;
        Ok(parsed)
    }

    /// The first (lower) or last (upper) instant of the interval.
    pub fn to_datetime(&self, bound: Bound) -> Result<NaiveDateTime> {
        let invalid = || CisError::InvalidTime(format!("{:?} is out of range", self));
        let upper = bound == Bound::Upper;

        let month = self.month.unwrap_or(if upper { 12 } else { 1 });
        let day = match self.day {
            Some(d) => d,
            None if upper => last_day_of_month(self.year, month).ok_or_else(invalid)?,
            None => 1,
        };
        let hour = self.hour.unwrap_or(if upper { 23 } else { 0 });
        let minute = self.minute.unwrap_or(if upper { 59 } else { 0 });
        let (second, millis) = match self.second {
            Some(s) if (0.0..60.0).contains(&s) => {
                (s.trunc() as u32, ((s - s.trunc()) * 1000.0).round() as u32)
            }
            Some(_) => return Err(invalid()),
            None if upper => (59, 0),
            None => (0, 0),
        };

        NaiveDate::from_ymd_opt(self.year, month, day)
            .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis.min(999)))
            .ok_or_else(invalid)
    }

    /// Bound of the interval as days since the standard epoch.
    pub fn to_days(&self, bound: Bound) -> Result<f64> {
        Ok(datetime_to_days(self.to_datetime(bound)?))
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
}

/// Parse either a plain number (already days since epoch) or a partial datetime.
pub fn parse_time_value(s: &str, bound: Bound) -> Result<f64> {
    if let Ok(value) = s.trim().parse::<f64>() {
        return Ok(value);
    }
    PartialDateTime::parse(s)?.to_days(bound)
}

/// Parse an ISO-8601 duration (`P1Y2M3DT4H5M6S`, `PT30M`, `P2W`) into days.
///
/// Months count as 30 days and years as 365.
pub fn parse_iso_duration(s: &str) -> Result<f64> {
    let invalid = || CisError::InvalidTime(format!("'{}' is not an ISO 8601 duration", s));

    let body = s.trim().strip_prefix('P').ok_or_else(invalid)?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) => {
            if t.is_empty() {
                return Err(invalid());
            }
            (d, Some(t))
        }
        None => (body, None),
    };

    let mut total = 0.0;
    let mut components = 0;

    let mut accumulate = |part: &str, units: &[(char, f64)]| -> Result<()> {
        let mut number = String::new();
        let mut next_unit = 0;
        for ch in part.chars() {
            if ch.is_ascii_digit() || ch == '.' {
                number.push(ch);
                continue;
            }
            let pos = units[next_unit..]
                .iter()
                .position(|(designator, _)| *designator == ch)
                .ok_or_else(invalid)?;
            let value: f64 = number.parse().map_err(|_| invalid())?;
            total += value * units[next_unit + pos].1;
            next_unit += pos + 1;
            components += 1;
            number.clear();
        }
        if number.is_empty() {
            Ok(())
        } else {
            Err(invalid())
        }
    };

    accumulate(date_part, &[('Y', 365.0), ('M', 30.0), ('W', 7.0), ('D', 1.0)])?;
    if let Some(time) = time_part {
        accumulate(time, &[('H', 1.0 / 24.0), ('M', 1.0 / 1440.0), ('S', 1.0 / 86_400.0)])?;
    }

    if components == 0 {
        return Err(invalid());
    }
    Ok(total)
}

/// Parse a time delta given either as an ISO duration or as a number of days.
pub fn parse_time_delta(s: &str) -> Result<f64> {
    match s.trim().parse::<f64>() {
        Ok(days) => Ok(days),
        Err(_) => parse_iso_duration(s),
    }
}

/// Granularity of a CF-style time unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    /// Length of one unit in days.
    pub fn in_days(&self) -> f64 {
        match self {
            TimeUnit::Days => 1.0,
            TimeUnit::Hours => 1.0 / 24.0,
            TimeUnit::Minutes => 1.0 / 1440.0,
            TimeUnit::Seconds => 1.0 / 86_400.0,
        }
    }

    /// Parse from string (case-insensitive, singular or plural).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" | "days" | "d" => Some(Self::Days),
            "hour" | "hours" | "hr" | "hrs" | "h" => Some(Self::Hours),
            "minute" | "minutes" | "min" | "mins" => Some(Self::Minutes),
            "second" | "seconds" | "sec" | "secs" | "s" => Some(Self::Seconds),
            _ => None,
        }
    }
}

/// A parsed `"<unit> since <reference>"` units string with its calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: NaiveDateTime,
    pub calendar: String,
}

impl TimeUnits {
    /// Parse a CF units string such as `hours since 1970-01-01 00:00:00`.
    pub fn parse(units: &str, calendar: Option<&str>) -> Result<Self> {
        let calendar = calendar.unwrap_or(STD_CALENDAR).to_lowercase();
        if !matches!(
            calendar.as_str(),
            "standard" | "gregorian" | "proleptic_gregorian"
        ) {
            return Err(CisError::InvalidTime(format!(
                "calendar '{}' is not supported",
                calendar
            )));
        }

        let (unit, reference) = units.split_once(" since ").ok_or_else(|| {
            CisError::InvalidTime(format!("'{}' is not of the form '<unit> since <date>'", units))
        })?;
        let unit = TimeUnit::from_str(unit.trim())
            .ok_or_else(|| CisError::InvalidTime(format!("unknown time unit in '{}'", units)))?;
        let reference = PartialDateTime::parse(reference)?.to_datetime(Bound::Lower)?;

        Ok(Self {
            unit,
            reference,
            calendar,
        })
    }

    /// The standard units every time coordinate is converted to.
    pub fn standard() -> Self {
        Self {
            unit: TimeUnit::Days,
            reference: epoch(),
            calendar: STD_CALENDAR.to_string(),
        }
    }

    /// Convert a value in these units to days since the standard epoch.
    pub fn to_std_days(&self, value: f64) -> f64 {
        datetime_to_days(self.reference) + value * self.unit.in_days()
    }

    /// Check whether these are already the standard units.
    pub fn is_standard(&self) -> bool {
        self.unit == TimeUnit::Days && self.reference == epoch()
    }
}

/// Render days since epoch as an ISO-8601 string, for logs and `info` output.
pub fn format_days(days: f64) -> String {
    let dt = days_to_datetime(days);
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    }
}
