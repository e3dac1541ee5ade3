// src/slots.rs

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::error::ApiError;

/// Bookable hour labels, in the order the clinic day runs.
/// `12am` closes the day: it is midnight at the end of the given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeSlot {
    #[serde(rename = "6am")]
    SixAm,
    #[serde(rename = "7am")]
    SevenAm,
    #[serde(rename = "8am")]
    EightAm,
    #[serde(rename = "9am")]
    NineAm,
    #[serde(rename = "10am")]
    TenAm,
    #[serde(rename = "11am")]
    ElevenAm,
    #[serde(rename = "12pm")]
    TwelvePm,
    #[serde(rename = "1pm")]
    OnePm,
    #[serde(rename = "2pm")]
    TwoPm,
    #[serde(rename = "3pm")]
    ThreePm,
    #[serde(rename = "4pm")]
    FourPm,
    #[serde(rename = "5pm")]
    FivePm,
    #[serde(rename = "6pm")]
    SixPm,
    #[serde(rename = "7pm")]
    SevenPm,
    #[serde(rename = "8pm")]
    EightPm,
    #[serde(rename = "9pm")]
    NinePm,
    #[serde(rename = "10pm")]
    TenPm,
    #[serde(rename = "11pm")]
    ElevenPm,
    #[serde(rename = "12am")]
    TwelveAm,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("unknown time slot: {0}")]
    UnknownSlot(String),
    #[error("date must be YYYY-MM-DD or an RFC 3339 timestamp: {0}")]
    InvalidDate(String),
}

impl From<SlotError> for ApiError {
    fn from(e: SlotError) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", e.to_string())
    }
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 19] = [
        TimeSlot::SixAm,
        TimeSlot::SevenAm,
        TimeSlot::EightAm,
        TimeSlot::NineAm,
        TimeSlot::TenAm,
        TimeSlot::ElevenAm,
        TimeSlot::TwelvePm,
        TimeSlot::OnePm,
        TimeSlot::TwoPm,
        TimeSlot::ThreePm,
        TimeSlot::FourPm,
        TimeSlot::FivePm,
        TimeSlot::SixPm,
        TimeSlot::SevenPm,
        TimeSlot::EightPm,
        TimeSlot::NinePm,
        TimeSlot::TenPm,
        TimeSlot::ElevenPm,
        TimeSlot::TwelveAm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeSlot::SixAm => "6am",
            TimeSlot::SevenAm => "7am",
            TimeSlot::EightAm => "8am",
            TimeSlot::NineAm => "9am",
            TimeSlot::TenAm => "10am",
            TimeSlot::ElevenAm => "11am",
            TimeSlot::TwelvePm => "12pm",
            TimeSlot::OnePm => "1pm",
            TimeSlot::TwoPm => "2pm",
            TimeSlot::ThreePm => "3pm",
            TimeSlot::FourPm => "4pm",
            TimeSlot::FivePm => "5pm",
            TimeSlot::SixPm => "6pm",
            TimeSlot::SevenPm => "7pm",
            TimeSlot::EightPm => "8pm",
            TimeSlot::NinePm => "9pm",
            TimeSlot::TenPm => "10pm",
            TimeSlot::ElevenPm => "11pm",
            TimeSlot::TwelveAm => "12am",
        }
    }

    /// Accepts labels regardless of case and surrounding whitespace ("9AM").
    pub fn parse(label: &str) -> Result<Self, SlotError> {
        let wanted = label.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == wanted)
            .ok_or_else(|| SlotError::UnknownSlot(label.to_string()))
    }

    /// 6 for `6am` up to 24 for the closing `12am`.
    fn hours_after_midnight(self) -> i64 {
        // ALL starts at 6am and advances one hour per entry
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or_default();
        6 + idx as i64
    }

    pub fn start_on(self, day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
        let local = day.and_time(NaiveTime::MIN) + Duration::hours(self.hours_after_midnight());
        (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
    }
}

/// Calendar day of `date` as seen from the clinic.
pub fn parse_date(date: &str, offset: FixedOffset) -> Result<NaiveDate, SlotError> {
    let raw = date.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&offset).date_naive())
        .map_err(|_| SlotError::InvalidDate(date.to_string()))
}

/// Turns a slot label plus a date into the appointment's absolute start time.
pub fn start_time(time_value: &str, date: &str, offset: FixedOffset) -> Result<DateTime<Utc>, SlotError> {
    let slot = TimeSlot::parse(time_value)?;
    let day = parse_date(date, offset)?;
    Ok(slot.start_on(day, offset))
}
