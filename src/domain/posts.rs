//! Date and path rules for posts.

use time::{
    Date, Duration, Month, OffsetDateTime, Time, UtcOffset, format_description::FormatItem,
    macros::format_description,
};

use crate::domain::error::DomainError;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
pub const HUMAN_DATETIME_FORMAT: &[FormatItem<'static>] = format_description!(
    "[month repr:long] [day padding:none], [year], [hour]:[minute] UTC"
);

/// Calendar day (UTC) a post is published on, as addressed by detail URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishDay(Date);

impl PublishDay {
    pub fn new(year: i32, month: u8, day: u8) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidDate { year, month, day };
        let month_value = Month::try_from(month).map_err(|_| invalid())?;
        Date::from_calendar_date(year, month_value, day)
            .map(Self)
            .map_err(|_| invalid())
    }

    /// Parse the raw path segments. Only plain digit runs are accepted.
    pub fn parse(year: &str, month: &str, day: &str) -> Result<Self, DomainError> {
        let year = parse_digits::<i32>(year, "year")?;
        let month = parse_digits::<u8>(month, "month")?;
        let day = parse_digits::<u8>(day, "day")?;
        Self::new(year, month, day)
    }

    pub fn of(timestamp: OffsetDateTime) -> Self {
        Self(timestamp.to_offset(UtcOffset::UTC).date())
    }

    pub fn date(self) -> Date {
        self.0
    }

    /// Half-open `[start, end)` UTC range covering the day.
    ///
    /// `None` for the last representable date, which has no following midnight.
    pub fn utc_bounds(self) -> Option<(OffsetDateTime, OffsetDateTime)> {
        let start = self.0.with_time(Time::MIDNIGHT).assume_utc();
        let end = start.checked_add(Duration::DAY)?;
        Some((start, end))
    }
}

fn parse_digits<T: std::str::FromStr>(raw: &str, component: &'static str) -> Result<T, DomainError> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(DomainError::invalid_component(component, raw));
    }
    raw.parse::<T>()
        .map_err(|_| DomainError::invalid_component(component, raw))
}

pub fn canonical_path(slug: &str, publish: OffsetDateTime) -> String {
    let date = PublishDay::of(publish).date();
    format!(
        "/{}/{}/{}/{}/",
        date.year(),
        u8::from(date.month()),
        date.day(),
        slug
    )
}

pub fn format_human_date(timestamp: OffsetDateTime) -> String {
    let date = PublishDay::of(timestamp).date();
    date.format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn format_human_datetime(timestamp: OffsetDateTime) -> String {
    let utc = timestamp.to_offset(UtcOffset::UTC);
    utc.format(HUMAN_DATETIME_FORMAT)
        .unwrap_or_else(|_| utc.to_string())
}

/// Keep the first `limit` whitespace-separated words, appending an ellipsis when cut.
pub fn truncate_words(text: &str, limit: usize) -> String {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(limit).collect();
    let mut out = kept.join(" ");
    if words.next().is_some() {
        out.push_str(" …");
    }
    out
}
