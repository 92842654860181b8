use chrono::{Datelike, Days, Local, NaiveDate};

/// The upcoming Sunday relative to `today`; `today` itself if it is a Sunday.
pub fn next_sunday(today: NaiveDate) -> NaiveDate {
    let days_until = (7 - today.weekday().num_days_from_sunday()) % 7;
    today + Days::new(u64::from(days_until))
}

/// Service date used when the caller gives none.
pub fn default_service_date() -> NaiveDate {
    next_sunday(Local::now().date_naive())
}

/// Long display form, e.g. "Sunday, December 15, 2024".
pub fn format_service_date(date: NaiveDate) -> String {
    date.format("%A, %B %d, %Y").to_string()
}
